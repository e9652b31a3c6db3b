//! Linear algebra layer.
//!
//! Dense triangular solves on conditional blocks, sparse matrix helpers,
//! and assembly of a network into one sparse system.

pub mod assemble;
pub mod sparse;
pub mod triangular;
