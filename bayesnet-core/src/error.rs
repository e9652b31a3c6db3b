//! Error types for Bayes network construction and solves.

use crate::values::Key;
use thiserror::Error;

/// Errors raised while building or solving a Gaussian Bayes network.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BayesNetError {
    /// A diagonal pivot of some R block is zero, subnormal, below the pivot
    /// tolerance, or produced a non-finite solution
    #[error("Degenerate system: pivot {pivot:e} at row {row} of the block for variable {key}")]
    DegenerateSystem {
        /// First frontal variable of the offending block (the variable owning
        /// the column for an assembled solve)
        key: Key,
        /// Row within the block
        row: usize,
        /// Offending diagonal entry
        pivot: f64,
    },

    /// A parent value is unavailable when its child is solved
    #[error("Missing parent: variable {parent} is not solved before its child {child}")]
    MissingParent {
        /// Parent variable
        parent: Key,
        /// First frontal variable of the child block
        child: Key,
    },

    /// An assignment lacks a variable the operation needs
    #[error("Missing value for variable {key}")]
    MissingValue {
        /// Variable without a value
        key: Key,
    },

    /// Block or vector dimensions disagree
    #[error("Dimension mismatch in {context}: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// What was being checked
        context: String,
        /// Expected dimension
        expected: usize,
        /// Actual dimension
        actual: usize,
    },

    /// The steepest-descent curvature gᵀRᵀRg vanished, including a zero gradient
    #[error("Degenerate gradient: curvature along the gradient is {denominator:e}")]
    DegenerateGradient {
        /// The offending denominator
        denominator: f64,
    },

    /// A variable is defined twice
    #[error("Duplicate variable {key}")]
    DuplicateKey {
        /// Repeated variable
        key: Key,
    },

    /// R has a nonzero entry below its diagonal
    #[error("R block for variable {key} is not upper triangular: nonzero at ({row}, {col})")]
    NotUpperTriangular {
        /// First frontal variable of the block
        key: Key,
        /// Row of the entry
        row: usize,
        /// Column of the entry
        col: usize,
    },

    /// A noise sigma is not finite and positive
    #[error("Invalid noise sigma {sigma} for variable {key}")]
    InvalidNoise {
        /// First frontal variable of the block
        key: Key,
        /// Offending sigma
        sigma: f64,
    },
}

impl BayesNetError {
    pub(crate) fn dims(context: impl Into<String>, expected: usize, actual: usize) -> Self {
        BayesNetError::DimensionMismatch {
            context: context.into(),
            expected,
            actual,
        }
    }
}

/// Result type for Bayes network operations.
pub type BayesNetResult<T> = Result<T, BayesNetError>;
