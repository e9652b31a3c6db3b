//! bayesnet-core: linear-Gaussian Bayes networks in square-root information form
//!
//! Eliminating a sparse linear least-squares problem (QR or Cholesky style)
//! produces a sequence of Gaussian conditionals
//!
//! ```text
//! R_i x_{f_i} = d_i - Σ_j S_ij x_{p_ij} + noise_i
//! ```
//!
//! that together form a block upper-triangular system `R x = d`. This crate
//! stores that sequence and runs the operations a nonlinear least-squares
//! solver needs from it:
//!
//! - **Back-substitution**: the maximum-likelihood point, or a solve against a
//!   different right-hand side on the same structure
//! - **Transposed back-substitution**: `R_wᵀ y = x`
//! - **Determinant** of the whitened square-root information matrix
//! - **Steepest-descent (Cauchy) point** of `0.5 ||R_w x - d_w||²`, the
//!   gradient leg of dogleg trust-region steps, without forming `RᵀR`
//! - **Assembly** into one sparse matrix for diagnostics and validation
//!
//! Producing the network (elimination, orderings) and driving it (the
//! nonlinear iteration) are left to the caller.
//!
//! # Example
//!
//! ```
//! use bayesnet_core::{GaussianBayesNet, GaussianConditional, NoiseScale};
//! use nalgebra::{DMatrix, DVector};
//!
//! // x + y = 9, y = 5
//! let x_given_y = GaussianConditional::single(
//!     0,
//!     DVector::from_element(1, 9.0),
//!     DMatrix::from_element(1, 1, 1.0),
//!     vec![(1, DMatrix::from_element(1, 1, 1.0))],
//!     NoiseScale::Unit,
//! )?;
//! let y = GaussianConditional::single(
//!     1,
//!     DVector::from_element(1, 5.0),
//!     DMatrix::from_element(1, 1, 1.0),
//!     vec![],
//!     NoiseScale::Unit,
//! )?;
//!
//! let net = GaussianBayesNet::new(vec![x_given_y, y])?;
//! let solution = net.optimize()?;
//! assert_eq!(solution.get(0).unwrap()[0], 4.0);
//! assert_eq!(solution.get(1).unwrap()[0], 5.0);
//! # Ok::<(), bayesnet_core::BayesNetError>(())
//! ```

#![warn(clippy::all)]

pub mod conditional;
pub mod error;
pub mod linalg;
pub mod network;
pub mod noise;
pub mod settings;
pub mod values;

// Re-export main types
pub use conditional::GaussianConditional;
pub use error::{BayesNetError, BayesNetResult};
pub use linalg::assemble::{AssembledSystem, ColumnLayout};
pub use network::GaussianBayesNet;
pub use noise::NoiseScale;
pub use settings::NetworkSettings;
pub use values::{Key, VectorValues};
