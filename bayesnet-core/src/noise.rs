//! Per-row noise scales of a conditional.
//!
//! Only diagonal noise is represented; each row of a conditional has its own
//! standard deviation and is whitened by dividing through by it.

use nalgebra::DVector;

use crate::error::{BayesNetError, BayesNetResult};
use crate::values::Key;

/// Standard deviations of a conditional's rows.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum NoiseScale {
    /// All sigmas equal to one (already whitened)
    #[default]
    Unit,

    /// Same sigma on every row
    Isotropic(f64),

    /// One sigma per row
    Diagonal(DVector<f64>),
}

impl NoiseScale {
    /// Resolve to a sigma vector for a block of `dim` rows.
    ///
    /// `key` only labels errors.
    pub fn sigmas(&self, dim: usize, key: Key) -> BayesNetResult<DVector<f64>> {
        let sigmas = match self {
            NoiseScale::Unit => DVector::from_element(dim, 1.0),
            NoiseScale::Isotropic(sigma) => DVector::from_element(dim, *sigma),
            NoiseScale::Diagonal(sigmas) => {
                if sigmas.len() != dim {
                    return Err(BayesNetError::dims(
                        format!("sigmas of variable {}", key),
                        dim,
                        sigmas.len(),
                    ));
                }
                sigmas.clone()
            }
        };

        if let Some(&sigma) = sigmas.iter().find(|s| !(s.is_finite() && **s > 0.0)) {
            return Err(BayesNetError::InvalidNoise { key, sigma });
        }
        Ok(sigmas)
    }
}
