//! Per-variable vector storage.
//!
//! [`VectorValues`] maps each variable to a dense vector of that variable's
//! dimension. It carries right-hand sides, solutions, gradients and
//! row-block residuals between the network algorithms.

use std::collections::BTreeMap;

use nalgebra::DVector;

use crate::error::{BayesNetError, BayesNetResult};

/// Opaque variable identifier.
pub type Key = usize;

/// Ordered map from variable to value vector.
///
/// Iteration is in key order, so every algorithm that walks a
/// `VectorValues` is deterministic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VectorValues {
    values: BTreeMap<Key, DVector<f64>>,
}

impl VectorValues {
    /// Create an empty assignment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value. Fails if the variable already has one.
    pub fn insert(&mut self, key: Key, value: DVector<f64>) -> BayesNetResult<()> {
        if self.values.contains_key(&key) {
            return Err(BayesNetError::DuplicateKey { key });
        }
        self.values.insert(key, value);
        Ok(())
    }

    /// Builder-style insert for literals in tests and examples.
    pub fn with(mut self, key: Key, value: &[f64]) -> BayesNetResult<Self> {
        self.insert(key, DVector::from_column_slice(value))?;
        Ok(self)
    }

    pub fn get(&self, key: Key) -> Option<&DVector<f64>> {
        self.values.get(&key)
    }

    /// Value for `key`, or `MissingValue`.
    pub fn require(&self, key: Key) -> BayesNetResult<&DVector<f64>> {
        self.values
            .get(&key)
            .ok_or(BayesNetError::MissingValue { key })
    }

    pub fn contains(&self, key: Key) -> bool {
        self.values.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = Key> + '_ {
        self.values.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Key, &DVector<f64>)> {
        self.values.iter().map(|(&k, v)| (k, v))
    }

    /// Sum of all vector lengths.
    pub fn total_dim(&self) -> usize {
        self.values.values().map(|v| v.len()).sum()
    }

    /// Same keys and dimensions, all entries zero.
    pub fn zero_like(&self) -> Self {
        self.map(|v| DVector::zeros(v.len()))
    }

    /// Every entry multiplied by `alpha`.
    pub fn scaled(&self, alpha: f64) -> Self {
        self.map(|v| v * alpha)
    }

    /// Inner product over all variables. Both sides must have the same structure.
    pub fn dot(&self, other: &VectorValues) -> BayesNetResult<f64> {
        self.check_same_structure(other)?;
        Ok(self
            .values
            .iter()
            .map(|(k, v)| v.dot(&other.values[k]))
            .sum())
    }

    pub fn squared_norm(&self) -> f64 {
        self.values.values().map(|v| v.norm_squared()).sum()
    }

    pub fn norm(&self) -> f64 {
        self.squared_norm().sqrt()
    }

    /// Elementwise `self + other`.
    pub fn add(&self, other: &VectorValues) -> BayesNetResult<Self> {
        self.check_same_structure(other)?;
        Ok(self.zip_map(other, |a, b| a + b))
    }

    /// Elementwise `self - other`.
    pub fn sub(&self, other: &VectorValues) -> BayesNetResult<Self> {
        self.check_same_structure(other)?;
        Ok(self.zip_map(other, |a, b| a - b))
    }

    /// Largest absolute entrywise difference; `None` if the structures differ.
    pub fn max_abs_diff(&self, other: &VectorValues) -> Option<f64> {
        self.check_same_structure(other).ok()?;
        Some(
            self.values
                .iter()
                .map(|(k, v)| (v - &other.values[k]).amax())
                .fold(0.0, f64::max),
        )
    }

    pub(crate) fn entry_mut(&mut self, key: Key) -> Option<&mut DVector<f64>> {
        self.values.get_mut(&key)
    }

    pub(crate) fn set(&mut self, key: Key, value: DVector<f64>) {
        self.values.insert(key, value);
    }

    fn map(&self, f: impl Fn(&DVector<f64>) -> DVector<f64>) -> Self {
        Self {
            values: self.values.iter().map(|(&k, v)| (k, f(v))).collect(),
        }
    }

    fn zip_map(
        &self,
        other: &VectorValues,
        f: impl Fn(&DVector<f64>, &DVector<f64>) -> DVector<f64>,
    ) -> Self {
        Self {
            values: self
                .values
                .iter()
                .map(|(&k, v)| (k, f(v, &other.values[&k])))
                .collect(),
        }
    }

    fn check_same_structure(&self, other: &VectorValues) -> BayesNetResult<()> {
        for (&key, v) in &self.values {
            let w = other.require(key)?;
            if v.len() != w.len() {
                return Err(BayesNetError::dims(
                    format!("value of variable {}", key),
                    v.len(),
                    w.len(),
                ));
            }
        }
        if let Some(key) = other.keys().find(|k| !self.contains(*k)) {
            return Err(BayesNetError::MissingValue { key });
        }
        Ok(())
    }
}

impl FromIterator<(Key, DVector<f64>)> for VectorValues {
    /// Later duplicates overwrite earlier ones.
    fn from_iter<I: IntoIterator<Item = (Key, DVector<f64>)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}
