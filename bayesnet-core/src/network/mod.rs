//! Gaussian Bayes networks.
//!
//! A [`GaussianBayesNet`] is the result of eliminating a linear-Gaussian
//! factor graph: a flat sequence of conditionals in elimination order, where
//! every parent of the conditional at position `i` is a frontal variable of a
//! conditional at some position `j > i`. Stacking the conditionals' rows gives
//! a block upper-triangular square-root information matrix `R` and vector `d`.
//!
//! The network is stored as an arena (`Vec<GaussianConditional>`) plus an
//! index from variable to the position of its defining conditional, so
//! parent lookups are index lookups and the ordering check is a single pass.
//!
//! Algorithms live in submodules:
//! - [`solve`]: back-substitution and its transpose
//! - [`determinant`]: determinant of the whitened `R`
//! - [`gradient`]: structural products, errors, gradients and the steepest-descent point

pub mod determinant;
pub mod gradient;
pub mod solve;

use std::collections::{BTreeMap, HashMap};

use crate::conditional::GaussianConditional;
use crate::error::{BayesNetError, BayesNetResult};
use crate::linalg::assemble::{AssembledSystem, ColumnLayout};
use crate::settings::NetworkSettings;
use crate::values::{Key, VectorValues};

/// Where a variable is defined inside the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    /// Position of the defining conditional
    pub position: usize,
    /// Dimension of the variable
    pub dim: usize,
}

/// Ordered, validated sequence of Gaussian conditionals.
#[derive(Debug, Clone)]
pub struct GaussianBayesNet {
    conditionals: Vec<GaussianConditional>,
    index: HashMap<Key, Slot>,
    settings: NetworkSettings,
}

impl GaussianBayesNet {
    /// Build a network with default settings.
    ///
    /// Fails if a variable is defined twice, a parent is not defined by a
    /// later conditional, or an S block disagrees with its parent's dimension.
    pub fn new(conditionals: Vec<GaussianConditional>) -> BayesNetResult<Self> {
        Self::with_settings(conditionals, NetworkSettings::default())
    }

    /// Build a network with explicit settings.
    pub fn with_settings(
        conditionals: Vec<GaussianConditional>,
        settings: NetworkSettings,
    ) -> BayesNetResult<Self> {
        let mut index = HashMap::new();
        for (position, conditional) in conditionals.iter().enumerate() {
            for &(key, dim) in conditional.frontals() {
                if index.insert(key, Slot { position, dim }).is_some() {
                    return Err(BayesNetError::DuplicateKey { key });
                }
            }
        }

        for (position, conditional) in conditionals.iter().enumerate() {
            for (parent, s) in conditional.parents() {
                let slot = index
                    .get(parent)
                    .filter(|slot| slot.position > position)
                    .ok_or(BayesNetError::MissingParent {
                        parent: *parent,
                        child: conditional.first_frontal(),
                    })?;
                if s.ncols() != slot.dim {
                    return Err(BayesNetError::dims(
                        format!(
                            "columns of S for parent {} of variable {}",
                            parent,
                            conditional.first_frontal()
                        ),
                        slot.dim,
                        s.ncols(),
                    ));
                }
            }
        }

        let net = Self {
            conditionals,
            index,
            settings,
        };
        log::debug!(
            "Gaussian Bayes net: {} conditionals, {} variables, dim {}",
            net.len(),
            net.index.len(),
            net.total_dim()
        );
        Ok(net)
    }

    pub fn settings(&self) -> &NetworkSettings {
        &self.settings
    }

    /// Number of conditionals.
    pub fn len(&self) -> usize {
        self.conditionals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conditionals.is_empty()
    }

    pub fn conditionals(&self) -> &[GaussianConditional] {
        &self.conditionals
    }

    pub fn iter(&self) -> std::slice::Iter<'_, GaussianConditional> {
        self.conditionals.iter()
    }

    /// All variables in elimination order.
    pub fn keys(&self) -> Vec<Key> {
        self.conditionals
            .iter()
            .flat_map(|c| c.frontal_keys())
            .collect()
    }

    /// Dimension of every variable.
    pub fn dims(&self) -> BTreeMap<Key, usize> {
        self.index.iter().map(|(&k, slot)| (k, slot.dim)).collect()
    }

    /// Total number of scalar unknowns (and rows).
    pub fn total_dim(&self) -> usize {
        self.index.values().map(|slot| slot.dim).sum()
    }

    pub fn slot(&self, key: Key) -> Option<Slot> {
        self.index.get(&key).copied()
    }

    /// Position of the conditional defining `key`.
    pub fn position_of(&self, key: Key) -> Option<usize> {
        self.slot(key).map(|slot| slot.position)
    }

    /// The conditional defining `key`.
    pub fn conditional_for(&self, key: Key) -> Option<&GaussianConditional> {
        self.position_of(key).map(|p| &self.conditionals[p])
    }

    /// All-zero assignment over the network's variables.
    pub fn zero(&self) -> VectorValues {
        self.index
            .iter()
            .map(|(&k, slot)| (k, nalgebra::DVector::zeros(slot.dim)))
            .collect()
    }

    /// Column layout with variables in elimination order.
    pub fn layout(&self) -> ColumnLayout {
        ColumnLayout::from_conditionals(&self.conditionals)
    }

    /// Assemble the whitened sparse system `(R, d)` in elimination-order columns.
    pub fn assemble(&self) -> BayesNetResult<AssembledSystem> {
        AssembledSystem::build(&self.conditionals, self.layout())
    }

    /// Assemble with a caller-provided column layout.
    pub fn assemble_with(&self, layout: &ColumnLayout) -> BayesNetResult<AssembledSystem> {
        for (key, dim) in self.dims() {
            let actual = layout.dim(key).ok_or(BayesNetError::MissingValue { key })?;
            if actual != dim {
                return Err(BayesNetError::dims(format!("layout of variable {}", key), dim, actual));
            }
        }
        AssembledSystem::build(&self.conditionals, layout.clone())
    }

    /// Check that `values` has exactly the network's variables and dimensions.
    pub(crate) fn check_values(&self, values: &VectorValues) -> BayesNetResult<()> {
        for (&key, slot) in &self.index {
            let v = values.require(key)?;
            if v.len() != slot.dim {
                let context = format!("value of variable {}", key);
                return Err(BayesNetError::dims(context, slot.dim, v.len()));
            }
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a GaussianBayesNet {
    type Item = &'a GaussianConditional;
    type IntoIter = std::slice::Iter<'a, GaussianConditional>;

    fn into_iter(self) -> Self::IntoIter {
        self.conditionals.iter()
    }
}
