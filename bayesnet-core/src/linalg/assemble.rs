//! Assembly of a network into one sparse square-root information system.
//!
//! Each conditional contributes its whitened rows `[R | S_1 .. S_k | d] / σ`.
//! Rows are stacked in conditional order; columns follow a [`ColumnLayout`].
//! With the default layout (variables in elimination order) the assembled
//! `R` is upper triangular and its solution equals block back-substitution.

use std::collections::BTreeMap;

use nalgebra::{DMatrix, DVector};

use super::sparse::{self, SparseCsc};
use crate::conditional::GaussianConditional;
use crate::error::{BayesNetError, BayesNetResult};
use crate::values::{Key, VectorValues};

/// Mapping from variable to its column span in a stacked vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnLayout {
    order: Vec<Key>,
    spans: BTreeMap<Key, (usize, usize)>,
    total_dim: usize,
}

impl ColumnLayout {
    /// Layout with variables placed in the given order.
    pub fn from_dims<I>(dims: I) -> BayesNetResult<Self>
    where
        I: IntoIterator<Item = (Key, usize)>,
    {
        let mut layout = Self {
            order: Vec::new(),
            spans: BTreeMap::new(),
            total_dim: 0,
        };
        for (key, dim) in dims {
            if layout.spans.insert(key, (layout.total_dim, dim)).is_some() {
                return Err(BayesNetError::DuplicateKey { key });
            }
            layout.order.push(key);
            layout.total_dim += dim;
        }
        Ok(layout)
    }

    /// Frontal variables in conditional order.
    pub(crate) fn from_conditionals(conditionals: &[GaussianConditional]) -> Self {
        let mut order = Vec::new();
        let mut spans = BTreeMap::new();
        let mut total_dim = 0;
        for &(key, dim) in conditionals.iter().flat_map(|c| c.frontals()) {
            order.push(key);
            spans.insert(key, (total_dim, dim));
            total_dim += dim;
        }
        Self { order, spans, total_dim }
    }

    /// Variables in column order.
    pub fn order(&self) -> &[Key] {
        &self.order
    }

    pub fn total_dim(&self) -> usize {
        self.total_dim
    }

    /// First column of `key`.
    pub fn offset(&self, key: Key) -> Option<usize> {
        self.spans.get(&key).map(|&(offset, _)| offset)
    }

    pub fn dim(&self, key: Key) -> Option<usize> {
        self.spans.get(&key).map(|&(_, dim)| dim)
    }

    /// Concatenate `values` into one vector in column order.
    pub fn stack(&self, values: &VectorValues) -> BayesNetResult<DVector<f64>> {
        let mut out = DVector::zeros(self.total_dim);
        for &key in &self.order {
            let (offset, dim) = self.spans[&key];
            let v = values.require(key)?;
            if v.len() != dim {
                return Err(BayesNetError::dims(format!("value of variable {}", key), dim, v.len()));
            }
            out.rows_mut(offset, dim).copy_from(v);
        }
        Ok(out)
    }

    /// Variable owning column `col`, and the column's offset within it.
    pub fn locate(&self, col: usize) -> Option<(Key, usize)> {
        self.order.iter().find_map(|&key| {
            let (offset, dim) = self.spans[&key];
            (offset..offset + dim).contains(&col).then_some((key, col - offset))
        })
    }

    /// Split a stacked vector back into per-variable values.
    pub fn split(&self, x: &DVector<f64>) -> BayesNetResult<VectorValues> {
        if x.len() != self.total_dim {
            return Err(BayesNetError::dims("stacked vector", self.total_dim, x.len()));
        }
        Ok(self
            .order
            .iter()
            .map(|&key| {
                let (offset, dim) = self.spans[&key];
                (key, x.rows(offset, dim).into_owned())
            })
            .collect())
    }
}

/// Whitened `(R, d)` of a whole network.
#[derive(Debug, Clone)]
pub struct AssembledSystem {
    /// Block-sparse square-root information matrix
    pub r: SparseCsc,
    /// Stacked whitened right-hand side
    pub d: DVector<f64>,
    /// Column layout used for `r`
    pub layout: ColumnLayout,
}

impl AssembledSystem {
    pub(crate) fn build(
        conditionals: &[GaussianConditional],
        layout: ColumnLayout,
    ) -> BayesNetResult<Self> {
        let nrows: usize = conditionals.iter().map(|c| c.dim()).sum();
        let mut triplets = Vec::new();
        let mut d = DVector::zeros(nrows);

        let mut row0 = 0;
        for c in conditionals {
            let sigmas = c.sigmas();

            let mut local = 0;
            for &(key, dim) in c.frontals() {
                let col0 = layout.offset(key).ok_or(BayesNetError::MissingValue { key })?;
                push_block(&mut triplets, c.r(), row0, col0, local, dim, sigmas);
                local += dim;
            }
            for (parent, s) in c.parents() {
                let col0 = layout
                    .offset(*parent)
                    .ok_or(BayesNetError::MissingValue { key: *parent })?;
                push_block(&mut triplets, s, row0, col0, 0, s.ncols(), sigmas);
            }

            d.rows_mut(row0, c.dim()).copy_from(&c.whitened_d());
            row0 += c.dim();
        }

        let r = sparse::from_triplets(nrows, layout.total_dim(), triplets);
        Ok(Self { r, d, layout })
    }

    /// Dense copy of `R`.
    pub fn to_dense_r(&self) -> DMatrix<f64> {
        sparse::to_dense(&self.r)
    }

    /// Whitened residual `R x - d`.
    pub fn residual(&self, x: &VectorValues) -> BayesNetResult<DVector<f64>> {
        let x = self.layout.stack(x)?;
        Ok(sparse::spmv(&self.r, &x) - &self.d)
    }

    /// `0.5 * ||R x - d||²`.
    pub fn error(&self, x: &VectorValues) -> BayesNetResult<f64> {
        Ok(0.5 * self.residual(x)?.norm_squared())
    }

    /// Gradient `Rᵀ (R x - d)` of [`error`](Self::error).
    pub fn gradient(&self, x: &VectorValues) -> BayesNetResult<VectorValues> {
        let g = sparse::spmv_transpose(&self.r, &self.residual(x)?);
        self.layout.split(&g)
    }

    /// Solve `R x = d` densely, independent of the conditional structure.
    ///
    /// A singular or overflowing solve reports the weakest diagonal of the
    /// LU factor as `DegenerateSystem`, located by variable and row within
    /// that variable.
    pub fn solve_dense(&self) -> BayesNetResult<VectorValues> {
        let r = self.to_dense_r();
        if r.nrows() != r.ncols() {
            return Err(BayesNetError::dims("rows of assembled R", r.ncols(), r.nrows()));
        }
        if r.ncols() != self.layout.total_dim() {
            return Err(BayesNetError::dims(
                "columns of assembled R",
                self.layout.total_dim(),
                r.ncols(),
            ));
        }

        let lu = r.lu();
        match lu.solve(&self.d) {
            Some(x) if x.iter().all(|v| v.is_finite()) => self.layout.split(&x),
            _ => Err(self.degenerate_column(&lu.u())),
        }
    }

    /// Last non-normal diagonal of `u`, else the smallest in magnitude.
    fn degenerate_column(&self, u: &DMatrix<f64>) -> BayesNetError {
        let n = u.nrows().min(u.ncols());
        let col = (0..n)
            .rev()
            .find(|&i| !u[(i, i)].is_normal())
            .or_else(|| (0..n).min_by(|&a, &b| u[(a, a)].abs().total_cmp(&u[(b, b)].abs())));
        let located = col.and_then(|col| {
            let (key, row) = self.layout.locate(col)?;
            Some((key, row, u[(col, col)]))
        });
        match located {
            Some((key, row, pivot)) => {
                log::warn!(
                    "Degenerate pivot {:e} at row {} of variable {} in assembled system",
                    pivot,
                    row,
                    key
                );
                BayesNetError::DegenerateSystem { key, row, pivot }
            }
            None => BayesNetError::dims("columns of assembled R", self.layout.total_dim(), n),
        }
    }
}

/// Push columns `[local, local + ncols)` of `block` as whitened triplets.
fn push_block(
    triplets: &mut Vec<(usize, usize, f64)>,
    block: &DMatrix<f64>,
    row0: usize,
    col0: usize,
    local: usize,
    ncols: usize,
    sigmas: &DVector<f64>,
) {
    for j in 0..ncols {
        for i in 0..block.nrows() {
            let val = block[(i, local + j)];
            if val != 0.0 {
                triplets.push((row0 + i, col0 + j, val / sigmas[i]));
            }
        }
    }
}
