//! Orthonormal basis expansion of training responses.
//!
//! Splits are scored on basis coefficients rather than raw responses.
//! Responses are first boxed to the unit cube using the per-column training
//! range, then each column is expanded into a one-dimensional basis. For
//! multivariate responses the per-dimension bases are combined into a tensor
//! product.

use std::f64::consts::{PI, SQRT_2};

use crate::error::RfcdeError;
use crate::matrix::{ColumnMajorMatrix, ColumnMajorView};

/// One-dimensional orthonormal basis system on [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BasisSystem {
    /// φ0(z) = 1, φk(z) = √2 cos(πkz).
    #[default]
    Cosine,
}

impl BasisSystem {
    /// Box `responses` to [0, 1] and evaluate the basis at every observation.
    ///
    /// `n_basis` gives the basis size per response dimension; a single entry
    /// applies to every dimension. A one-dimensional response yields
    /// `n_basis[0]` columns, a `D`-dimensional response yields the product of
    /// the sizes.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`RfcdeError::EmptyDataset`] | `responses` has zero rows |
    /// | [`RfcdeError::BasisDimensionMismatch`] | `n_basis` has neither 1 nor `n_cols` entries, or `responses` has no columns |
    /// | [`RfcdeError::InvalidBasisSize`] | a basis size is zero |
    /// | [`RfcdeError::NonFiniteValue`] | a response is NaN or infinite |
    /// | [`RfcdeError::DegenerateResponse`] | a response column is constant |
    /// | [`RfcdeError::ResourceExhausted`] | the basis matrix cannot be allocated |
    pub fn evaluate(
        self,
        responses: ColumnMajorView<'_>,
        n_basis: &[usize],
    ) -> Result<ColumnMajorMatrix, RfcdeError> {
        let n_dims = responses.n_cols();
        let sizes: Vec<usize> = match n_basis {
            [n] if n_dims > 0 => vec![*n; n_dims],
            sizes if sizes.len() == n_dims && n_dims > 0 => sizes.to_vec(),
            _ => {
                return Err(RfcdeError::BasisDimensionMismatch {
                    expected: n_dims,
                    got: n_basis.len(),
                });
            }
        };
        if let Some(dimension) = sizes.iter().position(|&n| n == 0) {
            return Err(RfcdeError::InvalidBasisSize { dimension });
        }

        let boxed = ResponseBox::fit(responses)?.apply(responses);
        let boxed = boxed.as_view();
        match self {
            BasisSystem::Cosine => tensor_basis(boxed, &sizes, cosine_basis),
        }
    }
}

/// Per-column range used to map responses onto [0, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseBox {
    min: Vec<f64>,
    max: Vec<f64>,
}

impl ResponseBox {
    /// Record the minimum and maximum of every response column.
    ///
    /// # Errors
    ///
    /// Returns [`RfcdeError::EmptyDataset`] for zero rows,
    /// [`RfcdeError::NonFiniteValue`] for NaN or infinite responses, and
    /// [`RfcdeError::DegenerateResponse`] when a column is constant.
    pub fn fit(responses: ColumnMajorView<'_>) -> Result<Self, RfcdeError> {
        if responses.n_rows() == 0 {
            return Err(RfcdeError::EmptyDataset);
        }
        if let Some((row, column)) = responses.find_non_finite() {
            return Err(RfcdeError::NonFiniteValue {
                matrix: "response",
                row,
                column,
            });
        }
        let mut min = Vec::with_capacity(responses.n_cols());
        let mut max = Vec::with_capacity(responses.n_cols());
        for column in 0..responses.n_cols() {
            let values = responses.column(column);
            let lo = values.iter().copied().fold(f64::INFINITY, f64::min);
            let hi = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            if lo == hi {
                return Err(RfcdeError::DegenerateResponse { column });
            }
            min.push(lo);
            max.push(hi);
        }
        Ok(Self { min, max })
    }

    /// Per-column minimum.
    #[must_use]
    pub fn min(&self) -> &[f64] {
        &self.min
    }

    /// Per-column maximum.
    #[must_use]
    pub fn max(&self) -> &[f64] {
        &self.max
    }

    /// Map `responses` through `(z - min) / (max - min)` column by column.
    ///
    /// Values outside the fitted range map outside [0, 1].
    ///
    /// # Panics
    ///
    /// Panics if `responses` has a different number of columns than the box.
    #[must_use]
    pub fn apply(&self, responses: ColumnMajorView<'_>) -> ColumnMajorMatrix {
        assert_eq!(responses.n_cols(), self.min.len(), "response dimension mismatch");
        ColumnMajorMatrix::from_columns(responses.n_rows(), responses.n_cols(), |column, out| {
            let (lo, hi) = (self.min[column], self.max[column]);
            out.extend(responses.column(column).iter().map(|&z| (z - lo) / (hi - lo)));
        })
    }
}

/// Evaluate the first `n_basis` cosine functions at each response.
fn cosine_basis(responses: &[f64], n_basis: usize, out: &mut Vec<f64>) {
    for k in 0..n_basis {
        if k == 0 {
            out.extend(std::iter::repeat_n(1.0, responses.len()));
        } else {
            let freq = PI * k as f64;
            out.extend(responses.iter().map(|&z| SQRT_2 * (freq * z).cos()));
        }
    }
}

/// Combine one-dimensional bases into a tensor-product basis.
///
/// Column `c` multiplies, for each dimension `d`, sub-basis function
/// `(c / period_d) % n_basis[d]`, where `period_d` is the product of the
/// sizes of the earlier dimensions. A single dimension reduces to its own
/// basis.
fn tensor_basis(
    responses: ColumnMajorView<'_>,
    n_basis: &[usize],
    basis_fn: fn(&[f64], usize, &mut Vec<f64>),
) -> Result<ColumnMajorMatrix, RfcdeError> {
    let n_obs = responses.n_rows();
    let total = n_basis.iter().fold(1usize, |acc, &n| acc.saturating_mul(n));
    let len = n_obs.saturating_mul(total);

    let mut data = Vec::new();
    data.try_reserve_exact(len)
        .map_err(|source| RfcdeError::ResourceExhausted {
            what: "basis matrix",
            source,
        })?;
    data.resize(len, 1.0);

    let mut sub = Vec::new();
    let mut period = 1usize;
    for (d, &n_d) in n_basis.iter().enumerate() {
        sub.clear();
        basis_fn(responses.column(d), n_d, &mut sub);
        for (c, column) in data.chunks_exact_mut(n_obs).enumerate() {
            let k = (c / period) % n_d;
            let factor = &sub[k * n_obs..(k + 1) * n_obs];
            for (value, &f) in column.iter_mut().zip(factor) {
                *value *= f;
            }
        }
        period *= n_d;
    }

    ColumnMajorMatrix::new(data, n_obs, total)
}
