//! Functional grouping of contiguous covariates.
//!
//! Functional covariates (spectra, curves) arrive as many adjacent raw
//! columns. Each tree partitions every functional block into random-width
//! groups and splits on the sum of the raw columns in a group instead of on
//! the individual columns.

use std::ops::Range;

use rand::Rng;
use rand_distr::{Distribution, Poisson};

use crate::bootstrap::poisson;
use crate::error::RfcdeError;
use crate::matrix::{ColumnMajorMatrix, ColumnMajorView};

/// A half-open range of raw covariate columns summed into one split variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CovariateGroup {
    start: usize,
    end: usize,
}

impl CovariateGroup {
    pub(crate) fn new(start: usize, end: usize) -> Self {
        debug_assert!(start < end, "empty covariate group {start}..{end}");
        Self { start, end }
    }

    /// First raw covariate in the group.
    #[must_use]
    pub fn start(self) -> usize {
        self.start
    }

    /// One past the last raw covariate in the group.
    #[must_use]
    pub fn end(self) -> usize {
        self.end
    }

    /// Number of raw covariates in the group.
    #[must_use]
    pub fn width(self) -> usize {
        self.end - self.start
    }

    /// Raw covariate indices covered by the group.
    #[must_use]
    pub fn range(self) -> Range<usize> {
        self.start..self.end
    }

    /// Sum a query point's raw covariates over the group.
    pub(crate) fn value(self, point: &[f64]) -> f64 {
        point[self.range()].iter().sum()
    }
}

/// Group widths drawn from Poisson(`lambda`) conditioned on being at least one.
///
/// Large rates reject zero draws from the plain Poisson sampler. Small rates,
/// where nearly every plain draw is zero, invert the truncated CDF directly.
#[derive(Debug, Clone, Copy)]
pub(crate) struct GroupWidths {
    lambda: f64,
    poisson: Poisson<f64>,
}

impl GroupWidths {
    /// Rates at or above this reject zeros; P(0) is at most e^-1 there.
    const REJECTION_MIN_RATE: f64 = 1.0;

    pub(crate) fn new(lambda: f64) -> Result<Self, RfcdeError> {
        Ok(Self {
            lambda,
            poisson: poisson(lambda)?,
        })
    }
}

impl Distribution<usize> for GroupWidths {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        if self.lambda >= Self::REJECTION_MIN_RATE {
            loop {
                let jump = self.poisson.sample(rng) as usize;
                if jump > 0 {
                    return jump;
                }
            }
        }
        // P(k) = lambda^k / (k! (e^lambda - 1)) for k >= 1.
        let u: f64 = rng.r#gen();
        let mut k = 1usize;
        let mut p = self.lambda / self.lambda.exp_m1();
        let mut cdf = p;
        while u >= cdf && p > 0.0 {
            k += 1;
            p *= self.lambda / k as f64;
            cdf += p;
        }
        k
    }
}

/// Ordered partition of `[0, n_var)` into contiguous covariate groups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureGroups {
    groups: Vec<CovariateGroup>,
}

impl FeatureGroups {
    /// One group per raw covariate.
    #[must_use]
    pub fn singletons(n_var: usize) -> Self {
        Self {
            groups: (0..n_var).map(|j| CovariateGroup::new(j, j + 1)).collect(),
        }
    }

    /// Draw random groups within each functional block.
    ///
    /// Group widths are zero-truncated Poisson draws clamped to what remains
    /// of the current block, so groups never straddle a block boundary. Every
    /// block consumes at least one draw, including blocks of length one.
    pub(crate) fn draw(block_lengths: &[usize], widths: &GroupWidths, rng: &mut impl Rng) -> Self {
        let mut groups = Vec::with_capacity(block_lengths.len());
        let mut block_start = 0usize;
        for &len in block_lengths {
            let block_end = block_start + len;
            let mut pos = block_start;
            while pos < block_end {
                let width = widths.sample(rng).min(block_end - pos);
                groups.push(CovariateGroup::new(pos, pos + width));
                pos += width;
            }
            block_start = block_end;
        }
        Self { groups }
    }

    /// Number of groups (derived split variables).
    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Return true if there are no groups.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Return group `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= len()`.
    #[must_use]
    pub fn get(&self, index: usize) -> CovariateGroup {
        self.groups[index]
    }

    /// Iterate over the groups in covariate order.
    pub fn iter(&self) -> impl Iterator<Item = CovariateGroup> + '_ {
        self.groups.iter().copied()
    }

    /// Sum raw covariates per group for every training observation.
    ///
    /// Returns an `n_train x n_groups` column-major matrix. Each value is
    /// accumulated in the same order as [`CovariateGroup::value`], so a
    /// training row traverses a tree exactly as it was partitioned.
    pub(crate) fn derive_covariates(&self, covariates: ColumnMajorView<'_>) -> ColumnMajorMatrix {
        let n_train = covariates.n_rows();
        ColumnMajorMatrix::from_columns(n_train, self.groups.len(), |g, out| {
            let group = self.groups[g];
            out.extend((0..n_train).map(|row| {
                group
                    .range()
                    .map(|col| covariates.get(row, col))
                    .sum::<f64>()
            }));
        })
    }
}

/// Check that `block_lengths` partition `n_var` covariates into non-empty blocks.
pub(crate) fn validate_block_lengths(block_lengths: &[usize], n_var: usize) -> Result<(), RfcdeError> {
    if let Some(block) = block_lengths.iter().position(|&len| len == 0) {
        return Err(RfcdeError::ZeroBlockLength { block });
    }
    let sum: usize = block_lengths.iter().sum();
    if sum != n_var {
        return Err(RfcdeError::BlockLengthMismatch { sum, n_var });
    }
    Ok(())
}
