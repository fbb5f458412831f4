//! Configuration builder for RFCDE forest training.

use crate::error::RfcdeError;
use crate::grouping::validate_block_lengths;
use crate::matrix::ColumnMajorView;
use crate::result::ForestResult;

/// Strategy for determining the number of variables tried at each split.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Mtry {
    /// Square root of the number of covariates.
    Sqrt,
    /// Log base 2 of the number of covariates.
    Log2,
    /// A fraction of the covariates (must be in (0.0, 1.0]).
    Fraction(f64),
    /// A fixed count.
    Fixed(usize),
    /// All covariates.
    All,
}

impl Mtry {
    /// Resolve to a concrete count for `n_var` raw covariates.
    ///
    /// # Errors
    ///
    /// Returns [`RfcdeError::InvalidMtry`] when the result is 0 or exceeds `n_var`.
    pub fn resolve(self, n_var: usize) -> Result<usize, RfcdeError> {
        let resolved = match self {
            Mtry::Sqrt => (n_var as f64).sqrt().ceil() as usize,
            Mtry::Log2 => (n_var as f64).log2().ceil().max(1.0) as usize,
            Mtry::Fraction(f) => (n_var as f64 * f).ceil() as usize,
            Mtry::Fixed(n) => n,
            Mtry::All => n_var,
        };
        if resolved == 0 || resolved > n_var {
            return Err(RfcdeError::InvalidMtry {
                mtry: resolved,
                n_var,
            });
        }
        Ok(resolved)
    }
}

/// Whether zero-weight observations stay in the trees for out-of-bag queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OobMode {
    /// Keep out-of-bag observations in leaf ranges so OOB weights can be computed.
    Enabled,
    /// Drop zero-weight observations before splitting.
    Disabled,
}

/// Configuration for RFCDE forest training.
///
/// Construct via [`ForestConfig::new`], then chain `with_*` methods.
///
/// # Defaults
///
/// | Parameter        | Default              |
/// |------------------|----------------------|
/// | `mtry`           | `Sqrt`               |
/// | `node_size`      | 5                    |
/// | `min_loss_delta` | 0.0                  |
/// | `block_lengths`  | `None` (all scalar)  |
/// | `lambda`         | 1.0                  |
/// | `oob_mode`       | `Disabled`           |
/// | `seed`           | 42                   |
#[derive(Debug, Clone)]
pub struct ForestConfig {
    pub(crate) n_trees: usize,
    pub(crate) mtry: Mtry,
    pub(crate) node_size: usize,
    pub(crate) min_loss_delta: f64,
    pub(crate) block_lengths: Option<Vec<usize>>,
    pub(crate) lambda: f64,
    pub(crate) oob_mode: OobMode,
    pub(crate) seed: u64,
}

impl ForestConfig {
    /// Create a new config with the given number of trees.
    ///
    /// # Errors
    ///
    /// Returns [`RfcdeError::InvalidTreeCount`] if `n_trees` is zero.
    pub fn new(n_trees: usize) -> Result<Self, RfcdeError> {
        if n_trees == 0 {
            return Err(RfcdeError::InvalidTreeCount { n_trees });
        }
        Ok(Self {
            n_trees,
            mtry: Mtry::Sqrt,
            node_size: 5,
            min_loss_delta: 0.0,
            block_lengths: None,
            lambda: 1.0,
            oob_mode: OobMode::Disabled,
            seed: 42,
        })
    }

    // --- Setters ---

    /// Set the number of variables tried per split.
    #[must_use]
    pub fn with_mtry(mut self, mtry: Mtry) -> Self {
        self.mtry = mtry;
        self
    }

    /// Set the minimum weight each side of a split must exceed.
    #[must_use]
    pub fn with_node_size(mut self, node_size: usize) -> Self {
        self.node_size = node_size;
        self
    }

    /// Set the loss a split must fall below to be accepted.
    ///
    /// `f64::NEG_INFINITY` disables the check.
    #[must_use]
    pub fn with_min_loss_delta(mut self, min_loss_delta: f64) -> Self {
        self.min_loss_delta = min_loss_delta;
        self
    }

    /// Set the lengths of the functional covariate blocks.
    ///
    /// The lengths must sum to the number of covariates; scalar covariates
    /// have length 1. `None` treats every covariate as a scalar.
    #[must_use]
    pub fn with_block_lengths(mut self, block_lengths: Option<Vec<usize>>) -> Self {
        self.block_lengths = block_lengths;
        self
    }

    /// Set the Poisson rate of functional group widths.
    #[must_use]
    pub fn with_lambda(mut self, lambda: f64) -> Self {
        self.lambda = lambda;
        self
    }

    /// Set the out-of-bag mode.
    #[must_use]
    pub fn with_oob_mode(mut self, oob_mode: OobMode) -> Self {
        self.oob_mode = oob_mode;
        self
    }

    /// Set the random seed for reproducibility.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    // --- Getters ---

    /// Return the number of trees.
    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.n_trees
    }

    /// Return the mtry strategy.
    #[must_use]
    pub fn mtry(&self) -> Mtry {
        self.mtry
    }

    /// Return the node size floor.
    #[must_use]
    pub fn node_size(&self) -> usize {
        self.node_size
    }

    /// Return the split loss threshold.
    #[must_use]
    pub fn min_loss_delta(&self) -> f64 {
        self.min_loss_delta
    }

    /// Return the functional block lengths, if set.
    #[must_use]
    pub fn block_lengths(&self) -> Option<&[usize]> {
        self.block_lengths.as_deref()
    }

    /// Return the functional grouping rate.
    #[must_use]
    pub fn lambda(&self) -> f64 {
        self.lambda
    }

    /// Return the out-of-bag mode.
    #[must_use]
    pub fn oob_mode(&self) -> OobMode {
        self.oob_mode
    }

    /// Return the random seed.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Train a forest on column-major covariates and basis evaluations.
    ///
    /// `covariates` is `n_train x n_var`; `basis` is `n_train x n_basis`,
    /// holding basis functions evaluated at the training responses.
    ///
    /// # Errors
    ///
    /// | Variant                               | When                                          |
    /// |---------------------------------------|-----------------------------------------------|
    /// | [`RfcdeError::EmptyDataset`]          | `covariates` has zero rows                    |
    /// | [`RfcdeError::ZeroCovariates`]        | `covariates` has zero columns                 |
    /// | [`RfcdeError::ZeroBasis`]             | `basis` has zero columns                      |
    /// | [`RfcdeError::RowCountMismatch`]      | row counts differ                             |
    /// | [`RfcdeError::NonFiniteValue`]        | any input value is NaN or infinite            |
    /// | [`RfcdeError::InvalidMtry`]           | resolved mtry is outside [1, n_var]           |
    /// | [`RfcdeError::InvalidNodeSize`]       | `node_size` is zero                           |
    /// | [`RfcdeError::InvalidMinLossDelta`]   | `min_loss_delta` is NaN                       |
    /// | [`RfcdeError::InvalidLambda`]         | `lambda` is not positive and finite           |
    /// | [`RfcdeError::ZeroBlockLength`]       | a block length is zero                        |
    /// | [`RfcdeError::BlockLengthMismatch`]   | block lengths do not sum to n_var             |
    /// | [`RfcdeError::ResourceExhausted`]     | an index buffer or node arena cannot grow     |
    pub fn fit(
        &self,
        covariates: ColumnMajorView<'_>,
        basis: ColumnMajorView<'_>,
    ) -> Result<ForestResult, RfcdeError> {
        crate::forest::train(self, covariates, basis)
    }
}

/// Hyperparameters shared by every tree, validated against the data.
#[derive(Debug, Clone)]
pub(crate) struct TreeParams {
    pub(crate) mtry: usize,
    pub(crate) node_size: usize,
    pub(crate) min_loss_delta: f64,
    pub(crate) block_lengths: Option<Vec<usize>>,
    pub(crate) lambda: f64,
    pub(crate) oob_mode: OobMode,
}

impl TreeParams {
    /// Check every hyperparameter against a dataset with `n_var` covariates.
    pub(crate) fn validate(&self, n_var: usize) -> Result<(), RfcdeError> {
        if self.mtry == 0 || self.mtry > n_var {
            return Err(RfcdeError::InvalidMtry {
                mtry: self.mtry,
                n_var,
            });
        }
        if self.node_size == 0 {
            return Err(RfcdeError::InvalidNodeSize {
                node_size: self.node_size,
            });
        }
        if self.min_loss_delta.is_nan() {
            return Err(RfcdeError::InvalidMinLossDelta);
        }
        if !(self.lambda.is_finite() && self.lambda > 0.0) {
            return Err(RfcdeError::InvalidLambda {
                lambda: self.lambda,
            });
        }
        if let Some(block_lengths) = &self.block_lengths {
            validate_block_lengths(block_lengths, n_var)?;
        }
        Ok(())
    }
}

/// Validate training matrices before any work begins.
pub(crate) fn validate_training_data(
    covariates: ColumnMajorView<'_>,
    basis: ColumnMajorView<'_>,
) -> Result<(), RfcdeError> {
    if covariates.n_rows() == 0 {
        return Err(RfcdeError::EmptyDataset);
    }
    if covariates.n_cols() == 0 {
        return Err(RfcdeError::ZeroCovariates);
    }
    if basis.n_cols() == 0 {
        return Err(RfcdeError::ZeroBasis);
    }
    if covariates.n_rows() != basis.n_rows() {
        return Err(RfcdeError::RowCountMismatch {
            covariate_rows: covariates.n_rows(),
            basis_rows: basis.n_rows(),
        });
    }
    if let Some((row, column)) = covariates.find_non_finite() {
        return Err(RfcdeError::NonFiniteValue {
            matrix: "covariate",
            row,
            column,
        });
    }
    if let Some((row, column)) = basis.find_non_finite() {
        return Err(RfcdeError::NonFiniteValue {
            matrix: "basis",
            row,
            column,
        });
    }
    Ok(())
}
