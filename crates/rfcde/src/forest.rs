//! RFCDE forest training with parallel tree construction.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use tracing::{debug, info, instrument};

use crate::bootstrap::draw_weights;
use crate::config::{ForestConfig, OobMode, TreeParams, validate_training_data};
use crate::error::RfcdeError;
use crate::matrix::ColumnMajorView;
use crate::result::{ForestResult, TrainingMetadata};
use crate::tree::Tree;

/// A fitted RFCDE forest.
///
/// Holds the trees and the dimensions they were trained on. Training data
/// is not retained; leaves refer to training observations by index.
#[derive(Debug, Clone)]
pub struct Forest {
    pub(crate) trees: Vec<Tree>,
    pub(crate) n_train: usize,
    pub(crate) n_var: usize,
    pub(crate) oob_mode: OobMode,
}

impl Forest {
    /// Return the number of trees.
    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Return the number of training observations.
    #[must_use]
    pub fn n_train(&self) -> usize {
        self.n_train
    }

    /// Return the number of raw covariates.
    #[must_use]
    pub fn n_var(&self) -> usize {
        self.n_var
    }

    /// Return the out-of-bag mode the forest was fitted with.
    #[must_use]
    pub fn oob_mode(&self) -> OobMode {
        self.oob_mode
    }

    /// Borrow the fitted trees.
    #[must_use]
    pub fn trees(&self) -> &[Tree] {
        &self.trees
    }
}

/// Train the RFCDE ensemble.
#[instrument(skip_all, fields(n_trees = config.n_trees, n_train = covariates.n_rows()))]
pub(crate) fn train(
    config: &ForestConfig,
    covariates: ColumnMajorView<'_>,
    basis: ColumnMajorView<'_>,
) -> Result<ForestResult, RfcdeError> {
    validate_training_data(covariates, basis)?;
    let n_train = covariates.n_rows();
    let n_var = covariates.n_cols();
    let n_basis = basis.n_cols();

    let mtry = config.mtry.resolve(n_var)?;
    let params = TreeParams {
        mtry,
        node_size: config.node_size,
        min_loss_delta: config.min_loss_delta,
        block_lengths: config.block_lengths.clone(),
        lambda: config.lambda,
        oob_mode: config.oob_mode,
    };
    params.validate(n_var)?;

    info!(
        n_trees = config.n_trees,
        n_train,
        n_var,
        n_basis,
        mtry,
        "training rfcde forest"
    );

    // Per-tree seeds come from one master stream, so the forest does not
    // depend on how rayon schedules the trees.
    let mut master_rng = ChaCha8Rng::seed_from_u64(config.seed);
    let tree_seeds: Vec<u64> = (0..config.n_trees).map(|_| master_rng.r#gen()).collect();

    let trees: Vec<Tree> = tree_seeds
        .into_par_iter()
        .map(|seed| {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let weights = draw_weights(n_train, &mut rng)?;
            Tree::fit_validated(&params, covariates, basis, weights, &mut rng)
        })
        .collect::<Result<_, _>>()?;

    let n_leaves: usize = trees.iter().map(Tree::n_leaves).sum();
    debug!(n_trees_trained = trees.len(), n_leaves, "tree training complete");

    let forest = Forest {
        trees,
        n_train,
        n_var,
        oob_mode: config.oob_mode,
    };

    let metadata = TrainingMetadata {
        n_trees: config.n_trees,
        n_train,
        n_var,
        n_basis,
        mtry,
        n_leaves,
    };

    info!(n_leaves, "rfcde forest training complete");

    Ok(ForestResult::new(forest, metadata))
}
