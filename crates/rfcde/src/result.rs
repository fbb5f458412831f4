//! Training result types for RFCDE.

use crate::forest::Forest;

/// Metadata about the training run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainingMetadata {
    /// Number of trees trained.
    pub n_trees: usize,
    /// Number of training observations.
    pub n_train: usize,
    /// Number of raw covariates.
    pub n_var: usize,
    /// Number of basis functions the responses were expanded into.
    pub n_basis: usize,
    /// Resolved mtry value used.
    pub mtry: usize,
    /// Total number of leaves across all trees.
    pub n_leaves: usize,
}

/// Result of RFCDE training: the fitted forest and training metadata.
#[derive(Debug)]
pub struct ForestResult {
    forest: Forest,
    metadata: TrainingMetadata,
}

impl ForestResult {
    /// Create a new training result.
    pub(crate) fn new(forest: Forest, metadata: TrainingMetadata) -> Self {
        Self { forest, metadata }
    }

    /// Borrow the fitted forest.
    #[must_use]
    pub fn forest(&self) -> &Forest {
        &self.forest
    }

    /// Consume the result and return the fitted forest.
    #[must_use]
    pub fn into_forest(self) -> Forest {
        self.forest
    }

    /// Return training metadata.
    #[must_use]
    pub fn metadata(&self) -> &TrainingMetadata {
        &self.metadata
    }
}
