//! Covariate importance aggregation across trees.

use crate::error::RfcdeError;
use crate::forest::Forest;
use crate::node::Loss;
use crate::tree::{Tree, check_buffer};

/// Which per-split credit an importance score accumulates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportanceKind {
    /// Split loss, spread over the split group. Scores are non-positive;
    /// more negative means more important.
    Loss,
    /// Number of splits, spread over the split group.
    Count,
}

/// A ranked covariate with its normalized importance.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedCovariate {
    /// Zero-based raw covariate index.
    pub index: usize,
    /// Normalized importance score (sums to 1.0 across all covariates).
    pub importance: f64,
    /// 1-based rank (1 = most important).
    pub rank: usize,
}

impl Forest {
    /// Add per-covariate loss importance into `scores`.
    ///
    /// For every split in every tree, the split loss divided by the group
    /// width is added to each raw covariate in the split group.
    ///
    /// # Errors
    ///
    /// Returns [`RfcdeError::BufferLengthMismatch`] when `scores.len() != n_var`.
    pub fn fill_loss_importance(&self, scores: &mut [f64]) -> Result<(), RfcdeError> {
        self.fill_importance(ImportanceKind::Loss, scores)
    }

    /// Add per-covariate split counts into `scores`.
    ///
    /// For every split in every tree, one divided by the group width is added
    /// to each raw covariate in the split group.
    ///
    /// # Errors
    ///
    /// Returns [`RfcdeError::BufferLengthMismatch`] when `scores.len() != n_var`.
    pub fn fill_count_importance(&self, scores: &mut [f64]) -> Result<(), RfcdeError> {
        self.fill_importance(ImportanceKind::Count, scores)
    }

    /// Return covariates ranked by normalized importance.
    ///
    /// Accumulated scores are divided by their sum, so they total 1.0 for
    /// both kinds (loss scores share a sign). A forest with no splits yields
    /// all-zero importances ranked in covariate order.
    #[must_use]
    pub fn importances(&self, kind: ImportanceKind) -> Vec<RankedCovariate> {
        let mut totals = vec![0.0f64; self.n_var];
        for tree in &self.trees {
            accumulate(tree, kind, &mut totals);
        }
        rank(&totals)
    }

    fn fill_importance(&self, kind: ImportanceKind, scores: &mut [f64]) -> Result<(), RfcdeError> {
        check_buffer("importance", self.n_var, scores.len())?;
        for tree in &self.trees {
            accumulate(tree, kind, scores);
        }
        Ok(())
    }
}

fn accumulate(tree: &Tree, kind: ImportanceKind, scores: &mut [f64]) {
    match kind {
        ImportanceKind::Loss => tree.accumulate_importance(scores, Loss::value),
        ImportanceKind::Count => tree.accumulate_importance(scores, |_| 1.0),
    }
}

/// Normalize totals to sum to 1.0, sort descending, and assign 1-based ranks.
fn rank(totals: &[f64]) -> Vec<RankedCovariate> {
    let sum: f64 = totals.iter().sum();
    let mut covariates: Vec<RankedCovariate> = totals
        .iter()
        .enumerate()
        .map(|(index, &total)| RankedCovariate {
            index,
            importance: if sum != 0.0 { total / sum } else { 0.0 },
            rank: 0, // set after sorting
        })
        .collect();

    covariates.sort_by(|a, b| b.importance.total_cmp(&a.importance));

    for (i, covariate) in covariates.iter_mut().enumerate() {
        covariate.rank = i + 1;
    }

    covariates
}
