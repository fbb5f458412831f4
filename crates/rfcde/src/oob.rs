//! Out-of-bag (OOB) neighbor weights.
//!
//! When a forest is fitted with [`OobMode::Enabled`], zero-weight
//! observations stay in the trees and land in leaves alongside in-bag
//! observations. Each training observation can then be treated as a query
//! against only the trees that never saw it.

use crate::config::OobMode;
use crate::error::RfcdeError;
use crate::forest::Forest;
use crate::tree::check_buffer;

/// Dense `n_train x n_train` matrix of out-of-bag neighbor weights.
///
/// Entry `(query, neighbor)` is the total bootstrap weight `neighbor`
/// contributes to `query` over the trees where `query` was out-of-bag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OobWeights {
    data: Vec<u64>,
    n_train: usize,
}

impl OobWeights {
    /// Return the number of training observations.
    #[must_use]
    pub fn n_train(&self) -> usize {
        self.n_train
    }

    /// Return the weight `neighbor` contributes to `query`.
    ///
    /// # Panics
    ///
    /// Panics if either index is `>= n_train`.
    #[must_use]
    pub fn get(&self, query: usize, neighbor: usize) -> u64 {
        assert!(query < self.n_train, "query {query} out of bounds");
        assert!(neighbor < self.n_train, "neighbor {neighbor} out of bounds");
        self.data[query * self.n_train + neighbor]
    }

    /// Return the OOB neighbor weights for `query`.
    ///
    /// # Panics
    ///
    /// Panics if `query >= n_train`.
    #[must_use]
    pub fn row(&self, query: usize) -> &[u64] {
        assert!(query < self.n_train, "query {query} out of bounds");
        &self.data[query * self.n_train..(query + 1) * self.n_train]
    }

    /// Borrow the row-major matrix.
    #[must_use]
    pub fn as_slice(&self) -> &[u64] {
        &self.data
    }

    /// Consume and return the row-major matrix.
    #[must_use]
    pub fn into_inner(self) -> Vec<u64> {
        self.data
    }
}

impl Forest {
    /// Add out-of-bag neighbor weights into a row-major `n_train x n_train` buffer.
    ///
    /// Row `q` receives, for every tree where `q` was out-of-bag, the
    /// bootstrap weight of each in-bag observation sharing its leaf. The
    /// buffer is not cleared first.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`RfcdeError::OobNotFitted`] | the forest was fitted with [`OobMode::Disabled`] |
    /// | [`RfcdeError::BufferLengthMismatch`] | `matrix.len() != n_train * n_train` |
    pub fn fill_oob_weights(&self, matrix: &mut [u64]) -> Result<(), RfcdeError> {
        if self.oob_mode != OobMode::Enabled {
            return Err(RfcdeError::OobNotFitted);
        }
        check_buffer("oob weight", self.n_train * self.n_train, matrix.len())?;
        for tree in &self.trees {
            tree.accumulate_oob_weights(matrix);
        }
        Ok(())
    }

    /// Compute the out-of-bag neighbor weight matrix.
    ///
    /// # Errors
    ///
    /// Returns [`RfcdeError::OobNotFitted`] when the forest was fitted with
    /// [`OobMode::Disabled`], or [`RfcdeError::ResourceExhausted`] when the
    /// matrix cannot be allocated.
    pub fn oob_weights(&self) -> Result<OobWeights, RfcdeError> {
        if self.oob_mode != OobMode::Enabled {
            return Err(RfcdeError::OobNotFitted);
        }
        let len = self.n_train * self.n_train;
        let mut data = Vec::new();
        data.try_reserve_exact(len)
            .map_err(|source| RfcdeError::ResourceExhausted {
                what: "oob weight matrix",
                source,
            })?;
        data.resize(len, 0);
        self.fill_oob_weights(&mut data)?;
        Ok(OobWeights {
            data,
            n_train: self.n_train,
        })
    }
}
