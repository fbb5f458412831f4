//! Prediction methods for the RFCDE forest.
//!
//! A forest does not predict a density directly. For a query point it
//! produces one non-negative weight per training observation: the bootstrap
//! mass the observation contributes to the leaves the point reaches. These
//! weights feed any weighted estimator of the response distribution; the
//! mean and quantile summaries below are two such estimators.

use rayon::iter::{IntoParallelRefIterator, ParallelIterator};

use crate::error::RfcdeError;
use crate::forest::Forest;
use crate::tree::check_buffer;

impl Forest {
    /// Add the forest's neighbor weights for `point` into `buffer`.
    ///
    /// `buffer[i]` gains, summed over trees, the bootstrap weight of training
    /// observation `i` whenever it shares a leaf with `point`. The buffer is
    /// not cleared first.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`RfcdeError::PointDimensionMismatch`] | `point.len() != n_var` |
    /// | [`RfcdeError::BufferLengthMismatch`] | `buffer.len() != n_train` |
    pub fn fill_weights(&self, point: &[f64], buffer: &mut [u64]) -> Result<(), RfcdeError> {
        self.check_point(point)?;
        check_buffer("weight", self.n_train, buffer.len())?;
        for tree in &self.trees {
            tree.accumulate_weights(point, buffer);
        }
        Ok(())
    }

    /// Return the forest's neighbor weights for `point` in a fresh buffer.
    ///
    /// # Errors
    ///
    /// Returns [`RfcdeError::PointDimensionMismatch`] when `point.len() != n_var`.
    pub fn weights(&self, point: &[f64]) -> Result<Vec<u64>, RfcdeError> {
        let mut buffer = vec![0u64; self.n_train];
        self.fill_weights(point, &mut buffer)?;
        Ok(buffer)
    }

    /// Compute neighbor weights for a batch of points in parallel.
    ///
    /// # Errors
    ///
    /// Returns [`RfcdeError::PointDimensionMismatch`] if any point has the wrong length.
    pub fn weights_batch(&self, points: &[Vec<f64>]) -> Result<Vec<Vec<u64>>, RfcdeError> {
        points.par_iter().map(|point| self.weights(point)).collect()
    }

    /// Estimate the conditional mean of a scalar response at `point`.
    ///
    /// `responses` holds the training responses in training order.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`RfcdeError::PointDimensionMismatch`] | `point.len() != n_var` |
    /// | [`RfcdeError::BufferLengthMismatch`] | `responses.len() != n_train` |
    /// | [`RfcdeError::ZeroTotalWeight`] | no training observation shares a leaf with `point` |
    pub fn predict_mean(&self, point: &[f64], responses: &[f64]) -> Result<f64, RfcdeError> {
        check_buffer("response", self.n_train, responses.len())?;
        let weights = self.weights(point)?;
        let total: u64 = weights.iter().sum();
        if total == 0 {
            return Err(RfcdeError::ZeroTotalWeight);
        }
        let weighted: f64 = weights
            .iter()
            .zip(responses)
            .map(|(&w, &z)| w as f64 * z)
            .sum();
        Ok(weighted / total as f64)
    }

    /// Estimate the conditional `quantile` of a scalar response at `point`.
    ///
    /// The weighted empirical CDF of the responses is linearly interpolated
    /// at `quantile`; values below the first CDF step clamp to the smallest
    /// weighted response.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`RfcdeError::InvalidQuantile`] | `quantile` is outside [0, 1] or NaN |
    /// | [`RfcdeError::PointDimensionMismatch`] | `point.len() != n_var` |
    /// | [`RfcdeError::BufferLengthMismatch`] | `responses.len() != n_train` |
    /// | [`RfcdeError::ZeroTotalWeight`] | no training observation shares a leaf with `point` |
    pub fn predict_quantile(
        &self,
        point: &[f64],
        responses: &[f64],
        quantile: f64,
    ) -> Result<f64, RfcdeError> {
        if !(0.0..=1.0).contains(&quantile) {
            return Err(RfcdeError::InvalidQuantile { quantile });
        }
        check_buffer("response", self.n_train, responses.len())?;
        let weights = self.weights(point)?;
        weighted_quantile(responses, &weights, quantile).ok_or(RfcdeError::ZeroTotalWeight)
    }

    pub(crate) fn check_point(&self, point: &[f64]) -> Result<(), RfcdeError> {
        if point.len() != self.n_var {
            return Err(RfcdeError::PointDimensionMismatch {
                expected: self.n_var,
                got: point.len(),
            });
        }
        Ok(())
    }
}

/// Interpolate the weighted ECDF of `values` at `quantile`.
///
/// Returns `None` when every weight is zero.
pub(crate) fn weighted_quantile(values: &[f64], weights: &[u64], quantile: f64) -> Option<f64> {
    let mut points: Vec<(f64, u64)> = values
        .iter()
        .zip(weights)
        .filter(|&(_, &w)| w > 0)
        .map(|(&v, &w)| (v, w))
        .collect();
    if points.is_empty() {
        return None;
    }
    points.sort_by(|a, b| a.0.total_cmp(&b.0));

    let total: u64 = points.iter().map(|&(_, w)| w).sum();
    let mut cumulative = 0u64;
    let mut prev: Option<(f64, f64)> = None;
    for &(value, w) in &points {
        cumulative += w;
        let cdf = cumulative as f64 / total as f64;
        if quantile <= cdf {
            return Some(match prev {
                None => value,
                Some((prev_value, prev_cdf)) => {
                    let t = (quantile - prev_cdf) / (cdf - prev_cdf);
                    prev_value + t * (value - prev_value)
                }
            });
        }
        prev = Some((value, cdf));
    }
    points.last().map(|&(v, _)| v)
}

#[cfg(test)]
mod tests {
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    use super::weighted_quantile;
    use crate::config::{ForestConfig, Mtry};
    use crate::forest::Forest;
    use crate::matrix::ColumnMajorMatrix;
    use crate::RfcdeError;

    fn fit(n: usize, seed: u64) -> (Forest, Vec<Vec<f64>>, Vec<f64>) {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let x: Vec<f64> = (0..n).map(|_| rng.gen_range(0.0..1.0)).collect();
        let z: Vec<f64> = x.iter().map(|&v| v * v).collect();
        let basis: Vec<f64> = (0..3)
            .flat_map(|k| {
                z.iter().map(move |&v| {
                    if k == 0 {
                        1.0
                    } else {
                        2f64.sqrt() * (std::f64::consts::PI * k as f64 * v).cos()
                    }
                })
            })
            .collect();
        let xm = ColumnMajorMatrix::new(x.clone(), n, 1).unwrap();
        let zm = ColumnMajorMatrix::new(basis, n, 3).unwrap();
        let forest = ForestConfig::new(12)
            .unwrap()
            .with_mtry(Mtry::All)
            .with_node_size(3)
            .with_seed(seed)
            .fit(xm.as_view(), zm.as_view())
            .unwrap()
            .into_forest();
        let points = x.iter().map(|&v| vec![v]).collect();
        (forest, points, z)
    }

    #[test]
    fn weights_equal_sum_of_tree_leaf_mass() {
        let (forest, points, _) = fit(100, 1);
        for point in points.iter().take(10) {
            let weights = forest.weights(point).unwrap();
            let mut expected = vec![0u64; 100];
            for tree in forest.trees() {
                tree.fill_weights(point, &mut expected).unwrap();
            }
            assert_eq!(weights, expected);

            let total: u64 = weights.iter().sum();
            let leaf_mass: u64 = forest
                .trees()
                .iter()
                .map(|t| {
                    let leaf = t.traverse(point).unwrap();
                    t.range_weight(t.nodes()[leaf.index()].range())
                })
                .sum();
            assert_eq!(total, leaf_mass);
        }
    }

    #[test]
    fn fill_weights_accumulates() {
        let (forest, points, _) = fit(50, 2);
        let once = forest.weights(&points[0]).unwrap();
        let mut buffer = vec![0u64; 50];
        forest.fill_weights(&points[0], &mut buffer).unwrap();
        forest.fill_weights(&points[0], &mut buffer).unwrap();
        let doubled: Vec<u64> = once.iter().map(|w| 2 * w).collect();
        assert_eq!(buffer, doubled);
    }

    #[test]
    fn batch_matches_individual() {
        let (forest, points, _) = fit(60, 3);
        let batch = forest.weights_batch(&points).unwrap();
        for (i, point) in points.iter().enumerate() {
            assert_eq!(batch[i], forest.weights(point).unwrap());
        }
    }

    #[test]
    fn wrong_dimension_is_rejected() {
        let (forest, _, _) = fit(30, 4);
        assert!(matches!(
            forest.weights(&[0.1, 0.2]),
            Err(RfcdeError::PointDimensionMismatch { expected: 1, got: 2 })
        ));
        let mut short = vec![0u64; 29];
        assert!(matches!(
            forest.fill_weights(&[0.1], &mut short),
            Err(RfcdeError::BufferLengthMismatch { expected: 30, got: 29, .. })
        ));
    }

    #[test]
    fn mean_tracks_response() {
        let (forest, _, z) = fit(400, 5);
        let low = forest.predict_mean(&[0.1], &z).unwrap();
        let high = forest.predict_mean(&[0.9], &z).unwrap();
        assert!(low < 0.1, "low = {low}");
        assert!(high > 0.6, "high = {high}");
    }

    #[test]
    fn quantiles_are_monotone() {
        let (forest, _, z) = fit(300, 6);
        let q10 = forest.predict_quantile(&[0.5], &z, 0.1).unwrap();
        let q50 = forest.predict_quantile(&[0.5], &z, 0.5).unwrap();
        let q90 = forest.predict_quantile(&[0.5], &z, 0.9).unwrap();
        assert!(q10 <= q50 && q50 <= q90);
        assert!(matches!(
            forest.predict_quantile(&[0.5], &z, 1.5),
            Err(RfcdeError::InvalidQuantile { .. })
        ));
        assert!(matches!(
            forest.predict_mean(&[0.5], &z[1..]),
            Err(RfcdeError::BufferLengthMismatch { .. })
        ));
    }

    #[test]
    fn weighted_quantile_interpolates_ecdf() {
        let values = [3.0, 1.0, 4.0, 2.0];
        let weights = [1, 1, 1, 1];
        assert_eq!(weighted_quantile(&values, &weights, 0.1), Some(1.0));
        assert_eq!(weighted_quantile(&values, &weights, 0.5), Some(2.0));
        assert_eq!(weighted_quantile(&values, &weights, 0.625), Some(2.5));
        assert_eq!(weighted_quantile(&values, &weights, 1.0), Some(4.0));
    }

    #[test]
    fn weighted_quantile_ignores_zero_weights() {
        let values = [1.0, 100.0, 3.0];
        let weights = [1, 0, 3];
        assert_eq!(weighted_quantile(&values, &weights, 0.25), Some(1.0));
        assert_eq!(weighted_quantile(&values, &weights, 1.0), Some(3.0));
        assert_eq!(weighted_quantile(&values, &[0, 0, 0], 0.5), None);
    }
}
