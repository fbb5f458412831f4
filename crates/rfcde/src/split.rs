use rand::Rng;

use crate::matrix::ColumnMajorView;
use crate::node::{GroupIndex, Loss};

/// Best split found for a node's index range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Split {
    /// Derived covariate the range was sorted by.
    pub(crate) variable: GroupIndex,
    /// Position (within the range) of the last observation sent left.
    pub(crate) offset: usize,
    /// Loss of the two-sided partition; lower is better.
    pub(crate) loss: Loss,
}

/// Read-only training inputs shared by every node of one tree.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SplitContext<'a> {
    /// Derived (grouped) covariates, `n_train x n_groups`.
    pub(crate) covariates: ColumnMajorView<'a>,
    /// Basis evaluations of the responses, `n_train x n_basis`.
    pub(crate) basis: ColumnMajorView<'a>,
    /// Bootstrap weight per training observation.
    pub(crate) weights: &'a [u32],
    /// Number of variable trials per node.
    pub(crate) mtry: usize,
    /// Each side of a split must carry strictly more weight than this.
    pub(crate) node_size: u64,
}

/// Weight and per-basis weighted sums over a node's index range.
#[derive(Debug, Clone)]
pub(crate) struct NodeTotals {
    pub(crate) weight: u64,
    pub(crate) sums: Vec<f64>,
}

impl NodeTotals {
    pub(crate) fn compute(ctx: &SplitContext<'_>, indices: &[usize]) -> Self {
        let n_basis = ctx.basis.n_cols();
        let mut weight = 0u64;
        let mut sums = vec![0.0f64; n_basis];
        for &i in indices {
            let w = ctx.weights[i];
            weight += u64::from(w);
            let w = f64::from(w);
            for (b, sum) in sums.iter_mut().enumerate() {
                *sum += ctx.basis.get(i, b) * w;
            }
        }
        Self { weight, sums }
    }
}

/// Sort `indices` ascending by `column[index]`.
///
/// The sort is stable so repeated runs over the same input reorder ties the
/// same way.
pub(crate) fn sort_by_covariate(indices: &mut [usize], column: &[f64]) {
    indices.sort_by(|&a, &b| column[a].total_cmp(&column[b]));
}

/// Find the lowest-loss split over `mtry` randomly drawn variables.
///
/// `last_sorted` names the variable `indices` is currently sorted by, if any;
/// it is updated whenever the range is re-sorted. Returns `None` when the
/// range carries less than `2 * node_size` weight or no scan position leaves
/// more than `node_size` weight on both sides.
pub(crate) fn find_best_split(
    ctx: &SplitContext<'_>,
    indices: &mut [usize],
    last_sorted: &mut Option<GroupIndex>,
    rng: &mut impl Rng,
) -> Option<Split> {
    let totals = NodeTotals::compute(ctx, indices);
    if totals.weight < ctx.node_size.saturating_mul(2) {
        return None;
    }

    let n_groups = ctx.covariates.n_cols();
    let mut best: Option<Split> = None;

    for _ in 0..ctx.mtry {
        let variable = GroupIndex::new(rng.gen_range(0..n_groups));
        let column = ctx.covariates.column(variable.index());
        if *last_sorted != Some(variable) {
            sort_by_covariate(indices, column);
            *last_sorted = Some(variable);
        }

        if let Some((offset, loss)) = evaluate_split(ctx, column, indices, &totals)
            && best.is_none_or(|b| loss < b.loss)
        {
            best = Some(Split {
                variable,
                offset,
                loss,
            });
        }
    }

    best
}

/// Scan a sorted range for the lowest-loss boundary.
///
/// The loss at a boundary is `-Σ_b (L_b² / W_L + R_b² / W_R)` where `L_b`,
/// `R_b` are the weighted basis sums on each side and `W_L`, `W_R` the side
/// weights. Boundaries between tied covariate values are never candidates.
pub(crate) fn evaluate_split(
    ctx: &SplitContext<'_>,
    column: &[f64],
    indices: &[usize],
    totals: &NodeTotals,
) -> Option<(usize, Loss)> {
    let n_basis = totals.sums.len();
    let mut left_weight = 0u64;
    let mut left_sums = vec![0.0f64; n_basis];
    let mut best: Option<(usize, Loss)> = None;

    for (pos, &i) in indices.iter().enumerate() {
        let w = ctx.weights[i];
        left_weight += u64::from(w);
        let wf = f64::from(w);
        for (b, sum) in left_sums.iter_mut().enumerate() {
            *sum += ctx.basis.get(i, b) * wf;
        }

        let right_weight = totals.weight - left_weight;
        if left_weight <= ctx.node_size || right_weight <= ctx.node_size {
            continue;
        }
        // right_weight > 0 guarantees a successor in the range.
        if column[i] == column[indices[pos + 1]] {
            continue;
        }

        let lw = left_weight as f64;
        let rw = right_weight as f64;
        let loss = -left_sums
            .iter()
            .zip(&totals.sums)
            .map(|(&l, &t)| {
                let r = t - l;
                l * l / lw + r * r / rw
            })
            .sum::<f64>();
        let loss = Loss::new(loss);

        if best.is_none_or(|(_, b)| loss < b) {
            best = Some((pos, loss));
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    use super::*;

    fn ctx<'a>(
        x: &'a [f64],
        n_var: usize,
        z: &'a [f64],
        n_basis: usize,
        weights: &'a [u32],
        node_size: u64,
    ) -> SplitContext<'a> {
        let n = weights.len();
        SplitContext {
            covariates: ColumnMajorView::new(x, n, n_var).unwrap(),
            basis: ColumnMajorView::new(z, n, n_basis).unwrap(),
            weights,
            mtry: n_var,
            node_size,
        }
    }

    #[test]
    fn two_clusters_split_in_the_middle() {
        let x = [1.0, 2.0, 3.0, 4.0];
        let z = [0.0, 0.0, 1.0, 1.0];
        let w = [1, 1, 1, 1];
        let ctx = ctx(&x, 1, &z, 1, &w, 1);
        let mut indices: Vec<usize> = (0..4).collect();
        let mut last = None;
        let mut rng = ChaCha8Rng::seed_from_u64(42);

        let split = find_best_split(&ctx, &mut indices, &mut last, &mut rng).unwrap();
        assert_eq!(split.variable.index(), 0);
        assert_eq!(split.offset, 1);
        assert!((split.loss.value() + 2.0).abs() < 1e-12);
        assert_eq!(last, Some(GroupIndex::new(0)));
    }

    #[test]
    fn node_size_two_blocks_four_points() {
        let x = [1.0, 2.0, 3.0, 4.0];
        let z = [0.0, 0.0, 1.0, 1.0];
        let w = [1, 1, 1, 1];
        let ctx = ctx(&x, 1, &z, 1, &w, 2);
        let mut indices: Vec<usize> = (0..4).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        assert!(find_best_split(&ctx, &mut indices, &mut None, &mut rng).is_none());
    }

    #[test]
    fn insufficient_total_weight_exits_early() {
        let x = [1.0, 2.0, 3.0];
        let z = [0.0, 1.0, 0.0];
        let w = [1, 0, 1];
        let ctx = ctx(&x, 1, &z, 1, &w, 2);
        let mut indices: Vec<usize> = (0..3).collect();
        let mut last = None;
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        assert!(find_best_split(&ctx, &mut indices, &mut last, &mut rng).is_none());
        // Early exit happens before any sort.
        assert_eq!(last, None);
    }

    #[test]
    fn ties_are_never_separated() {
        // Values tie at the only boundary that satisfies node_size.
        let x = [1.0, 2.0, 2.0, 3.0];
        let z = [0.0, 0.0, 1.0, 1.0];
        let w = [1, 1, 1, 1];
        let ctx = ctx(&x, 1, &z, 1, &w, 1);
        let indices: Vec<usize> = (0..4).collect();
        let totals = NodeTotals::compute(&ctx, &indices);
        assert!(evaluate_split(&ctx, &x, &indices, &totals).is_none());
    }

    #[test]
    fn weights_shift_the_boundary() {
        // Heavy weight on observation 0 makes a 1|3 boundary admissible.
        let x = [1.0, 2.0, 3.0, 4.0];
        let z = [0.0, 1.0, 1.0, 1.0];
        let w = [3, 1, 1, 1];
        let ctx = ctx(&x, 1, &z, 1, &w, 2);
        let indices: Vec<usize> = (0..4).collect();
        let totals = NodeTotals::compute(&ctx, &indices);
        assert_eq!(totals.weight, 6);
        let (offset, loss) = evaluate_split(&ctx, &x, &indices, &totals).unwrap();
        assert_eq!(offset, 0);
        // Left: weight 3, sum 0. Right: weight 3, sum 3.
        assert!((loss.value() + 3.0).abs() < 1e-12);
    }

    #[test]
    fn zero_weight_points_do_not_count_toward_node_size() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        let z = [0.0, 0.0, 0.0, 1.0, 1.0];
        let w = [1, 1, 0, 1, 1];
        let ctx = ctx(&x, 1, &z, 1, &w, 1);
        let indices: Vec<usize> = (0..5).collect();
        let totals = NodeTotals::compute(&ctx, &indices);
        let (offset, _) = evaluate_split(&ctx, &x, &indices, &totals).unwrap();
        // Positions 1 and 2 both leave weight 2 | 2; the first wins.
        assert_eq!(offset, 1);
    }

    #[test]
    fn picks_informative_variable() {
        // Column 0 is noise, column 1 separates the responses.
        let x = [
            0.3, 0.1, 0.4, 0.2, 0.6, 0.5, // noise
            1.0, 2.0, 3.0, 10.0, 11.0, 12.0, // signal
        ];
        let z = [0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        let w = [1; 6];
        let mut ctx = ctx(&x, 2, &z, 1, &w, 1);
        ctx.mtry = 16;
        let mut indices: Vec<usize> = (0..6).collect();
        let mut last = None;
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let split = find_best_split(&ctx, &mut indices, &mut last, &mut rng).unwrap();
        assert_eq!(split.variable.index(), 1);
        assert_eq!(split.offset, 2);
    }

    #[test]
    fn chosen_loss_not_worse_than_any_position() {
        let x = [0.5, 0.1, 0.9, 0.3, 0.7, 0.2, 0.8, 0.4];
        let z = [1.0, 0.0, 3.0, 0.5, 2.0, 0.1, 2.5, 1.0, 0.3, 0.2, 0.1, 0.4, 0.9, 0.6, 0.8, 0.7];
        let w = [1, 2, 1, 1, 3, 1, 1, 1];
        let ctx = ctx(&x, 1, &z, 2, &w, 1);
        let mut indices: Vec<usize> = (0..8).collect();
        sort_by_covariate(&mut indices, &x);
        let totals = NodeTotals::compute(&ctx, &indices);
        let (_, best) = evaluate_split(&ctx, &x, &indices, &totals).unwrap();

        for cut in 1..indices.len() {
            let (left, right) = indices.split_at(cut);
            let lw: u64 = left.iter().map(|&i| u64::from(w[i])).sum();
            let rw: u64 = right.iter().map(|&i| u64::from(w[i])).sum();
            if lw <= 1 || rw <= 1 {
                continue;
            }
            let mut loss = 0.0;
            for b in 0..2 {
                let ls: f64 = left.iter().map(|&i| z[b * 8 + i] * f64::from(w[i])).sum();
                let rs: f64 = right.iter().map(|&i| z[b * 8 + i] * f64::from(w[i])).sum();
                loss -= ls * ls / lw as f64 + rs * rs / rw as f64;
            }
            assert!(best.value() <= loss + 1e-9, "cut {cut}: {} > {loss}", best.value());
        }
    }

    #[test]
    fn sort_is_stable_for_ties() {
        let column = [2.0, 1.0, 2.0, 1.0];
        let mut indices = vec![0, 1, 2, 3];
        sort_by_covariate(&mut indices, &column);
        assert_eq!(indices, vec![1, 3, 0, 2]);
    }

    #[test]
    fn best_split_is_first_minimum_over_trials() {
        let n = 12;
        let mut data = ChaCha8Rng::seed_from_u64(5);
        let x: Vec<f64> = (0..3 * n).map(|_| data.gen_range(0.0..1.0)).collect();
        let z: Vec<f64> = (0..2 * n).map(|_| data.gen_range(-1.0..1.0)).collect();
        let w = vec![1u32; n];
        let mut ctx = ctx(&x, 3, &z, 2, &w, 1);
        ctx.mtry = 8;

        for seed in 0..10 {
            // Replay the variable draws and score each trial on its own.
            let mut replay = ChaCha8Rng::seed_from_u64(seed);
            let mut indices: Vec<usize> = (0..n).collect();
            let totals = NodeTotals::compute(&ctx, &indices);
            let mut trials = Vec::new();
            for _ in 0..ctx.mtry {
                let variable = replay.gen_range(0..3);
                let column = ctx.covariates.column(variable);
                sort_by_covariate(&mut indices, column);
                if let Some((_, loss)) = evaluate_split(&ctx, column, &indices, &totals) {
                    trials.push((variable, loss));
                }
            }
            let first_min = trials
                .iter()
                .copied()
                .reduce(|a, b| if b.1 < a.1 { b } else { a })
                .unwrap();

            let mut indices: Vec<usize> = (0..n).collect();
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let split = find_best_split(&ctx, &mut indices, &mut None, &mut rng).unwrap();
            assert!(trials.iter().all(|&(_, loss)| split.loss <= loss), "seed {seed}");
            assert_eq!(split.variable.index(), first_min.0, "seed {seed}");
            assert_eq!(split.loss, first_min.1, "seed {seed}");
        }
    }
}
