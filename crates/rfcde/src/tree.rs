use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, instrument};

use crate::{
    RfcdeError,
    config::{OobMode, TreeParams, validate_training_data},
    grouping::{FeatureGroups, GroupWidths},
    matrix::{ColumnMajorMatrix, ColumnMajorView},
    node::{GroupIndex, IndexRange, Loss, Node, NodeIndex},
    split::{SplitContext, find_best_split, sort_by_covariate},
};

/// Configuration for a single RFCDE tree fitted with caller-supplied weights.
///
/// Construct via [`TreeConfig::new`], then chain `with_*` methods.
///
/// # Defaults
///
/// | Parameter        | Default               |
/// |------------------|-----------------------|
/// | `mtry`           | `None` (all covariates) |
/// | `node_size`      | 5                     |
/// | `min_loss_delta` | 0.0                   |
/// | `block_lengths`  | `None` (all scalar)   |
/// | `lambda`         | 1.0                   |
/// | `oob_mode`       | `Disabled`            |
/// | `seed`           | 42                    |
#[derive(Debug, Clone)]
pub struct TreeConfig {
    pub(crate) mtry: Option<usize>,
    pub(crate) node_size: usize,
    pub(crate) min_loss_delta: f64,
    pub(crate) block_lengths: Option<Vec<usize>>,
    pub(crate) lambda: f64,
    pub(crate) oob_mode: OobMode,
    pub(crate) seed: u64,
}

impl TreeConfig {
    /// Create a new config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            mtry: None,
            node_size: 5,
            min_loss_delta: 0.0,
            block_lengths: None,
            lambda: 1.0,
            oob_mode: OobMode::Disabled,
            seed: 42,
        }
    }

    /// Set the number of variables tried per split. `None` tries all covariates.
    #[must_use]
    pub fn with_mtry(mut self, mtry: Option<usize>) -> Self {
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

    /// Set the random seed for variable sampling and grouping.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Fit one tree using the given bootstrap `weights`.
    ///
    /// # Errors
    ///
    /// Returns the same validation errors as [`crate::ForestConfig::fit`], plus
    /// [`RfcdeError::WeightCountMismatch`] when `weights.len() != n_train`.
    #[instrument(skip_all, fields(n_train = covariates.n_rows(), n_var = covariates.n_cols()))]
    pub fn fit(
        &self,
        covariates: ColumnMajorView<'_>,
        basis: ColumnMajorView<'_>,
        weights: Vec<u32>,
    ) -> Result<Tree, RfcdeError> {
        validate_training_data(covariates, basis)?;
        if weights.len() != covariates.n_rows() {
            return Err(RfcdeError::WeightCountMismatch {
                expected: covariates.n_rows(),
                got: weights.len(),
            });
        }
        let params = TreeParams {
            mtry: self.mtry.unwrap_or(covariates.n_cols()),
            node_size: self.node_size,
            min_loss_delta: self.min_loss_delta,
            block_lengths: self.block_lengths.clone(),
            lambda: self.lambda,
            oob_mode: self.oob_mode,
        };
        params.validate(covariates.n_cols())?;

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        Tree::fit_validated(&params, covariates, basis, weights, &mut rng)
    }
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether a split's loss clears the `min_loss_delta` gate.
fn passes_loss_gate(loss: Loss, min_loss_delta: f64) -> bool {
    min_loss_delta == f64::NEG_INFINITY || loss.value() < min_loss_delta
}

/// Reserve arena space, surfacing allocation failure as an error.
fn reserve_nodes(arena: &mut Vec<Node>, additional: usize) -> Result<(), RfcdeError> {
    arena
        .try_reserve(additional)
        .map_err(|source| RfcdeError::ResourceExhausted {
            what: "node arena",
            source,
        })
}

/// A node waiting to be split.
struct PendingNode {
    node: NodeIndex,
    range: IndexRange,
    last_sorted: Option<GroupIndex>,
}

/// A fitted RFCDE tree.
///
/// Nodes live in an arena with the root at index 0. Every node refers to a
/// contiguous range of the tree's index buffer; leaf ranges partition the
/// active range and hold the training neighbors used at prediction time.
#[derive(Debug, Clone)]
pub struct Tree {
    pub(crate) nodes: Vec<Node>,
    pub(crate) indices: Vec<usize>,
    pub(crate) weights: Vec<u32>,
    pub(crate) groups: FeatureGroups,
    pub(crate) active: IndexRange,
}

impl Tree {
    /// Fit a tree on pre-validated inputs.
    pub(crate) fn fit_validated(
        params: &TreeParams,
        covariates: ColumnMajorView<'_>,
        basis: ColumnMajorView<'_>,
        weights: Vec<u32>,
        rng: &mut impl Rng,
    ) -> Result<Tree, RfcdeError> {
        let n_train = covariates.n_rows();
        let n_var = covariates.n_cols();

        let groups = match &params.block_lengths {
            Some(block_lengths) => FeatureGroups::draw(block_lengths, &GroupWidths::new(params.lambda)?, rng),
            None => FeatureGroups::singletons(n_var),
        };
        // Singleton groups split directly on the raw covariates.
        let derived: Option<ColumnMajorMatrix> =
            (groups.len() != n_var).then(|| groups.derive_covariates(covariates));
        let split_covariates = derived.as_ref().map_or(covariates, ColumnMajorMatrix::as_view);

        let mut indices = Vec::new();
        indices
            .try_reserve_exact(n_train)
            .map_err(|source| RfcdeError::ResourceExhausted {
                what: "index buffer",
                source,
            })?;
        indices.extend(0..n_train);

        let start = match params.oob_mode {
            OobMode::Enabled => 0,
            OobMode::Disabled => {
                indices.sort_by_key(|&i| weights[i]);
                indices
                    .iter()
                    .position(|&i| weights[i] > 0)
                    .unwrap_or(0)
            }
        };
        let active = IndexRange::new(start, n_train);

        let ctx = SplitContext {
            covariates: split_covariates,
            basis,
            weights: &weights,
            mtry: params.mtry.min(groups.len()),
            node_size: params.node_size as u64,
        };
        let nodes = build_nodes(&ctx, &mut indices, active, params.min_loss_delta, rng)?;

        let tree = Tree {
            nodes,
            indices,
            weights,
            groups,
            active,
        };
        debug!(
            n_groups = tree.groups.len(),
            n_nodes = tree.n_nodes(),
            n_leaves = tree.n_leaves(),
            active_start = start,
            "tree built"
        );
        Ok(tree)
    }

    /// Return the number of raw covariates this tree was trained on.
    #[must_use]
    pub fn n_var(&self) -> usize {
        self.groups.iter().last().map_or(0, |g| g.end())
    }

    /// Return the number of training observations.
    #[must_use]
    pub fn n_train(&self) -> usize {
        self.weights.len()
    }

    /// Borrow the node arena (root at index 0).
    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Borrow the index buffer as reordered by training.
    #[must_use]
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// Borrow the bootstrap weights.
    #[must_use]
    pub fn weights(&self) -> &[u32] {
        &self.weights
    }

    /// Borrow the covariate groups drawn for this tree.
    #[must_use]
    pub fn groups(&self) -> &FeatureGroups {
        &self.groups
    }

    /// Return the index buffer range the root was trained on.
    #[must_use]
    pub fn active_range(&self) -> IndexRange {
        self.active
    }

    /// Return the training observations in a node's range.
    #[must_use]
    pub fn observations(&self, range: IndexRange) -> &[usize] {
        &self.indices[range.as_range()]
    }

    /// Return the total bootstrap weight of a node's range.
    #[must_use]
    pub fn range_weight(&self, range: IndexRange) -> u64 {
        self.observations(range)
            .iter()
            .map(|&i| u64::from(self.weights[i]))
            .sum()
    }

    /// Return the total number of nodes in the tree (both splits and leaves).
    #[must_use]
    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Return the number of leaf nodes.
    #[must_use]
    pub fn n_leaves(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }

    /// Return the maximum depth of the tree.
    ///
    /// A single-node tree (just a root leaf) has depth 0.
    #[must_use]
    pub fn depth(&self) -> usize {
        let mut max_depth = 0usize;
        let mut stack = vec![(NodeIndex::ROOT, 0usize)];
        while let Some((node, d)) = stack.pop() {
            match &self.nodes[node.index()] {
                Node::Leaf { .. } => max_depth = max_depth.max(d),
                Node::Split { left, right, .. } => {
                    stack.push((*left, d + 1));
                    stack.push((*right, d + 1));
                }
            }
        }
        max_depth
    }

    /// Return the leaf a query point falls into.
    ///
    /// At each split the point's raw covariates are summed over the split
    /// group; values `<= threshold` go left, others go right.
    ///
    /// # Errors
    ///
    /// Returns [`RfcdeError::PointDimensionMismatch`] when `point.len() != n_var`.
    pub fn traverse(&self, point: &[f64]) -> Result<NodeIndex, RfcdeError> {
        self.check_point(point)?;
        Ok(self.leaf_for(point))
    }

    /// Add each leaf neighbor's bootstrap weight into `buffer`.
    ///
    /// `buffer[i]` is incremented by `weight[i]` for every training index `i`
    /// sharing the point's leaf. The caller zeroes the buffer.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`RfcdeError::PointDimensionMismatch`] | `point.len() != n_var` |
    /// | [`RfcdeError::BufferLengthMismatch`] | `buffer.len() != n_train` |
    pub fn fill_weights(&self, point: &[f64], buffer: &mut [u64]) -> Result<(), RfcdeError> {
        self.check_point(point)?;
        check_buffer("weight", self.n_train(), buffer.len())?;
        self.accumulate_weights(point, buffer);
        Ok(())
    }

    pub(crate) fn check_point(&self, point: &[f64]) -> Result<(), RfcdeError> {
        if point.len() != self.n_var() {
            return Err(RfcdeError::PointDimensionMismatch {
                expected: self.n_var(),
                got: point.len(),
            });
        }
        Ok(())
    }

    pub(crate) fn leaf_for(&self, point: &[f64]) -> NodeIndex {
        let mut idx = NodeIndex::ROOT;
        loop {
            match &self.nodes[idx.index()] {
                Node::Leaf { .. } => return idx,
                Node::Split {
                    variable,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    let value = self.groups.get(variable.index()).value(point);
                    idx = if value <= *threshold { *left } else { *right };
                }
            }
        }
    }

    pub(crate) fn accumulate_weights(&self, point: &[f64], buffer: &mut [u64]) {
        let leaf = self.leaf_for(point);
        for &i in self.observations(self.nodes[leaf.index()].range()) {
            buffer[i] += u64::from(self.weights[i]);
        }
    }

    /// Credit in-bag leaf neighbors to out-of-bag queries.
    ///
    /// `matrix` is row-major `n_train x n_train`; row `q` is an out-of-bag
    /// query and column `a` an in-bag neighbor sharing its leaf.
    pub(crate) fn accumulate_oob_weights(&self, matrix: &mut [u64]) {
        let n_train = self.n_train();
        let mut in_bag = Vec::new();
        let mut out_of_bag = Vec::new();
        for node in self.nodes.iter().filter(|n| n.is_leaf()) {
            in_bag.clear();
            out_of_bag.clear();
            for &i in self.observations(node.range()) {
                if self.weights[i] == 0 {
                    out_of_bag.push(i);
                } else {
                    in_bag.push(i);
                }
            }
            for &q in &out_of_bag {
                let row = &mut matrix[q * n_train..(q + 1) * n_train];
                for &a in &in_bag {
                    row[a] += u64::from(self.weights[a]);
                }
            }
        }
    }

    /// Spread per-split credit uniformly over the raw covariates of the split group.
    pub(crate) fn accumulate_importance(&self, scores: &mut [f64], credit: impl Fn(Loss) -> f64) {
        for node in &self.nodes {
            if let Node::Split { variable, loss, .. } = node {
                let group = self.groups.get(variable.index());
                let share = credit(*loss) / group.width() as f64;
                for j in group.range() {
                    scores[j] += share;
                }
            }
        }
    }
}

pub(crate) fn check_buffer(buffer: &'static str, expected: usize, got: usize) -> Result<(), RfcdeError> {
    if expected != got {
        return Err(RfcdeError::BufferLengthMismatch {
            buffer,
            expected,
            got,
        });
    }
    Ok(())
}

/// Grow the node arena over `active` using an explicit work stack.
///
/// Left subtrees are completed before right subtrees, so the random stream
/// is consumed in depth-first order.
fn build_nodes(
    ctx: &SplitContext<'_>,
    indices: &mut [usize],
    active: IndexRange,
    min_loss_delta: f64,
    rng: &mut impl Rng,
) -> Result<Vec<Node>, RfcdeError> {
    let mut arena: Vec<Node> = Vec::new();
    reserve_nodes(&mut arena, 1)?;
    arena.push(Node::Leaf { range: active });

    let mut stack = vec![PendingNode {
        node: NodeIndex::ROOT,
        range: active,
        last_sorted: None,
    }];

    while let Some(PendingNode {
        node,
        range,
        mut last_sorted,
    }) = stack.pop()
    {
        let slice = &mut indices[range.as_range()];
        let Some(split) = find_best_split(ctx, slice, &mut last_sorted, rng) else {
            continue;
        };
        if !passes_loss_gate(split.loss, min_loss_delta) {
            continue;
        }

        let column = ctx.covariates.column(split.variable.index());
        if last_sorted != Some(split.variable) {
            sort_by_covariate(slice, column);
        }
        let threshold = column[slice[split.offset]];
        let (left_range, right_range) = range.split_at(split.offset + 1);

        reserve_nodes(&mut arena, 2)?;
        let left = NodeIndex::new(arena.len());
        arena.push(Node::Leaf { range: left_range });
        let right = NodeIndex::new(arena.len());
        arena.push(Node::Leaf { range: right_range });

        arena[node.index()] = Node::Split {
            variable: split.variable,
            threshold,
            loss: split.loss,
            left,
            right,
            range,
        };

        stack.push(PendingNode {
            node: right,
            range: right_range,
            last_sorted: Some(split.variable),
        });
        stack.push(PendingNode {
            node: left,
            range: left_range,
            last_sorted: Some(split.variable),
        });
    }

    Ok(arena)
}
