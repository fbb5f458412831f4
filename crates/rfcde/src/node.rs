use std::fmt;
use std::ops::Range;

/// Zero-based index of a derived (grouped) covariate within one tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupIndex(usize);

impl GroupIndex {
    /// Create a new group index from a zero-based position.
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    /// Return the zero-based group index.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for GroupIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Index into a `Vec<Node>` arena, identifying a specific node in a tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeIndex(usize);

impl NodeIndex {
    /// The root node always lives at arena index 0.
    pub(crate) const ROOT: NodeIndex = NodeIndex(0);

    /// Create a new node index from a zero-based arena position.
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    /// Return the zero-based arena index.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Split loss: negative weighted sum of squared basis-coefficient sums.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Loss(f64);

impl Loss {
    /// Create a new loss value.
    pub(crate) fn new(value: f64) -> Self {
        Self(value)
    }

    /// Return the raw loss value.
    #[must_use]
    pub fn value(self) -> f64 {
        self.0
    }
}

impl fmt::Display for Loss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}", self.0)
    }
}

/// Half-open range of positions in a tree's index buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndexRange {
    start: usize,
    end: usize,
}

impl IndexRange {
    pub(crate) fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end);
        Self { start, end }
    }

    /// First buffer position in the range.
    #[must_use]
    pub fn start(self) -> usize {
        self.start
    }

    /// One past the last buffer position in the range.
    #[must_use]
    pub fn end(self) -> usize {
        self.end
    }

    /// Number of buffer positions in the range.
    #[must_use]
    pub fn len(self) -> usize {
        self.end - self.start
    }

    /// Return true if the range is empty.
    #[must_use]
    pub fn is_empty(self) -> bool {
        self.start == self.end
    }

    /// Return the range as a `Range<usize>` for slicing.
    #[must_use]
    pub fn as_range(self) -> Range<usize> {
        self.start..self.end
    }

    /// Split after `offset` positions into `(left, right)`.
    pub(crate) fn split_at(self, offset: usize) -> (IndexRange, IndexRange) {
        let mid = self.start + offset;
        debug_assert!(mid <= self.end);
        (IndexRange::new(self.start, mid), IndexRange::new(mid, self.end))
    }
}

/// A node in a tree arena.
///
/// Trees are stored as `Vec<Node>` where children are referenced by
/// [`NodeIndex`]. Every node keeps the slice of the tree's index buffer that
/// reached it during training; leaves use it at prediction time.
#[derive(Debug, Clone)]
pub enum Node {
    /// An interior split node.
    Split {
        /// Derived covariate used for the split.
        variable: GroupIndex,
        /// Observations with derived value <= threshold go left.
        threshold: f64,
        /// Loss of the chosen split.
        loss: Loss,
        /// Index of the left (<=) child node.
        left: NodeIndex,
        /// Index of the right (>) child node.
        right: NodeIndex,
        /// Index buffer positions that reached this node.
        range: IndexRange,
    },
    /// A terminal leaf node.
    Leaf {
        /// Index buffer positions that reached this leaf.
        range: IndexRange,
    },
}

impl Node {
    /// Return the index buffer range that reached this node.
    #[must_use]
    pub fn range(&self) -> IndexRange {
        match self {
            Node::Split { range, .. } | Node::Leaf { range } => *range,
        }
    }

    /// Return `true` if this node is a leaf.
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf { .. })
    }

    /// Return the split variable, or `None` for a leaf.
    #[must_use]
    pub fn variable(&self) -> Option<GroupIndex> {
        match self {
            Node::Split { variable, .. } => Some(*variable),
            Node::Leaf { .. } => None,
        }
    }
}
