use std::fmt;

/// Defines a `usize` position newtype with crate-private construction.
macro_rules! position {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
            serde::Serialize, serde::Deserialize,
        )]
        pub struct $name(usize);

        impl $name {
            pub(crate) fn new(position: usize) -> Self {
                Self(position)
            }

            /// Zero-based position.
            #[must_use]
            pub fn index(self) -> usize {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }
    };
}

position! {
    /// Column a split tests. Within a forest member this is a position in the
    /// member's own column subset, not in the training matrix.
    FeatureIndex
}

position! {
    /// Position of a node in its tree's arena.
    NodeIndex
}

impl NodeIndex {
    /// Every fitted tree starts at arena position 0.
    pub const ROOT: Self = Self(0);
}

/// Gini impurity, in `[0, 1 - 1/n_classes]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, serde::Serialize, serde::Deserialize)]
pub struct Impurity(f64);

impl Impurity {
    pub(crate) const PURE: Self = Self(0.0);

    pub(crate) fn new(value: f64) -> Self {
        Self(value)
    }

    #[must_use]
    pub fn value(self) -> f64 {
        self.0
    }

    /// `true` when every sample at the node has the same class.
    #[must_use]
    pub fn is_pure(self) -> bool {
        self.0 <= 0.0
    }
}

impl fmt::Display for Impurity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}", self.0)
    }
}

/// One entry of a tree arena.
///
/// Arenas are laid out in pre-order: the root sits at [`NodeIndex::ROOT`]
/// and both children of a split sit after it.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Node {
    /// Rows with `row[feature] <= threshold` go to `left`, the rest to `right`.
    Split {
        feature: FeatureIndex,
        /// An observed training value of `feature`.
        threshold: f64,
        left: NodeIndex,
        right: NodeIndex,
        /// Impurity of the rows reaching this node, before the split.
        impurity: Impurity,
        n_samples: usize,
    },
    /// Terminal node voting for `prediction`, the plurality class of its rows.
    Leaf {
        prediction: usize,
        impurity: Impurity,
        n_samples: usize,
    },
}

/// Outcome of presenting a row to a single node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Route {
    /// The row reached a leaf with this class.
    Class(usize),
    /// The row continues at this node.
    Child(NodeIndex),
}

/// Which child slot of a split to fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Branch {
    Left,
    Right,
}

impl Node {
    #[must_use]
    pub fn impurity(&self) -> Impurity {
        match self {
            Node::Split { impurity, .. } | Node::Leaf { impurity, .. } => *impurity,
        }
    }

    /// Number of training rows that reached this node.
    #[must_use]
    pub fn n_samples(&self) -> usize {
        match self {
            Node::Split { n_samples, .. } | Node::Leaf { n_samples, .. } => *n_samples,
        }
    }

    #[must_use]
    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf { .. })
    }

    /// `(left, right)` for a split, `None` for a leaf.
    #[must_use]
    pub fn children(&self) -> Option<(NodeIndex, NodeIndex)> {
        match self {
            Node::Split { left, right, .. } => Some((*left, *right)),
            Node::Leaf { .. } => None,
        }
    }

    /// Send `row` one step down the tree.
    ///
    /// `row` must be at least as wide as the tree's feature count.
    pub(crate) fn route(&self, row: &[f64]) -> Route {
        match self {
            Node::Leaf { prediction, .. } => Route::Class(*prediction),
            Node::Split {
                feature,
                threshold,
                left,
                right,
                ..
            } => Route::Child(if row[feature.index()] <= *threshold {
                *left
            } else {
                *right
            }),
        }
    }

    /// Point one child slot of a split at `child`. Leaves are left untouched.
    pub(crate) fn attach(&mut self, branch: Branch, child: NodeIndex) {
        if let Node::Split { left, right, .. } = self {
            match branch {
                Branch::Left => *left = child,
                Branch::Right => *right = child,
            }
        }
    }
}
