use tracing::{debug, instrument};

use crate::{
    RfError,
    node::{Branch, Node, NodeIndex, Route},
    split::{find_best_split, gini},
    validate::validate_training_data,
    vote::{class_counts, plurality},
};

/// Configuration for a single CART decision tree.
///
/// Construct via [`DecisionTreeConfig::new`], then chain `with_*` methods.
///
/// # Defaults
///
/// | Parameter           | Default             |
/// |---------------------|---------------------|
/// | `max_depth`         | `None` (unbounded)  |
/// | `min_samples_split` | 2                   |
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DecisionTreeConfig {
    pub(crate) max_depth: Option<usize>,
    pub(crate) min_samples_split: usize,
}

impl DecisionTreeConfig {
    /// Create a new config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
        }
    }

    /// Set the maximum tree depth.
    ///
    /// `None` grows until no split improves impurity; growth is iterative, so
    /// very deep trees are safe. `Some(d)` turns every node at depth `d` into
    /// a leaf (root is depth 0), so `Some(0)` always yields a single leaf.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Set the sample count a node must exceed before a split is attempted.
    #[must_use]
    pub fn with_min_samples_split(mut self, min_samples_split: usize) -> Self {
        self.min_samples_split = min_samples_split;
        self
    }

    /// Return the maximum depth limit, if any.
    #[must_use]
    pub fn max_depth(&self) -> Option<usize> {
        self.max_depth
    }

    /// Return the minimum samples required to split a node.
    #[must_use]
    pub fn min_samples_split(&self) -> usize {
        self.min_samples_split
    }
}

impl Default for DecisionTreeConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Learned state of a tree: the node arena plus the shape it was trained on.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub(crate) struct FittedTree {
    pub(crate) nodes: Vec<Node>,
    pub(crate) n_features: usize,
    pub(crate) n_classes: usize,
}

impl FittedTree {
    /// Walk from the root to a leaf and return its class.
    fn classify(&self, sample: &[f64]) -> usize {
        let mut idx = NodeIndex::ROOT;
        loop {
            match self.nodes[idx.index()].route(sample) {
                Route::Class(class) => return class,
                Route::Child(next) => idx = next,
            }
        }
    }
}

/// A CART classification tree grown by exhaustive Gini split search.
///
/// The tree starts unfitted; [`DecisionTree::fit`] replaces its learned
/// state in one step, so a failed fit leaves any earlier state untouched.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DecisionTree {
    config: DecisionTreeConfig,
    pub(crate) fitted: Option<FittedTree>,
}

impl DecisionTree {
    /// Create an unfitted tree with the given configuration.
    #[must_use]
    pub fn new(config: DecisionTreeConfig) -> Self {
        Self {
            config,
            fitted: None,
        }
    }

    /// Train the tree on a row-major dataset.
    ///
    /// `features[sample_idx][feature_idx]`: row-major layout.
    /// `labels[sample_idx]`: class codes in `[0, n_classes)`, where
    /// `n_classes` is the number of distinct labels.
    ///
    /// # Errors
    ///
    /// | Variant                            | When                                  |
    /// |------------------------------------|---------------------------------------|
    /// | [`RfError::EmptyDataset`]          | `features` is empty                   |
    /// | [`RfError::ZeroFeatures`]          | rows have zero feature columns        |
    /// | [`RfError::FeatureCountMismatch`]  | rows have inconsistent lengths        |
    /// | [`RfError::NonFiniteValue`]        | any value is NaN or infinite          |
    /// | [`RfError::LabelCountMismatch`]    | `labels.len() != features.len()`      |
    /// | [`RfError::LabelOutOfRange`]       | a label is `>= n_classes`             |
    #[instrument(skip(self, features, labels), fields(n_samples = features.len()))]
    pub fn fit(&mut self, features: &[Vec<f64>], labels: &[usize]) -> Result<(), RfError> {
        let shape = validate_training_data(features, labels)?;
        let fitted = grow(&self.config, features, labels, shape.n_classes);
        self.fitted = Some(fitted);
        Ok(())
    }

    /// Train on pre-validated data with a class count fixed by the caller.
    ///
    /// Used by the forest, whose bootstrap samples may miss some classes.
    pub(crate) fn fit_with_classes(
        &mut self,
        features: &[Vec<f64>],
        labels: &[usize],
        n_classes: usize,
    ) {
        self.fitted = Some(grow(&self.config, features, labels, n_classes));
    }

    /// Predict the class of every row, preserving order.
    ///
    /// # Errors
    ///
    /// Returns [`RfError::NotFitted`] before [`fit`](Self::fit) and
    /// [`RfError::PredictionFeatureMismatch`] when a row has the wrong width.
    pub fn predict(&self, features: &[Vec<f64>]) -> Result<Vec<usize>, RfError> {
        features.iter().map(|row| self.predict_row(row)).collect()
    }

    /// Predict the class of a single row.
    ///
    /// Traverses from the root: at each `Split`, goes left when
    /// `sample[feature] <= threshold`, right otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`RfError::NotFitted`] before [`fit`](Self::fit) and
    /// [`RfError::PredictionFeatureMismatch`] when `sample.len() != n_features`.
    pub fn predict_row(&self, sample: &[f64]) -> Result<usize, RfError> {
        let fitted = self.fitted()?;
        if sample.len() != fitted.n_features {
            return Err(RfError::PredictionFeatureMismatch {
                expected: fitted.n_features,
                got: sample.len(),
            });
        }
        Ok(fitted.classify(sample))
    }

    /// Return the configuration this tree was built with.
    #[must_use]
    pub fn config(&self) -> &DecisionTreeConfig {
        &self.config
    }

    /// Return `true` once the tree has been fitted.
    #[must_use]
    pub fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }

    /// Return the node arena (root at index 0). Empty when unfitted.
    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        self.fitted
            .as_ref()
            .map(|f| f.nodes.as_slice())
            .unwrap_or(&[])
    }

    /// Return the number of feature columns the tree was trained on (0 when unfitted).
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.fitted.as_ref().map_or(0, |f| f.n_features)
    }

    /// Return the number of classes the tree was trained with (0 when unfitted).
    #[must_use]
    pub fn n_classes(&self) -> usize {
        self.fitted.as_ref().map_or(0, |f| f.n_classes)
    }

    /// Return the total number of nodes in the tree (both splits and leaves).
    #[must_use]
    pub fn n_nodes(&self) -> usize {
        self.nodes().len()
    }

    /// Return the number of leaf nodes.
    #[must_use]
    pub fn n_leaves(&self) -> usize {
        self.nodes().iter().filter(|n| n.is_leaf()).count()
    }

    /// Return the maximum depth of the tree.
    ///
    /// A single-node tree (just a root leaf) has depth 0.
    #[must_use]
    pub fn depth(&self) -> usize {
        let nodes = self.nodes();
        if nodes.is_empty() {
            return 0;
        }

        let mut max_depth = 0usize;
        let mut queue = std::collections::VecDeque::new();
        queue.push_back((0usize, 0usize));

        while let Some((node_idx, d)) = queue.pop_front() {
            match nodes[node_idx].children() {
                None => max_depth = max_depth.max(d),
                Some((left, right)) => {
                    queue.push_back((left.index(), d + 1));
                    queue.push_back((right.index(), d + 1));
                }
            }
        }

        max_depth
    }

    fn fitted(&self) -> Result<&FittedTree, RfError> {
        self.fitted.as_ref().ok_or(RfError::NotFitted {
            model: "decision tree",
        })
    }
}

/// Grow a tree over all rows of a validated dataset.
fn grow(
    config: &DecisionTreeConfig,
    features: &[Vec<f64>],
    labels: &[usize],
    n_classes: usize,
) -> FittedTree {
    let n_samples = features.len();
    let n_features = features.first().map_or(0, Vec::len);

    // Column-major copy for the split search.
    let col_features: Vec<Vec<f64>> = (0..n_features)
        .map(|feat_idx| features.iter().map(|row| row[feat_idx]).collect())
        .collect();

    let arena = build_tree(&col_features, labels, n_samples, n_classes, config);

    debug!(
        n_samples,
        n_features,
        n_classes,
        n_nodes = arena.len(),
        "decision tree built"
    );

    FittedTree {
        nodes: arena,
        n_features,
        n_classes,
    }
}

/// A node still to be grown: the rows reaching it, its depth, and the split
/// slot that must point at it once it lands in the arena.
struct Pending {
    rows: Vec<usize>,
    depth: usize,
    parent: Option<(usize, Branch)>,
}

/// Build the arena-based decision tree.
///
/// Uses an explicit work stack, so unbounded depth cannot exhaust the call
/// stack. Popping the left child before the right lays nodes out in
/// pre-order, and every child lands after its parent.
fn build_tree(
    col_features: &[Vec<f64>],
    labels: &[usize],
    n_samples: usize,
    n_classes: usize,
    config: &DecisionTreeConfig,
) -> Vec<Node> {
    let mut arena: Vec<Node> = Vec::new();
    let mut stack = vec![Pending {
        rows: (0..n_samples).collect(),
        depth: 0,
        parent: None,
    }];

    while let Some(Pending {
        rows,
        depth,
        parent,
    }) = stack.pop()
    {
        let slot = arena.len();
        if let Some((parent_slot, branch)) = parent {
            arena[parent_slot].attach(branch, NodeIndex::new(slot));
        }

        let n_samples = rows.len();
        let counts = class_counts(rows.iter().map(|&si| labels[si]), n_classes);
        let impurity = gini(&counts, n_samples);

        let split = if config.max_depth.is_some_and(|max_d| depth >= max_d) {
            None
        } else {
            find_best_split(
                col_features,
                labels,
                &rows,
                n_classes,
                config.min_samples_split,
            )
        };

        let Some(split) = split else {
            arena.push(Node::Leaf {
                prediction: plurality(&counts),
                impurity,
                n_samples,
            });
            continue;
        };

        // Each child slot is filled once that child lands in the arena.
        arena.push(Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left: NodeIndex::ROOT,
            right: NodeIndex::ROOT,
            impurity,
            n_samples,
        });
        stack.push(Pending {
            rows: split.right_indices,
            depth: depth + 1,
            parent: Some((slot, Branch::Right)),
        });
        stack.push(Pending {
            rows: split.left_indices,
            depth: depth + 1,
            parent: Some((slot, Branch::Left)),
        });
    }

    arena
}
