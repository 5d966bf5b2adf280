//! Configuration builder for Random Forest training.

use crate::error::RfError;
use crate::forest::RandomForest;
use crate::tree::DecisionTreeConfig;

/// Configuration for Random Forest training.
///
/// Construct via [`RandomForestConfig::new`], then chain `with_*` methods.
///
/// # Defaults
///
/// | Parameter           | Default     |
/// |---------------------|-------------|
/// | `max_depth`         | `Some(10)`  |
/// | `min_samples_split` | 2           |
/// | `sample_ratio`      | 0.8         |
/// | `feat_ratio`        | 0.6         |
/// | `seed`              | `None`      |
///
/// [`Default`] additionally uses 50 trees.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RandomForestConfig {
    pub(crate) n_trees: usize,
    pub(crate) max_depth: Option<usize>,
    pub(crate) min_samples_split: usize,
    pub(crate) sample_ratio: f64,
    pub(crate) feat_ratio: f64,
    pub(crate) seed: Option<u64>,
}

impl RandomForestConfig {
    /// Create a new config with the given number of trees.
    ///
    /// # Errors
    ///
    /// Returns [`RfError::InvalidTreeCount`] if `n_trees` is zero.
    pub fn new(n_trees: usize) -> Result<Self, RfError> {
        if n_trees == 0 {
            return Err(RfError::InvalidTreeCount { n_trees });
        }
        Ok(Self {
            n_trees,
            max_depth: Some(10),
            min_samples_split: 2,
            sample_ratio: 0.8,
            feat_ratio: 0.6,
            seed: None,
        })
    }

    // --- Setters ---

    /// Set the maximum tree depth. `None` means unbounded.
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

    /// Set the fraction of rows drawn with replacement for each tree.
    ///
    /// Values above 1.0 are allowed and draw more rows than the dataset holds,
    /// up to 100 times the row count.
    #[must_use]
    pub fn with_sample_ratio(mut self, sample_ratio: f64) -> Self {
        self.sample_ratio = sample_ratio;
        self
    }

    /// Set the fraction of feature columns drawn without replacement for each tree.
    #[must_use]
    pub fn with_feat_ratio(mut self, feat_ratio: f64) -> Self {
        self.feat_ratio = feat_ratio;
        self
    }

    /// Set the random seed for reproducibility. `None` seeds from OS entropy.
    #[must_use]
    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    // --- Getters ---

    /// Return the number of trees.
    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.n_trees
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

    /// Return the row sampling ratio.
    #[must_use]
    pub fn sample_ratio(&self) -> f64 {
        self.sample_ratio
    }

    /// Return the feature sampling ratio.
    #[must_use]
    pub fn feat_ratio(&self) -> f64 {
        self.feat_ratio
    }

    /// Return the random seed, if set.
    #[must_use]
    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    /// Return the configuration handed to every member tree.
    #[must_use]
    pub fn tree_config(&self) -> DecisionTreeConfig {
        DecisionTreeConfig::new()
            .with_max_depth(self.max_depth)
            .with_min_samples_split(self.min_samples_split)
    }

    /// Train a Random Forest on the provided dataset.
    ///
    /// Shorthand for [`RandomForest::new`] followed by [`RandomForest::fit`].
    ///
    /// # Errors
    ///
    /// See [`RandomForest::fit`].
    pub fn fit(&self, features: &[Vec<f64>], labels: &[usize]) -> Result<RandomForest, RfError> {
        let mut forest = RandomForest::new(self.clone());
        forest.fit(features, labels)?;
        Ok(forest)
    }
}

impl Default for RandomForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 50,
            max_depth: Some(10),
            min_samples_split: 2,
            sample_ratio: 0.8,
            feat_ratio: 0.6,
            seed: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::RandomForestConfig;
    use crate::RfError;

    #[test]
    fn zero_trees_rejected() {
        assert!(matches!(
            RandomForestConfig::new(0).unwrap_err(),
            RfError::InvalidTreeCount { n_trees: 0 }
        ));
    }

    #[test]
    fn defaults_match_new() {
        assert_eq!(RandomForestConfig::new(50).unwrap(), RandomForestConfig::default());
    }

    #[test]
    fn builder_sets_fields() {
        let config = RandomForestConfig::new(7)
            .unwrap()
            .with_max_depth(None)
            .with_min_samples_split(5)
            .with_sample_ratio(1.0)
            .with_feat_ratio(0.5)
            .with_seed(Some(9));
        assert_eq!(config.n_trees(), 7);
        assert_eq!(config.max_depth(), None);
        assert_eq!(config.min_samples_split(), 5);
        assert_eq!(config.sample_ratio(), 1.0);
        assert_eq!(config.feat_ratio(), 0.5);
        assert_eq!(config.seed(), Some(9));
        assert_eq!(config.tree_config().min_samples_split(), 5);
    }
}
