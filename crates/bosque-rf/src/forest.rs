//! Random Forest training with parallel tree construction.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use tracing::{debug, info, instrument};

use crate::config::RandomForestConfig;
use crate::error::RfError;
use crate::tree::DecisionTree;
use crate::validate::validate_training_data;

/// One ensemble member: a tree and the feature columns it was trained on.
///
/// The tree's split features index into `features`, not into the full row.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ForestMember {
    pub(crate) tree: DecisionTree,
    pub(crate) features: Vec<usize>,
}

impl ForestMember {
    /// Borrow the member tree.
    #[must_use]
    pub fn tree(&self) -> &DecisionTree {
        &self.tree
    }

    /// Return the full-row column indices this tree sees, in draw order.
    #[must_use]
    pub fn features(&self) -> &[usize] {
        &self.features
    }

    /// Predict a full-width row by projecting it onto this member's features.
    ///
    /// The caller guarantees that every index in `features` is in bounds.
    pub(crate) fn predict_full_row(&self, sample: &[f64]) -> Result<usize, RfError> {
        let projected: Vec<f64> = self.features.iter().map(|&f| sample[f]).collect();
        self.tree.predict_row(&projected)
    }
}

/// Learned state of a forest.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub(crate) struct FittedForest {
    pub(crate) members: Vec<ForestMember>,
    pub(crate) n_features: usize,
    pub(crate) n_classes: usize,
}

/// A bagging ensemble of CART trees with per-tree feature subsets.
///
/// Starts unfitted. [`RandomForest::fit`] builds every member before
/// replacing the learned state, so a failed fit leaves the previous
/// ensemble (if any) untouched.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RandomForest {
    pub(crate) config: RandomForestConfig,
    pub(crate) fitted: Option<FittedForest>,
}

/// Row and column draws for a single tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TreeDraw {
    pub(crate) rows: Vec<usize>,
    pub(crate) features: Vec<usize>,
}

/// Largest bootstrap sample per tree, as a multiple of the training rows.
pub(crate) const MAX_SAMPLE_FACTOR: usize = 100;

/// Resolve the per-tree row and column counts from the sampling ratios.
///
/// Both counts are `round(n * ratio)` with halves rounded away from zero.
/// The row count is capped at [`MAX_SAMPLE_FACTOR`] times `n_samples` and
/// checked before any conversion or allocation.
pub(crate) fn resolve_draw_counts(
    config: &RandomForestConfig,
    n_samples: usize,
    n_features: usize,
) -> Result<(usize, usize), RfError> {
    for (name, value) in [
        ("sample_ratio", config.sample_ratio),
        ("feat_ratio", config.feat_ratio),
    ] {
        if !value.is_finite() || value < 0.0 {
            return Err(RfError::InvalidRatio { name, value });
        }
    }

    let rows = (n_samples as f64 * config.sample_ratio).round();
    let max_rows = n_samples.saturating_mul(MAX_SAMPLE_FACTOR);
    if rows > max_rows as f64 {
        return Err(RfError::OversizedSample {
            sample_ratio: config.sample_ratio,
            n_samples,
            max_rows,
        });
    }
    let n_rows = rows as usize;
    if n_rows == 0 {
        return Err(RfError::EmptySample {
            sample_ratio: config.sample_ratio,
            n_samples,
        });
    }

    let n_cols = (n_features as f64 * config.feat_ratio).round() as usize;
    if n_cols == 0 || n_cols > n_features {
        return Err(RfError::InvalidFeatureSubset {
            feat_ratio: config.feat_ratio,
            selected: n_cols,
            n_features,
        });
    }

    Ok((n_rows, n_cols))
}

/// Draw `draw_count` row indices uniformly with replacement.
fn bootstrap_rows(n_samples: usize, draw_count: usize, rng: &mut impl Rng) -> Vec<usize> {
    (0..draw_count).map(|_| rng.gen_range(0..n_samples)).collect()
}

/// Draw `amount` distinct column indices, in draw order.
fn feature_subset(n_features: usize, amount: usize, rng: &mut impl Rng) -> Vec<usize> {
    rand::seq::index::sample(rng, n_features, amount).into_vec()
}

/// Draw rows then columns for each tree in turn from one generator.
pub(crate) fn draw_all(
    n_trees: usize,
    n_samples: usize,
    n_rows: usize,
    n_features: usize,
    n_cols: usize,
    rng: &mut impl Rng,
) -> Vec<TreeDraw> {
    (0..n_trees)
        .map(|_| {
            let rows = bootstrap_rows(n_samples, n_rows, rng);
            let features = feature_subset(n_features, n_cols, rng);
            TreeDraw { rows, features }
        })
        .collect()
}

impl RandomForest {
    /// Create an unfitted forest with the given configuration.
    #[must_use]
    pub fn new(config: RandomForestConfig) -> Self {
        Self {
            config,
            fitted: None,
        }
    }

    /// Train the ensemble on a row-major dataset.
    ///
    /// `n_classes` is the number of distinct labels and is shared by every
    /// member tree. All row and column draws for all trees are taken
    /// sequentially from a single generator before the trees are fitted in
    /// parallel, so a fixed seed reproduces the forest exactly.
    ///
    /// # Errors
    ///
    /// | Variant                             | When                                              |
    /// |-------------------------------------|---------------------------------------------------|
    /// | [`RfError::EmptyDataset`]           | `features` is empty                               |
    /// | [`RfError::ZeroFeatures`]           | rows have zero feature columns                    |
    /// | [`RfError::FeatureCountMismatch`]   | rows have inconsistent lengths                    |
    /// | [`RfError::NonFiniteValue`]         | any value is NaN or infinite                      |
    /// | [`RfError::LabelCountMismatch`]     | `labels.len() != features.len()`                  |
    /// | [`RfError::LabelOutOfRange`]        | a label is `>= n_classes`                         |
    /// | [`RfError::InvalidTreeCount`]       | `n_trees` is zero                                 |
    /// | [`RfError::InvalidRatio`]           | a ratio is negative or non-finite                 |
    /// | [`RfError::EmptySample`]            | `sample_ratio` rounds to zero rows                |
    /// | [`RfError::OversizedSample`]        | `sample_ratio` draws over 100x the row count      |
    /// | [`RfError::InvalidFeatureSubset`]   | `feat_ratio` rounds to zero or too many columns   |
    #[instrument(skip_all, fields(n_trees = self.config.n_trees, n_samples = features.len()))]
    pub fn fit(&mut self, features: &[Vec<f64>], labels: &[usize]) -> Result<(), RfError> {
        let shape = validate_training_data(features, labels)?;

        let config = &self.config;
        if config.n_trees == 0 {
            return Err(RfError::InvalidTreeCount {
                n_trees: config.n_trees,
            });
        }
        let (n_rows, n_cols) = resolve_draw_counts(config, shape.n_samples, shape.n_features)?;
        let n_classes = shape.n_classes;

        info!(
            n_trees = config.n_trees,
            n_samples = shape.n_samples,
            n_features = shape.n_features,
            n_classes,
            rows_per_tree = n_rows,
            features_per_tree = n_cols,
            seeded = config.seed.is_some(),
            "training random forest"
        );

        let mut rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        let draws = draw_all(
            config.n_trees,
            shape.n_samples,
            n_rows,
            shape.n_features,
            n_cols,
            &mut rng,
        );

        let tree_config = config.tree_config();

        // Parallel tree training; collect preserves draw order.
        let members: Vec<ForestMember> = draws
            .into_par_iter()
            .map(|draw| {
                let boot_features: Vec<Vec<f64>> = draw
                    .rows
                    .iter()
                    .map(|&r| draw.features.iter().map(|&f| features[r][f]).collect())
                    .collect();
                let boot_labels: Vec<usize> = draw.rows.iter().map(|&r| labels[r]).collect();

                let mut tree = DecisionTree::new(tree_config);
                tree.fit_with_classes(&boot_features, &boot_labels, n_classes);

                ForestMember {
                    tree,
                    features: draw.features,
                }
            })
            .collect();

        debug!(
            n_nodes = members.iter().map(|m| m.tree.n_nodes()).sum::<usize>(),
            "tree training complete"
        );

        self.fitted = Some(FittedForest {
            members,
            n_features: shape.n_features,
            n_classes,
        });

        info!("random forest training complete");
        Ok(())
    }

    /// Return the configuration this forest trains with.
    #[must_use]
    pub fn config(&self) -> &RandomForestConfig {
        &self.config
    }

    /// Return `true` once the forest has been fitted (or loaded).
    #[must_use]
    pub fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }

    /// Return the ensemble members in draw order. Empty when unfitted.
    #[must_use]
    pub fn members(&self) -> &[ForestMember] {
        self.fitted
            .as_ref()
            .map(|f| f.members.as_slice())
            .unwrap_or(&[])
    }

    /// Return the number of fitted trees (0 when unfitted).
    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.members().len()
    }

    /// Return the number of features this forest was trained on (0 when unfitted).
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.fitted.as_ref().map_or(0, |f| f.n_features)
    }

    /// Return the number of classes (0 when unfitted).
    #[must_use]
    pub fn n_classes(&self) -> usize {
        self.fitted.as_ref().map_or(0, |f| f.n_classes)
    }

    pub(crate) fn fitted(&self) -> Result<&FittedForest, RfError> {
        self.fitted.as_ref().ok_or(RfError::NotFitted {
            model: "random forest",
        })
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::{MAX_SAMPLE_FACTOR, draw_all, resolve_draw_counts};
    use crate::{ErrorKind, RandomForest, RandomForestConfig, RfError};

    /// Generate a simple 3-class separable dataset.
    fn make_separable_data() -> (Vec<Vec<f64>>, Vec<usize>) {
        let mut features = Vec::new();
        let mut labels = Vec::new();
        for class in 0..3usize {
            for i in 0..20 {
                let x = class as f64 * 10.0 + i as f64 * 0.15;
                features.push(vec![x, x * 0.5 + 1.0, (i % 4) as f64]);
                labels.push(class);
            }
        }
        (features, labels)
    }

    fn seeded(n_trees: usize, seed: u64) -> RandomForestConfig {
        RandomForestConfig::new(n_trees)
            .unwrap()
            .with_seed(Some(seed))
    }

    #[test]
    fn three_class_separable_accuracy() {
        let (features, labels) = make_separable_data();
        let forest = seeded(25, 42).fit(&features, &labels).unwrap();

        let predictions = forest.predict(&features).unwrap();
        let correct = predictions
            .iter()
            .zip(&labels)
            .filter(|&(&p, &l)| p == l)
            .count();
        let accuracy = correct as f64 / labels.len() as f64;
        assert!(accuracy > 0.9, "accuracy = {accuracy}");
    }

    #[test]
    fn members_follow_ratios() {
        let (features, labels) = make_separable_data();
        let forest = seeded(8, 1)
            .with_feat_ratio(0.6)
            .with_sample_ratio(0.5)
            .fit(&features, &labels)
            .unwrap();
        assert_eq!(forest.n_trees(), 8);
        assert_eq!(forest.n_classes(), 3);
        assert_eq!(forest.n_features(), 3);
        for member in forest.members() {
            // round(3 * 0.6) = 2 distinct columns.
            assert_eq!(member.features().len(), 2);
            assert_ne!(member.features()[0], member.features()[1]);
            assert_eq!(member.tree().n_features(), 2);
            assert_eq!(member.tree().n_classes(), 3);
            // round(60 * 0.5) = 30 bootstrap rows reach the root.
            assert_eq!(member.tree().nodes()[0].n_samples(), 30);
        }
    }

    #[test]
    fn deterministic_with_same_seed() {
        let (features, labels) = make_separable_data();
        let forest1 = seeded(10, 99).fit(&features, &labels).unwrap();
        let forest2 = seeded(10, 99).fit(&features, &labels).unwrap();
        assert_eq!(forest1, forest2);
        assert_eq!(
            forest1.predict(&features).unwrap(),
            forest2.predict(&features).unwrap()
        );
    }

    #[test]
    fn different_seeds_draw_differently() {
        let (features, labels) = make_separable_data();
        let forest1 = seeded(10, 1).fit(&features, &labels).unwrap();
        let forest2 = seeded(10, 2).fit(&features, &labels).unwrap();
        assert_ne!(forest1, forest2);
    }

    #[test]
    fn bootstrap_draws_repeat_rows() {
        let mut saw_repeat = false;
        for seed in 0..20u64 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let draws = draw_all(5, 30, 30, 4, 2, &mut rng);
            for draw in &draws {
                assert_eq!(draw.rows.len(), 30);
                assert!(draw.rows.iter().all(|&r| r < 30));
                let mut unique = draw.rows.clone();
                unique.sort_unstable();
                unique.dedup();
                saw_repeat |= unique.len() < draw.rows.len();

                let mut cols = draw.features.clone();
                cols.sort_unstable();
                cols.dedup();
                assert_eq!(cols.len(), 2);
            }
        }
        assert!(saw_repeat);
    }

    #[test]
    fn draw_counts_round_to_nearest() {
        let config = seeded(1, 0).with_sample_ratio(0.25).with_feat_ratio(0.5);
        // 10 * 0.25 = 2.5 -> 3; 5 * 0.5 = 2.5 -> 3.
        assert_eq!(resolve_draw_counts(&config, 10, 5).unwrap(), (3, 3));
    }

    #[test]
    fn huge_sample_ratio_is_invalid_config() {
        let (features, labels) = make_separable_data();
        let err = seeded(1, 1)
            .with_sample_ratio(1e30)
            .fit(&features, &labels)
            .unwrap_err();
        assert!(matches!(
            err,
            RfError::OversizedSample {
                n_samples: 60,
                max_rows: 6000,
                ..
            }
        ));
        assert_eq!(err.kind(), ErrorKind::InvalidConfig);

        let at_cap = seeded(1, 0).with_sample_ratio(MAX_SAMPLE_FACTOR as f64);
        assert_eq!(resolve_draw_counts(&at_cap, 10, 5).unwrap().0, 1000);
        let past_cap = at_cap.with_sample_ratio(100.06);
        assert!(resolve_draw_counts(&past_cap, 10, 5).is_err());
    }

    #[test]
    fn zero_row_sample_is_invalid_config() {
        let (features, labels) = make_separable_data();
        let err = seeded(3, 0)
            .with_sample_ratio(0.001)
            .fit(&features, &labels)
            .unwrap_err();
        assert!(matches!(err, RfError::EmptySample { .. }));
        assert_eq!(err.kind(), ErrorKind::InvalidConfig);
    }

    #[test]
    fn zero_feature_subset_is_invalid_config() {
        let (features, labels) = make_separable_data();
        let err = seeded(3, 0)
            .with_feat_ratio(0.1)
            .fit(&features, &labels)
            .unwrap_err();
        assert!(matches!(err, RfError::InvalidFeatureSubset { selected: 0, .. }));
        assert_eq!(err.kind(), ErrorKind::InvalidConfig);
    }

    #[test]
    fn oversized_feature_subset_is_invalid_config() {
        let (features, labels) = make_separable_data();
        let err = seeded(3, 0)
            .with_feat_ratio(1.5)
            .fit(&features, &labels)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidConfig);
    }

    #[test]
    fn negative_ratio_is_invalid_config() {
        let (features, labels) = make_separable_data();
        let err = seeded(3, 0)
            .with_sample_ratio(-1.0)
            .fit(&features, &labels)
            .unwrap_err();
        assert!(matches!(err, RfError::InvalidRatio { name: "sample_ratio", .. }));
    }

    #[test]
    fn ragged_matrix_is_invalid_input() {
        let features = vec![vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0]];
        let err = seeded(3, 0).fit(&features, &[0, 1, 0]).unwrap_err();
        assert!(matches!(err, RfError::FeatureCountMismatch { .. }));
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn empty_dataset_error() {
        let err = seeded(3, 0).fit(&[], &[]).unwrap_err();
        assert!(matches!(err, RfError::EmptyDataset));
    }

    #[test]
    fn failed_refit_keeps_previous_forest() {
        let (features, labels) = make_separable_data();
        let mut forest = RandomForest::new(seeded(4, 5));
        forest.fit(&features, &labels).unwrap();
        let before = forest.clone();
        assert!(forest.fit(&features, &labels[..10]).is_err());
        assert_eq!(forest, before);
    }

    #[test]
    fn unseeded_forest_still_fits() {
        let (features, labels) = make_separable_data();
        let forest = RandomForestConfig::new(5)
            .unwrap()
            .fit(&features, &labels)
            .unwrap();
        assert_eq!(forest.n_trees(), 5);
    }
}
