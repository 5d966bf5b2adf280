use crate::node::{FeatureIndex, Impurity};

/// Compute the Gini impurity `1 - Σ(p_i²)` of a label subset from its class counts.
///
/// `class_counts` must span the tree's full class range, so classes absent
/// from the subset contribute zero. Returns zero impurity when
/// `n_samples` is zero.
#[must_use]
pub fn gini(class_counts: &[usize], n_samples: usize) -> Impurity {
    if n_samples == 0 {
        return Impurity::PURE;
    }
    let n = n_samples as f64;
    let sum_sq: f64 = class_counts
        .iter()
        .map(|&c| {
            let p = c as f64 / n;
            p * p
        })
        .sum();
    Impurity::new(1.0 - sum_sq)
}

/// Result of finding the best split for a node.
#[derive(Debug, Clone)]
pub(crate) struct SplitResult {
    /// Feature used for the split.
    pub(crate) feature: FeatureIndex,
    /// Threshold value, always one of the observed feature values.
    pub(crate) threshold: f64,
    /// Sample-size-weighted Gini of the two children.
    pub(crate) weighted_impurity: f64,
    /// Sample indices going to the left child (`value <= threshold`).
    pub(crate) left_indices: Vec<usize>,
    /// Sample indices going to the right child.
    pub(crate) right_indices: Vec<usize>,
}

/// Find the split minimizing weighted Gini impurity by exhaustive search.
///
/// Every distinct value of every feature among `sample_indices` is a
/// threshold candidate. Features are scanned in ascending index order and
/// thresholds in ascending value order; a candidate only replaces the best
/// when its score is strictly lower, so the first candidate wins exact ties.
///
/// Returns `None` when `sample_indices.len() <= min_samples_split` or when
/// no candidate beats the parent impurity.
///
/// # Column-major layout
///
/// `features` is column-major: `features[feature_idx][sample_idx]`.
/// `sample_indices` are indices into these inner Vecs.
pub(crate) fn find_best_split(
    features: &[Vec<f64>],
    labels: &[usize],
    sample_indices: &[usize],
    n_classes: usize,
    min_samples_split: usize,
) -> Option<SplitResult> {
    let n_samples = sample_indices.len();
    if n_samples <= min_samples_split || n_samples < 2 {
        return None;
    }

    let mut parent_counts = vec![0usize; n_classes];
    for &si in sample_indices {
        parent_counts[labels[si]] += 1;
    }

    let m = n_samples as f64;
    let mut best_score = gini(&parent_counts, n_samples).value();
    let mut best: Option<(FeatureIndex, f64)> = None;

    for (feat_idx, feat_col) in features.iter().enumerate() {
        let mut sorted: Vec<(f64, usize)> = sample_indices
            .iter()
            .map(|&si| (feat_col[si], labels[si]))
            .collect();
        sorted.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut left_counts = vec![0usize; n_classes];
        let mut right_counts = parent_counts.clone();

        // The last distinct value would put every sample on the left.
        for i in 0..(n_samples - 1) {
            let (value, class) = sorted[i];
            left_counts[class] += 1;
            right_counts[class] -= 1;

            if sorted[i + 1].0 == value {
                continue;
            }

            let n_left = i + 1;
            let n_right = n_samples - n_left;
            let score = (gini(&left_counts, n_left).value() * n_left as f64
                + gini(&right_counts, n_right).value() * n_right as f64)
                / m;

            if score < best_score {
                best_score = score;
                best = Some((FeatureIndex::new(feat_idx), value));
            }
        }
    }

    let (feature, threshold) = best?;

    let feat_col = &features[feature.index()];
    let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = sample_indices
        .iter()
        .partition(|&&si| feat_col[si] <= threshold);

    Some(SplitResult {
        feature,
        threshold,
        weighted_impurity: best_score,
        left_indices,
        right_indices,
    })
}
