//! Confusion matrix and per-class classification metrics.

use std::fmt;

use crate::error::RfError;
use crate::forest::RandomForest;

/// Counts of (true class, predicted class) pairs.
///
/// `as_rows()[t][p]` is the number of samples of class `t` predicted as `p`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ConfusionMatrix {
    matrix: Vec<Vec<usize>>,
}

/// Precision, recall, F1 and support of one class.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ClassMetrics {
    /// The class code.
    pub class: usize,
    /// TP / (TP + FP), or 0.0 when the class was never predicted.
    pub precision: f64,
    /// TP / (TP + FN), or 0.0 when the class never occurs.
    pub recall: f64,
    /// Harmonic mean of precision and recall, or 0.0 when both are zero.
    pub f1: f64,
    /// Number of samples whose true class is this one.
    pub support: usize,
}

impl ConfusionMatrix {
    /// Tally true against predicted labels over `[0, n_classes)`.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`RfError::EmptyDataset`] | Zero labels provided |
    /// | [`RfError::LabelCountMismatch`] | `predicted.len() != true_labels.len()` |
    /// | [`RfError::LabelOutOfRange`] | A true or predicted label is `>= n_classes` |
    pub fn from_labels(
        true_labels: &[usize],
        predicted: &[usize],
        n_classes: usize,
    ) -> Result<Self, RfError> {
        if true_labels.is_empty() {
            return Err(RfError::EmptyDataset);
        }
        if predicted.len() != true_labels.len() {
            return Err(RfError::LabelCountMismatch {
                n_samples: true_labels.len(),
                n_labels: predicted.len(),
            });
        }

        let pairs = true_labels.iter().zip(predicted);
        for (sample_index, (&t, &p)) in pairs.clone().enumerate() {
            if let Some(label) = [t, p].into_iter().find(|&l| l >= n_classes) {
                return Err(RfError::LabelOutOfRange {
                    label,
                    sample_index,
                    n_classes,
                });
            }
        }

        let mut matrix = vec![vec![0usize; n_classes]; n_classes];
        for (&t, &p) in pairs {
            matrix[t][p] += 1;
        }
        Ok(Self { matrix })
    }

    /// Predict `features` with `forest` and tally against `labels`.
    ///
    /// The matrix spans the forest's classes, so every true label must be
    /// one the forest was trained with.
    ///
    /// # Errors
    ///
    /// Any prediction error from [`RandomForest::predict`], plus the
    /// [`from_labels`](Self::from_labels) errors.
    pub fn evaluate(
        forest: &RandomForest,
        features: &[Vec<f64>],
        labels: &[usize],
    ) -> Result<Self, RfError> {
        let predicted = forest.predict(features)?;
        Self::from_labels(labels, &predicted, forest.n_classes())
    }

    /// Return the number of classes (matrix side length).
    #[must_use]
    pub fn n_classes(&self) -> usize {
        self.matrix.len()
    }

    /// Return the number of tallied samples.
    #[must_use]
    pub fn total(&self) -> usize {
        self.matrix.iter().flatten().sum()
    }

    /// Return the number of samples on the diagonal.
    #[must_use]
    pub fn correct(&self) -> usize {
        self.matrix.iter().enumerate().map(|(i, row)| row[i]).sum()
    }

    /// Fraction of samples predicted correctly.
    #[must_use]
    pub fn accuracy(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            total => self.correct() as f64 / total as f64,
        }
    }

    /// Per-class precision, recall, F1, and support, in class order.
    #[must_use]
    pub fn class_metrics(&self) -> Vec<ClassMetrics> {
        let n = self.n_classes();
        (0..n)
            .map(|c| {
                let tp = self.matrix[c][c];
                let support: usize = self.matrix[c].iter().sum();
                let predicted: usize = (0..n).map(|t| self.matrix[t][c]).sum();
                let precision = ratio(tp, predicted);
                let recall = ratio(tp, support);
                let f1 = if precision + recall == 0.0 {
                    0.0
                } else {
                    2.0 * precision * recall / (precision + recall)
                };
                ClassMetrics {
                    class: c,
                    precision,
                    recall,
                    f1,
                    support,
                }
            })
            .collect()
    }

    /// Return the underlying matrix rows.
    #[must_use]
    pub fn as_rows(&self) -> &[Vec<usize>] {
        &self.matrix
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>10}", "true\\pred")?;
        for p in 0..self.n_classes() {
            write!(f, " {p:>6}")?;
        }
        writeln!(f)?;
        for (t, row) in self.matrix.iter().enumerate() {
            write!(f, "{t:>10}")?;
            for count in row {
                write!(f, " {count:>6}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RandomForestConfig;

    #[test]
    fn perfect_predictions() {
        let labels = vec![0, 0, 1, 1, 2, 2];
        let cm = ConfusionMatrix::from_labels(&labels, &labels, 3).unwrap();
        assert_eq!(cm.accuracy(), 1.0);
        for m in cm.class_metrics() {
            assert_eq!((m.precision, m.recall, m.f1), (1.0, 1.0, 1.0));
        }
    }

    #[test]
    fn cyclic_errors() {
        // Each class loses one sample to the next class.
        let truth = vec![0, 0, 0, 1, 1, 1, 2, 2, 2];
        let predicted = vec![0, 0, 1, 1, 1, 2, 2, 2, 0];
        let cm = ConfusionMatrix::from_labels(&truth, &predicted, 3).unwrap();

        assert_eq!(cm.correct(), 6);
        assert_eq!(cm.total(), 9);
        assert!((cm.accuracy() - 6.0 / 9.0).abs() < 1e-12);
        for m in cm.class_metrics() {
            assert!((m.precision - 2.0 / 3.0).abs() < 1e-12);
            assert!((m.recall - 2.0 / 3.0).abs() < 1e-12);
            assert_eq!(m.support, 3);
        }
    }

    #[test]
    fn absent_class_scores_zero() {
        let cm = ConfusionMatrix::from_labels(&[0, 1], &[0, 1], 3).unwrap();
        let metrics = cm.class_metrics();
        assert_eq!(metrics[2].support, 0);
        assert_eq!(metrics[2].recall, 0.0);
        assert_eq!(metrics[2].f1, 0.0);
    }

    #[test]
    fn rows_index_true_then_predicted() {
        let cm = ConfusionMatrix::from_labels(&[0, 0, 1], &[1, 0, 1], 2).unwrap();
        assert_eq!(cm.as_rows(), &[vec![1, 1], vec![0, 1]]);
    }

    #[test]
    fn empty_labels_error() {
        let err = ConfusionMatrix::from_labels(&[], &[], 3).unwrap_err();
        assert!(matches!(err, RfError::EmptyDataset));
    }

    #[test]
    fn mismatched_lengths_error() {
        let err = ConfusionMatrix::from_labels(&[0, 1], &[0], 2).unwrap_err();
        assert!(matches!(err, RfError::LabelCountMismatch { .. }));
    }

    #[test]
    fn out_of_range_prediction_error() {
        let err = ConfusionMatrix::from_labels(&[0, 1], &[0, 2], 2).unwrap_err();
        assert!(matches!(
            err,
            RfError::LabelOutOfRange {
                label: 2,
                sample_index: 1,
                n_classes: 2
            }
        ));
    }

    #[test]
    fn display_has_header_and_rows() {
        let cm = ConfusionMatrix::from_labels(&[0, 1], &[0, 1], 2).unwrap();
        let output = format!("{cm}");
        assert!(output.starts_with(" true\\pred"));
        assert_eq!(output.lines().count(), 3);
    }

    #[test]
    fn evaluate_rejects_labels_outside_forest_classes() {
        let features: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64]).collect();
        let labels: Vec<usize> = (0..10).map(|i| usize::from(i >= 5)).collect();
        let forest = RandomForestConfig::new(3)
            .unwrap()
            .with_seed(Some(1))
            .with_feat_ratio(1.0)
            .fit(&features, &labels)
            .unwrap();

        let cm = ConfusionMatrix::evaluate(&forest, &features, &labels).unwrap();
        assert_eq!(cm.n_classes(), 2);

        let err = ConfusionMatrix::evaluate(&forest, &features[..2], &[0, 2]).unwrap_err();
        assert!(matches!(
            err,
            RfError::LabelOutOfRange {
                label: 2,
                sample_index: 1,
                n_classes: 2
            }
        ));
        let err = ConfusionMatrix::evaluate(&forest, &features[..1], &[usize::MAX]).unwrap_err();
        assert!(matches!(err, RfError::LabelOutOfRange { label: usize::MAX, .. }));
    }

    #[test]
    fn out_of_range_checked_before_allocating() {
        let err = ConfusionMatrix::from_labels(&[0, 1], &[0, usize::MAX], 2).unwrap_err();
        assert!(matches!(err, RfError::LabelOutOfRange { label: usize::MAX, .. }));
    }
}
