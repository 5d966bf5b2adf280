//! Training-data validation shared by trees and forests.

use crate::error::RfError;

/// Shape of a validated training set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TrainingShape {
    pub(crate) n_samples: usize,
    pub(crate) n_features: usize,
    /// Number of distinct labels.
    pub(crate) n_classes: usize,
}

/// Check that `features` is a non-empty rectangular finite matrix and that
/// `labels` has one code per row, each in `[0, n_classes)`.
pub(crate) fn validate_training_data(
    features: &[Vec<f64>],
    labels: &[usize],
) -> Result<TrainingShape, RfError> {
    let Some(first) = features.first() else {
        return Err(RfError::EmptyDataset);
    };
    let n_samples = features.len();
    let n_features = first.len();
    if n_features == 0 {
        return Err(RfError::ZeroFeatures);
    }

    for (sample_index, row) in features.iter().enumerate() {
        if row.len() != n_features {
            return Err(RfError::FeatureCountMismatch {
                expected: n_features,
                got: row.len(),
                sample_index,
            });
        }
        if let Some(feature_index) = row.iter().position(|v| !v.is_finite()) {
            return Err(RfError::NonFiniteValue {
                sample_index,
                feature_index,
            });
        }
    }

    if labels.len() != n_samples {
        return Err(RfError::LabelCountMismatch {
            n_samples,
            n_labels: labels.len(),
        });
    }

    let mut distinct = labels.to_vec();
    distinct.sort_unstable();
    distinct.dedup();
    let n_classes = distinct.len();

    if let Some((sample_index, &label)) = labels
        .iter()
        .enumerate()
        .find(|&(_, &label)| label >= n_classes)
    {
        return Err(RfError::LabelOutOfRange {
            label,
            sample_index,
            n_classes,
        });
    }

    Ok(TrainingShape {
        n_samples,
        n_features,
        n_classes,
    })
}
