use std::path::PathBuf;

/// Coarse classification of an [`RfError`].
///
/// Callers that only care about *why* an operation was rejected (bad data,
/// bad configuration, missing training) can match on this instead of on
/// individual variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The feature matrix, label vector, or a prediction row is malformed.
    InvalidInput,
    /// The configuration yields a degenerate sample or ensemble.
    InvalidConfig,
    /// The model has no trained state.
    NotFitted,
    /// Saving or loading a model failed.
    Persistence,
}

/// Errors from decision tree and random forest operations.
#[derive(Debug, thiserror::Error)]
pub enum RfError {
    /// Returned when n_trees is zero.
    #[error("n_trees must be at least 1, got {n_trees}")]
    InvalidTreeCount {
        /// The invalid n_trees value provided.
        n_trees: usize,
    },

    /// Returned when a sampling ratio is negative, NaN, or infinite.
    #[error("{name} must be a finite non-negative number, got {value}")]
    InvalidRatio {
        /// Name of the offending ratio (`sample_ratio` or `feat_ratio`).
        name: &'static str,
        /// The invalid value provided.
        value: f64,
    },

    /// Returned when `round(n_samples * sample_ratio)` is zero.
    #[error("sample_ratio {sample_ratio} draws zero rows from {n_samples} samples")]
    EmptySample {
        /// The configured sample ratio.
        sample_ratio: f64,
        /// The number of training samples.
        n_samples: usize,
    },

    /// Returned when `round(n_samples * sample_ratio)` exceeds the bootstrap cap.
    #[error("sample_ratio {sample_ratio} draws more than {max_rows} rows from {n_samples} samples")]
    OversizedSample {
        /// The configured sample ratio.
        sample_ratio: f64,
        /// The number of training samples.
        n_samples: usize,
        /// The largest bootstrap sample allowed for this dataset.
        max_rows: usize,
    },

    /// Returned when `round(n_features * feat_ratio)` is zero or exceeds n_features.
    #[error("feat_ratio {feat_ratio} selects {selected} features, but must be in [1, {n_features}]")]
    InvalidFeatureSubset {
        /// The configured feature ratio.
        feat_ratio: f64,
        /// The resolved number of features per tree.
        selected: usize,
        /// The number of features in the dataset.
        n_features: usize,
    },

    /// Returned when the training dataset has zero samples.
    #[error("training dataset has zero samples")]
    EmptyDataset,

    /// Returned when the training dataset has zero feature columns.
    #[error("training dataset has zero feature columns")]
    ZeroFeatures,

    /// Returned when a sample has a different number of features than expected.
    #[error("sample {sample_index} has {got} features, expected {expected}")]
    FeatureCountMismatch {
        /// The expected number of features.
        expected: usize,
        /// The actual number of features in the sample.
        got: usize,
        /// The zero-based index of the offending sample.
        sample_index: usize,
    },

    /// Returned when a training value is NaN or infinite.
    #[error("non-finite value at sample {sample_index}, feature {feature_index}")]
    NonFiniteValue {
        /// The zero-based index of the offending sample.
        sample_index: usize,
        /// The zero-based index of the offending feature column.
        feature_index: usize,
    },

    /// Returned when the label vector length differs from the number of samples.
    #[error("got {n_labels} labels for {n_samples} samples")]
    LabelCountMismatch {
        /// Number of feature rows.
        n_samples: usize,
        /// Number of labels.
        n_labels: usize,
    },

    /// Returned when a label is not in `[0, n_classes)`.
    #[error("label {label} at sample {sample_index} is outside [0, {n_classes})")]
    LabelOutOfRange {
        /// The offending label.
        label: usize,
        /// The zero-based index of the offending sample.
        sample_index: usize,
        /// The number of distinct classes.
        n_classes: usize,
    },

    /// Returned when a sample has a different number of features at prediction time.
    #[error("prediction input has {got} features, expected {expected}")]
    PredictionFeatureMismatch {
        /// The expected number of features.
        expected: usize,
        /// The actual number of features in the prediction input.
        got: usize,
    },

    /// Returned when predicting with, or saving, a model that was never fitted.
    #[error("{model} has not been fitted")]
    NotFitted {
        /// Which kind of model was used.
        model: &'static str,
    },

    /// Returned when model serialization fails.
    #[error("failed to serialize model")]
    SerializeModel {
        /// The underlying bincode error.
        source: Box<bincode::ErrorKind>,
    },

    /// Returned when model deserialization fails.
    #[error("failed to deserialize model")]
    DeserializeModel {
        /// Path to the model file, when loading from disk.
        path: Option<PathBuf>,
        /// The underlying bincode error.
        source: Box<bincode::ErrorKind>,
    },

    /// Returned when writing the model file fails.
    #[error("failed to write model to {path}")]
    WriteModel {
        /// Path to the file that could not be written.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when reading the model file fails.
    #[error("failed to read model from {path}")]
    ReadModel {
        /// Path to the file that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when a decoded model violates the forest's structural invariants.
    #[error("corrupt model: {reason}")]
    CorruptModel {
        /// Human-readable description of the violated invariant.
        reason: String,
    },

    /// Returned when loading a model with an incompatible format version.
    #[error("incompatible model version: expected {expected}, found {found}")]
    IncompatibleModelVersion {
        /// The model format version this build expects.
        expected: u32,
        /// The model format version found in the payload.
        found: u32,
    },
}

impl RfError {
    /// Return the coarse [`ErrorKind`] of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            RfError::EmptyDataset
            | RfError::ZeroFeatures
            | RfError::FeatureCountMismatch { .. }
            | RfError::NonFiniteValue { .. }
            | RfError::LabelCountMismatch { .. }
            | RfError::LabelOutOfRange { .. }
            | RfError::PredictionFeatureMismatch { .. } => ErrorKind::InvalidInput,
            RfError::InvalidTreeCount { .. }
            | RfError::InvalidRatio { .. }
            | RfError::EmptySample { .. }
            | RfError::OversizedSample { .. }
            | RfError::InvalidFeatureSubset { .. } => ErrorKind::InvalidConfig,
            RfError::NotFitted { .. } => ErrorKind::NotFitted,
            RfError::SerializeModel { .. }
            | RfError::DeserializeModel { .. }
            | RfError::WriteModel { .. }
            | RfError::ReadModel { .. }
            | RfError::CorruptModel { .. }
            | RfError::IncompatibleModelVersion { .. } => ErrorKind::Persistence,
        }
    }
}
