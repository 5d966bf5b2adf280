//! CSV dataset reader with full input validation.

use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument};

use crate::IoError;
use crate::domain::Dataset;

/// Which column, if any, holds the class labels.
#[derive(Debug, Clone, PartialEq, Eq)]
enum LabelColumn {
    Last,
    Named(String),
    Absent,
}

/// Reads a numeric dataset from a headered CSV file.
///
/// Expected CSV format:
/// - Header row required, one name per column
/// - Every feature cell parses as a finite `f64`
/// - The label column (default: the last column) holds non-negative
///   integer class codes
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`IoError::FileNotFound`] | File doesn't exist or is unreadable |
/// | [`IoError::CsvParse`] | Malformed CSV record |
/// | [`IoError::UnknownLabelColumn`] | Named label column is not in the header |
/// | [`IoError::NoFeatureColumns`] | No columns remain besides the label |
/// | [`IoError::EmptyDataset`] | Zero data rows after header |
/// | [`IoError::InconsistentRowLength`] | Row has different column count than header |
/// | [`IoError::NonFiniteValue`] | Feature cell is NaN, Inf, or unparseable |
/// | [`IoError::InvalidLabel`] | Label cell is not a non-negative integer |
pub struct DatasetReader {
    path: PathBuf,
    label: LabelColumn,
}

impl DatasetReader {
    /// Create a reader that takes labels from the last column.
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            label: LabelColumn::Last,
        }
    }

    /// Take labels from the column with this header name.
    #[must_use]
    pub fn with_label_column(mut self, name: impl Into<String>) -> Self {
        self.label = LabelColumn::Named(name.into());
        self
    }

    /// Treat every column as a feature (prediction input).
    #[must_use]
    pub fn without_labels(mut self) -> Self {
        self.label = LabelColumn::Absent;
        self
    }

    fn csv_error(&self, e: csv::Error) -> IoError {
        IoError::CsvParse {
            path: self.path.clone(),
            offset: e.position().map_or(0, |p| p.byte()),
            source: e,
        }
    }

    /// Read and validate the CSV file, returning a [`Dataset`].
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn read(&self) -> Result<Dataset, IoError> {
        let file = std::fs::File::open(&self.path).map_err(|e| IoError::FileNotFound {
            path: self.path.clone(),
            source: e,
        })?;

        // flexible(true) so our own InconsistentRowLength check fires instead
        // of a low-level CsvParse error.
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(file);

        let header = rdr.headers().map_err(|e| self.csv_error(e))?.clone();
        let expected_cols = header.len();

        let label_index = match &self.label {
            LabelColumn::Absent => None,
            LabelColumn::Last => expected_cols.checked_sub(1),
            LabelColumn::Named(name) => Some(
                header
                    .iter()
                    .position(|h| h == name)
                    .ok_or_else(|| IoError::UnknownLabelColumn {
                        path: self.path.clone(),
                        column: name.clone(),
                    })?,
            ),
        };

        let feature_columns: Vec<usize> = (0..expected_cols)
            .filter(|&c| Some(c) != label_index)
            .collect();
        if feature_columns.is_empty() {
            return Err(IoError::NoFeatureColumns {
                path: self.path.clone(),
            });
        }
        let feature_names: Vec<String> = feature_columns
            .iter()
            .map(|&c| header[c].to_string())
            .collect();
        debug!(expected_cols, ?label_index, "read CSV header");

        let mut features = Vec::new();
        let mut labels = label_index.map(|_| Vec::new());

        for (row_index, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| self.csv_error(e))?;

            if record.len() != expected_cols {
                return Err(IoError::InconsistentRowLength {
                    path: self.path.clone(),
                    row_index,
                    expected: expected_cols,
                    got: record.len(),
                });
            }

            let mut row = Vec::with_capacity(feature_columns.len());
            for &c in &feature_columns {
                let raw = &record[c];
                let value = raw
                    .parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .ok_or_else(|| IoError::NonFiniteValue {
                        path: self.path.clone(),
                        row_index,
                        column: header[c].to_string(),
                        raw: raw.to_string(),
                    })?;
                row.push(value);
            }
            features.push(row);

            if let (Some(c), Some(labels)) = (label_index, labels.as_mut()) {
                let raw = &record[c];
                let label = parse_label(raw).ok_or_else(|| IoError::InvalidLabel {
                    path: self.path.clone(),
                    row_index,
                    raw: raw.to_string(),
                })?;
                labels.push(label);
            }
        }

        if features.is_empty() {
            return Err(IoError::EmptyDataset {
                path: self.path.clone(),
            });
        }

        info!(
            n_samples = features.len(),
            n_features = feature_names.len(),
            labelled = labels.is_some(),
            "dataset loaded"
        );

        Ok(Dataset::new(feature_names, features, labels))
    }
}

/// Parse a class code in `[0, u32::MAX]`. Integral floats such as `1.0` are
/// accepted since numeric exports often write labels that way.
fn parse_label(raw: &str) -> Option<usize> {
    let code = match raw.parse::<u32>() {
        Ok(code) => code,
        Err(_) => {
            let value = raw.parse::<f64>().ok()?;
            if value.fract() != 0.0 || !(0.0..=f64::from(u32::MAX)).contains(&value) {
                return None;
            }
            value as u32
        }
    };
    usize::try_from(code).ok()
}
