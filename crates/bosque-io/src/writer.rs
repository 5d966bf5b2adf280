//! JSON result writer for prediction and evaluation outputs.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::IoError;
use crate::domain::ExperimentName;

/// Per-class scores handed to [`ResultWriter::write_evaluation`].
///
/// Plain numbers only, so this crate stays independent of the model crate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClassScore {
    /// Class code.
    pub class: usize,
    /// Fraction of predictions of this class that were correct.
    pub precision: f64,
    /// Fraction of samples of this class that were found.
    pub recall: f64,
    /// Harmonic mean of precision and recall.
    pub f1: f64,
    /// Number of samples whose true class is this one.
    pub support: usize,
}

/// Writes prediction and evaluation results to JSON files.
///
/// Creates the output directory on construction if it does not exist.
/// Output files are named `{experiment}_predictions.json` and
/// `{experiment}_evaluate.json`.
pub struct ResultWriter {
    output_dir: PathBuf,
    experiment: ExperimentName,
}

impl ResultWriter {
    /// Create a new writer targeting the given directory and experiment name.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::OutputDirCreate`] if the directory cannot be created.
    #[instrument(skip_all, fields(dir = %output_dir.display(), experiment = %experiment))]
    pub fn new(output_dir: &Path, experiment: ExperimentName) -> Result<Self, IoError> {
        fs::create_dir_all(output_dir).map_err(|e| IoError::OutputDirCreate {
            path: output_dir.to_path_buf(),
            source: e,
        })?;
        debug!("output directory ready");
        Ok(Self {
            output_dir: output_dir.to_path_buf(),
            experiment,
        })
    }

    /// Return the path of `{experiment}_predictions.json`.
    #[must_use]
    pub fn predictions_path(&self) -> PathBuf {
        self.artifact_path("predictions")
    }

    /// Return the path of `{experiment}_evaluate.json`.
    #[must_use]
    pub fn evaluation_path(&self) -> PathBuf {
        self.artifact_path("evaluate")
    }

    fn artifact_path(&self, kind: &str) -> PathBuf {
        self.output_dir
            .join(format!("{}_{kind}.json", self.experiment.as_str()))
    }

    /// Write one predicted class per input row to `{experiment}_predictions.json`.
    ///
    /// Rows are keyed by their zero-based index in the input file.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::SerializeResult`] or [`IoError::WriteFile`].
    #[instrument(skip_all, fields(n_rows = predictions.len()))]
    pub fn write_predictions(&self, predictions: &[usize]) -> Result<PathBuf, IoError> {
        let path = self.predictions_path();

        let mut class_counts: BTreeMap<usize, usize> = BTreeMap::new();
        for &class in predictions {
            *class_counts.entry(class).or_default() += 1;
        }

        let artifact = PredictArtifact {
            experiment: self.experiment.as_str(),
            n_rows: predictions.len(),
            class_counts,
            predictions: predictions
                .iter()
                .enumerate()
                .map(|(row, &predicted_class)| PredictionEntry {
                    row,
                    predicted_class,
                })
                .collect(),
        };

        write_json(&path, &artifact)?;
        info!(path = %path.display(), "predictions written");
        Ok(path)
    }

    /// Write accuracy, the confusion matrix, and per-class scores to
    /// `{experiment}_evaluate.json`.
    ///
    /// `confusion_matrix[t][p]` counts samples of true class `t` predicted as `p`.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::SerializeResult`] or [`IoError::WriteFile`].
    #[instrument(skip_all, fields(n_samples))]
    pub fn write_evaluation(
        &self,
        n_samples: usize,
        accuracy: f64,
        confusion_matrix: &[Vec<usize>],
        class_scores: &[ClassScore],
    ) -> Result<PathBuf, IoError> {
        let path = self.evaluation_path();

        let artifact = EvaluateArtifact {
            experiment: self.experiment.as_str(),
            n_samples,
            accuracy,
            n_classes: confusion_matrix.len(),
            confusion_matrix,
            class_metrics: class_scores,
        };

        write_json(&path, &artifact)?;
        info!(path = %path.display(), accuracy, "evaluation result written");
        Ok(path)
    }
}

fn write_json<T: Serialize>(path: &Path, artifact: &T) -> Result<(), IoError> {
    let json = serde_json::to_string_pretty(artifact).map_err(|e| IoError::SerializeResult {
        path: path.to_path_buf(),
        source: e,
    })?;
    fs::write(path, json).map_err(|e| IoError::WriteFile {
        path: path.to_path_buf(),
        source: e,
    })
}

// --- Shadow structs for JSON serialization ---

#[derive(Serialize)]
struct PredictArtifact<'a> {
    experiment: &'a str,
    n_rows: usize,
    class_counts: BTreeMap<usize, usize>,
    predictions: Vec<PredictionEntry>,
}

#[derive(Serialize)]
struct PredictionEntry {
    row: usize,
    predicted_class: usize,
}

#[derive(Serialize)]
struct EvaluateArtifact<'a> {
    experiment: &'a str,
    n_samples: usize,
    accuracy: f64,
    n_classes: usize,
    confusion_matrix: &'a [Vec<usize>],
    class_metrics: &'a [ClassScore],
}
