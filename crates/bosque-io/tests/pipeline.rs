//! End-to-end integration tests: CSV -> fit/predict -> JSON -> deserialize.

use std::fs;
use std::path::Path;

use bosque_io::{ClassScore, DatasetReader, ExperimentName, IoError, ResultWriter};
use bosque_rf::{ConfusionMatrix, RandomForest, RandomForestConfig};
use tempfile::TempDir;

/// Path to the test fixture directory.
fn fixture_path(name: &str) -> std::path::PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn read_json(path: &Path) -> serde_json::Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

fn fitted_forest() -> RandomForest {
    let dataset = DatasetReader::new(&fixture_path("labelled_36x3.csv"))
        .with_label_column("species")
        .read()
        .expect("fixture should parse");
    let (features, labels) = dataset.into_parts();
    RandomForestConfig::new(25)
        .unwrap()
        .with_seed(Some(42))
        .fit(&features, &labels.unwrap())
        .unwrap()
}

#[test]
fn labelled_fixture_shape() {
    let dataset = DatasetReader::new(&fixture_path("labelled_36x3.csv"))
        .read()
        .unwrap();

    assert_eq!(dataset.n_samples(), 36);
    assert_eq!(dataset.feature_names(), &["width", "height", "noise"]);
    let labels = dataset.labels().unwrap();
    for class in 0..3 {
        assert_eq!(labels.iter().filter(|&&l| l == class).count(), 12);
    }
}

#[test]
fn predict_round_trip() {
    let forest = fitted_forest();

    // 1. Read unlabelled rows
    let dataset = DatasetReader::new(&fixture_path("unlabelled_6x3.csv"))
        .without_labels()
        .read()
        .unwrap();
    assert_eq!(dataset.n_features(), forest.n_features());

    // 2. Predict; rows sit in the middle of each class cluster
    let predictions = forest.predict(dataset.features()).unwrap();
    assert_eq!(predictions, vec![0, 1, 2, 2, 1, 0]);

    // 3. Write and read back
    let dir = TempDir::new().unwrap();
    let experiment = ExperimentName::new("predict_rt".into()).unwrap();
    let writer = ResultWriter::new(dir.path(), experiment).unwrap();
    let path = writer.write_predictions(&predictions).unwrap();

    let content = read_json(&path);
    assert_eq!(content["experiment"], "predict_rt");
    assert_eq!(content["n_rows"], 6);
    let entries = content["predictions"].as_array().unwrap();
    for (i, entry) in entries.iter().enumerate() {
        assert_eq!(entry["row"].as_u64().unwrap() as usize, i);
        assert_eq!(
            entry["predicted_class"].as_u64().unwrap() as usize,
            predictions[i]
        );
    }
}

#[test]
fn evaluate_round_trip() {
    let forest = fitted_forest();
    let dataset = DatasetReader::new(&fixture_path("labelled_36x3.csv"))
        .read()
        .unwrap();
    let labels = dataset.labels().unwrap();

    let cm = ConfusionMatrix::evaluate(&forest, dataset.features(), labels).unwrap();
    let scores: Vec<ClassScore> = cm
        .class_metrics()
        .into_iter()
        .map(|m| ClassScore {
            class: m.class,
            precision: m.precision,
            recall: m.recall,
            f1: m.f1,
            support: m.support,
        })
        .collect();

    let dir = TempDir::new().unwrap();
    let experiment = ExperimentName::new("eval_rt".into()).unwrap();
    let writer = ResultWriter::new(dir.path(), experiment).unwrap();
    let path = writer
        .write_evaluation(cm.total(), cm.accuracy(), cm.as_rows(), &scores)
        .unwrap();

    let content = read_json(&path);
    assert_eq!(content["n_samples"], 36);
    assert_eq!(content["n_classes"], 3);
    assert!(content["accuracy"].as_f64().unwrap() > 0.9);
    let matrix = content["confusion_matrix"].as_array().unwrap();
    for row in matrix {
        let total: u64 = row.as_array().unwrap().iter().map(|c| c.as_u64().unwrap()).sum();
        assert_eq!(total, 12);
    }
}

#[test]
fn ragged_fixture_rejected() {
    let err = DatasetReader::new(&fixture_path("ragged.csv"))
        .read()
        .unwrap_err();
    assert!(matches!(err, IoError::InconsistentRowLength { row_index: 1, .. }));
}

#[test]
fn width_mismatch_surfaces_from_model() {
    let forest = fitted_forest();
    // Labelled file read without labels has one column too many.
    let dataset = DatasetReader::new(&fixture_path("labelled_36x3.csv"))
        .without_labels()
        .read()
        .unwrap();
    assert!(forest.predict(dataset.features()).is_err());
}
