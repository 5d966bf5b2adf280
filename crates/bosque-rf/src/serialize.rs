//! Model serialization and deserialization via bincode.

use std::path::Path;

use tracing::{debug, info, instrument};

use crate::error::RfError;
use crate::forest::{FittedForest, RandomForest};
use crate::node::Node;

/// Current binary format version.
pub const FORMAT_VERSION: u32 = 1;

/// Versioned envelope for the serialized model.
///
/// `format_version` must stay the first field: it is decoded on its own
/// before the rest of the payload.
#[derive(serde::Serialize, serde::Deserialize)]
struct ModelEnvelope {
    /// Format version for compatibility checking.
    format_version: u32,
    /// Number of trees in the forest.
    n_trees: usize,
    /// Number of features the model was trained on.
    n_features: usize,
    /// Number of classes.
    n_classes: usize,
    /// The serialized forest, configuration included.
    forest: RandomForest,
}

impl RandomForest {
    /// Encode the fitted model into a versioned bincode payload.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`RfError::NotFitted`] | the forest has not been fitted |
    /// | [`RfError::SerializeModel`] | bincode encoding failed |
    pub fn to_bytes(&self) -> Result<Vec<u8>, RfError> {
        let fitted = self.fitted()?;
        let envelope = ModelEnvelope {
            format_version: FORMAT_VERSION,
            n_trees: fitted.members.len(),
            n_features: fitted.n_features,
            n_classes: fitted.n_classes,
            forest: self.clone(),
        };
        bincode::serialize(&envelope).map_err(|e| RfError::SerializeModel { source: e })
    }

    /// Decode a model produced by [`to_bytes`](Self::to_bytes).
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`RfError::DeserializeModel`] | bincode decoding failed |
    /// | [`RfError::IncompatibleModelVersion`] | format version mismatch |
    /// | [`RfError::CorruptModel`] | decoded trees violate structural invariants |
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, RfError> {
        decode(bytes, None)
    }

    /// Save the model to a binary file.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`RfError::NotFitted`] | the forest has not been fitted |
    /// | [`RfError::SerializeModel`] | bincode encoding failed |
    /// | [`RfError::WriteModel`] | file write failed |
    #[instrument(skip(self), fields(path = %path.as_ref().display()))]
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), RfError> {
        let path = path.as_ref();
        let bytes = self.to_bytes()?;

        std::fs::write(path, &bytes).map_err(|e| RfError::WriteModel {
            path: path.to_path_buf(),
            source: e,
        })?;

        info!(
            size_bytes = bytes.len(),
            n_trees = self.n_trees(),
            "model saved"
        );

        Ok(())
    }

    /// Load a model from a binary file.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`RfError::ReadModel`] | file read failed |
    /// | [`RfError::DeserializeModel`] | bincode decoding failed |
    /// | [`RfError::IncompatibleModelVersion`] | format version mismatch |
    /// | [`RfError::CorruptModel`] | decoded trees violate structural invariants |
    #[instrument(fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RfError> {
        let path = path.as_ref();

        let bytes = std::fs::read(path).map_err(|e| RfError::ReadModel {
            path: path.to_path_buf(),
            source: e,
        })?;

        decode(&bytes, Some(path))
    }
}

fn decode(bytes: &[u8], path: Option<&Path>) -> Result<RandomForest, RfError> {
    let deserialize_err = |e| RfError::DeserializeModel {
        path: path.map(Path::to_path_buf),
        source: e,
    };

    let found: u32 = bincode::deserialize(bytes).map_err(deserialize_err)?;
    if found != FORMAT_VERSION {
        return Err(RfError::IncompatibleModelVersion {
            expected: FORMAT_VERSION,
            found,
        });
    }

    let envelope: ModelEnvelope = bincode::deserialize(bytes).map_err(deserialize_err)?;
    let Some(fitted) = envelope.forest.fitted.as_ref() else {
        return Err(corrupt("payload holds an unfitted forest"));
    };
    if envelope.n_trees != fitted.members.len()
        || envelope.n_features != fitted.n_features
        || envelope.n_classes != fitted.n_classes
    {
        return Err(corrupt("envelope header disagrees with forest"));
    }
    check_forest(fitted)?;

    debug!(
        n_trees = envelope.n_trees,
        n_features = envelope.n_features,
        n_classes = envelope.n_classes,
        "model loaded"
    );

    Ok(envelope.forest)
}

fn corrupt(reason: impl Into<String>) -> RfError {
    RfError::CorruptModel {
        reason: reason.into(),
    }
}

/// Verify the invariants prediction relies on: fitted members, in-range
/// feature subsets and split features, leaf classes below `n_classes`, and
/// child indices strictly after their parent.
fn check_forest(forest: &FittedForest) -> Result<(), RfError> {
    if forest.members.is_empty() {
        return Err(corrupt("forest has no trees"));
    }
    for (t, member) in forest.members.iter().enumerate() {
        if let Some(&f) = member.features.iter().find(|&&f| f >= forest.n_features) {
            return Err(corrupt(format!(
                "tree {t} uses column {f} of {}",
                forest.n_features
            )));
        }
        let Some(tree) = member.tree.fitted.as_ref() else {
            return Err(corrupt(format!("tree {t} is not fitted")));
        };
        if tree.n_features != member.features.len() || tree.n_classes != forest.n_classes {
            return Err(corrupt(format!("tree {t} shape disagrees with forest")));
        }
        if tree.nodes.is_empty() {
            return Err(corrupt(format!("tree {t} has no nodes")));
        }
        let n_nodes = tree.nodes.len();
        for (i, node) in tree.nodes.iter().enumerate() {
            let valid = match node {
                Node::Split {
                    feature,
                    left,
                    right,
                    ..
                } => {
                    feature.index() < tree.n_features
                        && (i + 1..n_nodes).contains(&left.index())
                        && (i + 1..n_nodes).contains(&right.index())
                }
                Node::Leaf { prediction, .. } => *prediction < tree.n_classes,
            };
            if !valid {
                return Err(corrupt(format!("tree {t} node {i} is out of range")));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::FORMAT_VERSION;
    use crate::node::Node;
    use crate::{ErrorKind, RandomForest, RandomForestConfig, RfError};

    fn training_data() -> (Vec<Vec<f64>>, Vec<usize>) {
        let features = vec![
            vec![1.0, 0.0, 4.0],
            vec![2.0, 0.0, 3.0],
            vec![3.0, 1.0, 2.0],
            vec![10.0, 1.0, 9.0],
            vec![11.0, 0.0, 8.0],
            vec![12.0, 1.0, 7.0],
        ];
        let labels = vec![0, 0, 0, 1, 1, 1];
        (features, labels)
    }

    fn train_simple_model() -> RandomForest {
        let (features, labels) = training_data();
        RandomForestConfig::new(5)
            .unwrap()
            .with_seed(Some(42))
            .with_sample_ratio(1.0)
            .fit(&features, &labels)
            .unwrap()
    }

    #[test]
    fn round_trip_identical_model() {
        let dir = TempDir::new().unwrap();
        let model_path = dir.path().join("test_model.bin");

        let forest = train_simple_model();
        forest.save(&model_path).unwrap();
        let loaded = RandomForest::load(&model_path).unwrap();

        assert_eq!(loaded, forest);
        assert_eq!(loaded.config(), forest.config());

        let test_samples = vec![vec![1.5, 0.0, 3.0], vec![11.0, 1.0, 8.0], vec![5.0, 0.5, 5.0]];
        assert_eq!(
            forest.predict(&test_samples).unwrap(),
            loaded.predict(&test_samples).unwrap()
        );
    }

    #[test]
    fn bytes_round_trip() {
        let forest = train_simple_model();
        let bytes = forest.to_bytes().unwrap();
        assert_eq!(RandomForest::from_bytes(&bytes).unwrap(), forest);
    }

    #[test]
    fn unfitted_forest_cannot_be_saved() {
        let forest = RandomForest::new(RandomForestConfig::default());
        let err = forest.to_bytes().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFitted);
    }

    #[test]
    fn load_nonexistent_file_error() {
        let dir = TempDir::new().unwrap();
        let err = RandomForest::load(dir.path().join("missing.bin")).unwrap_err();
        assert!(matches!(err, RfError::ReadModel { .. }));
    }

    #[test]
    fn load_corrupt_file_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("corrupt.bin");
        std::fs::write(&path, [1u8, 0, 0, 0, 0xff]).unwrap();
        let err = RandomForest::load(&path).unwrap_err();
        assert!(matches!(err, RfError::DeserializeModel { path: Some(_), .. }));
    }

    #[test]
    fn version_mismatch_error() {
        let forest = train_simple_model();
        let mut bytes = forest.to_bytes().unwrap();
        bytes[..4].copy_from_slice(&(FORMAT_VERSION + 1).to_le_bytes());
        let err = RandomForest::from_bytes(&bytes).unwrap_err();
        assert!(matches!(
            err,
            RfError::IncompatibleModelVersion { expected: 1, found: 2 }
        ));
    }

    #[test]
    fn out_of_range_leaf_is_corrupt() {
        let mut forest = train_simple_model();
        let fitted = forest.fitted.as_mut().unwrap();
        let tree = fitted.members[0].tree.fitted.as_mut().unwrap();
        let last = tree.nodes.len() - 1;
        if let Node::Leaf { prediction, .. } = &mut tree.nodes[last] {
            *prediction = 7;
        }
        let bytes = forest.to_bytes().unwrap();
        let err = RandomForest::from_bytes(&bytes).unwrap_err();
        assert!(matches!(err, RfError::CorruptModel { .. }));
    }
}
