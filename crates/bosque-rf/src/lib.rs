//! Random Forest classification: fit, predict, evaluate, persist.
//!
//! A from-scratch CART learner driven by Gini impurity with exhaustive
//! distinct-value thresholds, bagged into a forest with per-tree bootstrap
//! rows and feature subsets. Trees are fitted and rows are predicted in
//! parallel via rayon; seeded draws happen up front so results are
//! reproducible. Fitted forests persist as a versioned bincode payload.
//!
//! ```no_run
//! use bosque_rf::RandomForestConfig;
//!
//! # fn main() -> Result<(), bosque_rf::RfError> {
//! let features = vec![vec![1.0, 0.0], vec![2.0, 1.0], vec![8.0, 0.0], vec![9.0, 1.0]];
//! let labels = vec![0, 0, 1, 1];
//! let forest = RandomForestConfig::new(10)?
//!     .with_seed(Some(7))
//!     .with_sample_ratio(1.0)
//!     .with_feat_ratio(1.0)
//!     .fit(&features, &labels)?;
//! let predicted = forest.predict(&[vec![1.5, 0.0], vec![8.5, 1.0]])?;
//! # let _ = predicted;
//! # Ok(())
//! # }
//! ```

mod config;
mod confusion;
mod error;
mod forest;
mod node;
mod predict;
mod serialize;
mod split;
mod tree;
mod validate;
mod vote;

pub use config::RandomForestConfig;
pub use confusion::{ClassMetrics, ConfusionMatrix};
pub use error::{ErrorKind, RfError};
pub use forest::{ForestMember, RandomForest};
pub use node::{FeatureIndex, Impurity, Node, NodeIndex};
pub use predict::VoteTally;
pub use serialize::FORMAT_VERSION;
pub use split::gini;
pub use tree::{DecisionTree, DecisionTreeConfig};
pub use vote::{class_counts, plurality};
