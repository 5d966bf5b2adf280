//! Prediction methods for the Random Forest ensemble.

use rayon::iter::{IntoParallelIterator, ParallelIterator};

use crate::error::RfError;
use crate::forest::{FittedForest, RandomForest};
use crate::vote::plurality;

/// Per-class vote counts from every tree for one sample.
///
/// This is an opt-in diagnostic; [`RandomForest::predict`] only reports the
/// winning class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteTally {
    counts: Vec<usize>,
}

impl VoteTally {
    /// Return the plurality class, ties going to the lowest class code.
    #[must_use]
    pub fn predicted_class(&self) -> usize {
        plurality(&self.counts)
    }

    /// Return the number of votes per class, indexed by class code.
    #[must_use]
    pub fn counts(&self) -> &[usize] {
        &self.counts
    }

    /// Return the total number of votes cast.
    #[must_use]
    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    /// Return each class's fraction of the votes.
    #[must_use]
    pub fn shares(&self) -> Vec<f64> {
        let total = self.total();
        if total == 0 {
            return vec![0.0; self.counts.len()];
        }
        self.counts
            .iter()
            .map(|&c| c as f64 / total as f64)
            .collect()
    }
}

impl FittedForest {
    fn tally(&self, sample: &[f64]) -> Result<VoteTally, RfError> {
        if sample.len() != self.n_features {
            return Err(RfError::PredictionFeatureMismatch {
                expected: self.n_features,
                got: sample.len(),
            });
        }
        let mut counts = vec![0usize; self.n_classes];
        for member in &self.members {
            let vote = member.predict_full_row(sample)?;
            counts[vote] += 1;
        }
        Ok(VoteTally { counts })
    }
}

impl RandomForest {
    /// Predict the class of every row in parallel, preserving order.
    ///
    /// # Errors
    ///
    /// Returns [`RfError::NotFitted`] before fitting and
    /// [`RfError::PredictionFeatureMismatch`] if any row has the wrong width.
    pub fn predict(&self, features: &[Vec<f64>]) -> Result<Vec<usize>, RfError> {
        let fitted = self.fitted()?;
        features
            .into_par_iter()
            .map(|sample| fitted.tally(sample).map(|tally| tally.predicted_class()))
            .collect()
    }

    /// Predict the class of a single full-width row by plurality vote.
    ///
    /// # Errors
    ///
    /// Returns [`RfError::NotFitted`] before fitting and
    /// [`RfError::PredictionFeatureMismatch`] when `sample.len() != n_features`.
    pub fn predict_row(&self, sample: &[f64]) -> Result<usize, RfError> {
        Ok(self.vote_tally(sample)?.predicted_class())
    }

    /// Return every tree's vote for a single full-width row.
    ///
    /// # Errors
    ///
    /// Same as [`predict_row`](Self::predict_row).
    pub fn vote_tally(&self, sample: &[f64]) -> Result<VoteTally, RfError> {
        self.fitted()?.tally(sample)
    }
}
