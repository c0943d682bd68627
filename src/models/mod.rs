//! Trained predictor, its persisted artifacts, and the prediction service

pub mod forest;
pub mod inference;
pub mod loader;
pub mod schema;

pub use forest::{ForestParams, RandomForest};
pub use inference::PredictionService;
pub use loader::ArtifactStore;
pub use schema::FeatureSchema;

use crate::error::PredictorError;

/// A fitted classifier over fixed-length numeric feature rows.
pub trait Predictor: Send + Sync {
    /// Number of features each row must carry
    fn n_features(&self) -> usize;

    /// Class labels, in the order of [`Predictor::predict_proba`] entries
    fn classes(&self) -> &[u8];

    /// Probability of each class in [`Predictor::classes`]
    fn predict_proba(&self, features: &[f64]) -> Result<Vec<f64>, PredictorError>;

    /// Most probable class label plus the full distribution. Ties go to the
    /// lowest class label.
    fn predict(&self, features: &[f64]) -> Result<(u8, Vec<f64>), PredictorError> {
        let proba = self.predict_proba(features)?;

        let mut best: Option<usize> = None;
        for (i, p) in proba.iter().enumerate() {
            if best.map_or(true, |b| *p > proba[b]) {
                best = Some(i);
            }
        }

        let label = best
            .and_then(|i| self.classes().get(i).copied())
            .ok_or(PredictorError::EmptyDistribution)?;
        Ok((label, proba))
    }
}
