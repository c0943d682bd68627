//! Immutable serving state loaded once at startup

use crate::config::ArtifactsConfig;
use crate::error::ArtifactError;
use crate::models::loader::ArtifactStore;
use crate::models::PredictionService;
use crate::training::evaluation::EvaluationMetrics;
use std::sync::Arc;
use tracing::{info, warn};

/// Predictor, schema and metrics for the lifetime of the process.
///
/// A missing model or schema leaves the context unloaded; anything present but
/// unusable is an error.
#[derive(Debug, Clone, Default)]
pub struct ServiceContext {
    service: Option<Arc<PredictionService>>,
    metrics: Option<EvaluationMetrics>,
}

impl ServiceContext {
    pub fn new(service: Option<PredictionService>, metrics: Option<EvaluationMetrics>) -> Self {
        Self {
            service: service.map(Arc::new),
            metrics,
        }
    }

    pub fn load(config: &ArtifactsConfig) -> Result<Self, ArtifactError> {
        Self::from_store(&ArtifactStore::from_config(config))
    }

    pub fn from_store(store: &ArtifactStore) -> Result<Self, ArtifactError> {
        let predictor = store.load_predictor()?;
        let schema = store.load_schema()?;

        let service = match (predictor, schema) {
            (Some(predictor), Some(schema)) => {
                Some(PredictionService::new(Arc::new(predictor), schema)?)
            }
            (predictor, schema) => {
                warn!(
                    model_present = predictor.is_some(),
                    schema_present = schema.is_some(),
                    model_path = %store.model_path().display(),
                    "No trained model available; predictions disabled until retrained"
                );
                None
            }
        };

        let metrics = store.load_metrics()?;
        match &metrics {
            Some(m) => info!(model_id = %m.model_id, accuracy = m.accuracy, "Evaluation metrics loaded"),
            None => info!("No evaluation metrics found"),
        }

        Ok(Self::new(service, metrics))
    }

    pub fn service(&self) -> Option<&Arc<PredictionService>> {
        self.service.as_ref()
    }

    pub fn metrics(&self) -> Option<&EvaluationMetrics> {
        self.metrics.as_ref()
    }

    pub fn model_loaded(&self) -> bool {
        self.service.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::forest::{ForestParams, RandomForest};
    use crate::models::schema::FeatureSchema;
    use tempfile::tempdir;

    fn forest(n_features: usize) -> RandomForest {
        let x: Vec<Vec<f64>> = (0..8)
            .map(|i| (0..n_features).map(|j| (i * (j + 1)) as f64).collect())
            .collect();
        let y: Vec<u8> = (0..8).map(|i| if i < 4 { 0 } else { 1 }).collect();
        let params = ForestParams {
            ensemble_size: 3,
            ..ForestParams::default()
        };
        RandomForest::fit(&x, &y, &params, 1).unwrap()
    }

    #[test]
    fn test_empty_directory_starts_unloaded() {
        let dir = tempdir().unwrap();
        let context = ServiceContext::from_store(&ArtifactStore::new(dir.path())).unwrap();
        assert!(!context.model_loaded());
        assert!(context.metrics().is_none());
    }

    #[test]
    fn test_model_without_schema_starts_unloaded() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        store.save_predictor(&forest(5)).unwrap();

        let context = ServiceContext::from_store(&store).unwrap();
        assert!(!context.model_loaded());
    }

    #[test]
    fn test_complete_artifacts_load() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        store.save_predictor(&forest(5)).unwrap();
        store.save_schema(&FeatureSchema::current()).unwrap();

        let context = ServiceContext::from_store(&store).unwrap();
        assert!(context.model_loaded());
        assert_eq!(context.service().unwrap().schema(), &FeatureSchema::current());
    }

    #[test]
    fn test_foreign_schema_is_fatal() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        store.save_predictor(&forest(5)).unwrap();
        store
            .save_schema(&FeatureSchema::new(vec!["a".into(), "b".into()]))
            .unwrap();

        assert!(matches!(
            ServiceContext::from_store(&store),
            Err(ArtifactError::SchemaMismatch { .. })
        ));
    }

    #[test]
    fn test_predictor_shape_mismatch_is_fatal() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        store.save_predictor(&forest(3)).unwrap();
        store.save_schema(&FeatureSchema::current()).unwrap();

        assert!(matches!(
            ServiceContext::from_store(&store),
            Err(ArtifactError::PredictorShape { .. })
        ));
    }

    #[test]
    fn test_corrupt_model_is_fatal() {
        let dir = tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        std::fs::write(store.model_path(), "{\"trees\": 12}").unwrap();
        store.save_schema(&FeatureSchema::current()).unwrap();

        assert!(ServiceContext::from_store(&store).is_err());
    }
}
