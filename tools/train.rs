//! Offline Training Job
//!
//! Fits the delinquency classifier on the configured CSV and writes the model,
//! feature schema and evaluation metrics to the artifacts directory.
//!
//! Usage: train [config]

use anyhow::{Context, Result};
use delinquency_risk::{
    config::AppConfig, logging, ArtifactStore, FeatureExtractor, TrainingPipeline,
};
use tracing::info;

fn main() -> Result<()> {
    let config_path = std::env::args().nth(1);
    let config = AppConfig::load_optional(config_path.as_deref())?;

    logging::init(&config.logging, "warn,train=info")?;
    let extractor = FeatureExtractor::new();
    info!(
        features = extractor.feature_count(),
        names = ?extractor.feature_names(),
        "Starting training run"
    );

    let store = ArtifactStore::from_config(&config.artifacts);
    let pipeline =
        TrainingPipeline::new(config.training.clone()).context("Invalid training configuration")?;

    let outcome = pipeline
        .run(&store)
        .with_context(|| format!("Training on {} failed", config.training.data_path))?;

    outcome.metrics.log_report();
    info!(
        model = %store.model_path().display(),
        schema = %store.schema_path().display(),
        metrics = %store.metrics_path().display(),
        "Artifacts written"
    );

    Ok(())
}
