//! Persistence of training artifacts.
//!
//! Predictor, feature schema and evaluation metrics are each written to their
//! own JSON file and can be loaded independently.

use crate::config::ArtifactsConfig;
use crate::error::ArtifactError;
use crate::models::forest::RandomForest;
use crate::models::schema::FeatureSchema;
use crate::training::evaluation::EvaluationMetrics;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Reads and writes the three training artifacts in a models directory
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    model_path: PathBuf,
    schema_path: PathBuf,
    metrics_path: PathBuf,
}

impl ArtifactStore {
    /// Store with the default file names inside `models_dir`
    pub fn new<P: AsRef<Path>>(models_dir: P) -> Self {
        Self::from_config(&ArtifactsConfig {
            models_dir: models_dir.as_ref().to_string_lossy().into_owned(),
            ..ArtifactsConfig::default()
        })
    }

    pub fn from_config(config: &ArtifactsConfig) -> Self {
        let dir = Path::new(&config.models_dir);
        Self {
            model_path: dir.join(&config.model_file),
            schema_path: dir.join(&config.schema_file),
            metrics_path: dir.join(&config.metrics_file),
        }
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    pub fn schema_path(&self) -> &Path {
        &self.schema_path
    }

    pub fn metrics_path(&self) -> &Path {
        &self.metrics_path
    }

    pub fn save_predictor(&self, forest: &RandomForest) -> Result<(), ArtifactError> {
        write_json(&self.model_path, forest, false)?;
        info!(path = %self.model_path.display(), trees = forest.n_trees(), "Predictor saved");
        Ok(())
    }

    /// Load the predictor; `None` if no model has been saved yet
    pub fn load_predictor(&self) -> Result<Option<RandomForest>, ArtifactError> {
        let Some(forest) = read_json::<RandomForest>(&self.model_path)? else {
            return Ok(None);
        };

        forest.validate().map_err(|reason| ArtifactError::Corrupt {
            path: self.model_path.clone(),
            reason,
        })?;

        info!(path = %self.model_path.display(), trees = forest.n_trees(), "Predictor loaded");
        Ok(Some(forest))
    }

    pub fn save_schema(&self, schema: &FeatureSchema) -> Result<(), ArtifactError> {
        write_json(&self.schema_path, schema, false)?;
        info!(path = %self.schema_path.display(), features = schema.len(), "Feature schema saved");
        Ok(())
    }

    pub fn load_schema(&self) -> Result<Option<FeatureSchema>, ArtifactError> {
        read_json(&self.schema_path)
    }

    pub fn save_metrics(&self, metrics: &EvaluationMetrics) -> Result<(), ArtifactError> {
        write_json(&self.metrics_path, metrics, true)?;
        info!(path = %self.metrics_path.display(), accuracy = metrics.accuracy, "Metrics saved");
        Ok(())
    }

    /// Load evaluation metrics; `None` until a training run has completed
    pub fn load_metrics(&self) -> Result<Option<EvaluationMetrics>, ArtifactError> {
        read_json(&self.metrics_path)
    }
}

/// Write through a temporary sibling so readers never see a partial file
fn write_json<T: Serialize>(path: &Path, value: &T, pretty: bool) -> Result<(), ArtifactError> {
    let io_err = |source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    };
    let json_err = |source| ArtifactError::Json {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }

    let encoded = if pretty {
        serde_json::to_vec_pretty(value)
    } else {
        serde_json::to_vec(value)
    };
    let bytes = encoded.map_err(json_err)?;

    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, bytes).map_err(io_err)?;
    fs::rename(&tmp, path).map_err(io_err)?;

    debug!(path = %path.display(), "Artifact written");
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, ArtifactError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "Artifact not found");
            return Ok(None);
        }
        Err(source) => {
            return Err(ArtifactError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|source| ArtifactError::Json {
            path: path.to_path_buf(),
            source,
        })
}
