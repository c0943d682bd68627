//! Configuration management for training and serving

use crate::error::TrainingError;
use crate::models::forest::ForestParams;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// Default configuration file location
pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub artifacts: ArtifactsConfig,
    pub training: TrainingConfig,
    pub reporting: ReportingConfig,
    pub logging: LoggingConfig,
}

/// HTTP listener configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
        }
    }
}

/// Locations of the persisted training artifacts
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ArtifactsConfig {
    /// Directory holding all artifacts
    pub models_dir: String,
    /// Serialized predictor
    pub model_file: String,
    /// Ordered feature names
    pub schema_file: String,
    /// Evaluation metrics
    pub metrics_file: String,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            models_dir: "models".to_string(),
            model_file: "model.json".to_string(),
            schema_file: "feature_names.json".to_string(),
            metrics_file: "metrics.json".to_string(),
        }
    }
}

/// Training run configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Labeled CSV dataset
    pub data_path: String,
    /// Fraction of rows held out for evaluation
    pub test_fraction: f64,
    /// Seed for the split and for forest fitting
    pub random_seed: u64,
    /// Number of trees
    pub ensemble_size: usize,
    /// Per-tree depth cap
    pub max_depth: usize,
    /// Minimum node size eligible for splitting
    pub min_samples_split: usize,
    /// Threads used to grow trees (0 = all cores)
    pub workers: usize,
    /// Date days-since-due is measured against; today when unset
    pub reference_date: Option<NaiveDate>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        let forest = ForestParams::default();
        Self {
            data_path: "data/deudas.csv".to_string(),
            test_fraction: 0.2,
            random_seed: forest.random_seed,
            ensemble_size: forest.ensemble_size,
            max_depth: forest.max_depth,
            min_samples_split: forest.min_samples_split,
            workers: 0,
            reference_date: None,
        }
    }
}

impl TrainingConfig {
    /// Reject settings no training run can use
    pub fn validate(&self) -> Result<(), TrainingError> {
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(TrainingError::InvalidConfig(format!(
                "test_fraction must be in (0, 1), got {}",
                self.test_fraction
            )));
        }
        self.forest_params().validate()
    }

    /// Forest hyperparameters from this configuration
    pub fn forest_params(&self) -> ForestParams {
        ForestParams {
            ensemble_size: self.ensemble_size,
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            random_seed: self.random_seed,
        }
    }
}

/// Periodic service statistics reporting
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReportingConfig {
    /// Seconds between summaries (0 disables the reporter)
    pub interval_secs: u64,
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self { interval_secs: 60 }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default file
    pub fn load() -> Result<Self> {
        Self::load_from_path(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific path, with `DELINQUENCY__SECTION__KEY`
    /// environment variables taking precedence over the file.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(
                Environment::with_prefix("DELINQUENCY")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Load from `path` when given, otherwise from the default location
    pub fn load_optional(path: Option<&str>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_path(path),
            None => Self::load(),
        }
    }
}
