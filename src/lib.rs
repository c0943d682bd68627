//! Debt delinquency risk classifier
//!
//! Trains a random forest on historical debtor accounts and serves
//! delinquency-category predictions, with per-category probabilities and a
//! collection recommendation, over HTTP.

pub mod api;
pub mod config;
pub mod context;
pub mod error;
pub mod feature_extractor;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod recommendation;
pub mod training;
pub mod types;

pub use config::AppConfig;
pub use context::ServiceContext;
pub use feature_extractor::FeatureExtractor;
pub use models::{ArtifactStore, PredictionService, RandomForest};
pub use training::TrainingPipeline;
pub use types::{AccountRecord, PredictionResponse, RiskCategory};
