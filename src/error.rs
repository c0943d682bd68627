//! Error types shared by training and serving.

use std::path::PathBuf;
use thiserror::Error;

/// Feature derivation failure.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FeatureError {
    /// `debt_ratio` is undefined when the original amount is zero
    #[error("cannot derive debt ratio: original amount is zero")]
    DivisionByZero,
    /// The quotient left the `f64` range
    #[error("debt ratio {current} / {original} is not finite")]
    RatioOverflow { original: f64, current: f64 },
}

/// A raw category code outside `0..=3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("unknown risk category code {0} (expected 0..=3)")]
pub struct UnknownCategory(pub i64);

/// Client-caused input problems. Always recoverable by fixing the request.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("request body must be a JSON object")]
    NotAnObject,

    #[error("missing field(s): {}", .0.join(", "))]
    MissingFields(Vec<String>),

    #[error("invalid value for '{field}': {reason}")]
    InvalidField { field: String, reason: String },
}

/// Failure of a single prediction request.
#[derive(Debug, Error)]
pub enum PredictError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("no trained model is loaded")]
    ModelUnavailable,

    /// Carries full detail for logs; callers only ever see an opaque message.
    #[error("internal prediction failure: {0}")]
    Internal(String),
}

impl PredictError {
    /// True when the caller can fix the failure by changing the request.
    pub fn is_client_error(&self) -> bool {
        matches!(self, PredictError::Validation(_))
    }
}

/// Predictor misuse at inference time.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PredictorError {
    #[error("feature count mismatch: predictor expects {expected}, got {got}")]
    FeatureCountMismatch { expected: usize, got: usize },

    #[error("non-finite feature value at position {index}")]
    NonFiniteFeature { index: usize },

    #[error("predictor returned an empty distribution")]
    EmptyDistribution,
}

/// Problems reading the labeled dataset.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("failed to open dataset {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed dataset row: {0}")]
    Csv(#[from] csv::Error),
}

/// Failure of a training run. Fatal to that run only.
#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("invalid training configuration: {0}")]
    InvalidConfig(String),

    #[error("dataset has no usable rows")]
    EmptyDataset,

    #[error("dataset too small to split: {rows} rows with test fraction {test_fraction}")]
    TooFewRows { rows: usize, test_fraction: f64 },

    #[error("need at least 2 distinct classes to fit, found {found}")]
    InsufficientClasses { found: usize },

    #[error("evaluation failed: {0}")]
    Evaluation(String),

    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),
}

/// Persisted artifact read/write failures.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("artifact I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("artifact {path} is not valid JSON: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("artifact {path} is structurally invalid: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    /// Persisted schema disagrees with the features this build derives.
    #[error("feature schema mismatch: expected {expected:?}, found {found:?}")]
    SchemaMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("predictor expects {predictor} features but schema lists {schema}")]
    PredictorShape { predictor: usize, schema: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_message_lists_all() {
        let err = ValidationError::MissingFields(vec![
            "ratio_deuda".to_string(),
            "meses_mora".to_string(),
        ]);
        assert_eq!(err.to_string(), "missing field(s): ratio_deuda, meses_mora");
    }

    #[test]
    fn test_client_error_classification() {
        let validation: PredictError = ValidationError::NotAnObject.into();
        assert!(validation.is_client_error());
        assert!(!PredictError::Internal("boom".into()).is_client_error());
        assert!(!PredictError::ModelUnavailable.is_client_error());
    }
}
