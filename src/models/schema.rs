//! Ordered feature schema persisted next to the trained model

use crate::error::ArtifactError;
use crate::feature_extractor::FEATURE_NAMES;
use serde::{Deserialize, Serialize};

/// Feature names in the exact column order the predictor was fit on.
///
/// Serialized as a plain JSON array of strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureSchema(Vec<String>);

impl FeatureSchema {
    pub fn new(names: Vec<String>) -> Self {
        Self(names)
    }

    /// Schema of the features this build derives
    pub fn current() -> Self {
        Self(FEATURE_NAMES.iter().map(|n| n.to_string()).collect())
    }

    pub fn names(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Require this schema to equal the one the code derives, name for name
    /// and position for position.
    pub fn ensure_current(&self) -> Result<(), ArtifactError> {
        let expected = Self::current();
        if *self != expected {
            return Err(ArtifactError::SchemaMismatch {
                expected: expected.0,
                found: self.0.clone(),
            });
        }
        Ok(())
    }
}
