//! Prediction response returned to callers

use crate::recommendation::recommend;
use crate::types::category::RiskCategory;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::collections::BTreeMap;

/// Allowed drift of the probability sum away from 1.0
pub const PROBABILITY_TOLERANCE: f64 = 1e-6;

/// Classification of one account, with the full distribution behind it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResponse {
    /// Predicted category (serialized as its integer code)
    #[serde(rename = "predicted_category")]
    pub category: RiskCategory,

    /// Description of the predicted category
    pub description: &'static str,

    /// Probability per category the predictor knows about, keyed by
    /// description on the wire
    #[serde(serialize_with = "serialize_by_description")]
    pub probabilities: BTreeMap<RiskCategory, f64>,

    /// Recommended collection action
    pub recommendation: &'static str,
}

impl PredictionResponse {
    /// Build a response for a category and its distribution
    pub fn new(category: RiskCategory, probabilities: BTreeMap<RiskCategory, f64>) -> Self {
        Self {
            category,
            description: category.description(),
            probabilities,
            recommendation: recommend(category),
        }
    }

    /// Probability assigned to the predicted category
    pub fn confidence(&self) -> Option<f64> {
        self.probabilities.get(&self.category).copied()
    }

    /// Check that the response agrees with its own distribution: the
    /// probabilities sum to one and the predicted category holds the maximum.
    pub fn check_consistency(&self) -> Result<(), String> {
        if self.probabilities.values().any(|p| !p.is_finite() || *p < 0.0) {
            return Err(format!("invalid probability in {:?}", self.probabilities));
        }

        let total: f64 = self.probabilities.values().sum();
        if (total - 1.0).abs() > PROBABILITY_TOLERANCE {
            return Err(format!("probabilities sum to {total}, not 1"));
        }

        let predicted = self
            .confidence()
            .ok_or_else(|| format!("no probability for predicted category {}", self.category))?;
        let max = self
            .probabilities
            .values()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max);
        if predicted < max {
            return Err(format!(
                "predicted category {} has probability {predicted} below maximum {max}",
                self.category
            ));
        }

        Ok(())
    }
}

fn serialize_by_description<S>(
    probabilities: &BTreeMap<RiskCategory, f64>,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let mut map = serializer.serialize_map(Some(probabilities.len()))?;
    for (category, probability) in probabilities {
        map.serialize_entry(category.description(), probability)?;
    }
    map.end()
}
