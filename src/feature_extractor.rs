//! Feature derivation for delinquency model training and inference.
//!
//! Training and serving both go through this module, so the feature vector a
//! request produces is laid out exactly like the rows the forest was fit on.

use crate::error::FeatureError;
use crate::types::account::AccountRecord;
use chrono::{DateTime, NaiveDate, Utc};

/// Number of features produced
pub const FEATURE_COUNT: usize = 5;

/// Feature names in model column order
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "monto_original",
    "monto_actual",
    "ratio_deuda",
    "dias_desde_vencimiento",
    "meses_mora",
];

/// Column positions in [`FEATURE_NAMES`]
pub const ORIGINAL_AMOUNT: usize = 0;
pub const CURRENT_AMOUNT: usize = 1;
pub const DEBT_RATIO: usize = 2;
pub const DAYS_SINCE_DUE: usize = 3;
pub const MONTHS_OVERDUE: usize = 4;

/// Ordered feature values for one account
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector {
    values: [f64; FEATURE_COUNT],
}

impl FeatureVector {
    /// Wrap values already laid out in [`FEATURE_NAMES`] order
    pub fn from_values(values: [f64; FEATURE_COUNT]) -> Self {
        Self { values }
    }

    /// Values in column order
    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    /// Value of a named feature
    pub fn get(&self, name: &str) -> Option<f64> {
        FEATURE_NAMES
            .iter()
            .position(|n| *n == name)
            .map(|i| self.values[i])
    }

    /// (name, value) pairs in column order
    pub fn named(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        FEATURE_NAMES.iter().copied().zip(self.values.iter().copied())
    }
}

impl AsRef<[f64]> for FeatureVector {
    fn as_ref(&self) -> &[f64] {
        &self.values
    }
}

/// Turns account records into model input features.
///
/// Stateless; the reference time is always passed in so derivation stays
/// reproducible.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureExtractor;

impl FeatureExtractor {
    /// Create a new feature extractor.
    pub fn new() -> Self {
        Self
    }

    /// Extract features from an account record relative to `now`.
    pub fn extract(
        &self,
        record: &AccountRecord,
        now: DateTime<Utc>,
    ) -> Result<FeatureVector, FeatureError> {
        let mut values = [0.0; FEATURE_COUNT];

        values[ORIGINAL_AMOUNT] = record.original_amount;
        values[CURRENT_AMOUNT] = record.current_amount;
        values[DEBT_RATIO] = Self::debt_ratio(record.original_amount, record.current_amount)?;
        values[DAYS_SINCE_DUE] = Self::days_since_due(record.due_date, now) as f64;
        values[MONTHS_OVERDUE] = record.months_overdue as f64;

        Ok(FeatureVector::from_values(values))
    }

    /// Outstanding over original amount. Not clamped: values above 1 mean
    /// accrued penalty interest.
    pub fn debt_ratio(original_amount: f64, current_amount: f64) -> Result<f64, FeatureError> {
        if original_amount == 0.0 {
            return Err(FeatureError::DivisionByZero);
        }
        let ratio = current_amount / original_amount;
        if !ratio.is_finite() {
            return Err(FeatureError::RatioOverflow {
                original: original_amount,
                current: current_amount,
            });
        }
        Ok(ratio)
    }

    /// Whole days from the due date (midnight UTC) to `now`, rounded down.
    ///
    /// Negative for accounts that are not due yet.
    pub fn days_since_due(due_date: NaiveDate, now: DateTime<Utc>) -> i64 {
        let due = due_date.and_time(chrono::NaiveTime::MIN).and_utc();
        (now - due).num_seconds().div_euclid(86_400)
    }

    /// Get feature names in schema order.
    pub fn feature_names(&self) -> &'static [&'static str; FEATURE_COUNT] {
        &FEATURE_NAMES
    }

    /// Get the number of features produced.
    pub fn feature_count(&self) -> usize {
        FEATURE_COUNT
    }
}
