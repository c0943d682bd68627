//! Debtor account records as they arrive from the collections ledger

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One debtor account, as read from the training CSV.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountRecord {
    /// Amount originally lent (must be positive)
    #[serde(rename = "monto_original", alias = "original_amount")]
    pub original_amount: f64,

    /// Amount still outstanding. May exceed the original amount when
    /// penalty interest has accrued.
    #[serde(rename = "monto_actual", alias = "current_amount")]
    pub current_amount: f64,

    /// Payment due date
    #[serde(rename = "fecha_vencimiento", alias = "due_date")]
    pub due_date: NaiveDate,

    /// Whole months the payment is overdue
    #[serde(rename = "meses_mora", alias = "months_overdue")]
    pub months_overdue: u32,
}

impl AccountRecord {
    /// Create a new account record
    pub fn new(
        original_amount: f64,
        current_amount: f64,
        due_date: NaiveDate,
        months_overdue: u32,
    ) -> Self {
        Self {
            original_amount,
            current_amount,
            due_date,
            months_overdue,
        }
    }

    /// Check the amount bounds a record must satisfy before it can be used.
    ///
    /// Returns a human-readable reason for the first violated bound.
    pub fn check_bounds(&self) -> Result<(), String> {
        if !self.original_amount.is_finite() || self.original_amount <= 0.0 {
            return Err(format!(
                "original amount must be positive, got {}",
                self.original_amount
            ));
        }
        if !self.current_amount.is_finite() || self.current_amount < 0.0 {
            return Err(format!(
                "current amount must be non-negative, got {}",
                self.current_amount
            ));
        }
        Ok(())
    }

    /// Whether any payment is overdue at all
    pub fn is_delinquent(&self) -> bool {
        self.months_overdue > 0
    }
}
