//! Ordinal delinquency categories

use crate::error::UnknownCategory;
use serde::{Deserialize, Serialize};

/// Number of delinquency categories
pub const CATEGORY_COUNT: usize = 4;

/// Delinquency risk category, ordered by severity.
///
/// Serialized as its integer code (0..=3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum RiskCategory {
    Current,
    MildDelinquency,
    SevereDelinquency,
    CriticalDelinquency,
}

impl RiskCategory {
    /// All categories in ordinal order
    pub const ALL: [RiskCategory; CATEGORY_COUNT] = [
        RiskCategory::Current,
        RiskCategory::MildDelinquency,
        RiskCategory::SevereDelinquency,
        RiskCategory::CriticalDelinquency,
    ];

    /// Label an account from how many months it is overdue.
    ///
    /// Buckets 0, 1 and 2 are single values; everything from 3 months on is
    /// critical with no further distinction.
    pub fn from_months_overdue(months: u32) -> Self {
        match months {
            0 => RiskCategory::Current,
            1 => RiskCategory::MildDelinquency,
            2 => RiskCategory::SevereDelinquency,
            _ => RiskCategory::CriticalDelinquency,
        }
    }

    /// Integer code used for training labels and on the wire
    pub fn code(self) -> u8 {
        match self {
            RiskCategory::Current => 0,
            RiskCategory::MildDelinquency => 1,
            RiskCategory::SevereDelinquency => 2,
            RiskCategory::CriticalDelinquency => 3,
        }
    }

    /// Position in [`RiskCategory::ALL`]
    pub fn index(self) -> usize {
        self.code() as usize
    }

    /// Human-readable description
    pub fn description(self) -> &'static str {
        match self {
            RiskCategory::Current => "Current",
            RiskCategory::MildDelinquency => "Mild delinquency",
            RiskCategory::SevereDelinquency => "Severe delinquency",
            RiskCategory::CriticalDelinquency => "Critical delinquency",
        }
    }

    /// Short label used in reports and log fields
    pub fn short_name(self) -> &'static str {
        match self {
            RiskCategory::Current => "current",
            RiskCategory::MildDelinquency => "mild",
            RiskCategory::SevereDelinquency => "severe",
            RiskCategory::CriticalDelinquency => "critical",
        }
    }
}

impl TryFrom<u8> for RiskCategory {
    type Error = UnknownCategory;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Self::try_from(code as i64)
    }
}

impl TryFrom<i64> for RiskCategory {
    type Error = UnknownCategory;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(RiskCategory::Current),
            1 => Ok(RiskCategory::MildDelinquency),
            2 => Ok(RiskCategory::SevereDelinquency),
            3 => Ok(RiskCategory::CriticalDelinquency),
            other => Err(UnknownCategory(other)),
        }
    }
}

impl From<RiskCategory> for u8 {
    fn from(category: RiskCategory) -> Self {
        category.code()
    }
}

impl std::fmt::Display for RiskCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.description())
    }
}
