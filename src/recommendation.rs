//! Collection actions recommended for each delinquency category.
//!
//! Raw integer codes must go through `RiskCategory::try_from` first, which
//! rejects anything outside `0..=3`; there is no fallback action.

use crate::types::category::RiskCategory;

/// Recommended collection action for a category
pub fn recommend(category: RiskCategory) -> &'static str {
    match category {
        RiskCategory::Current => "Account is current. Keep routine monitoring.",
        RiskCategory::MildDelinquency => "Mild delinquency detected. Send a payment reminder.",
        RiskCategory::SevereDelinquency => "Severe delinquency. Contact the customer urgently.",
        RiskCategory::CriticalDelinquency => {
            "Critical delinquency. Start the collection process immediately."
        }
    }
}
