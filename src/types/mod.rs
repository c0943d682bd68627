//! Type definitions for the delinquency classifier

pub mod account;
pub mod category;
pub mod response;

pub use account::AccountRecord;
pub use category::RiskCategory;
pub use response::PredictionResponse;
