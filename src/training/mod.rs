//! Offline training of the delinquency classifier

pub mod dataset;
pub mod evaluation;
pub mod pipeline;

pub use dataset::{Dataset, LabeledExample};
pub use evaluation::{ClassReport, Evaluation, EvaluationMetrics};
pub use pipeline::{TrainingOutcome, TrainingPipeline};
