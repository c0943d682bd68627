//! Held-out evaluation and the persisted metrics record

use crate::types::category::{RiskCategory, CATEGORY_COUNT};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

/// Precision / recall / F1 for one category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassReport {
    pub category: RiskCategory,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    /// Number of held-out examples of this category
    pub support: usize,
}

/// Scores of a predictor on held-out data
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub accuracy: f64,
    pub per_class: Vec<ClassReport>,
    /// `confusion[actual][predicted]`, indexed by category code
    pub confusion: [[usize; CATEGORY_COUNT]; CATEGORY_COUNT],
}

impl Evaluation {
    /// Compare predictions against true categories.
    ///
    /// Per-class rows cover every category that appears on either side.
    /// Both slices must have the same, non-zero length.
    pub fn compute(actual: &[RiskCategory], predicted: &[RiskCategory]) -> Self {
        debug_assert_eq!(actual.len(), predicted.len());

        let mut confusion = [[0usize; CATEGORY_COUNT]; CATEGORY_COUNT];
        for (a, p) in actual.iter().zip(predicted) {
            confusion[a.index()][p.index()] += 1;
        }

        let correct: usize = (0..CATEGORY_COUNT).map(|i| confusion[i][i]).sum();
        let accuracy = if actual.is_empty() {
            0.0
        } else {
            correct as f64 / actual.len() as f64
        };

        let per_class = RiskCategory::ALL
            .into_iter()
            .filter_map(|category| {
                let i = category.index();
                let tp = confusion[i][i];
                let support: usize = confusion[i].iter().sum();
                let predicted_as: usize = confusion.iter().map(|row| row[i]).sum();
                if support == 0 && predicted_as == 0 {
                    return None;
                }

                let precision = ratio(tp, predicted_as);
                let recall = ratio(tp, support);
                let f1 = if precision + recall > 0.0 {
                    2.0 * precision * recall / (precision + recall)
                } else {
                    0.0
                };

                Some(ClassReport {
                    category,
                    precision,
                    recall,
                    f1,
                    support,
                })
            })
            .collect();

        Self {
            accuracy,
            per_class,
            confusion,
        }
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

/// Outcome of one training run, persisted as `metrics.json`.
///
/// Written once per run and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    /// Accuracy on the held-out split, in [0, 1]
    pub accuracy: f64,
    #[serde(alias = "n_estimators")]
    pub ensemble_size: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub random_seed: u64,
    pub test_fraction: f64,
    pub train_size: usize,
    pub test_size: usize,
    /// Input rows skipped while building the dataset
    pub rejected_rows: usize,
    pub per_class: Vec<ClassReport>,
    pub confusion_matrix: [[usize; CATEGORY_COUNT]; CATEGORY_COUNT],
    /// Identifier of the model artifact these metrics describe
    pub model_id: Uuid,
    pub trained_at: DateTime<Utc>,
}

impl EvaluationMetrics {
    /// Log the classification report and confusion matrix
    pub fn log_report(&self) {
        info!(
            model_id = %self.model_id,
            accuracy = format!("{:.4}", self.accuracy),
            train_size = self.train_size,
            test_size = self.test_size,
            ensemble_size = self.ensemble_size,
            max_depth = self.max_depth,
            "Evaluation on held-out split"
        );
        info!("{:<10} {:>9} {:>9} {:>9} {:>9}", "category", "precision", "recall", "f1", "support");
        for row in &self.per_class {
            info!(
                "{:<10} {:>9.3} {:>9.3} {:>9.3} {:>9}",
                row.category.short_name(),
                row.precision,
                row.recall,
                row.f1,
                row.support
            );
        }
        for (category, counts) in RiskCategory::ALL.iter().zip(&self.confusion_matrix) {
            info!("confusion {:<10} {:?}", category.short_name(), counts);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::category::RiskCategory::*;

    #[test]
    fn test_perfect_predictions() {
        let actual = [Current, MildDelinquency, CriticalDelinquency];
        let eval = Evaluation::compute(&actual, &actual);

        assert_eq!(eval.accuracy, 1.0);
        assert_eq!(eval.per_class.len(), 3);
        assert!(eval.per_class.iter().all(|r| r.f1 == 1.0));
    }

    #[test]
    fn test_report_values() {
        let actual = [Current, Current, MildDelinquency, MildDelinquency];
        let predicted = [Current, MildDelinquency, MildDelinquency, MildDelinquency];
        let eval = Evaluation::compute(&actual, &predicted);

        assert_eq!(eval.accuracy, 0.75);
        assert_eq!(eval.confusion[0], [1, 1, 0, 0]);
        assert_eq!(eval.confusion[1], [0, 2, 0, 0]);

        let current = &eval.per_class[0];
        assert_eq!(current.category, Current);
        assert_eq!(current.precision, 1.0);
        assert_eq!(current.recall, 0.5);
        assert_eq!(current.support, 2);

        let mild = &eval.per_class[1];
        assert!((mild.precision - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(mild.recall, 1.0);
        assert!((mild.f1 - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_category_only_predicted_still_reported() {
        let eval = Evaluation::compute(&[Current], &[SevereDelinquency]);
        assert_eq!(eval.accuracy, 0.0);
        let severe = eval
            .per_class
            .iter()
            .find(|r| r.category == SevereDelinquency)
            .unwrap();
        assert_eq!(severe.support, 0);
        assert_eq!(severe.precision, 0.0);
    }

    #[test]
    fn test_metrics_accept_legacy_estimator_key() {
        let json = serde_json::json!({
            "accuracy": 0.9,
            "n_estimators": 100,
            "max_depth": 10,
            "min_samples_split": 2,
            "random_seed": 42,
            "test_fraction": 0.2,
            "train_size": 80,
            "test_size": 20,
            "rejected_rows": 0,
            "per_class": [],
            "confusion_matrix": [[0,0,0,0],[0,0,0,0],[0,0,0,0],[0,0,0,0]],
            "model_id": "67e55044-10b1-426f-9247-bb680e5fe0c8",
            "trained_at": "2024-06-30T00:00:00Z"
        });
        let metrics: EvaluationMetrics = serde_json::from_value(json).unwrap();
        assert_eq!(metrics.ensemble_size, 100);
    }
}
