//! Offline training: split, fit, evaluate, persist

use crate::config::TrainingConfig;
use crate::error::{ArtifactError, TrainingError};
use crate::models::forest::RandomForest;
use crate::models::loader::ArtifactStore;
use crate::models::schema::FeatureSchema;
use crate::models::Predictor;
use crate::training::dataset::Dataset;
use crate::training::evaluation::{Evaluation, EvaluationMetrics};
use crate::types::category::RiskCategory;
use chrono::{DateTime, NaiveTime, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::info;
use uuid::Uuid;

/// Everything one training run produces
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub forest: RandomForest,
    pub schema: FeatureSchema,
    pub metrics: EvaluationMetrics,
}

impl TrainingOutcome {
    /// Write predictor, schema and metrics to the store
    pub fn persist(&self, store: &ArtifactStore) -> Result<(), ArtifactError> {
        store.save_predictor(&self.forest)?;
        store.save_schema(&self.schema)?;
        store.save_metrics(&self.metrics)?;
        Ok(())
    }
}

/// Train/evaluation split sizes and row indices
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Fits the delinquency classifier from labeled accounts
#[derive(Debug, Clone)]
pub struct TrainingPipeline {
    config: TrainingConfig,
}

impl TrainingPipeline {
    pub fn new(config: TrainingConfig) -> Result<Self, TrainingError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Time days-since-due is measured against: the configured reference
    /// date at midnight UTC, or now
    pub fn reference_time(&self) -> DateTime<Utc> {
        match self.config.reference_date {
            Some(date) => date.and_time(NaiveTime::MIN).and_utc(),
            None => Utc::now(),
        }
    }

    /// Seeded shuffle of `0..rows`, holding out `ceil(rows * test_fraction)`
    pub fn split(&self, rows: usize) -> Result<Split, TrainingError> {
        let n_test = (rows as f64 * self.config.test_fraction).ceil() as usize;
        if n_test == 0 || n_test >= rows {
            return Err(TrainingError::TooFewRows {
                rows,
                test_fraction: self.config.test_fraction,
            });
        }

        let mut indices: Vec<usize> = (0..rows).collect();
        let mut rng = StdRng::seed_from_u64(self.config.random_seed);
        indices.shuffle(&mut rng);

        let train = indices.split_off(n_test);
        Ok(Split {
            train,
            test: indices,
        })
    }

    /// Fit and evaluate on an in-memory dataset
    pub fn fit(&self, dataset: &Dataset) -> Result<TrainingOutcome, TrainingError> {
        if dataset.is_empty() {
            return Err(TrainingError::EmptyDataset);
        }
        let found = dataset.distinct_classes();
        if found < 2 {
            return Err(TrainingError::InsufficientClasses { found });
        }

        let split = self.split(dataset.len())?;
        let examples = dataset.examples();

        let x_train: Vec<_> = split.train.iter().map(|&i| examples[i].features).collect();
        let y_train: Vec<u8> = split
            .train
            .iter()
            .map(|&i| examples[i].category.code())
            .collect();

        let params = self.config.forest_params();
        info!(
            train_size = x_train.len(),
            test_size = split.test.len(),
            ensemble_size = params.ensemble_size,
            max_depth = params.max_depth,
            random_seed = params.random_seed,
            "Fitting random forest"
        );
        let forest = RandomForest::fit(&x_train, &y_train, &params, self.config.workers)?;

        let mut actual = Vec::with_capacity(split.test.len());
        let mut predicted = Vec::with_capacity(split.test.len());
        for &i in &split.test {
            let (label, _) = forest
                .predict(examples[i].features.as_slice())
                .map_err(|e| TrainingError::Evaluation(e.to_string()))?;
            let category = RiskCategory::try_from(label)
                .map_err(|e| TrainingError::Evaluation(e.to_string()))?;
            actual.push(examples[i].category);
            predicted.push(category);
        }

        let evaluation = Evaluation::compute(&actual, &predicted);
        let metrics = EvaluationMetrics {
            accuracy: evaluation.accuracy,
            ensemble_size: params.ensemble_size,
            max_depth: params.max_depth,
            min_samples_split: params.min_samples_split,
            random_seed: params.random_seed,
            test_fraction: self.config.test_fraction,
            train_size: split.train.len(),
            test_size: split.test.len(),
            rejected_rows: dataset.rejected_rows(),
            per_class: evaluation.per_class,
            confusion_matrix: evaluation.confusion,
            model_id: Uuid::new_v4(),
            trained_at: Utc::now(),
        };

        info!(
            model_id = %metrics.model_id,
            accuracy = metrics.accuracy,
            "Training complete"
        );

        Ok(TrainingOutcome {
            forest,
            schema: FeatureSchema::current(),
            metrics,
        })
    }

    /// Load the configured CSV, fit, and persist all artifacts
    pub fn run(&self, store: &ArtifactStore) -> Result<TrainingOutcome, TrainingError> {
        let reference = self.reference_time();
        info!(
            data_path = %self.config.data_path,
            reference = %reference,
            "Loading training data"
        );

        let dataset = Dataset::from_csv(&self.config.data_path, reference)?;
        dataset.log_distribution();

        let outcome = self.fit(&dataset)?;
        outcome.persist(store)?;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::account::AccountRecord;
    use chrono::{NaiveDate, TimeZone};

    fn config() -> TrainingConfig {
        TrainingConfig {
            ensemble_size: 10,
            max_depth: 6,
            workers: 1,
            ..TrainingConfig::default()
        }
    }

    fn dataset(rows: usize, max_months: u32) -> Dataset {
        let reference = Utc.with_ymd_and_hms(2024, 6, 30, 0, 0, 0).unwrap();
        let records = (0..rows).map(|i| {
            let months = i as u32 % (max_months + 1);
            let due = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
                - chrono::Days::new(months as u64 * 30);
            AccountRecord::new(1000.0 + i as f64, 200.0 * months as f64, due, months)
        });
        Dataset::from_records(records, reference)
    }

    #[test]
    fn test_invalid_test_fraction_rejected() {
        for fraction in [0.0, 1.0, -0.1, 1.5] {
            let result = TrainingPipeline::new(TrainingConfig {
                test_fraction: fraction,
                ..config()
            });
            assert!(matches!(result, Err(TrainingError::InvalidConfig(_))));
        }
    }

    #[test]
    fn test_split_sizes_and_disjointness() {
        let pipeline = TrainingPipeline::new(config()).unwrap();
        let split = pipeline.split(101).unwrap();

        assert_eq!(split.test.len(), 21);
        assert_eq!(split.train.len(), 80);
        let mut all: Vec<usize> = split.train.iter().chain(&split.test).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..101).collect::<Vec<_>>());
    }

    #[test]
    fn test_split_is_seeded() {
        let a = TrainingPipeline::new(config()).unwrap().split(50).unwrap();
        let b = TrainingPipeline::new(config()).unwrap().split(50).unwrap();
        let c = TrainingPipeline::new(TrainingConfig {
            random_seed: 7,
            ..config()
        })
        .unwrap()
        .split(50)
        .unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_single_row_cannot_be_split() {
        let pipeline = TrainingPipeline::new(config()).unwrap();
        assert!(matches!(
            pipeline.split(1),
            Err(TrainingError::TooFewRows { .. })
        ));
    }

    #[test]
    fn test_single_class_dataset_fails() {
        let pipeline = TrainingPipeline::new(config()).unwrap();
        let err = pipeline.fit(&dataset(20, 0)).unwrap_err();
        assert!(matches!(err, TrainingError::InsufficientClasses { found: 1 }));
    }

    #[test]
    fn test_empty_dataset_fails() {
        let pipeline = TrainingPipeline::new(config()).unwrap();
        assert!(matches!(
            pipeline.fit(&Dataset::default()),
            Err(TrainingError::EmptyDataset)
        ));
    }

    #[test]
    fn test_fit_produces_consistent_metrics() {
        let pipeline = TrainingPipeline::new(config()).unwrap();
        let outcome = pipeline.fit(&dataset(200, 5)).unwrap();

        let metrics = &outcome.metrics;
        assert_eq!(metrics.train_size + metrics.test_size, 200);
        assert_eq!(metrics.ensemble_size, 10);
        assert_eq!(metrics.max_depth, 6);
        assert!((0.0..=1.0).contains(&metrics.accuracy));
        // months_overdue is a feature, so the label is learnable
        assert!(metrics.accuracy > 0.9);
        assert_eq!(outcome.schema, FeatureSchema::current());
        assert_eq!(outcome.forest.n_trees(), 10);
    }

    #[test]
    fn test_refit_reproduces_predictions() {
        let data = dataset(120, 4);
        let first = TrainingPipeline::new(config()).unwrap().fit(&data).unwrap();
        let second = TrainingPipeline::new(config()).unwrap().fit(&data).unwrap();

        assert_eq!(first.forest, second.forest);
        for example in data.examples() {
            let row = example.features.as_slice();
            assert_eq!(
                first.forest.predict(row).unwrap(),
                second.forest.predict(row).unwrap()
            );
        }
    }

    #[test]
    fn test_reference_time_from_config() {
        let pipeline = TrainingPipeline::new(TrainingConfig {
            reference_date: NaiveDate::from_ymd_opt(2024, 1, 31),
            ..config()
        })
        .unwrap();
        assert_eq!(
            pipeline.reference_time(),
            Utc.with_ymd_and_hms(2024, 1, 31, 0, 0, 0).unwrap()
        );
    }
}
