//! Prediction service: request validation, feature assembly, inference and
//! response assembly

use crate::error::{ArtifactError, PredictError, ValidationError};
use crate::feature_extractor::{
    FeatureVector, CURRENT_AMOUNT, FEATURE_COUNT, FEATURE_NAMES, MONTHS_OVERDUE, ORIGINAL_AMOUNT,
};
use crate::models::schema::FeatureSchema;
use crate::models::Predictor;
use crate::types::category::RiskCategory;
use crate::types::response::PredictionResponse;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Serves predictions from an immutable predictor and its feature schema
#[derive(Clone)]
pub struct PredictionService {
    predictor: Arc<dyn Predictor>,
    schema: FeatureSchema,
}

impl std::fmt::Debug for PredictionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PredictionService")
            .field("schema", &self.schema)
            .field("classes", &self.predictor.classes())
            .finish()
    }
}

impl PredictionService {
    /// Pair a predictor with the schema it was fit on.
    ///
    /// Fails if the schema is not the one this build derives, or if the
    /// predictor expects a different number of features.
    pub fn new(predictor: Arc<dyn Predictor>, schema: FeatureSchema) -> Result<Self, ArtifactError> {
        schema.ensure_current()?;
        if predictor.n_features() != schema.len() {
            return Err(ArtifactError::PredictorShape {
                predictor: predictor.n_features(),
                schema: schema.len(),
            });
        }

        Ok(Self { predictor, schema })
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    /// Classify one raw request body
    pub fn predict(&self, input: &Value) -> Result<PredictionResponse, PredictError> {
        let fields = input.as_object().ok_or(ValidationError::NotAnObject)?;
        let features = self.resolve_features(fields)?;
        self.infer(&features)
    }

    /// Check every schema field is present and valid, then lay the values out
    /// in schema order.
    pub fn resolve_features(
        &self,
        fields: &Map<String, Value>,
    ) -> Result<FeatureVector, ValidationError> {
        let missing: Vec<String> = self
            .schema
            .names()
            .iter()
            .filter(|name| !fields.contains_key(name.as_str()))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(ValidationError::MissingFields(missing));
        }

        let mut values = [0.0; FEATURE_COUNT];
        for (position, name) in FEATURE_NAMES.iter().enumerate() {
            values[position] = read_feature(position, &fields[*name])?;
        }

        Ok(FeatureVector::from_values(values))
    }

    fn infer(&self, features: &FeatureVector) -> Result<PredictionResponse, PredictError> {
        let (label, proba) = self
            .predictor
            .predict(features.as_slice())
            .map_err(|e| PredictError::Internal(format!("inference failed: {e}")))?;

        let category = RiskCategory::try_from(label)
            .map_err(|e| PredictError::Internal(format!("predicted label: {e}")))?;

        let classes = self.predictor.classes();
        if proba.len() != classes.len() {
            return Err(PredictError::Internal(format!(
                "{} probabilities for {} classes",
                proba.len(),
                classes.len()
            )));
        }

        let mut probabilities = BTreeMap::new();
        for (&class, &p) in classes.iter().zip(&proba) {
            let class = RiskCategory::try_from(class)
                .map_err(|e| PredictError::Internal(format!("predictor class: {e}")))?;
            if probabilities.insert(class, p).is_some() {
                return Err(PredictError::Internal(format!(
                    "predictor lists class {} twice",
                    class.code()
                )));
            }
        }

        let response = PredictionResponse::new(category, probabilities);
        response
            .check_consistency()
            .map_err(|e| PredictError::Internal(format!("inconsistent response: {e}")))?;

        debug!(
            category = category.code(),
            confidence = response.confidence(),
            features = ?features.named().collect::<Vec<_>>(),
            "Prediction complete"
        );

        Ok(response)
    }
}

/// Numeric value of a feature field, with that feature's domain bounds applied
fn read_feature(position: usize, value: &Value) -> Result<f64, ValidationError> {
    let field = FEATURE_NAMES[position];
    let invalid = |reason: String| ValidationError::InvalidField {
        field: field.to_string(),
        reason,
    };

    let number = value
        .as_f64()
        .filter(|v| v.is_finite())
        .ok_or_else(|| invalid(format!("expected a finite number, got {value}")))?;

    match position {
        ORIGINAL_AMOUNT if number <= 0.0 => Err(invalid(format!("must be positive, got {number}"))),
        CURRENT_AMOUNT if number < 0.0 => {
            Err(invalid(format!("must be non-negative, got {number}")))
        }
        MONTHS_OVERDUE if number < 0.0 || number.fract() != 0.0 => Err(invalid(format!(
            "must be a non-negative whole number, got {number}"
        ))),
        _ => Ok(number),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PredictorError;
    use crate::models::forest::{ForestParams, RandomForest};
    use crate::recommendation::recommend;
    use crate::types::response::PROBABILITY_TOLERANCE;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Predictor returning a fixed distribution and counting calls
    struct FixedPredictor {
        classes: Vec<u8>,
        proba: Vec<f64>,
        calls: AtomicUsize,
    }

    impl FixedPredictor {
        fn new(classes: Vec<u8>, proba: Vec<f64>) -> Arc<Self> {
            Arc::new(Self {
                classes,
                proba,
                calls: AtomicUsize::new(0),
            })
        }
    }

    impl Predictor for FixedPredictor {
        fn n_features(&self) -> usize {
            FEATURE_COUNT
        }

        fn classes(&self) -> &[u8] {
            &self.classes
        }

        fn predict_proba(&self, _features: &[f64]) -> Result<Vec<f64>, PredictorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.proba.clone())
        }
    }

    fn service(predictor: Arc<dyn Predictor>) -> PredictionService {
        PredictionService::new(predictor, FeatureSchema::current()).unwrap()
    }

    fn full_request() -> Value {
        json!({
            "monto_original": 5000,
            "monto_actual": 3000,
            "ratio_deuda": 0.6,
            "dias_desde_vencimiento": 45,
            "meses_mora": 1
        })
    }

    /// Forest trained on months_overdue 0..=5 accounts
    fn trained_forest() -> Arc<RandomForest> {
        let mut x = Vec::new();
        let mut y = Vec::new();
        for i in 0..120u32 {
            let months = i % 6;
            let original = 1000.0 + i as f64 * 10.0;
            let current = original * (0.2 + 0.1 * months as f64);
            x.push(vec![
                original,
                current,
                current / original,
                (months * 30 + i % 7) as f64,
                months as f64,
            ]);
            y.push(RiskCategory::from_months_overdue(months).code());
        }
        let params = ForestParams {
            ensemble_size: 20,
            ..ForestParams::default()
        };
        Arc::new(RandomForest::fit(&x, &y, &params, 1).unwrap())
    }

    #[test]
    fn test_end_to_end_prediction() {
        let service = service(trained_forest());
        let response = service.predict(&full_request()).unwrap();

        assert!(response.category.code() <= 3);
        assert_eq!(response.description, response.category.description());
        assert_eq!(response.recommendation, recommend(response.category));

        let total: f64 = response.probabilities.values().sum();
        assert!((total - 1.0).abs() <= PROBABILITY_TOLERANCE);
        let max = response.probabilities.values().copied().fold(0.0, f64::max);
        assert_eq!(response.confidence(), Some(max));
    }

    #[test]
    fn test_mild_account_classified_mild() {
        let service = service(trained_forest());
        let request = json!({
            "monto_original": 1500,
            "monto_actual": 450,
            "ratio_deuda": 0.3,
            "dias_desde_vencimiento": 33,
            "meses_mora": 1
        });
        let response = service.predict(&request).unwrap();
        assert_eq!(response.category, RiskCategory::MildDelinquency);
    }

    #[test]
    fn test_missing_fields_rejected_before_inference() {
        let predictor = FixedPredictor::new(vec![0, 1], vec![0.5, 0.5]);
        let service = service(predictor.clone());

        let err = service
            .predict(&json!({"monto_original": 5000, "monto_actual": 3000}))
            .unwrap_err();

        match err {
            PredictError::Validation(ValidationError::MissingFields(fields)) => {
                assert_eq!(
                    fields,
                    vec!["ratio_deuda", "dias_desde_vencimiento", "meses_mora"]
                );
            }
            other => panic!("expected missing fields, got {other:?}"),
        }
        assert_eq!(predictor.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_all_missing_fields_listed_in_schema_order() {
        let service = service(FixedPredictor::new(vec![0, 1], vec![0.5, 0.5]));
        let err = service.predict(&json!({})).unwrap_err();
        assert!(err.is_client_error());
        assert_eq!(
            err.to_string(),
            "missing field(s): monto_original, monto_actual, ratio_deuda, dias_desde_vencimiento, meses_mora"
        );
    }

    #[test]
    fn test_non_object_body_rejected() {
        let service = service(FixedPredictor::new(vec![0, 1], vec![0.5, 0.5]));
        let err = service.predict(&json!([1, 2, 3])).unwrap_err();
        assert!(matches!(
            err,
            PredictError::Validation(ValidationError::NotAnObject)
        ));
    }

    #[test]
    fn test_supplied_values_used_as_given() {
        let service = service(FixedPredictor::new(vec![0, 1], vec![0.5, 0.5]));
        let fields = json!({
            "monto_original": 5000,
            "monto_actual": 3000,
            "ratio_deuda": 0.9,
            "dias_desde_vencimiento": 45,
            "fecha_vencimiento": "2020-01-01",
            "meses_mora": 1
        });
        let features = service
            .resolve_features(fields.as_object().unwrap())
            .unwrap();

        assert_eq!(features.as_slice(), &[5000.0, 3000.0, 0.9, 45.0, 1.0]);
    }

    #[test]
    fn test_raw_account_fields_do_not_stand_in_for_features() {
        let predictor = FixedPredictor::new(vec![0, 1], vec![0.5, 0.5]);
        let service = service(predictor.clone());
        let request = json!({
            "monto_original": 5000,
            "monto_actual": 3000,
            "fecha_vencimiento": "2024-05-16",
            "meses_mora": 1
        });

        match service.predict(&request) {
            Err(PredictError::Validation(ValidationError::MissingFields(fields))) => {
                assert_eq!(fields, vec!["ratio_deuda", "dias_desde_vencimiento"]);
            }
            other => panic!("expected missing fields, got {other:?}"),
        }
        assert_eq!(predictor.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_extreme_amounts_without_ratio_are_a_client_error() {
        let predictor = FixedPredictor::new(vec![0, 1], vec![0.5, 0.5]);
        let service = service(predictor.clone());
        let request = json!({
            "monto_original": 1e-300,
            "monto_actual": 1e300,
            "dias_desde_vencimiento": 45,
            "meses_mora": 1
        });

        let err = service.predict(&request).unwrap_err();
        assert!(err.is_client_error());
        assert!(matches!(
            err,
            PredictError::Validation(ValidationError::MissingFields(ref fields))
                if fields == &["ratio_deuda"]
        ));
        assert_eq!(predictor.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let service = service(FixedPredictor::new(vec![0, 1], vec![0.5, 0.5]));
        let cases = [
            ("monto_original", json!(0)),
            ("monto_original", json!("5000")),
            ("monto_actual", json!(-1)),
            ("ratio_deuda", json!(null)),
            ("ratio_deuda", json!("inf")),
            ("meses_mora", json!(-1)),
            ("meses_mora", json!(1.5)),
        ];

        for (field, value) in cases {
            let mut request = full_request();
            request[field] = value;
            match service.predict(&request) {
                Err(PredictError::Validation(ValidationError::InvalidField { field: f, .. })) => {
                    assert_eq!(f, field)
                }
                other => panic!("expected invalid {field}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_unknown_class_is_internal_error() {
        let service = service(FixedPredictor::new(vec![0, 7], vec![0.2, 0.8]));
        let err = service.predict(&full_request()).unwrap_err();
        assert!(matches!(err, PredictError::Internal(_)));
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_unnormalized_distribution_is_internal_error() {
        let service = service(FixedPredictor::new(vec![0, 1], vec![0.6, 0.6]));
        let err = service.predict(&full_request()).unwrap_err();
        assert!(matches!(err, PredictError::Internal(_)));
    }

    #[test]
    fn test_ties_resolve_to_lowest_category() {
        let service = service(FixedPredictor::new(
            vec![0, 1, 2, 3],
            vec![0.1, 0.4, 0.4, 0.1],
        ));
        for _ in 0..3 {
            let response = service.predict(&full_request()).unwrap();
            assert_eq!(response.category, RiskCategory::MildDelinquency);
        }
    }

    #[test]
    fn test_schema_mismatch_rejected() {
        let mut names: Vec<String> = FEATURE_NAMES.iter().map(|n| n.to_string()).collect();
        names.reverse();
        let result = PredictionService::new(
            FixedPredictor::new(vec![0, 1], vec![0.5, 0.5]),
            FeatureSchema::new(names),
        );
        assert!(matches!(result, Err(ArtifactError::SchemaMismatch { .. })));
    }

    #[test]
    fn test_predictor_shape_mismatch_rejected() {
        let x = vec![vec![0.0, 1.0], vec![1.0, 0.0]];
        let forest = RandomForest::fit(&x, &[0, 1], &ForestParams::default(), 1).unwrap();
        let result = PredictionService::new(Arc::new(forest), FeatureSchema::current());
        assert!(matches!(
            result,
            Err(ArtifactError::PredictorShape {
                predictor: 2,
                schema: 5
            })
        ));
    }
}
