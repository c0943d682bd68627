//! Request handlers

use super::error::ApiError;
use super::AppState;
use crate::error::PredictError;
use crate::training::evaluation::EvaluationMetrics;
use crate::types::response::PredictionResponse;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::Serialize;
use serde_json::Value;
use std::time::Instant;
use tracing::{debug, warn};

const USAGE: &str = "\
Delinquency risk prediction API

Endpoints:
  POST /predict  - classify a debtor account into a delinquency category
  GET  /health   - service status
  GET  /metrics  - evaluation metrics of the loaded model

Example:
  curl -X POST http://localhost:5000/predict -H \"Content-Type: application/json\" \\
    -d '{\"monto_original\": 5000, \"monto_actual\": 3000, \"ratio_deuda\": 0.6, \"dias_desde_vencimiento\": 45, \"meses_mora\": 1}'
";

pub async fn index() -> &'static str {
    USAGE
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: &'static str,
    model_loaded: bool,
    version: &'static str,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        model_loaded: state.context.model_loaded(),
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub async fn metrics(State(state): State<AppState>) -> Result<Json<EvaluationMetrics>, ApiError> {
    state
        .context
        .metrics()
        .cloned()
        .map(Json)
        .ok_or(ApiError::MetricsUnavailable)
}

pub async fn predict(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<PredictionResponse>, ApiError> {
    let start = Instant::now();

    let Json(input) = body.map_err(|rejection| {
        state.stats.record_validation_rejection();
        debug!(error = %rejection.body_text(), "Rejected unparseable request body");
        ApiError::MalformedBody(rejection.body_text())
    })?;

    let result = match state.context.service() {
        Some(service) => service.predict(&input),
        None => Err(PredictError::ModelUnavailable),
    };

    match &result {
        Ok(response) => {
            state.stats.record_prediction(response.category, start.elapsed());
            debug!(
                category = response.category.code(),
                latency_us = start.elapsed().as_micros() as u64,
                "Prediction served"
            );
        }
        Err(PredictError::Validation(e)) => {
            state.stats.record_validation_rejection();
            debug!(error = %e, "Rejected invalid prediction request");
        }
        Err(PredictError::ModelUnavailable) => {
            state.stats.record_unavailable();
            warn!("Prediction requested but no model is loaded");
        }
        Err(PredictError::Internal(_)) => state.stats.record_internal_failure(),
    }

    result.map(Json).map_err(ApiError::from)
}
