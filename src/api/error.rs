//! HTTP error responses

use crate::error::{PredictError, ValidationError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

#[derive(Debug)]
pub enum ApiError {
    /// Request body could not be parsed as JSON
    MalformedBody(String),
    Validation(ValidationError),
    ModelUnavailable,
    MetricsUnavailable,
    /// Detail is logged, never returned
    Internal(String),
}

impl From<PredictError> for ApiError {
    fn from(err: PredictError) -> Self {
        match err {
            PredictError::Validation(e) => ApiError::Validation(e),
            PredictError::ModelUnavailable => ApiError::ModelUnavailable,
            PredictError::Internal(detail) => ApiError::Internal(detail),
        }
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MalformedBody(_) | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::ModelUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::MetricsUnavailable => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            ApiError::MalformedBody(msg) => json!({
                "error": format!("Invalid JSON body: {msg}"),
                "status": status.as_u16()
            }),
            ApiError::Validation(ValidationError::MissingFields(fields)) => json!({
                "error": ValidationError::MissingFields(fields.clone()).to_string(),
                "status": status.as_u16(),
                "missing_fields": fields
            }),
            ApiError::Validation(e) => json!({
                "error": e.to_string(),
                "status": status.as_u16()
            }),
            ApiError::ModelUnavailable => json!({
                "error": "Model not loaded",
                "status": status.as_u16()
            }),
            ApiError::MetricsUnavailable => json!({
                "error": "Metrics not available"
            }),
            ApiError::Internal(detail) => {
                tracing::error!(detail = %detail, "Internal prediction error");
                json!({
                    "error": "Internal server error",
                    "status": status.as_u16()
                })
            }
        };

        (status, Json(body)).into_response()
    }
}
