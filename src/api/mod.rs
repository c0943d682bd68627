//! HTTP surface of the prediction service

pub mod error;
pub mod handlers;

pub use error::ApiError;

use crate::context::ServiceContext;
use crate::metrics::ServiceMetrics;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub context: Arc<ServiceContext>,
    pub stats: Arc<ServiceMetrics>,
}

impl AppState {
    pub fn new(context: ServiceContext, stats: Arc<ServiceMetrics>) -> Self {
        Self {
            context: Arc::new(context),
            stats,
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .route("/predict", post(handlers::predict))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
