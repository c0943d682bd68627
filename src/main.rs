//! Delinquency risk prediction server
//!
//! Loads the trained model once and serves predictions over HTTP until Ctrl-C.

use anyhow::{Context, Result};
use delinquency_risk::{
    api::{create_router, AppState},
    config::AppConfig,
    context::ServiceContext,
    logging,
    metrics::{MetricsReporter, ServiceMetrics},
};
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args().nth(1);
    let config = AppConfig::load_optional(config_path.as_deref())?;

    logging::init(&config.logging, "warn,tower_http=info")?;
    info!("Starting delinquency risk service");

    let context = ServiceContext::load(&config.artifacts).with_context(|| {
        format!(
            "Failed to load model artifacts from {}",
            config.artifacts.models_dir
        )
    })?;
    if !context.model_loaded() {
        warn!("Serving without a model; run the train tool and restart");
    }

    let stats = Arc::new(ServiceMetrics::new());
    if config.reporting.interval_secs > 0 {
        let reporter = MetricsReporter::new(stats.clone(), config.reporting.interval_secs);
        tokio::spawn(reporter.start());
    }

    let app = create_router(AppState::new(context, stats.clone()));

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(address = %addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Service shutting down...");
    stats.print_summary();

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
