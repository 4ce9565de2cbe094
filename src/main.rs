//! Viability Service - Main Entry Point
//!
//! Serves the training and prediction HTTP API.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use viability_service::{
    api::{self, AppState},
    config::{AppConfig, LoggingConfig},
    metrics::{MetricsReporter, ServiceMetrics},
};

fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .context("invalid log level")?
        .add_directive("tower_http=info".parse()?);

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.format.eq_ignore_ascii_case("json") {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration before logging so the level can come from it
    let config = AppConfig::load()?;
    init_tracing(&config.logging)?;

    info!("Starting Viability Service");
    info!(
        model_dir = %config.models.model_dir.display(),
        scaler = %config.models.scaler_path().display(),
        refresh_scaler_on_train = config.training.refresh_scaler_on_train,
        "Configuration loaded successfully"
    );
    #[cfg(not(feature = "onnx"))]
    tracing::warn!("Built without the onnx feature; neural network models cannot be loaded");

    let metrics = Arc::new(ServiceMetrics::new());

    let interval = config.metrics.report_interval_secs;
    if interval > 0 {
        let reporter = MetricsReporter::new(metrics.clone(), interval);
        tokio::spawn(reporter.start());
        info!(interval_secs = interval, "Metrics reporter started");
    }

    let address = config.bind_address();
    let state = Arc::new(AppState::new(config, metrics.clone()));
    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {}", address))?;
    info!("Listening on http://{}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Print final summary
    info!("Service shutting down...");
    metrics.print_summary();

    Ok(())
}
