//! HTTP surface: prediction and training routes

pub mod auth;
pub mod predict;
pub mod state;
pub mod train;

use axum::extract::{Request, State};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use state::AppState;

/// Build the application router
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/predict/model", post(predict::predict_model))
        .route("/predict/health", get(predict::health))
        .route("/train/model", post(train::train_model))
        .route("/train/status", get(train::training_status))
        .route("/train/models", get(train::list_models))
        .layer(middleware::from_fn_with_state(state.clone(), record_failures))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Count every 4xx/5xx response, including extractor rejections
async fn record_failures(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let response = next.run(request).await;
    let status = response.status();
    if status.is_client_error() || status.is_server_error() {
        state.metrics.record_failure(status.as_u16());
    }
    response
}
