//! Error taxonomy shared by the loader, predictor, trainer and HTTP layer

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ServiceError>;

/// Reasons a bearer token is rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    Missing,
    Expired,
    Invalid,
}

impl std::fmt::Display for AuthFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthFailure::Missing => write!(f, "Token missing"),
            AuthFailure::Expired => write!(f, "Token expired"),
            AuthFailure::Invalid => write!(f, "Invalid token"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid parameter value: {0}")]
    InvalidParameter(String),

    #[error("{field} must be between {min} and {max}")]
    ParameterOutOfRange {
        field: String,
        min: String,
        max: String,
    },

    #[error("Unsupported model_type: {0}. Supported types: {supported}", supported = crate::models::format::SUPPORTED_TAGS.join(", "))]
    UnsupportedFormat(String),

    #[error("Missing required columns: {}", .missing.join(", "))]
    SchemaMismatch { missing: Vec<String> },

    #[error("Dataset file not found: {}", .0.display())]
    DatasetNotFound(PathBuf),

    #[error("Invalid dataset: {0}")]
    InvalidDataset(String),

    #[error("Model file not found: {}", .0.display())]
    ModelNotFound(PathBuf),

    #[error("Failed to load scaler: {0}")]
    ScalerUnavailable(String),

    #[error("{format} models need the `{feature}` feature, which this build does not include")]
    DependencyMissing {
        format: &'static str,
        feature: &'static str,
    },

    #[error("Failed to load model from {}: {reason}", .path.display())]
    LoadFailure { path: PathBuf, reason: String },

    #[error("Unsupported model for prediction: {0}")]
    UnsupportedModel(String),

    #[error("Prediction failed: {0}")]
    PredictionFailure(String),

    #[error("Training failed: {0}")]
    TrainingFailure(String),

    #[error("{0}")]
    AuthFailure(AuthFailure),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServiceError {
    pub fn out_of_range(field: &str, min: f64, max: f64) -> Self {
        ServiceError::ParameterOutOfRange {
            field: field.to_string(),
            min: min.to_string(),
            max: max.to_string(),
        }
    }

    pub fn load_failure(path: impl Into<PathBuf>, reason: impl std::fmt::Display) -> Self {
        ServiceError::LoadFailure {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// HTTP status for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::MissingField(_)
            | ServiceError::InvalidParameter(_)
            | ServiceError::ParameterOutOfRange { .. }
            | ServiceError::UnsupportedFormat(_)
            | ServiceError::SchemaMismatch { .. } => StatusCode::BAD_REQUEST,
            ServiceError::AuthFailure(_) => StatusCode::UNAUTHORIZED,
            ServiceError::ModelNotFound(_) | ServiceError::DatasetNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            ServiceError::InvalidDataset(_)
            | ServiceError::ScalerUnavailable(_)
            | ServiceError::DependencyMissing { .. }
            | ServiceError::LoadFailure { .. }
            | ServiceError::UnsupportedModel(_)
            | ServiceError::PredictionFailure(_)
            | ServiceError::TrainingFailure(_)
            | ServiceError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Bodies that are not a JSON object are bad parameters, whatever axum's reason
impl From<JsonRejection> for ServiceError {
    fn from(rejection: JsonRejection) -> Self {
        ServiceError::InvalidParameter(rejection.body_text())
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self, "Request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %self, "Request rejected");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
