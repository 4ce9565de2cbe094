//! Prediction endpoints

use crate::api::auth::AuthUser;
use crate::api::state::AppState;
use crate::error::{Result, ServiceError};
use crate::features::{FeatureVector, FEATURES, FEATURE_COUNT};
use crate::models::{FormatHint, ModelFormat, ModelLoader, ModelPredictor};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;
use uuid::Uuid;

/// Prediction body as sent. Fields stay untyped until every one is known to
/// be present.
#[derive(Debug, Default, Deserialize)]
pub struct PredictBody {
    pub pc_mxene_loading: Option<Value>,
    pub laminin_peptide_loading: Option<Value>,
    pub stimulation_frequency: Option<Value>,
    pub applied_voltage: Option<Value>,
    pub model_path: Option<Value>,
    pub model_type: Option<Value>,
}

impl PredictBody {
    /// Fields in the order their presence is checked
    fn fields(&self) -> [(&'static str, Option<&Value>); FEATURE_COUNT + 2] {
        [
            ("pc_mxene_loading", self.pc_mxene_loading.as_ref()),
            ("laminin_peptide_loading", self.laminin_peptide_loading.as_ref()),
            ("stimulation_frequency", self.stimulation_frequency.as_ref()),
            ("applied_voltage", self.applied_voltage.as_ref()),
            ("model_path", self.model_path.as_ref()),
            ("model_type", self.model_type.as_ref()),
        ]
    }
}

/// A float given either as a JSON number or a numeric string
pub(crate) fn number_value(field: &str, value: &Value) -> Result<f64> {
    match value {
        Value::Number(n) => n.as_f64().ok_or_else(|| {
            ServiceError::InvalidParameter(format!("{} is not a representable number", field))
        }),
        Value::String(s) => s.trim().parse::<f64>().map_err(|_| {
            ServiceError::InvalidParameter(format!("could not convert string to float: '{}'", s))
        }),
        _ => Err(ServiceError::InvalidParameter(format!(
            "{} must be a number",
            field
        ))),
    }
}

pub(crate) fn string_value<'a>(field: &str, value: &'a Value) -> Result<&'a str> {
    value
        .as_str()
        .ok_or_else(|| ServiceError::InvalidParameter(format!("{} must be a string", field)))
}

/// A validated prediction request
#[derive(Debug, Clone, PartialEq)]
pub struct PredictRequest {
    pub features: FeatureVector,
    pub model_path: PathBuf,
    /// Lowercased tag as supplied
    pub model_type: String,
    pub format: ModelFormat,
}

impl PredictRequest {
    /// Presence, numeric conversion, range and model-type checks, in that order
    pub fn from_body(body: &PredictBody) -> Result<Self> {
        let mut values = Vec::with_capacity(FEATURE_COUNT + 2);
        for (field, value) in body.fields() {
            values.push(value.ok_or_else(|| ServiceError::MissingField(field.to_string()))?);
        }

        let mut row = [0.0; FEATURE_COUNT];
        for ((slot, spec), value) in row.iter_mut().zip(FEATURES.iter()).zip(&values) {
            *slot = number_value(spec.field, value)?;
        }
        let features = FeatureVector::from_row(row);
        let model_path = string_value("model_path", values[FEATURE_COUNT])?;
        let model_type = string_value("model_type", values[FEATURE_COUNT + 1])?
            .trim()
            .to_ascii_lowercase();

        features.validate()?;
        let format = FormatHint::require_known(&model_type)?;

        Ok(Self {
            features,
            model_path: PathBuf::from(model_path),
            model_type,
            format,
        })
    }
}

/// POST /predict/model
pub async fn predict_model(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    payload: std::result::Result<Json<PredictBody>, JsonRejection>,
) -> Result<Json<Value>> {
    let request_id = Uuid::new_v4();
    let started = Instant::now();
    let Json(body) = payload?;
    let request = PredictRequest::from_body(&body)?;

    if !request.model_path.exists() {
        return Err(ServiceError::ModelNotFound(request.model_path));
    }

    info!(
        request_id = %request_id,
        user = %claims.username,
        model_path = %request.model_path.display(),
        model_type = %request.model_type,
        "Prediction requested"
    );

    let store = state.scaler_store.clone();
    let model_path = request.model_path.clone();
    let format = request.format;
    let row = request.features.to_row();

    let (percentage, model_used) = tokio::task::spawn_blocking(move || -> Result<(f64, String)> {
        let hint = FormatHint::Known(format);
        let mut model = ModelLoader::load_model(&model_path, &hint)?;
        let scaler = store.get()?;
        let scaled = scaler
            .transform_row(&row)
            .map_err(|e| ServiceError::PredictionFailure(format!("{:#}", e)))?;
        let percentage = ModelPredictor::predict(&mut model, &scaled, &hint)?;
        Ok((percentage, model.file_name()))
    })
    .await
    .map_err(|e| ServiceError::PredictionFailure(format!("prediction task failed: {}", e)))??;

    let latency = started.elapsed();
    state
        .metrics
        .record_prediction(format.as_str(), latency, percentage);

    info!(
        request_id = %request_id,
        prediction = percentage,
        latency_us = latency.as_micros() as u64,
        "Prediction served"
    );

    Ok(Json(json!({
        "prediction": percentage,
        "unit": "%",
        "user": claims.username,
        "model_used": model_used,
        "model_type": request.model_type,
        "input_parameters": request.features,
    })))
}

/// GET /predict/health
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "message": "Predict service is running",
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(value: Value) -> Result<PredictRequest> {
        let body: PredictBody = serde_json::from_value(value).unwrap();
        PredictRequest::from_body(&body)
    }

    fn valid() -> Value {
        json!({
            "pc_mxene_loading": 0.15,
            "laminin_peptide_loading": 75,
            "stimulation_frequency": "1.5",
            "applied_voltage": 1.5,
            "model_path": "/models/rf.pkl",
            "model_type": "JobLib",
        })
    }

    #[test]
    fn test_valid_request() {
        let request = parse(valid()).unwrap();
        assert_eq!(request.features.to_row(), [0.15, 75.0, 1.5, 1.5]);
        assert_eq!(request.model_type, "joblib");
        assert_eq!(request.format, ModelFormat::TreeEnsemble);
    }

    #[test]
    fn test_first_missing_field_reported() {
        let mut value = valid();
        let object = value.as_object_mut().unwrap();
        object.remove("applied_voltage");
        object.remove("model_type");

        let err = parse(value).unwrap_err();
        assert_eq!(err.to_string(), "Missing required field: applied_voltage");
    }

    #[test]
    fn test_null_counts_as_missing() {
        let mut value = valid();
        value["model_path"] = Value::Null;

        let err = parse(value).unwrap_err();
        assert_eq!(err.to_string(), "Missing required field: model_path");
    }

    #[test]
    fn test_non_numeric_value() {
        let mut value = valid();
        value["laminin_peptide_loading"] = json!("lots");
        assert!(matches!(parse(value), Err(ServiceError::InvalidParameter(_))));
    }

    #[test]
    fn test_range_checked_before_model_type() {
        let mut value = valid();
        value["applied_voltage"] = json!(3.5);
        value["model_type"] = json!("caffe");

        let err = parse(value).unwrap_err();
        assert_eq!(err.to_string(), "applied_voltage must be between 0 and 3");
    }

    #[test]
    fn test_unsupported_model_type() {
        let mut value = valid();
        value["model_type"] = json!("caffe");

        let err = parse(value).unwrap_err();
        assert!(matches!(err, ServiceError::UnsupportedFormat(_)));
        assert!(err.to_string().contains("caffe"));
    }

    #[test]
    fn test_model_path_must_be_string() {
        let mut value = valid();
        value["model_path"] = json!(42);
        assert!(matches!(parse(value), Err(ServiceError::InvalidParameter(_))));
    }
}
