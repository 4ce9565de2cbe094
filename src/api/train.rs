//! Training endpoints

use crate::api::auth::{AuthUser, OptionalUser};
use crate::api::predict::{number_value, string_value};
use crate::api::state::AppState;
use crate::error::{Result, ServiceError};
use crate::training::artifacts::{count_pkl_files, list_models as list_model_artifacts};
use crate::training::{Trainer, TrainingParams, TrainingRequest};
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

/// Training body as sent; hyperparameters accept numbers or numeric strings
#[derive(Debug, Default, Deserialize)]
pub struct TrainBody {
    pub dataset_path: Option<Value>,
    pub n_estimators: Option<Value>,
    pub max_depth: Option<Value>,
    pub test_size: Option<Value>,
    pub random_state: Option<Value>,
    pub model_name: Option<Value>,
    pub estimator: Option<Value>,
}

impl TrainBody {
    /// Type-check the fields; hyperparameter ranges are checked later
    pub fn into_request(self) -> Result<TrainingRequest> {
        let dataset_path = self
            .dataset_path
            .as_ref()
            .ok_or_else(|| ServiceError::MissingField("dataset_path".to_string()))
            .and_then(|v| string_value("dataset_path", v))?;

        let random_state = match optional_int("random_state", self.random_state.as_ref())? {
            Some(seed) if seed < 0 => {
                return Err(ServiceError::InvalidParameter(
                    "random_state must be a non-negative integer".to_string(),
                ))
            }
            seed => seed.map(|s| s as u64),
        };

        Ok(TrainingRequest {
            dataset_path: PathBuf::from(dataset_path),
            n_estimators: optional_int("n_estimators", self.n_estimators.as_ref())?,
            max_depth: optional_int("max_depth", self.max_depth.as_ref())?,
            test_size: self
                .test_size
                .as_ref()
                .map(|v| number_value("test_size", v))
                .transpose()?,
            random_state,
            model_name: optional_string("model_name", self.model_name.as_ref())?,
            estimator: optional_string("estimator", self.estimator.as_ref())?,
        })
    }
}

/// Integer parameter; floats are truncated and `""` means unset
fn optional_int(field: &str, value: Option<&Value>) -> Result<Option<i64>> {
    match value {
        None => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(value @ Value::Number(n)) => match n.as_i64() {
            Some(v) => Ok(Some(v)),
            None => Ok(Some(number_value(field, value)?.trunc() as i64)),
        },
        Some(Value::String(s)) => s.trim().parse::<i64>().map(Some).map_err(|_| {
            ServiceError::InvalidParameter(format!("invalid literal for int(): '{}'", s))
        }),
        Some(_) => Err(ServiceError::InvalidParameter(format!(
            "{} must be an integer",
            field
        ))),
    }
}

fn optional_string(field: &str, value: Option<&Value>) -> Result<Option<String>> {
    value
        .map(|v| string_value(field, v).map(str::to_string))
        .transpose()
}

/// POST /train/model
pub async fn train_model(
    State(state): State<Arc<AppState>>,
    OptionalUser(user): OptionalUser,
    payload: std::result::Result<Json<TrainBody>, JsonRejection>,
) -> Result<Json<Value>> {
    let request_id = Uuid::new_v4();
    let started = Instant::now();
    let trained_by = user
        .map(|claims| claims.username)
        .unwrap_or_else(|| "unknown".to_string());

    let Json(body) = payload?;
    let request = body.into_request()?;
    if !request.dataset_path.exists() {
        return Err(ServiceError::DatasetNotFound(request.dataset_path));
    }
    let params = TrainingParams::resolve(request, &state.config.training)?;

    info!(
        request_id = %request_id,
        trained_by = %trained_by,
        model_name = %params.model_name,
        "Training requested"
    );

    let job_state = state.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        Trainer::new(&job_state.config.models).train(&params, &trained_by)
    })
    .await
    .map_err(|e| ServiceError::TrainingFailure(format!("training task failed: {}", e)))??;

    state.metrics.record_training(started.elapsed());

    let scaler_reloaded = state.config.training.refresh_scaler_on_train;
    if scaler_reloaded {
        state.scaler_store.invalidate();
    }

    info!(
        request_id = %request_id,
        model_path = %outcome.model_path.display(),
        r2_score = outcome.metrics.r2_score,
        scaler_reloaded = scaler_reloaded,
        "Training request complete"
    );

    Ok(Json(json!({
        "success": true,
        "message": "Model trained successfully",
        "model_path": outcome.model_path,
        "scaler_path": outcome.scaler_path,
        "model_name": outcome.model_name,
        "metrics": outcome.metrics,
        "training_info": outcome.training_info,
        "artifacts": outcome.artifacts,
        "scaler_reloaded": scaler_reloaded,
    })))
}

/// GET /train/status
pub async fn training_status(State(state): State<Arc<AppState>>) -> Json<Value> {
    let dir = &state.config.models.model_dir;
    Json(json!({
        "status": "available",
        "models_directory": dir,
        "models_count": count_pkl_files(dir),
        "scaler_cached": state.scaler_store.is_cached(),
        "scaler_stale": state.scaler_store.is_stale(),
    }))
}

/// GET /train/models
pub async fn list_models(
    State(state): State<Arc<AppState>>,
    AuthUser(_claims): AuthUser,
) -> Result<Json<Value>> {
    let models = list_model_artifacts(
        &state.config.models.model_dir,
        &state.config.models.scaler_file,
    )?;
    Ok(Json(json!({ "models": models })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(body: &str) -> Result<TrainingRequest> {
        serde_json::from_str::<TrainBody>(body).unwrap().into_request()
    }

    #[test]
    fn test_parse_full_request() {
        let request = parse(
            r#"{"dataset_path": "/data/train.csv", "n_estimators": "50", "max_depth": 12.9,
                "test_size": 0.25, "random_state": 7, "model_name": "exp1",
                "estimator": "linear_regression"}"#,
        )
        .unwrap();

        assert_eq!(request.dataset_path, PathBuf::from("/data/train.csv"));
        assert_eq!(request.n_estimators, Some(50));
        assert_eq!(request.max_depth, Some(12));
        assert_eq!(request.test_size, Some(0.25));
        assert_eq!(request.random_state, Some(7));
        assert_eq!(request.model_name.as_deref(), Some("exp1"));
        assert_eq!(request.estimator.as_deref(), Some("linear_regression"));
    }

    #[test]
    fn test_blank_and_null_are_unset() {
        let request = parse(r#"{"dataset_path": "d.csv", "max_depth": "", "test_size": null}"#)
            .unwrap();
        assert_eq!(request.max_depth, None);
        assert_eq!(request.test_size, None);
        assert_eq!(request.n_estimators, None);
    }

    #[test]
    fn test_dataset_path_required() {
        let err = parse(r#"{"n_estimators": 10}"#).unwrap_err();
        assert_eq!(err.to_string(), "Missing required field: dataset_path");
    }

    #[test]
    fn test_bad_integer() {
        assert!(matches!(
            parse(r#"{"dataset_path": "d.csv", "n_estimators": "many"}"#),
            Err(ServiceError::InvalidParameter(_))
        ));
        assert!(matches!(
            parse(r#"{"dataset_path": "d.csv", "random_state": -1}"#),
            Err(ServiceError::InvalidParameter(_))
        ));
        assert!(matches!(
            parse(r#"{"dataset_path": "d.csv", "model_name": ["a"]}"#),
            Err(ServiceError::InvalidParameter(_))
        ));
    }
}
