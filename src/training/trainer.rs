//! End-to-end training run: ingest, split, scale, fit, evaluate, persist

use crate::config::{ModelsConfig, TrainingConfig};
use crate::error::{Result, ServiceError};
use crate::features::{feature_columns, FEATURE_COUNT};
use crate::scaler::StandardScaler;
use crate::training::dataset::Dataset;
use crate::training::estimator::{self, EstimatorConfig, EstimatorKind};
use crate::training::evaluation::RegressionMetrics;
use crate::training::split::train_test_split;
use chrono::Local;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

pub const LATEST_MODEL_FILE: &str = "latest_model.pkl";
pub const LATEST_SCALER_FILE: &str = "latest_scaler.pkl";

const N_ESTIMATORS_RANGE: (i64, i64) = (10, 1000);
const MAX_DEPTH_RANGE: (i64, i64) = (1, 50);
const TEST_SIZE_RANGE: (f64, f64) = (0.1, 0.5);

/// Training options as supplied by a caller, before validation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingRequest {
    pub dataset_path: PathBuf,
    pub n_estimators: Option<i64>,
    pub max_depth: Option<i64>,
    pub test_size: Option<f64>,
    pub random_state: Option<u64>,
    pub model_name: Option<String>,
    pub estimator: Option<String>,
}

/// Validated hyperparameters for one run
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingParams {
    pub dataset_path: PathBuf,
    pub n_estimators: usize,
    pub max_depth: Option<u16>,
    pub test_size: f64,
    pub random_state: u64,
    pub model_name: String,
    pub estimator: EstimatorKind,
}

impl TrainingParams {
    /// Fill defaults from configuration and range-check everything
    pub fn resolve(request: TrainingRequest, defaults: &TrainingConfig) -> Result<Self> {
        let n_estimators = request
            .n_estimators
            .unwrap_or(defaults.default_n_estimators as i64);
        if !(N_ESTIMATORS_RANGE.0..=N_ESTIMATORS_RANGE.1).contains(&n_estimators) {
            return Err(ServiceError::out_of_range(
                "n_estimators",
                N_ESTIMATORS_RANGE.0 as f64,
                N_ESTIMATORS_RANGE.1 as f64,
            ));
        }

        let max_depth = match request.max_depth {
            None => None,
            Some(depth) if (MAX_DEPTH_RANGE.0..=MAX_DEPTH_RANGE.1).contains(&depth) => {
                Some(depth as u16)
            }
            Some(_) => {
                return Err(ServiceError::out_of_range(
                    "max_depth",
                    MAX_DEPTH_RANGE.0 as f64,
                    MAX_DEPTH_RANGE.1 as f64,
                ))
            }
        };

        let test_size = request.test_size.unwrap_or(defaults.default_test_size);
        if !(TEST_SIZE_RANGE.0..=TEST_SIZE_RANGE.1).contains(&test_size) {
            return Err(ServiceError::out_of_range(
                "test_size",
                TEST_SIZE_RANGE.0,
                TEST_SIZE_RANGE.1,
            ));
        }

        let model_name = match request.model_name {
            Some(name) => validate_model_name(name)?,
            None => default_model_name(),
        };

        let estimator = match request.estimator.as_deref() {
            None => EstimatorKind::default(),
            Some(tag) => EstimatorKind::parse(tag).ok_or_else(|| {
                ServiceError::InvalidParameter(format!(
                    "estimator must be one of random_forest, linear_regression (got '{}')",
                    tag
                ))
            })?,
        };

        Ok(Self {
            dataset_path: request.dataset_path,
            n_estimators: n_estimators as usize,
            max_depth,
            test_size,
            random_state: request.random_state.unwrap_or(defaults.default_random_state),
            model_name,
            estimator,
        })
    }
}

/// `RF_Model_<YYYYmmdd_HHMMSS>` in local time
pub fn default_model_name() -> String {
    format!("RF_Model_{}", Local::now().format("%Y%m%d_%H%M%S"))
}

fn validate_model_name(name: String) -> Result<String> {
    let trimmed = name.trim();
    let valid = !trimmed.is_empty()
        && trimmed != "."
        && trimmed != ".."
        && !trimmed.contains(['/', '\\']);
    if !valid {
        return Err(ServiceError::InvalidParameter(format!(
            "model_name '{}' is not a valid file name",
            name
        )));
    }
    Ok(trimmed.to_string())
}

/// Every file a training run writes
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ArtifactPaths {
    pub model: PathBuf,
    pub scaler: PathBuf,
    pub latest_model: PathBuf,
    pub latest_scaler: PathBuf,
    pub shared_scaler: PathBuf,
}

impl ArtifactPaths {
    pub fn new(models: &ModelsConfig, model_name: &str) -> Self {
        let dir = &models.model_dir;
        Self {
            model: dir.join(format!("{}.pkl", model_name)),
            scaler: dir.join(format!("{}_scaler.pkl", model_name)),
            latest_model: dir.join(LATEST_MODEL_FILE),
            latest_scaler: dir.join(LATEST_SCALER_FILE),
            shared_scaler: models.scaler_path(),
        }
    }

    /// A model file that would land on one of the scaler files
    pub fn collision(&self) -> Option<&Path> {
        let scalers = [&self.scaler, &self.latest_scaler, &self.shared_scaler];
        [&self.model, &self.latest_model]
            .into_iter()
            .find(|model| scalers.contains(model))
            .map(PathBuf::as_path)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TrainingInfo {
    pub train_samples: usize,
    pub test_samples: usize,
    pub n_features: usize,
    pub n_estimators: usize,
    pub max_depth: Option<u16>,
    pub estimator: EstimatorKind,
    pub trained_by: String,
    pub trained_at: String,
}

/// Result of a successful run
#[derive(Debug, Clone, Serialize)]
pub struct TrainingOutcome {
    pub model_name: String,
    pub model_path: PathBuf,
    pub scaler_path: PathBuf,
    /// Rounded to four decimals
    pub metrics: RegressionMetrics,
    pub training_info: TrainingInfo,
    pub artifacts: ArtifactPaths,
}

pub struct Trainer<'a> {
    models: &'a ModelsConfig,
}

impl<'a> Trainer<'a> {
    pub fn new(models: &'a ModelsConfig) -> Self {
        Self { models }
    }

    /// Run one training job. Blocks the calling thread.
    pub fn train(&self, params: &TrainingParams, trained_by: &str) -> Result<TrainingOutcome> {
        let started = Instant::now();
        info!(
            dataset = %params.dataset_path.display(),
            model_name = %params.model_name,
            estimator = %params.estimator,
            n_estimators = params.n_estimators,
            max_depth = ?params.max_depth,
            test_size = params.test_size,
            random_state = params.random_state,
            "Starting training run"
        );

        let artifacts = ArtifactPaths::new(self.models, &params.model_name);
        if let Some(path) = artifacts.collision() {
            return Err(ServiceError::InvalidParameter(format!(
                "model_name '{}' would overwrite {}",
                params.model_name,
                path.display()
            )));
        }

        let dataset = Dataset::from_csv(&params.dataset_path)?;
        let split = train_test_split(dataset.len(), params.test_size, params.random_state)
            .map_err(|e| ServiceError::InvalidDataset(e.to_string()))?;
        let needed = estimator::min_training_rows(params.estimator, FEATURE_COUNT);
        if split.train.len() < needed {
            return Err(ServiceError::InvalidDataset(format!(
                "{} needs at least {} training rows, the split left {}",
                params.estimator,
                needed,
                split.train.len()
            )));
        }
        let (x_train, y_train) = dataset.select(&split.train);
        let (x_test, y_test) = dataset.select(&split.test);
        debug!(train = x_train.len(), test = x_test.len(), "Dataset split");

        let scaler = StandardScaler::fit(feature_columns(), &x_train)
            .map_err(|e| ServiceError::TrainingFailure(e.to_string()))?;
        let x_train = scaler
            .transform(&x_train)
            .map_err(|e| ServiceError::TrainingFailure(e.to_string()))?;
        let x_test = scaler
            .transform(&x_test)
            .map_err(|e| ServiceError::TrainingFailure(e.to_string()))?;

        let config = EstimatorConfig {
            kind: params.estimator,
            n_estimators: params.n_estimators,
            max_depth: params.max_depth,
            seed: params.random_state,
        };
        let model = estimator::fit(&config, &x_train, &y_train)
            .map_err(|e| ServiceError::TrainingFailure(format!("{:#}", e)))?;

        let predicted = model
            .predict(&x_test)
            .map_err(|e| ServiceError::TrainingFailure(format!("{:#}", e)))?;
        let metrics = RegressionMetrics::compute(&y_test, &predicted)
            .map_err(|e| ServiceError::TrainingFailure(format!("{:#}", e)))?
            .rounded();

        info!(
            r2_score = metrics.r2_score,
            rmse = metrics.rmse,
            mae = metrics.mae,
            "Model evaluated"
        );

        self.persist(&artifacts, &model, &scaler)?;

        info!(
            model = %artifacts.model.display(),
            shared_scaler = %artifacts.shared_scaler.display(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Training run complete"
        );

        Ok(TrainingOutcome {
            model_name: params.model_name.clone(),
            model_path: artifacts.model.clone(),
            scaler_path: artifacts.scaler.clone(),
            metrics,
            training_info: TrainingInfo {
                train_samples: split.train.len(),
                test_samples: split.test.len(),
                n_features: FEATURE_COUNT,
                n_estimators: params.n_estimators,
                max_depth: params.max_depth,
                estimator: params.estimator,
                trained_by: trained_by.to_string(),
                trained_at: Local::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string(),
            },
            artifacts,
        })
    }

    /// Every alias is written in full. Last write wins; the shared scaler is
    /// always overwritten.
    fn persist(
        &self,
        artifacts: &ArtifactPaths,
        model: &crate::models::NativeModel,
        scaler: &StandardScaler,
    ) -> Result<()> {
        std::fs::create_dir_all(&self.models.model_dir)?;

        for path in [&artifacts.model, &artifacts.latest_model] {
            model.save(path).map_err(|e| persist_failure(path, e))?;
        }
        for path in [
            &artifacts.scaler,
            &artifacts.latest_scaler,
            &artifacts.shared_scaler,
        ] {
            scaler.save(path).map_err(|e| persist_failure(path, e))?;
        }
        Ok(())
    }
}

fn persist_failure(path: &Path, err: anyhow::Error) -> ServiceError {
    ServiceError::TrainingFailure(format!("could not write {}: {:#}", path.display(), err))
}
