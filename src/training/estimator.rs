//! Regression estimators available for training

use crate::models::NativeModel;
use serde::{Deserialize, Serialize};
use smartcore::ensemble::random_forest_regressor::{
    RandomForestRegressor, RandomForestRegressorParameters,
};
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::linear::linear_regression::{LinearRegression, LinearRegressionParameters};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimatorKind {
    #[default]
    RandomForest,
    LinearRegression,
}

impl EstimatorKind {
    pub fn parse(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "random_forest" | "rf" => Some(EstimatorKind::RandomForest),
            "linear_regression" | "linear" => Some(EstimatorKind::LinearRegression),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EstimatorKind::RandomForest => "random_forest",
            EstimatorKind::LinearRegression => "linear_regression",
        }
    }
}

impl fmt::Display for EstimatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hyperparameters passed to the estimator
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EstimatorConfig {
    pub kind: EstimatorKind,
    pub n_estimators: usize,
    pub max_depth: Option<u16>,
    pub seed: u64,
}

/// Fewest training rows `kind` can be fitted on. Least squares with an
/// intercept needs more rows than features.
pub fn min_training_rows(kind: EstimatorKind, n_features: usize) -> usize {
    match kind {
        EstimatorKind::RandomForest => 2,
        EstimatorKind::LinearRegression => n_features + 1,
    }
}

/// Fit an estimator on already-scaled rows
pub fn fit(config: &EstimatorConfig, rows: &[Vec<f64>], targets: &[f64]) -> anyhow::Result<NativeModel> {
    if rows.is_empty() || rows.len() != targets.len() {
        anyhow::bail!(
            "cannot fit on {} rows with {} targets",
            rows.len(),
            targets.len()
        );
    }
    let n_features = rows[0].len();
    if rows.iter().any(|r| r.len() != n_features) {
        anyhow::bail!("training rows have differing widths");
    }
    let needed = min_training_rows(config.kind, n_features);
    if rows.len() < needed {
        anyhow::bail!(
            "{} needs at least {} rows for {} features, got {}",
            config.kind,
            needed,
            n_features,
            rows.len()
        );
    }

    let x = DenseMatrix::from_2d_vec(&rows.to_vec());
    let y = targets.to_vec();

    let model = match config.kind {
        EstimatorKind::RandomForest => {
            let mut params = RandomForestRegressorParameters::default()
                .with_n_trees(config.n_estimators)
                .with_seed(config.seed);
            if let Some(depth) = config.max_depth {
                params = params.with_max_depth(depth);
            }
            let forest = RandomForestRegressor::fit(&x, &y, params)
                .map_err(|e| anyhow::anyhow!("random forest fit failed: {}", e))?;
            NativeModel::RandomForest(forest)
        }
        EstimatorKind::LinearRegression => {
            let linear = LinearRegression::fit(&x, &y, LinearRegressionParameters::default())
                .map_err(|e| anyhow::anyhow!("linear regression fit failed: {}", e))?;
            NativeModel::LinearRegression(linear)
        }
    };

    Ok(model)
}
