//! Estimators trained and serialized by this service

use crate::persist;
use serde::{Deserialize, Serialize};
use smartcore::ensemble::random_forest_regressor::RandomForestRegressor;
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::linear::linear_regression::LinearRegression;
use std::path::Path;

pub type ForestRegressor = RandomForestRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>>;
pub type LinearRegressor = LinearRegression<f64, f64, DenseMatrix<f64>, Vec<f64>>;

/// A fitted native estimator
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NativeModel {
    RandomForest(ForestRegressor),
    LinearRegression(LinearRegressor),
}

impl std::fmt::Debug for NativeModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("NativeModel").field(&self.name()).finish()
    }
}

impl NativeModel {
    pub fn name(&self) -> &'static str {
        match self {
            NativeModel::RandomForest(_) => "random_forest",
            NativeModel::LinearRegression(_) => "linear_regression",
        }
    }

    /// One prediction per input row
    pub fn predict(&self, rows: &[Vec<f64>]) -> anyhow::Result<Vec<f64>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let x = DenseMatrix::from_2d_vec(&rows.to_vec());
        let predictions = match self {
            NativeModel::RandomForest(model) => model.predict(&x),
            NativeModel::LinearRegression(model) => model.predict(&x),
        }
        .map_err(|e| anyhow::anyhow!("{} predict failed: {}", self.name(), e))?;
        Ok(predictions)
    }

    /// Write as bincode
    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        persist::save(self, path)
    }

    pub fn from_bincode(bytes: &[u8]) -> anyhow::Result<Self> {
        persist::from_bytes(bytes)
    }

    pub fn from_json(bytes: &[u8]) -> anyhow::Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use smartcore::ensemble::random_forest_regressor::RandomForestRegressorParameters;
    use smartcore::linear::linear_regression::LinearRegressionParameters;

    /// Already-scaled rows with targets in [0, 1]
    pub(crate) fn training_rows() -> (Vec<Vec<f64>>, Vec<f64>) {
        let mut rows = Vec::new();
        let mut targets = Vec::new();
        for i in 0..40 {
            let t = i as f64 / 39.0;
            rows.push(vec![t * 2.0 - 1.0, t * t, (i % 4) as f64 - 1.5, (i % 3) as f64 - 1.0]);
            targets.push(0.2 + 0.6 * t);
        }
        (rows, targets)
    }

    pub(crate) fn small_forest() -> NativeModel {
        let (rows, targets) = training_rows();
        let x = DenseMatrix::from_2d_vec(&rows);
        let params = RandomForestRegressorParameters::default()
            .with_n_trees(10)
            .with_seed(7);
        NativeModel::RandomForest(RandomForestRegressor::fit(&x, &targets, params).unwrap())
    }

    #[test]
    fn test_forest_predictions_stay_in_target_range() {
        let model = small_forest();
        let (rows, _) = training_rows();
        let preds = model.predict(&rows[..3]).unwrap();
        assert_eq!(preds.len(), 3);
        assert!(preds.iter().all(|p| (0.2..=0.8).contains(p)));
    }

    #[test]
    fn test_linear_fit_recovers_trend() {
        let (rows, targets) = training_rows();
        let x = DenseMatrix::from_2d_vec(&rows);
        let model = NativeModel::LinearRegression(
            LinearRegression::fit(&x, &targets, LinearRegressionParameters::default()).unwrap(),
        );
        let preds = model.predict(&rows[..1]).unwrap();
        assert!((preds[0] - targets[0]).abs() < 1e-6);
    }

    #[test]
    fn test_bincode_round_trip_predicts_identically() {
        let model = small_forest();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("forest.pkl");
        model.save(&path).unwrap();

        let restored = NativeModel::from_bincode(&std::fs::read(&path).unwrap()).unwrap();
        let (rows, _) = training_rows();
        assert_eq!(model.predict(&rows).unwrap(), restored.predict(&rows).unwrap());
    }
}
