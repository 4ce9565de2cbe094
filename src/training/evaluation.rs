//! Regression metrics

use serde::Serialize;
use smartcore::metrics::{mean_absolute_error, mean_squared_error, r2};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RegressionMetrics {
    pub r2_score: f64,
    pub rmse: f64,
    pub mae: f64,
}

impl RegressionMetrics {
    pub fn compute(actual: &[f64], predicted: &[f64]) -> anyhow::Result<Self> {
        if actual.is_empty() || actual.len() != predicted.len() {
            anyhow::bail!(
                "cannot score {} predictions against {} targets",
                predicted.len(),
                actual.len()
            );
        }
        let (y_true, y_pred) = (actual.to_vec(), predicted.to_vec());

        Ok(Self {
            r2_score: r2_score(&y_true, &y_pred),
            rmse: mean_squared_error(&y_true, &y_pred).sqrt(),
            mae: mean_absolute_error(&y_true, &y_pred),
        })
    }

    /// Same metrics rounded to four decimals for responses
    pub fn rounded(&self) -> Self {
        Self {
            r2_score: round4(self.r2_score),
            rmse: round4(self.rmse),
            mae: round4(self.mae),
        }
    }
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// A constant target scores 1.0 when predicted exactly and 0.0 otherwise
fn r2_score(y_true: &[f64], y_pred: &[f64]) -> f64 {
    if y_true.windows(2).all(|w| w[0] == w[1]) {
        return if y_true == y_pred { 1.0 } else { 0.0 };
    }
    r2(&y_true.to_vec(), &y_pred.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn score(actual: &[f64], predicted: &[f64]) -> RegressionMetrics {
        RegressionMetrics::compute(actual, predicted).unwrap()
    }

    #[test]
    fn test_perfect_fit() {
        let y = [1.0, 2.0, 3.0];
        let m = score(&y, &y);
        assert_eq!(m.r2_score, 1.0);
        assert_eq!(m.rmse, 0.0);
        assert_eq!(m.mae, 0.0);
    }

    #[test]
    fn test_known_values() {
        let m = score(&[3.0, -0.5, 2.0, 7.0], &[2.5, 0.0, 2.0, 8.0]);
        assert!((m.r2_score - 0.948_608_137).abs() < 1e-6);
        assert!((m.mae - 0.5).abs() < 1e-12);
        assert!((m.rmse - 0.375f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_mean_predictor_scores_zero() {
        assert_eq!(score(&[1.0, 2.0, 3.0], &[2.0, 2.0, 2.0]).r2_score, 0.0);
    }

    #[test]
    fn test_constant_target() {
        assert_eq!(score(&[5.0, 5.0], &[5.0, 5.0]).r2_score, 1.0);
        assert_eq!(score(&[5.0, 5.0], &[4.0, 6.0]).r2_score, 0.0);
    }

    #[test]
    fn test_length_mismatch_is_error() {
        assert!(RegressionMetrics::compute(&[1.0, 2.0], &[1.0]).is_err());
        assert!(RegressionMetrics::compute(&[], &[]).is_err());
    }

    #[test]
    fn test_rounding() {
        let m = RegressionMetrics {
            r2_score: 0.123_456,
            rmse: 1.000_05,
            mae: 2.0,
        };
        assert_eq!(m.rounded().r2_score, 0.1235);
        assert_eq!(m.rounded().mae, 2.0);
    }
}
