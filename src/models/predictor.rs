//! Per-format prediction and percentage normalization

use crate::error::{Result, ServiceError};
use crate::models::format::{FormatHint, ModelFormat};
use crate::models::loader::{Backend, LoadedModel};
use tracing::debug;

/// Container shapes returned by the different backends
#[derive(Debug, Clone, PartialEq)]
pub enum RawOutput {
    Scalar(f64),
    /// One value per input row
    Vector(Vec<f64>),
    /// Dense tensor with its dimensions
    Tensor { shape: Vec<i64>, data: Vec<f64> },
}

impl RawOutput {
    /// The single prediction for a single input row
    pub fn single_value(&self) -> Result<f64> {
        match self {
            RawOutput::Scalar(v) => Ok(*v),
            RawOutput::Vector(values) if values.len() == 1 => Ok(values[0]),
            RawOutput::Tensor { shape, data }
                if data.len() == 1 && shape.iter().all(|&d| d == 1) =>
            {
                Ok(data[0])
            }
            other => Err(ServiceError::UnsupportedModel(format!(
                "expected exactly one output value, got {}",
                other.describe()
            ))),
        }
    }

    fn describe(&self) -> String {
        match self {
            RawOutput::Scalar(_) => "a scalar".to_string(),
            RawOutput::Vector(values) => format!("a vector of {} values", values.len()),
            RawOutput::Tensor { shape, .. } => format!("a tensor of shape {:?}", shape),
        }
    }
}

/// Round half away from zero to two decimals
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Convert a raw model output to a percentage.
///
/// Every recognized format is treated as emitting a 0-1 value and scaled by 100;
/// an unrecognized format is assumed to be in percent already and only rounded.
pub fn to_percentage(raw: f64, format: Option<ModelFormat>) -> f64 {
    match format {
        Some(_) => round2(raw * 100.0),
        None => round2(raw),
    }
}

pub struct ModelPredictor;

impl ModelPredictor {
    /// Predict a viability percentage for one scaled feature row.
    ///
    /// An explicit hint wins over the format the model was loaded as. Any failure
    /// inside the backend surfaces as [`ServiceError::PredictionFailure`].
    pub fn predict(model: &mut LoadedModel, scaled: &[f64], hint: &FormatHint) -> Result<f64> {
        let format = match hint {
            FormatHint::Known(format) => Some(*format),
            FormatHint::Auto => Some(model.format),
            FormatHint::Other(_) => None,
        };

        let raw = match format {
            Some(format) => Self::predict_as(format, &mut model.backend, scaled)?,
            None => Self::predict_generic(&mut model.backend, scaled)?,
        };
        let value = raw.single_value()?;
        let percentage = to_percentage(value, format);

        debug!(
            model = %model.file_name(),
            format = format.map(|f| f.as_str()).unwrap_or("unknown"),
            raw = value,
            percentage = percentage,
            "Prediction complete"
        );

        Ok(percentage)
    }

    fn predict_as(format: ModelFormat, backend: &mut Backend, row: &[f64]) -> Result<RawOutput> {
        match (format, backend) {
            (ModelFormat::TreeEnsemble | ModelFormat::Generic, Backend::Native(model)) => model
                .predict(&[row.to_vec()])
                .map(RawOutput::Vector)
                .map_err(|e| ServiceError::PredictionFailure(e.to_string())),
            #[cfg(feature = "onnx")]
            (ModelFormat::NeuralNetwork | ModelFormat::GradientBoosted, Backend::Onnx(model)) => model
                .run(row)
                .map(|out| RawOutput::Tensor {
                    shape: out.shape,
                    data: out.data,
                })
                .map_err(|e| ServiceError::PredictionFailure(format!("{:#}", e))),
            (format, backend) => Err(ServiceError::UnsupportedModel(format!(
                "{} model cannot be used as {}",
                backend.name(),
                format
            ))),
        }
    }

    /// Whatever prediction call the backend offers, with no format assumptions
    fn predict_generic(backend: &mut Backend, row: &[f64]) -> Result<RawOutput> {
        let format = match backend {
            Backend::Native(_) => ModelFormat::Generic,
            #[cfg(feature = "onnx")]
            Backend::Onnx(_) => ModelFormat::NeuralNetwork,
        };
        Self::predict_as(format, backend, row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::native::tests::{small_forest, training_rows};

    fn forest_model(format: ModelFormat) -> LoadedModel {
        LoadedModel::new(format, "/models/rf.pkl", Backend::Native(small_forest()))
    }

    fn decimals_ok(v: f64) -> bool {
        ((v * 100.0).round() - v * 100.0).abs() < 1e-6
    }

    #[test]
    fn test_tree_ensemble_percentage_in_range() {
        let mut model = forest_model(ModelFormat::TreeEnsemble);
        let (rows, _) = training_rows();

        for row in rows.iter().step_by(7) {
            let pct = ModelPredictor::predict(&mut model, row, &FormatHint::Auto).unwrap();
            assert!((0.0..=100.0).contains(&pct), "{pct}");
            assert!(decimals_ok(pct), "{pct}");
        }
    }

    #[test]
    fn test_unknown_hint_leaves_scale() {
        let mut model = forest_model(ModelFormat::Generic);
        let (rows, _) = training_rows();

        let scaled = ModelPredictor::predict(&mut model, &rows[0], &FormatHint::Auto).unwrap();
        let unscaled =
            ModelPredictor::predict(&mut model, &rows[0], &FormatHint::Other("custom".into()))
                .unwrap();

        assert!(unscaled <= 1.0);
        assert!((scaled / 100.0 - unscaled).abs() <= 0.0051);
    }

    #[test]
    fn test_mismatched_hint_is_unsupported() {
        let mut model = forest_model(ModelFormat::TreeEnsemble);
        let err = ModelPredictor::predict(
            &mut model,
            &[0.0; 4],
            &FormatHint::Known(ModelFormat::GradientBoosted),
        )
        .unwrap_err();
        assert!(matches!(err, ServiceError::UnsupportedModel(_)));
    }

    #[test]
    fn test_single_value_shapes() {
        assert_eq!(RawOutput::Scalar(0.4).single_value().unwrap(), 0.4);
        assert_eq!(RawOutput::Vector(vec![0.5]).single_value().unwrap(), 0.5);
        let tensor = RawOutput::Tensor {
            shape: vec![1, 1],
            data: vec![0.25],
        };
        assert_eq!(tensor.single_value().unwrap(), 0.25);

        assert!(RawOutput::Vector(vec![]).single_value().is_err());
        let wide = RawOutput::Tensor {
            shape: vec![1, 2],
            data: vec![0.1, 0.9],
        };
        assert!(matches!(
            wide.single_value(),
            Err(ServiceError::UnsupportedModel(_))
        ));
    }

    #[test]
    fn test_percentage_rules() {
        assert_eq!(to_percentage(0.87654, Some(ModelFormat::TreeEnsemble)), 87.65);
        assert_eq!(to_percentage(0.5, Some(ModelFormat::NeuralNetwork)), 50.0);
        assert_eq!(to_percentage(87.654, None), 87.65);
        assert_eq!(round2(-0.125), -0.13);
    }
}
