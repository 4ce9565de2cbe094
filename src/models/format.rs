//! Model format tags and extension detection

use crate::error::{Result, ServiceError};
use serde::Serialize;
use std::fmt;
use std::path::Path;

/// Serialization kinds a model artifact can be classified into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFormat {
    /// Tree ensemble trained by this service (joblib / sklearn style tags)
    TreeEnsemble,
    /// Neural network checkpoint exported to ONNX
    NeuralNetwork,
    /// Boosted tree ensemble exported to ONNX
    GradientBoosted,
    /// Any natively serialized estimator (pickle style tag)
    Generic,
}

/// Tags accepted in the `model_type` request field
pub const SUPPORTED_TAGS: [&str; 7] = [
    "keras", "pytorch", "onnx", "sklearn", "xgboost", "pickle", "joblib",
];

const EXTENSIONS: &[(&str, ModelFormat)] = &[
    ("keras", ModelFormat::NeuralNetwork),
    ("h5", ModelFormat::NeuralNetwork),
    ("hdf5", ModelFormat::NeuralNetwork),
    ("pt", ModelFormat::NeuralNetwork),
    ("pth", ModelFormat::NeuralNetwork),
    ("onnx", ModelFormat::NeuralNetwork),
    ("pkl", ModelFormat::Generic),
    ("pickle", ModelFormat::Generic),
    ("joblib", ModelFormat::TreeEnsemble),
    ("model", ModelFormat::GradientBoosted),
    ("xgb", ModelFormat::GradientBoosted),
];

impl ModelFormat {
    /// Parse a request tag, case-insensitively
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "sklearn" | "joblib" | "tree_ensemble" => Some(ModelFormat::TreeEnsemble),
            "keras" | "pytorch" | "onnx" | "neural_network" => Some(ModelFormat::NeuralNetwork),
            "xgboost" | "gradient_boosted" => Some(ModelFormat::GradientBoosted),
            "pickle" | "generic" => Some(ModelFormat::Generic),
            _ => None,
        }
    }

    /// Classify a model file by its extension; unknown extensions are generic
    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .and_then(|ext| {
                EXTENSIONS
                    .iter()
                    .find(|(known, _)| *known == ext)
                    .map(|(_, format)| *format)
            })
            .unwrap_or(ModelFormat::Generic)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelFormat::TreeEnsemble => "tree_ensemble",
            ModelFormat::NeuralNetwork => "neural_network",
            ModelFormat::GradientBoosted => "gradient_boosted",
            ModelFormat::Generic => "generic",
        }
    }
}

impl fmt::Display for ModelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Format information supplied alongside a model
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatHint {
    /// Infer from the file extension (loader) or the loaded backend (predictor)
    Auto,
    Known(ModelFormat),
    /// A tag outside the known set
    Other(String),
}

impl FormatHint {
    /// `None`, empty and `"auto"` mean [`FormatHint::Auto`]
    pub fn parse(tag: Option<&str>) -> Self {
        match tag.map(str::trim) {
            None | Some("") => FormatHint::Auto,
            Some(t) if t.eq_ignore_ascii_case("auto") => FormatHint::Auto,
            Some(t) => ModelFormat::from_tag(t)
                .map(FormatHint::Known)
                .unwrap_or_else(|| FormatHint::Other(t.to_ascii_lowercase())),
        }
    }

    /// Parse a request tag, rejecting anything that is not a known format
    pub fn require_known(tag: &str) -> Result<ModelFormat> {
        ModelFormat::from_tag(tag).ok_or_else(|| ServiceError::UnsupportedFormat(tag.to_string()))
    }
}
