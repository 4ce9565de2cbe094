//! Model loader: resolves a format and deserializes a model file

use crate::error::{Result, ServiceError};
use crate::models::format::{FormatHint, ModelFormat};
use crate::models::native::NativeModel;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Backend bound to a model when it is loaded
#[derive(Debug)]
pub enum Backend {
    Native(NativeModel),
    #[cfg(feature = "onnx")]
    Onnx(crate::models::onnx::OnnxModel),
}

impl Backend {
    pub fn name(&self) -> &'static str {
        match self {
            Backend::Native(model) => model.name(),
            #[cfg(feature = "onnx")]
            Backend::Onnx(_) => "onnx",
        }
    }
}

/// A deserialized model, tagged with the format it was loaded as
#[derive(Debug)]
pub struct LoadedModel {
    pub format: ModelFormat,
    pub path: PathBuf,
    pub backend: Backend,
}

impl LoadedModel {
    pub fn new(format: ModelFormat, path: impl Into<PathBuf>, backend: Backend) -> Self {
        Self {
            format,
            path: path.into(),
            backend,
        }
    }

    /// File name used in responses
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// Loader for every supported model format
pub struct ModelLoader;

impl ModelLoader {
    /// Load a model, inferring the format from the extension when the hint is `Auto`
    pub fn load_model<P: AsRef<Path>>(path: P, hint: &FormatHint) -> Result<LoadedModel> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ServiceError::ModelNotFound(path.to_path_buf()));
        }

        let format = match hint {
            FormatHint::Auto => {
                let detected = ModelFormat::from_path(path);
                debug!(path = %path.display(), format = %detected, "Detected model format");
                detected
            }
            FormatHint::Known(format) => *format,
            FormatHint::Other(tag) => return Err(ServiceError::UnsupportedFormat(tag.clone())),
        };

        info!(path = %path.display(), format = %format, "Loading model");

        let backend = match format {
            ModelFormat::TreeEnsemble => Self::load_tree_ensemble(path)?,
            ModelFormat::NeuralNetwork | ModelFormat::GradientBoosted => {
                Self::load_onnx(path, format)?
            }
            ModelFormat::Generic => Self::load_generic(path)?,
        };

        info!(
            path = %path.display(),
            format = %format,
            backend = backend.name(),
            "Model loaded successfully"
        );

        Ok(LoadedModel::new(format, path, backend))
    }

    fn load_tree_ensemble(path: &Path) -> Result<Backend> {
        let bytes = std::fs::read(path).map_err(|e| ServiceError::load_failure(path, e))?;
        NativeModel::from_bincode(&bytes)
            .map(Backend::Native)
            .map_err(|e| ServiceError::load_failure(path, e))
    }

    /// Generic artifacts may be either the binary or the JSON encoding
    fn load_generic(path: &Path) -> Result<Backend> {
        let bytes = std::fs::read(path).map_err(|e| ServiceError::load_failure(path, e))?;
        let looks_like_json = bytes
            .iter()
            .find(|b| !b.is_ascii_whitespace())
            .is_some_and(|b| *b == b'{');

        let model = if looks_like_json {
            NativeModel::from_json(&bytes)
        } else {
            NativeModel::from_bincode(&bytes)
        };
        model
            .map(Backend::Native)
            .map_err(|e| ServiceError::load_failure(path, e))
    }

    /// Neural networks and boosted trees are both served as ONNX exports
    #[cfg(feature = "onnx")]
    fn load_onnx(path: &Path, _format: ModelFormat) -> Result<Backend> {
        crate::models::onnx::OnnxModel::load(path)
            .map(Backend::Onnx)
            .map_err(|e| ServiceError::load_failure(path, format!("{:#}", e)))
    }

    #[cfg(not(feature = "onnx"))]
    fn load_onnx(_path: &Path, format: ModelFormat) -> Result<Backend> {
        Err(ServiceError::DependencyMissing {
            format: format.as_str(),
            feature: "onnx",
        })
    }
}
