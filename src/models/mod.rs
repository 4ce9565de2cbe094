//! Model formats, loading and prediction

pub mod format;
pub mod loader;
pub mod native;
#[cfg(feature = "onnx")]
pub mod onnx;
pub mod predictor;

pub use format::{FormatHint, ModelFormat};
pub use loader::{Backend, LoadedModel, ModelLoader};
pub use native::NativeModel;
pub use predictor::ModelPredictor;
