//! Schwann Cell Viability Service Library
//!
//! Trains regression models that predict Schwann cell viability from four
//! process parameters and serves predictions over HTTP. Models of several
//! serialization formats are loaded per request and fed rows scaled by one
//! shared, cached scaler.

pub mod api;
pub mod config;
pub mod error;
pub mod features;
pub mod metrics;
pub mod models;
pub mod persist;
pub mod scaler;
pub mod training;

pub use config::AppConfig;
pub use error::{Result, ServiceError};
pub use features::FeatureVector;
pub use models::{FormatHint, LoadedModel, ModelFormat, ModelLoader, ModelPredictor};
pub use scaler::{ScalerStore, StandardScaler};
pub use training::{Trainer, TrainingParams};
