//! Dataset ingestion, training and artifact management

pub mod artifacts;
pub mod dataset;
pub mod estimator;
pub mod evaluation;
pub mod split;
pub mod trainer;

pub use dataset::Dataset;
pub use estimator::EstimatorKind;
pub use evaluation::RegressionMetrics;
pub use trainer::{Trainer, TrainingOutcome, TrainingParams, TrainingRequest};
