//! Shared application state

use crate::config::AppConfig;
use crate::metrics::ServiceMetrics;
use crate::scaler::ScalerStore;
use std::sync::Arc;

/// State handed to every handler
pub struct AppState {
    pub config: AppConfig,
    /// The one scaler used for every prediction
    pub scaler_store: Arc<ScalerStore>,
    pub metrics: Arc<ServiceMetrics>,
}

impl AppState {
    /// Build state with a scaler store over the configured canonical scaler file
    pub fn new(config: AppConfig, metrics: Arc<ServiceMetrics>) -> Self {
        let scaler_store = Arc::new(ScalerStore::from_path(config.models.scaler_path()));
        Self {
            config,
            scaler_store,
            metrics,
        }
    }
}
