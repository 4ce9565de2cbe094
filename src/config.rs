//! Configuration management for the viability prediction service

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default configuration file, relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub models: ModelsConfig,
    pub training: TrainingConfig,
    pub metrics: MetricsConfig,
    pub logging: LoggingConfig,
}

/// HTTP listener configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address
    pub host: String,
    /// Listen port (legacy override: PREDICT_PORT)
    pub port: u16,
}

/// Bearer token configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// HS256 signing secret (legacy override: JWT_SECRET)
    pub jwt_secret: String,
}

/// Persisted model configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ModelsConfig {
    /// Directory holding trained models and scalers (legacy override: MODEL_DIR)
    pub model_dir: PathBuf,
    /// File name of the canonical scaler inside `model_dir`
    #[serde(default = "default_scaler_file")]
    pub scaler_file: String,
}

fn default_scaler_file() -> String {
    "scaler.pkl".to_string()
}

impl ModelsConfig {
    /// Path of the canonical scaler read by the prediction path
    pub fn scaler_path(&self) -> PathBuf {
        self.model_dir.join(&self.scaler_file)
    }
}

/// Training defaults
#[derive(Debug, Clone, Deserialize)]
pub struct TrainingConfig {
    pub default_n_estimators: usize,
    pub default_test_size: f64,
    pub default_random_state: u64,
    /// Invalidate the cached scaler once a training run rewrote it
    #[serde(default)]
    pub refresh_scaler_on_train: bool,
}

/// Metrics reporting configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    /// Seconds between summaries; 0 disables periodic reporting
    pub report_interval_secs: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl AppConfig {
    /// Load configuration from `VIABILITY_CONFIG` or the default file
    pub fn load() -> Result<Self> {
        let path = std::env::var("VIABILITY_CONFIG")
            .unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from_path(path)
    }

    /// Load configuration from a specific path.
    ///
    /// The file is optional; defaults fill anything it leaves out. Environment
    /// variables prefixed with `VIABILITY_` (nested keys separated by `__`) and the
    /// legacy `JWT_SECRET`, `MODEL_DIR` and `PREDICT_PORT` variables take precedence.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let defaults = Self::default();

        let config = Config::builder()
            .set_default("server.host", defaults.server.host)?
            .set_default("server.port", i64::from(defaults.server.port))?
            .set_default("auth.jwt_secret", defaults.auth.jwt_secret)?
            .set_default(
                "models.model_dir",
                defaults.models.model_dir.to_string_lossy().into_owned(),
            )?
            .set_default("models.scaler_file", defaults.models.scaler_file)?
            .set_default(
                "training.default_n_estimators",
                defaults.training.default_n_estimators as i64,
            )?
            .set_default("training.default_test_size", defaults.training.default_test_size)?
            .set_default(
                "training.default_random_state",
                defaults.training.default_random_state as i64,
            )?
            .set_default(
                "training.refresh_scaler_on_train",
                defaults.training.refresh_scaler_on_train,
            )?
            .set_default(
                "metrics.report_interval_secs",
                defaults.metrics.report_interval_secs as i64,
            )?
            .set_default("logging.level", defaults.logging.level)?
            .set_default("logging.format", defaults.logging.format)?
            .add_source(File::from(path.as_ref()).required(false))
            .add_source(Environment::with_prefix("VIABILITY").separator("__"))
            .set_override_option("auth.jwt_secret", std::env::var("JWT_SECRET").ok())?
            .set_override_option("models.model_dir", std::env::var("MODEL_DIR").ok())?
            .set_override_option("server.port", std::env::var("PREDICT_PORT").ok())?
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Socket address string for the listener
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 5000,
            },
            auth: AuthConfig {
                jwt_secret: "jwt_secret".to_string(),
            },
            models: ModelsConfig {
                model_dir: PathBuf::from("ml_model"),
                scaler_file: default_scaler_file(),
            },
            training: TrainingConfig {
                default_n_estimators: 100,
                default_test_size: 0.2,
                default_random_state: 42,
                refresh_scaler_on_train: false,
            },
            metrics: MetricsConfig {
                report_interval_secs: 0,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.auth.jwt_secret, "jwt_secret");
        assert_eq!(config.models.scaler_path(), PathBuf::from("ml_model/scaler.pkl"));
        assert_eq!(config.training.default_test_size, 0.2);
        assert!(!config.training.refresh_scaler_on_train);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[models]\nmodel_dir = \"/srv/models\"\n\n[training]\ndefault_n_estimators = 250\ndefault_test_size = 0.3\ndefault_random_state = 7\n",
        )
        .unwrap();

        let config = AppConfig::load_from_path(&path).unwrap();
        assert_eq!(config.models.model_dir, PathBuf::from("/srv/models"));
        assert_eq!(config.models.scaler_file, "scaler.pkl");
        assert_eq!(config.training.default_n_estimators, 250);
        assert_eq!(config.logging.level, "info");
    }
}
