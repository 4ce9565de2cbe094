//! Inspection of the model directory

use chrono::{DateTime, Local};
use serde::Serialize;
use std::path::{Path, PathBuf};

const MODEL_EXTENSION: &str = "pkl";

/// A persisted model file
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ModelArtifact {
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
    /// Modification time, local ISO-8601
    pub created_at: String,
}

fn is_pkl(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e == MODEL_EXTENSION)
}

/// Scaler files never show up in model listings
pub fn is_scaler_file(name: &str, shared_scaler_file: &str) -> bool {
    name == shared_scaler_file
        || name == super::trainer::LATEST_SCALER_FILE
        || name.ends_with("_scaler.pkl")
}

/// Number of `.pkl` files in the directory, scalers included; 0 when it is missing
pub fn count_pkl_files(dir: &Path) -> usize {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return 0;
    };
    entries
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_file() && is_pkl(&e.path()))
        .count()
}

/// Model artifacts in the directory, sorted by name
pub fn list_models(dir: &Path, shared_scaler_file: &str) -> std::io::Result<Vec<ModelArtifact>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut models = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();
        if !is_pkl(&path) || is_scaler_file(&name, shared_scaler_file) {
            continue;
        }
        let metadata = entry.metadata()?;
        if !metadata.is_file() {
            continue;
        }
        let modified: DateTime<Local> = metadata.modified()?.into();
        models.push(ModelArtifact {
            name,
            path,
            size: metadata.len(),
            created_at: modified.format("%Y-%m-%dT%H:%M:%S%.6f").to_string(),
        });
    }

    models.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(models)
}
