//! Shared feature scaler and its process-wide cache.
//!
//! Every model format is fed rows scaled by the same fitted [`StandardScaler`].
//! The training procedure rewrites the canonical scaler file on every run, while
//! the serving path reads it through a [`ScalerStore`] that memoises the first
//! successful load. The store is built once at startup and shared through the
//! application state; [`ScalerStore::is_stale`] reports when the file on disk has
//! moved on from the cached copy.

use crate::error::{Result, ServiceError};
use crate::persist;
use serde::{Deserialize, Serialize};
use smartcore::api::{Transformer, UnsupervisedEstimator};
use smartcore::linalg::basic::arrays::Array;
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::preprocessing::numerical::{self, StandardScalerParameters};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::SystemTime;
use tracing::{debug, info, warn};

/// Zero-mean, unit-variance scaling fitted per column, tagged with the column
/// names it was fitted on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    /// Column names in fit order
    pub feature_names: Vec<String>,
    fitted: numerical::StandardScaler<f64>,
}

impl StandardScaler {
    /// Fit on row-major data (population standard deviation)
    pub fn fit(feature_names: Vec<String>, rows: &[Vec<f64>]) -> anyhow::Result<Self> {
        if rows.is_empty() {
            anyhow::bail!("cannot fit a scaler on zero rows");
        }
        check_width(feature_names.len(), rows)?;

        let x = DenseMatrix::from_2d_vec(&rows.to_vec());
        let fitted = numerical::StandardScaler::<f64>::fit(&x, StandardScalerParameters::default())
            .map_err(|e| anyhow::anyhow!("scaler fit failed: {}", e))?;

        Ok(Self {
            feature_names,
            fitted,
        })
    }

    pub fn width(&self) -> usize {
        self.feature_names.len()
    }

    pub fn transform_row(&self, row: &[f64]) -> anyhow::Result<Vec<f64>> {
        let mut scaled = self.transform(&[row.to_vec()])?;
        scaled
            .pop()
            .ok_or_else(|| anyhow::anyhow!("scaler returned no rows"))
    }

    pub fn transform(&self, rows: &[Vec<f64>]) -> anyhow::Result<Vec<Vec<f64>>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        check_width(self.width(), rows)?;

        let x = DenseMatrix::from_2d_vec(&rows.to_vec());
        let scaled = self
            .fitted
            .transform(&x)
            .map_err(|e| anyhow::anyhow!("scaler transform failed: {}", e))?;

        let (nrows, ncols) = scaled.shape();
        Ok((0..nrows)
            .map(|r| (0..ncols).map(|c| *scaled.get((r, c))).collect())
            .collect())
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        persist::save(self, path)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        persist::load(path)
    }
}

fn check_width(width: usize, rows: &[Vec<f64>]) -> anyhow::Result<()> {
    if let Some(bad) = rows.iter().find(|r| r.len() != width) {
        anyhow::bail!("scaler was fitted on {} features, got {}", width, bad.len());
    }
    Ok(())
}

/// Where the shared scaler comes from
pub trait ScalerSource: Send + Sync {
    /// Read and deserialize the scaler
    fn load(&self) -> Result<StandardScaler>;

    /// Version marker of the backing data, if it has one
    fn fingerprint(&self) -> Option<SystemTime> {
        None
    }

    fn describe(&self) -> String;
}

/// Scaler stored at a fixed path on disk
pub struct FileScalerSource {
    path: PathBuf,
}

impl FileScalerSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ScalerSource for FileScalerSource {
    fn load(&self) -> Result<StandardScaler> {
        if !self.path.exists() {
            return Err(ServiceError::ScalerUnavailable(format!(
                "scaler file not found: {}",
                self.path.display()
            )));
        }
        StandardScaler::load(&self.path).map_err(|e| {
            ServiceError::ScalerUnavailable(format!("{}: {}", self.path.display(), e))
        })
    }

    fn fingerprint(&self) -> Option<SystemTime> {
        std::fs::metadata(&self.path).and_then(|m| m.modified()).ok()
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

struct CachedScaler {
    scaler: Arc<StandardScaler>,
    fingerprint: Option<SystemTime>,
}

/// Lazily loaded, memoised shared scaler
pub struct ScalerStore {
    source: Box<dyn ScalerSource>,
    cached: RwLock<Option<CachedScaler>>,
}

impl ScalerStore {
    pub fn new(source: Box<dyn ScalerSource>) -> Self {
        Self {
            source,
            cached: RwLock::new(None),
        }
    }

    /// Store backed by the scaler file at `path`
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self::new(Box::new(FileScalerSource::new(path)))
    }

    /// Cached scaler, loading it on first use.
    ///
    /// Concurrent first calls may each load; the first one stored wins and the
    /// rest are discarded, which is harmless because they read the same file.
    pub fn get(&self) -> Result<Arc<StandardScaler>> {
        if let Some(cached) = self
            .cached
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            return Ok(cached.scaler.clone());
        }

        let fresh = self.load_fresh()?;
        let mut slot = self.cached.write().unwrap_or_else(PoisonError::into_inner);
        let cached = slot.get_or_insert(fresh);
        Ok(cached.scaler.clone())
    }

    /// Drop the cached scaler so the next [`get`](Self::get) reads the source again
    pub fn invalidate(&self) {
        let previous = self
            .cached
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if previous.is_some() {
            info!(source = %self.source.describe(), "Shared scaler cache invalidated");
        }
    }

    /// Load from the source now and replace the cached value
    pub fn reload(&self) -> Result<Arc<StandardScaler>> {
        let fresh = self.load_fresh()?;
        let scaler = fresh.scaler.clone();
        *self.cached.write().unwrap_or_else(PoisonError::into_inner) = Some(fresh);
        Ok(scaler)
    }

    pub fn is_cached(&self) -> bool {
        self.cached
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// True when a scaler is cached and the source has changed since it was loaded
    pub fn is_stale(&self) -> bool {
        let guard = self.cached.read().unwrap_or_else(PoisonError::into_inner);
        match guard.as_ref() {
            Some(cached) => {
                let current = self.source.fingerprint();
                current.is_some() && current != cached.fingerprint
            }
            None => false,
        }
    }

    fn load_fresh(&self) -> Result<CachedScaler> {
        let fingerprint = self.source.fingerprint();
        let scaler = self.source.load().map_err(|e| {
            warn!(source = %self.source.describe(), error = %e, "Shared scaler unavailable");
            e
        })?;
        debug!(
            source = %self.source.describe(),
            features = scaler.width(),
            "Shared scaler loaded"
        );
        Ok(CachedScaler {
            scaler: Arc::new(scaler),
            fingerprint,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn names() -> Vec<String> {
        vec!["a".to_string(), "b".to_string()]
    }

    struct CountingSource {
        loads: Arc<AtomicUsize>,
        version: Arc<RwLock<u64>>,
    }

    impl ScalerSource for CountingSource {
        fn load(&self) -> Result<StandardScaler> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok(StandardScaler::fit(names(), &[vec![0.0, 1.0], vec![2.0, 3.0]]).unwrap())
        }

        fn fingerprint(&self) -> Option<SystemTime> {
            let v = *self.version.read().unwrap();
            Some(SystemTime::UNIX_EPOCH + Duration::from_secs(v))
        }

        fn describe(&self) -> String {
            "counting".to_string()
        }
    }

    fn counting_store() -> (ScalerStore, Arc<AtomicUsize>, Arc<RwLock<u64>>) {
        let loads = Arc::new(AtomicUsize::new(0));
        let version = Arc::new(RwLock::new(1));
        let store = ScalerStore::new(Box::new(CountingSource {
            loads: loads.clone(),
            version: version.clone(),
        }));
        (store, loads, version)
    }

    #[test]
    fn test_fit_and_transform() {
        let rows = vec![vec![1.0, 10.0], vec![3.0, 20.0]];
        let scaler = StandardScaler::fit(names(), &rows).unwrap();

        assert_eq!(scaler.width(), 2);
        assert_eq!(scaler.transform_row(&[3.0, 25.0]).unwrap(), vec![1.0, 2.0]);
        assert_eq!(
            scaler.transform(&rows).unwrap(),
            vec![vec![-1.0, -1.0], vec![1.0, 1.0]]
        );
        assert!(scaler.transform_row(&[1.0]).is_err());
        assert!(scaler.transform(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_population_std() {
        let rows = vec![vec![0.0], vec![4.0]];
        let scaler = StandardScaler::fit(vec!["x".into()], &rows).unwrap();
        // mean 2, std 2
        assert_eq!(scaler.transform_row(&[6.0]).unwrap(), vec![2.0]);
    }

    #[test]
    fn test_constant_column_centres_to_zero() {
        let rows = vec![vec![1.0, 7.0], vec![3.0, 7.0]];
        let scaler = StandardScaler::fit(names(), &rows).unwrap();
        assert_eq!(scaler.transform_row(&[2.0, 7.0]).unwrap(), vec![0.0, 0.0]);
    }

    #[test]
    fn test_fit_rejects_ragged_rows() {
        assert!(StandardScaler::fit(names(), &[vec![1.0, 2.0], vec![3.0]]).is_err());
        assert!(StandardScaler::fit(names(), &[]).is_err());
    }

    #[test]
    fn test_get_memoises() {
        let (store, loads, _) = counting_store();

        let first = store.get().unwrap();
        let second = store.get().unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_invalidate_and_reload() {
        let (store, loads, _) = counting_store();

        store.get().unwrap();
        store.invalidate();
        assert!(!store.is_cached());
        store.get().unwrap();
        assert_eq!(loads.load(Ordering::SeqCst), 2);

        store.reload().unwrap();
        assert_eq!(loads.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_staleness_tracks_source() {
        let (store, _, version) = counting_store();
        assert!(!store.is_stale());

        store.get().unwrap();
        assert!(!store.is_stale());

        *version.write().unwrap() = 2;
        assert!(store.is_stale());

        store.reload().unwrap();
        assert!(!store.is_stale());
    }

    #[test]
    fn test_missing_file_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let store = ScalerStore::from_path(dir.path().join("scaler.pkl"));
        assert!(matches!(
            store.get(),
            Err(ServiceError::ScalerUnavailable(_))
        ));
    }

    #[test]
    fn test_corrupt_file_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scaler.pkl");
        std::fs::write(&path, b"not a scaler").unwrap();
        let store = ScalerStore::from_path(&path);
        assert!(matches!(
            store.get(),
            Err(ServiceError::ScalerUnavailable(_))
        ));
    }

    #[test]
    fn test_file_round_trip_through_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scaler.pkl");
        let scaler = StandardScaler::fit(names(), &[vec![1.0, 2.0], vec![3.0, 6.0]]).unwrap();
        scaler.save(&path).unwrap();

        let store = ScalerStore::from_path(&path);
        assert_eq!(*store.get().unwrap(), scaler);
    }
}
