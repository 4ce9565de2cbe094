//! Tabular dataset ingestion and cleaning

use crate::error::{Result, ServiceError};
use crate::features::{FEATURES, FEATURE_COUNT, TARGET_COLUMN};
use std::collections::HashSet;
use std::path::Path;
use tracing::info;

/// Feature rows plus regression targets, in [`FEATURES`] column order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub rows: Vec<[f64; FEATURE_COUNT]>,
    pub targets: Vec<f64>,
}

/// Required columns as read from the file; `None` marks an empty or non-numeric cell
#[derive(Debug, Clone)]
pub struct RawTable {
    /// Each record holds the four features followed by the target
    pub records: Vec<[Option<f64>; FEATURE_COUNT + 1]>,
}

/// Column names a training file must contain, features first
pub fn required_columns() -> Vec<&'static str> {
    FEATURES
        .iter()
        .map(|f| f.column)
        .chain(std::iter::once(TARGET_COLUMN))
        .collect()
}

impl RawTable {
    /// Read the required columns from a CSV file with a header row.
    ///
    /// Extra columns are ignored. Fails with `DatasetNotFound` for a missing file
    /// and `SchemaMismatch` listing every absent required column.
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ServiceError::DatasetNotFound(path.to_path_buf()));
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(|e| ServiceError::InvalidDataset(e.to_string()))?;

        let headers = reader
            .headers()
            .map_err(|e| ServiceError::InvalidDataset(e.to_string()))?
            .clone();

        let required = required_columns();
        let positions: Vec<Option<usize>> = required
            .iter()
            .map(|name| headers.iter().position(|h| h == *name))
            .collect();

        let missing: Vec<String> = required
            .iter()
            .zip(&positions)
            .filter(|(_, pos)| pos.is_none())
            .map(|(name, _)| name.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(ServiceError::SchemaMismatch { missing });
        }
        let positions: Vec<usize> = positions.into_iter().flatten().collect();

        let mut records = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| ServiceError::InvalidDataset(e.to_string()))?;
            let mut values = [None; FEATURE_COUNT + 1];
            for (slot, &pos) in values.iter_mut().zip(&positions) {
                *slot = record
                    .get(pos)
                    .filter(|cell| !cell.is_empty())
                    .and_then(|cell| cell.parse::<f64>().ok())
                    .filter(|v| v.is_finite());
            }
            records.push(values);
        }

        info!(
            path = %path.display(),
            rows = records.len(),
            columns = headers.len(),
            "Dataset loaded"
        );

        Ok(Self { records })
    }

    /// Require every required cell to be numeric
    pub fn into_dataset(self) -> Result<Dataset> {
        let mut dataset = Dataset::default();
        for (line, record) in self.records.iter().enumerate() {
            let mut values = [0.0; FEATURE_COUNT + 1];
            for (i, cell) in record.iter().enumerate() {
                values[i] = cell.ok_or_else(|| {
                    ServiceError::InvalidDataset(format!(
                        "row {} has an empty or non-numeric value in column '{}'",
                        line + 1,
                        required_columns()[i]
                    ))
                })?;
            }
            dataset.push(&values);
        }
        Ok(dataset)
    }

    /// Fill gaps with the column median, then drop duplicate rows
    pub fn into_cleaned_dataset(self) -> Result<Dataset> {
        let medians: Vec<Option<f64>> = (0..=FEATURE_COUNT)
            .map(|col| median(self.records.iter().filter_map(|r| r[col])))
            .collect();

        let mut seen = HashSet::new();
        let mut dataset = Dataset::default();
        let mut imputed = 0usize;
        let mut duplicates = 0usize;

        for record in &self.records {
            let mut values = [0.0; FEATURE_COUNT + 1];
            for (col, cell) in record.iter().enumerate() {
                values[col] = match (cell, medians[col]) {
                    (Some(v), _) => *v,
                    (None, Some(m)) => {
                        imputed += 1;
                        m
                    }
                    (None, None) => {
                        return Err(ServiceError::InvalidDataset(format!(
                            "column '{}' has no numeric values",
                            required_columns()[col]
                        )))
                    }
                };
            }
            if !seen.insert(values.map(f64::to_bits)) {
                duplicates += 1;
                continue;
            }
            dataset.push(&values);
        }

        info!(
            rows = dataset.len(),
            imputed = imputed,
            duplicates = duplicates,
            "Dataset cleaned"
        );
        Ok(dataset)
    }
}

fn median(values: impl Iterator<Item = f64>) -> Option<f64> {
    let mut sorted: Vec<f64> = values.collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    Some(if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    })
}

impl Dataset {
    /// Load a CSV training file, rejecting rows with missing values
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        RawTable::from_csv(path)?.into_dataset()
    }

    fn push(&mut self, values: &[f64; FEATURE_COUNT + 1]) {
        let mut row = [0.0; FEATURE_COUNT];
        row.copy_from_slice(&values[..FEATURE_COUNT]);
        self.rows.push(row);
        self.targets.push(values[FEATURE_COUNT]);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows and targets at the given indices
    pub fn select(&self, indices: &[usize]) -> (Vec<Vec<f64>>, Vec<f64>) {
        indices
            .iter()
            .map(|&i| (self.rows[i].to_vec(), self.targets[i]))
            .unzip()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::fmt::Write as _;

    pub(crate) const HEADER: &str =
        "MXene (mg/mL),Laminin peptide (ug/mL),Electric stimulation (Hz),Voltage (V),Cell viability (%)";

    /// A deterministic synthetic dataset with `n` rows
    pub(crate) fn synthetic_csv(n: usize) -> String {
        let mut csv = format!("{HEADER},Cell viability Index\n");
        for i in 0..n {
            let mxene = (i % 7) as f64 * 0.04;
            let laminin = (i % 11) as f64 * 12.5;
            let freq = (i % 5) as f64 * 0.6;
            let volt = (i % 3) as f64 * 1.2;
            let viability = 60.0 + 80.0 * mxene + 0.1 * laminin + 2.0 * freq - 1.5 * volt;
            writeln!(csv, "{mxene},{laminin},{freq},{volt},{viability:.3},1").unwrap();
        }
        csv
    }

    pub(crate) fn write_csv(dir: &Path, name: &str, contents: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_reads_required_columns_and_ignores_extra() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(dir.path(), "data.csv", &synthetic_csv(50));

        let dataset = Dataset::from_csv(&path).unwrap();
        assert_eq!(dataset.len(), 50);
        assert_eq!(dataset.rows[1], [0.04, 12.5, 0.6, 1.2]);
    }

    #[test]
    fn test_schema_mismatch_lists_missing_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(
            dir.path(),
            "data.csv",
            "MXene (mg/mL),Voltage (V)\n0.1,1.0\n",
        );

        match Dataset::from_csv(&path) {
            Err(ServiceError::SchemaMismatch { missing }) => assert_eq!(
                missing,
                vec![
                    "Laminin peptide (ug/mL)",
                    "Electric stimulation (Hz)",
                    "Cell viability (%)"
                ]
            ),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            Dataset::from_csv("/no/such/data.csv"),
            Err(ServiceError::DatasetNotFound(_))
        ));
    }

    #[test]
    fn test_empty_cell_rejected_for_training() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(
            dir.path(),
            "data.csv",
            &format!("{HEADER}\n0.1,10,1,1,80\n0.2,,1,1,82\n"),
        );
        assert!(matches!(
            Dataset::from_csv(&path),
            Err(ServiceError::InvalidDataset(_))
        ));
    }

    #[test]
    fn test_cleaning_imputes_median_and_drops_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(
            dir.path(),
            "data.csv",
            &format!("{HEADER}\n0.1,10,1,1,80\n0.1,10,1,1,80\n0.3,,2,2,90\n0.2,30,1,1,70\n"),
        );

        let dataset = RawTable::from_csv(&path).unwrap().into_cleaned_dataset().unwrap();
        assert_eq!(dataset.len(), 3);
        // median of [10, 10, 30]
        assert_eq!(dataset.rows[1][1], 10.0);
    }
}
