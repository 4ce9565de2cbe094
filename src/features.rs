//! Process parameters fed to the viability models.
//!
//! The column order here is the order the scaler is fitted on, so every row
//! handed to a scaler or model is built through [`FeatureVector::to_row`] or the
//! dataset reader, both of which follow [`FEATURES`].

use crate::error::{Result, ServiceError};
use serde::{Deserialize, Serialize};

/// Description of one input feature
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureSpec {
    /// Request field name
    pub field: &'static str,
    /// Dataset column name
    pub column: &'static str,
    /// Inclusive lower bound
    pub min: f64,
    /// Inclusive upper bound
    pub max: f64,
}

impl FeatureSpec {
    pub fn check(&self, value: f64) -> Result<()> {
        if value >= self.min && value <= self.max {
            Ok(())
        } else {
            Err(ServiceError::out_of_range(self.field, self.min, self.max))
        }
    }
}

pub const FEATURE_COUNT: usize = 4;

/// Features in scaler column order
pub const FEATURES: [FeatureSpec; FEATURE_COUNT] = [
    FeatureSpec {
        field: "pc_mxene_loading",
        column: "MXene (mg/mL)",
        min: 0.0,
        max: 0.3,
    },
    FeatureSpec {
        field: "laminin_peptide_loading",
        column: "Laminin peptide (ug/mL)",
        min: 0.0,
        max: 150.0,
    },
    FeatureSpec {
        field: "stimulation_frequency",
        column: "Electric stimulation (Hz)",
        min: 0.0,
        max: 3.0,
    },
    FeatureSpec {
        field: "applied_voltage",
        column: "Voltage (V)",
        min: 0.0,
        max: 3.0,
    },
];

/// Regression target column
pub const TARGET_COLUMN: &str = "Cell viability (%)";

/// Dataset column names in scaler order
pub fn feature_columns() -> Vec<String> {
    FEATURES.iter().map(|f| f.column.to_string()).collect()
}

/// One set of process parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub pc_mxene_loading: f64,
    pub laminin_peptide_loading: f64,
    pub stimulation_frequency: f64,
    pub applied_voltage: f64,
}

impl FeatureVector {
    /// Build from a row in [`FEATURES`] order
    pub fn from_row(row: [f64; FEATURE_COUNT]) -> Self {
        Self {
            pc_mxene_loading: row[0],
            laminin_peptide_loading: row[1],
            stimulation_frequency: row[2],
            applied_voltage: row[3],
        }
    }

    /// Values in [`FEATURES`] order
    pub fn to_row(&self) -> [f64; FEATURE_COUNT] {
        [
            self.pc_mxene_loading,
            self.laminin_peptide_loading,
            self.stimulation_frequency,
            self.applied_voltage,
        ]
    }

    /// Check every value against its declared range, first failure wins
    pub fn validate(&self) -> Result<()> {
        FEATURES
            .iter()
            .zip(self.to_row())
            .try_for_each(|(spec, value)| spec.check(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> FeatureVector {
        FeatureVector {
            pc_mxene_loading: 0.15,
            laminin_peptide_loading: 75.0,
            stimulation_frequency: 1.5,
            applied_voltage: 1.5,
        }
    }

    #[test]
    fn test_row_order_matches_columns() {
        let row = sample().to_row();
        assert_eq!(row, [0.15, 75.0, 1.5, 1.5]);
        assert_eq!(FeatureVector::from_row(row), sample());
        assert_eq!(feature_columns()[0], "MXene (mg/mL)");
        assert_eq!(feature_columns()[3], "Voltage (V)");
    }

    #[test]
    fn test_validate_accepts_bounds() {
        let mut v = sample();
        v.pc_mxene_loading = 0.3;
        v.laminin_peptide_loading = 0.0;
        assert!(v.validate().is_ok());
    }

    #[test]
    fn test_validate_names_field_and_bound() {
        let mut v = sample();
        v.pc_mxene_loading = 5.0;
        let err = v.validate().unwrap_err();
        assert_eq!(err.to_string(), "pc_mxene_loading must be between 0 and 0.3");

        let mut v = sample();
        v.applied_voltage = -0.1;
        let err = v.validate().unwrap_err();
        assert!(err.to_string().starts_with("applied_voltage"));
    }
}
