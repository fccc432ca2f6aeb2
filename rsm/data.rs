//! # Experiment Data Loading and Validation
//!
//! This module is the only entry point for experiment tables. It parses CSV bytes,
//! validates them against a fixed schema and converts the columns into the
//! `ndarray` vectors used by the fitter and the surface generator.
//!
//! - Strict Schema: column names are part of the contract and not configurable.
//!   The table must provide `time`, `temp`, `solvent`, `et_w`, `pg_w` and `gly_w`.
//!   Extra columns are ignored.
//! - All-or-nothing: any missing, non-numeric or non-finite value rejects the whole
//!   table. A partially parsed dataset is never handed to the fitter.
//! - Where the bytes come from (file, URL) is the job of `crate::source`.

use crate::coding::{Factor, RawFactors};
use crate::types::SolventSystem;
use ndarray::{Array1, ArrayView1};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io::Cursor;
use thiserror::Error;

/// Columns every experiment table must contain, in canonical order.
pub const REQUIRED_COLUMNS: [&str; 6] = ["time", "temp", "solvent", "et_w", "pg_w", "gly_w"];

/// Error raised while fetching or parsing experiment data.
#[derive(Error, Debug)]
pub enum DataSourceError {
    #[error("Error from the underlying Polars DataFrame library: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("IO error while reading '{source_id}': {error}")]
    IoError {
        source_id: String,
        #[source]
        error: std::io::Error,
    },
    #[error("Failed to fetch '{source_id}': {reason}")]
    FetchFailed { source_id: String, reason: String },
    #[error(
        "The required column '{0}' was not found in the experiment table. Please check spelling and case."
    )]
    ColumnNotFound(String),
    #[error(
        "The required column '{column_name}' could not be converted to the expected type '{expected_type}'. It contains non-numeric data. (Found type: {found_type})"
    )]
    ColumnWrongType {
        column_name: String,
        expected_type: &'static str,
        found_type: String,
    },
    #[error(
        "Missing or null values were found in the required column '{0}'. The experiment table must be complete."
    )]
    MissingValuesFound(String),
    #[error(
        "Non-finite values (NaN or Infinity) were found in the required column '{0}'. All values must be finite."
    )]
    NonFiniteValuesFound(String),
    #[error("The experiment table contains no data rows.")]
    EmptyDataset,
}

/// A single trial of the designed experiment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExperimentRecord {
    pub factors: RawFactors,
    pub et_w: f64,
    pub pg_w: f64,
    pub gly_w: f64,
}

impl ExperimentRecord {
    pub fn yield_for(&self, system: SolventSystem) -> f64 {
        match system {
            SolventSystem::Ethanol => self.et_w,
            SolventSystem::PropyleneGlycol => self.pg_w,
            SolventSystem::Glycerol => self.gly_w,
        }
    }
}

/// Closed interval spanned by a factor in the experiment table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FactorRange {
    pub min: f64,
    pub max: f64,
}

impl FactorRange {
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    /// `n` evenly spaced values from `min` to `max`, both ends included.
    pub fn linspace(&self, n: usize) -> Array1<f64> {
        Array1::linspace(self.min, self.max, n)
    }

    /// Integer bounds for a slider control: `(floor(min), floor(max))`.
    pub fn slider_bounds(&self) -> (i64, i64) {
        (self.min.floor() as i64, self.max.floor() as i64)
    }
}

/// Observed range of each raw factor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObservedRanges {
    pub time: FactorRange,
    pub temperature: FactorRange,
    pub solvent: FactorRange,
}

impl ObservedRanges {
    pub fn get(&self, factor: Factor) -> FactorRange {
        match factor {
            Factor::Time => self.time,
            Factor::Temperature => self.temperature,
            Factor::Solvent => self.solvent,
        }
    }
}

/// The validated experiment table, stored column-wise.
#[derive(Debug, Clone)]
pub struct ExperimentData {
    time: Array1<f64>,
    temperature: Array1<f64>,
    solvent: Array1<f64>,
    et_w: Array1<f64>,
    pg_w: Array1<f64>,
    gly_w: Array1<f64>,
    ranges: ObservedRanges,
}

impl ExperimentData {
    /// Builds a dataset from in-memory records, applying the same validation as
    /// the CSV path.
    pub fn from_records(records: &[ExperimentRecord]) -> Result<Self, DataSourceError> {
        fn column(
            records: &[ExperimentRecord],
            field: impl Fn(&ExperimentRecord) -> f64,
        ) -> Array1<f64> {
            records.iter().map(field).collect()
        }
        Self::from_columns(
            column(records, |r| r.factors.time),
            column(records, |r| r.factors.temperature),
            column(records, |r| r.factors.solvent),
            column(records, |r| r.et_w),
            column(records, |r| r.pg_w),
            column(records, |r| r.gly_w),
        )
    }

    fn from_columns(
        time: Array1<f64>,
        temperature: Array1<f64>,
        solvent: Array1<f64>,
        et_w: Array1<f64>,
        pg_w: Array1<f64>,
        gly_w: Array1<f64>,
    ) -> Result<Self, DataSourceError> {
        if time.is_empty() {
            return Err(DataSourceError::EmptyDataset);
        }
        let columns = [&time, &temperature, &solvent, &et_w, &pg_w, &gly_w];
        for (name, values) in REQUIRED_COLUMNS.iter().zip(columns) {
            if values.iter().any(|v| !v.is_finite()) {
                return Err(DataSourceError::NonFiniteValuesFound(name.to_string()));
            }
        }

        let ranges = ObservedRanges {
            time: range_of(time.view()),
            temperature: range_of(temperature.view()),
            solvent: range_of(solvent.view()),
        };

        Ok(Self {
            time,
            temperature,
            solvent,
            et_w,
            pg_w,
            gly_w,
            ranges,
        })
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    pub fn factor(&self, factor: Factor) -> ArrayView1<'_, f64> {
        match factor {
            Factor::Time => self.time.view(),
            Factor::Temperature => self.temperature.view(),
            Factor::Solvent => self.solvent.view(),
        }
    }

    /// The dependent column for a solvent system.
    pub fn response(&self, system: SolventSystem) -> ArrayView1<'_, f64> {
        match system {
            SolventSystem::Ethanol => self.et_w.view(),
            SolventSystem::PropyleneGlycol => self.pg_w.view(),
            SolventSystem::Glycerol => self.gly_w.view(),
        }
    }

    pub fn ranges(&self) -> &ObservedRanges {
        &self.ranges
    }

    pub fn record(&self, i: usize) -> Option<ExperimentRecord> {
        if i >= self.len() {
            return None;
        }
        Some(ExperimentRecord {
            factors: RawFactors::new(self.time[i], self.temperature[i], self.solvent[i]),
            et_w: self.et_w[i],
            pg_w: self.pg_w[i],
            gly_w: self.gly_w[i],
        })
    }

    /// Raw conditions of every trial, in table order.
    pub fn raw_factors(&self) -> Vec<RawFactors> {
        (0..self.len())
            .map(|i| RawFactors::new(self.time[i], self.temperature[i], self.solvent[i]))
            .collect()
    }
}

fn range_of(values: ArrayView1<f64>) -> FactorRange {
    let min = values.iter().fold(f64::INFINITY, |a, &b| a.min(b));
    let max = values.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));
    FactorRange { min, max }
}

/// Parses and validates an experiment table held in memory.
pub fn parse_experiment_csv(bytes: Vec<u8>) -> Result<ExperimentData, DataSourceError> {
    let df = CsvReader::new(Cursor::new(bytes))
        .with_options(
            CsvReadOptions::default()
                .with_has_header(true)
                .with_parse_options(CsvParseOptions::default().with_separator(b',')),
        )
        .finish()?;
    internal::validate_frame(df)
}

mod internal {
    use super::*;

    pub(super) fn validate_frame(df: DataFrame) -> Result<ExperimentData, DataSourceError> {
        let columns_set: HashSet<String> = df
            .get_column_names()
            .into_iter()
            .map(|s| s.to_string())
            .collect();

        for col_name in REQUIRED_COLUMNS {
            if !columns_set.contains(col_name) {
                return Err(DataSourceError::ColumnNotFound(col_name.to_string()));
            }
        }

        if df.height() == 0 {
            return Err(DataSourceError::EmptyDataset);
        }

        log::debug!(
            "Experiment table has {} rows; all required columns found: {:?}",
            df.height(),
            REQUIRED_COLUMNS
        );

        let column = |name: &str| extract_numeric_column(&df, name).map(Array1::from_vec);

        ExperimentData::from_columns(
            column("time")?,
            column("temp")?,
            column("solvent")?,
            column("et_w")?,
            column("pg_w")?,
            column("gly_w")?,
        )
    }

    fn extract_numeric_column(
        df: &DataFrame,
        column_name: &str,
    ) -> Result<Vec<f64>, DataSourceError> {
        let series = df.column(column_name)?;
        if series.null_count() > 0 {
            return Err(DataSourceError::MissingValuesFound(column_name.to_string()));
        }

        let casted = match series.cast(&DataType::Float64) {
            Ok(casted) => casted,
            Err(_) => {
                return Err(DataSourceError::ColumnWrongType {
                    column_name: column_name.to_string(),
                    expected_type: "f64 (numeric)",
                    found_type: format!("{:?}", series.dtype()),
                });
            }
        };

        if casted.null_count() > 0 {
            return Err(DataSourceError::ColumnWrongType {
                column_name: column_name.to_string(),
                expected_type: "f64 (numeric)",
                found_type: format!("{:?}", series.dtype()),
            });
        }

        let chunked = casted.f64()?.rechunk();
        let values: Vec<f64> = chunked.into_no_null_iter().collect();
        if values.iter().any(|v| !v.is_finite()) {
            return Err(DataSourceError::NonFiniteValuesFound(column_name.to_string()));
        }
        Ok(values)
    }
}
