//! Feature engineering for daily demand
//!
//! Turns a dated demand series into a supervised-learning table of calendar,
//! lag and rolling-mean features. The date itself is dropped from the output,
//! and rows whose lookback values are undefined never make it into the table.

use crate::data::DemandData;
use crate::error::{ForecastError, Result};
use chrono::{Datelike, NaiveDate};
use demand_math::lags::lag;
use demand_math::moving_averages::rolling_mean;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const DAY_OF_WEEK: &str = "Day_of_Week";
pub const MONTH: &str = "Month";
pub const LAG_1: &str = "Lag_1";
pub const LAG_7: &str = "Lag_7";
pub const LAG_14: &str = "Lag_14";
pub const ROLLING_MEAN_7: &str = "RollingMean_7";
pub const ROLLING_MEAN_30: &str = "RollingMean_30";

/// Derived columns, in table order
pub const DERIVED_COLUMNS: [&str; 7] = [
    DAY_OF_WEEK,
    MONTH,
    LAG_1,
    LAG_7,
    LAG_14,
    ROLLING_MEAN_7,
    ROLLING_MEAN_30,
];

/// Longest lag used by any feature
pub const MAX_LAG: usize = 14;

/// Longest rolling window used by any feature
pub const MAX_WINDOW: usize = 30;

/// One fully populated, model-ready row
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    /// Covariates carried over from the raw record
    pub covariates: Vec<f64>,
    /// Target demand
    pub demand: f64,
    /// 0 = Monday .. 6 = Sunday
    pub day_of_week: u32,
    /// 1..=12
    pub month: u32,
    pub lag_1: f64,
    pub lag_7: f64,
    pub lag_14: f64,
    pub rolling_mean_7: f64,
    pub rolling_mean_30: f64,
}

impl FeatureRow {
    /// Model inputs: covariates followed by derived features, target excluded
    pub fn features(&self) -> Vec<f64> {
        let mut values = Vec::with_capacity(self.covariates.len() + DERIVED_COLUMNS.len());
        values.extend_from_slice(&self.covariates);
        values.extend_from_slice(&[
            self.day_of_week as f64,
            self.month as f64,
            self.lag_1,
            self.lag_7,
            self.lag_14,
            self.rolling_mean_7,
            self.rolling_mean_30,
        ]);
        values
    }

    /// Replace the calendar fields with those of `date`
    pub fn set_date(&mut self, date: NaiveDate) {
        self.day_of_week = day_of_week(date);
        self.month = date.month();
    }
}

/// Day of week with Monday as 0
pub fn day_of_week(date: NaiveDate) -> u32 {
    date.weekday().num_days_from_monday()
}

/// Feature table with its column schema
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    target_name: String,
    covariate_names: Vec<String>,
    rows: Vec<FeatureRow>,
}

impl FeatureTable {
    /// Create a table, checking every row against the covariate schema
    pub fn new(
        target_name: String,
        covariate_names: Vec<String>,
        rows: Vec<FeatureRow>,
    ) -> Result<Self> {
        if let Some(row) = rows
            .iter()
            .find(|row| row.covariates.len() != covariate_names.len())
        {
            return Err(ForecastError::DataError(format!(
                "Feature row has {} covariates, expected {}",
                row.covariates.len(),
                covariate_names.len()
            )));
        }

        Ok(Self {
            target_name,
            covariate_names,
            rows,
        })
    }

    /// Name of the target column
    pub fn target_name(&self) -> &str {
        &self.target_name
    }

    /// Covariate column names
    pub fn covariate_names(&self) -> &[String] {
        &self.covariate_names
    }

    /// Ordered model input names, matching `FeatureRow::features`
    pub fn feature_names(&self) -> Vec<String> {
        self.covariate_names
            .iter()
            .cloned()
            .chain(DERIVED_COLUMNS.iter().map(|c| c.to_string()))
            .collect()
    }

    /// All rows, oldest first
    pub fn rows(&self) -> &[FeatureRow] {
        &self.rows
    }

    /// Most recent row
    pub fn last_row(&self) -> Option<&FeatureRow> {
        self.rows.last()
    }

    /// Target values, oldest first
    pub fn demand_values(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.demand).collect()
    }

    /// Longest contiguous daily demand series ending at the last row.
    ///
    /// Rows are consecutive days, so the lag columns of the earliest rows
    /// recover up to `MAX_LAG` days that precede the table.
    pub fn demand_history(&self) -> Vec<f64> {
        let mut known: BTreeMap<i64, f64> = BTreeMap::new();
        for (j, row) in self.rows.iter().enumerate() {
            let j = j as i64;
            known.insert(j - MAX_LAG as i64, row.lag_14);
            known.insert(j - 7, row.lag_7);
            known.insert(j - 1, row.lag_1);
        }
        // Observed demand wins over values recovered from lags
        for (j, row) in self.rows.iter().enumerate() {
            known.insert(j as i64, row.demand);
        }

        let mut history = Vec::new();
        let mut idx = self.rows.len() as i64 - 1;
        while let Some(value) = known.get(&idx) {
            history.push(*value);
            idx -= 1;
        }
        history.reverse();
        history
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Load a table previously written by `to_csv`
    pub fn from_csv<P: AsRef<Path>>(path: P, target_name: &str) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let table = Self::from_reader(file, target_name)?;
        info!(path = %path.as_ref().display(), rows = table.len(), "loaded feature table");
        Ok(table)
    }

    /// Read a table from CSV; every column that is neither the target nor a
    /// derived feature is treated as a covariate
    pub fn from_reader<R: Read>(reader: R, target_name: &str) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);
        let headers = reader.headers()?.clone();

        let position = |name: &str| headers.iter().position(|h| h == name);

        let target_idx = position(target_name).ok_or_else(|| {
            ForecastError::DataError(format!("Target column '{}' not found", target_name))
        })?;
        let mut derived_idx = [0usize; DERIVED_COLUMNS.len()];
        for (slot, name) in derived_idx.iter_mut().zip(DERIVED_COLUMNS) {
            *slot = position(name).ok_or_else(|| {
                ForecastError::DataError(format!("Feature column '{}' not found", name))
            })?;
        }

        let covariate_columns: Vec<(usize, String)> = headers
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != target_idx && !derived_idx.contains(i))
            .map(|(i, name)| (i, name.to_string()))
            .collect();

        let mut rows = Vec::new();
        for (row, result) in reader.records().enumerate() {
            let record = result?;
            let line = row + 2;
            let value = |idx: usize| -> Result<f64> {
                let raw = record.get(idx).unwrap_or_default();
                raw.parse::<f64>().map_err(|_| {
                    ForecastError::ValidationError(format!(
                        "line {}: column '{}' has non-numeric value '{}'",
                        line,
                        &headers[idx],
                        raw
                    ))
                })
            };

            let covariates = covariate_columns
                .iter()
                .map(|(idx, _)| value(*idx))
                .collect::<Result<Vec<_>>>()?;

            let day_of_week = calendar_value(value(derived_idx[0])?, 0, 6, DAY_OF_WEEK, line)?;
            let month = calendar_value(value(derived_idx[1])?, 1, 12, MONTH, line)?;

            rows.push(FeatureRow {
                covariates,
                demand: value(target_idx)?,
                day_of_week,
                month,
                lag_1: value(derived_idx[2])?,
                lag_7: value(derived_idx[3])?,
                lag_14: value(derived_idx[4])?,
                rolling_mean_7: value(derived_idx[5])?,
                rolling_mean_30: value(derived_idx[6])?,
            });
        }

        Self::new(
            target_name.to_string(),
            covariate_columns.into_iter().map(|(_, name)| name).collect(),
            rows,
        )
    }

    /// Write the table as CSV: covariates, target, then derived columns
    pub fn to_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path.as_ref())?;
        self.to_writer(file)?;
        info!(path = %path.as_ref().display(), rows = self.len(), "wrote feature table");
        Ok(())
    }

    /// Write the table as CSV to any sink
    pub fn to_writer<W: Write>(&self, writer: W) -> Result<()> {
        let mut writer = csv::Writer::from_writer(writer);

        let mut header: Vec<&str> = self.covariate_names.iter().map(String::as_str).collect();
        header.push(&self.target_name);
        header.extend(DERIVED_COLUMNS);
        writer.write_record(&header)?;

        for row in &self.rows {
            let mut record: Vec<String> = row.covariates.iter().map(|v| v.to_string()).collect();
            record.push(row.demand.to_string());
            record.push(row.day_of_week.to_string());
            record.push(row.month.to_string());
            for v in [
                row.lag_1,
                row.lag_7,
                row.lag_14,
                row.rolling_mean_7,
                row.rolling_mean_30,
            ] {
                record.push(v.to_string());
            }
            writer.write_record(&record)?;
        }

        writer.flush()?;
        Ok(())
    }
}

/// Facts about a written feature table that its CSV does not carry.
///
/// Stored next to the table as `<name>.meta.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableMetadata {
    /// Target column of the table
    pub target: String,
    /// Date of the last row
    pub last_date: NaiveDate,
    /// Number of rows written
    pub rows: usize,
}

impl TableMetadata {
    pub fn new(table: &FeatureTable, last_date: NaiveDate) -> Self {
        Self {
            target: table.target_name().to_string(),
            last_date,
            rows: table.len(),
        }
    }

    /// Location of the metadata file for the table at `table_path`
    pub fn sidecar_path(table_path: &Path) -> PathBuf {
        table_path.with_extension("meta.json")
    }

    /// Write the metadata next to the table at `table_path`
    pub fn save(&self, table_path: &Path) -> Result<()> {
        let path = Self::sidecar_path(table_path);
        serde_json::to_writer_pretty(File::create(&path)?, self)?;
        info!(path = %path.display(), last_date = %self.last_date, "wrote table metadata");
        Ok(())
    }

    /// Read the metadata for the table at `table_path`; `None` when no file exists
    pub fn load(table_path: &Path) -> Result<Option<Self>> {
        let path = Self::sidecar_path(table_path);
        if !path.exists() {
            return Ok(None);
        }
        let metadata = serde_json::from_reader(File::open(&path)?)?;
        Ok(Some(metadata))
    }

    /// Fail unless the metadata describes `table`
    pub fn check(&self, table: &FeatureTable) -> Result<()> {
        if self.target != table.target_name() || self.rows != table.len() {
            return Err(ForecastError::DataError(format!(
                "Table metadata ({} rows of '{}') does not match the table ({} rows of '{}')",
                self.rows,
                self.target,
                table.len(),
                table.target_name()
            )));
        }
        Ok(())
    }
}

fn calendar_value(value: f64, min: u32, max: u32, column: &str, line: usize) -> Result<u32> {
    if value.fract() != 0.0 || value < min as f64 || value > max as f64 {
        return Err(ForecastError::ValidationError(format!(
            "line {}: column '{}' must be an integer in {}..={}, got {}",
            line, column, min, max, value
        )));
    }
    Ok(value as u32)
}

/// Builds feature tables from demand data
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureBuilder;

impl FeatureBuilder {
    /// Derive calendar, lag and rolling-mean features.
    ///
    /// Records are stably sorted by date first. The first `MAX_WINDOW - 1`
    /// rows lack a full 30-day window and are dropped, so fewer than
    /// `MAX_WINDOW` records produce an empty table rather than an error.
    pub fn build(&self, data: &DemandData) -> Result<FeatureTable> {
        let mut records = data.records().to_vec();
        records.sort_by_key(|r| r.date);

        let demand: Vec<f64> = records.iter().map(|r| r.demand).collect();
        let lag_1 = lag(&demand, 1);
        let lag_7 = lag(&demand, 7);
        let lag_14 = lag(&demand, MAX_LAG);
        let mean_7 = rolling_mean(&demand, 7)?;
        let mean_30 = rolling_mean(&demand, MAX_WINDOW)?;

        let rows: Vec<FeatureRow> = records
            .iter()
            .enumerate()
            .filter_map(|(i, record)| {
                Some(FeatureRow {
                    covariates: record.covariates.clone(),
                    demand: record.demand,
                    day_of_week: day_of_week(record.date),
                    month: record.date.month(),
                    lag_1: lag_1[i]?,
                    lag_7: lag_7[i]?,
                    lag_14: lag_14[i]?,
                    rolling_mean_7: mean_7[i]?,
                    rolling_mean_30: mean_30[i]?,
                })
            })
            .collect();

        if rows.is_empty() {
            warn!(
                records = records.len(),
                needed = MAX_WINDOW,
                "not enough history for any complete feature row"
            );
        } else {
            info!(records = records.len(), rows = rows.len(), "built feature table");
        }

        FeatureTable::new(
            data.target_name().to_string(),
            data.covariate_names().to_vec(),
            rows,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn series(values: &[f64]) -> DemandData {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let dates = (0..values.len())
            .map(|i| start + Duration::days(i as i64))
            .collect();
        DemandData::from_values(dates, values.to_vec()).unwrap()
    }

    #[test]
    fn drops_rows_without_full_window() {
        let values: Vec<f64> = (0..35).map(|i| i as f64).collect();
        let table = FeatureBuilder.build(&series(&values)).unwrap();
        assert_eq!(table.len(), 35 - (MAX_WINDOW - 1));

        // First surviving row is index 29
        let first = &table.rows()[0];
        assert_eq!(first.demand, 29.0);
        assert_eq!(first.lag_1, 28.0);
        assert_eq!(first.lag_7, 22.0);
        assert_eq!(first.lag_14, 15.0);
        assert_eq!(first.rolling_mean_7, 26.0);
        assert_eq!(first.rolling_mean_30, 14.5);
    }

    #[test]
    fn short_series_yields_empty_table() {
        let table = FeatureBuilder.build(&series(&[10.0; 29])).unwrap();
        assert!(table.is_empty());
        assert!(table.last_row().is_none());
    }

    #[test]
    fn calendar_fields_follow_dates() {
        let table = FeatureBuilder.build(&series(&[1.0; 30])).unwrap();
        // 2024-01-30 is a Tuesday
        assert_eq!(table.rows()[0].day_of_week, 1);
        assert_eq!(table.rows()[0].month, 1);
    }

    #[test]
    fn history_is_recovered_from_lags() {
        let values: Vec<f64> = (0..40).map(|i| i as f64).collect();
        let table = FeatureBuilder.build(&series(&values)).unwrap();
        assert_eq!(table.len(), 11);

        // 11 observed rows plus 14 days recovered before the first one
        let expected: Vec<f64> = (15..40).map(|i| i as f64).collect();
        assert_eq!(table.demand_history(), expected);
    }

    #[test]
    fn metadata_sits_next_to_the_table() {
        let dir = tempfile::tempdir().unwrap();
        let table_path = dir.path().join("features.csv");
        assert_eq!(
            TableMetadata::sidecar_path(&table_path),
            dir.path().join("features.meta.json")
        );
        assert_eq!(TableMetadata::load(&table_path).unwrap(), None);

        let data = series(&[7.0; 32]);
        let table = FeatureBuilder.build(&data).unwrap();
        let metadata = TableMetadata::new(&table, data.last_date().unwrap());
        metadata.save(&table_path).unwrap();

        let loaded = TableMetadata::load(&table_path).unwrap().unwrap();
        assert_eq!(loaded, metadata);
        assert_eq!(loaded.last_date, NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        assert!(loaded.check(&table).is_ok());

        let shorter = FeatureBuilder.build(&series(&[7.0; 31])).unwrap();
        assert!(matches!(loaded.check(&shorter), Err(ForecastError::DataError(_))));
    }

    #[test]
    fn feature_names_match_row_layout() {
        let table = FeatureBuilder.build(&series(&[5.0; 31])).unwrap();
        let names = table.feature_names();
        let values = table.rows()[0].features();
        assert_eq!(names.len(), values.len());
        assert_eq!(names[0], DAY_OF_WEEK);
        assert_eq!(names.last().map(String::as_str), Some(ROLLING_MEAN_30));
    }
}
