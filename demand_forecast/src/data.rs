//! Raw daily demand data handling

use crate::config::DataConfig;
use crate::error::{ForecastError, Result};
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::info;

/// Date formats accepted in the date column, tried in order
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d.%m.%Y"];

/// Datetime formats whose date part is kept
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// One day of observed demand
#[derive(Debug, Clone, PartialEq)]
pub struct DemandRecord {
    /// Observation date
    pub date: NaiveDate,
    /// Demand quantity for the day
    pub demand: f64,
    /// Exogenous covariates, aligned with `DemandData::covariate_names`
    pub covariates: Vec<f64>,
}

/// A validated demand series with its covariate schema
#[derive(Debug, Clone, PartialEq)]
pub struct DemandData {
    /// Name of the demand column
    target_name: String,
    /// Names of the covariate columns, in input order
    covariate_names: Vec<String>,
    /// Records in input order
    records: Vec<DemandRecord>,
}

/// Data loader for raw demand files
#[derive(Debug)]
pub struct DataLoader;

impl DataLoader {
    /// Load demand data from a CSV file
    pub fn from_csv<P: AsRef<Path>>(path: P, config: &DataConfig) -> Result<DemandData> {
        let file = File::open(path.as_ref())?;
        let data = Self::from_reader(file, config)?;
        info!(
            path = %path.as_ref().display(),
            rows = data.len(),
            covariates = data.covariate_names().len(),
            "loaded demand data"
        );
        Ok(data)
    }

    /// Load demand data from any CSV source with a header row
    pub fn from_reader<R: Read>(reader: R, config: &DataConfig) -> Result<DemandData> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);
        let headers = reader.headers()?.clone();

        let date_idx = find_column(&headers, &config.date_column)?;
        let target_idx = find_column(&headers, &config.target_column)?;

        let covariate_columns: Vec<(usize, String)> = headers
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != date_idx && *i != target_idx)
            .map(|(i, name)| (i, name.to_string()))
            .collect();

        let mut records = Vec::new();
        for (row, result) in reader.records().enumerate() {
            let record = result?;
            // Header is line 1
            let line = row + 2;

            let date = parse_date(field(&record, date_idx, line)?)
                .map_err(|e| ForecastError::ValidationError(format!("line {}: {}", line, e)))?;
            let demand = parse_number(field(&record, target_idx, line)?, &config.target_column, line)?;

            let mut covariates = Vec::with_capacity(covariate_columns.len());
            for (idx, name) in &covariate_columns {
                covariates.push(parse_number(field(&record, *idx, line)?, name, line)?);
            }

            records.push(DemandRecord {
                date,
                demand,
                covariates,
            });
        }

        DemandData::new(
            config.target_column.clone(),
            covariate_columns.into_iter().map(|(_, name)| name).collect(),
            records,
        )
    }
}

impl DemandData {
    /// Create a demand series, validating that it is non-empty, has no duplicate
    /// dates and that every record matches the covariate schema
    pub fn new(
        target_name: String,
        covariate_names: Vec<String>,
        records: Vec<DemandRecord>,
    ) -> Result<Self> {
        if records.is_empty() {
            return Err(ForecastError::ValidationError(
                "Demand data contains no rows".to_string(),
            ));
        }

        let mut seen = HashSet::with_capacity(records.len());
        for record in &records {
            if !seen.insert(record.date) {
                return Err(ForecastError::ValidationError(format!(
                    "Duplicate date {}",
                    record.date
                )));
            }
            if record.covariates.len() != covariate_names.len() {
                return Err(ForecastError::DataError(format!(
                    "Record for {} has {} covariates, expected {}",
                    record.date,
                    record.covariates.len(),
                    covariate_names.len()
                )));
            }
            if !record.demand.is_finite() {
                return Err(ForecastError::ValidationError(format!(
                    "Demand for {} is not a finite number",
                    record.date
                )));
            }
        }

        Ok(Self {
            target_name,
            covariate_names,
            records,
        })
    }

    /// Create a covariate-free series from dates and demand values (for testing)
    pub fn from_values(dates: Vec<NaiveDate>, values: Vec<f64>) -> Result<Self> {
        if dates.len() != values.len() {
            return Err(ForecastError::DataError(format!(
                "Got {} dates but {} demand values",
                dates.len(),
                values.len()
            )));
        }

        let records = dates
            .into_iter()
            .zip(values)
            .map(|(date, demand)| DemandRecord {
                date,
                demand,
                covariates: Vec::new(),
            })
            .collect();

        Self::new(DataConfig::default().target_column, Vec::new(), records)
    }

    /// Name of the demand column
    pub fn target_name(&self) -> &str {
        &self.target_name
    }

    /// Names of the covariate columns
    pub fn covariate_names(&self) -> &[String] {
        &self.covariate_names
    }

    /// Records in input order
    pub fn records(&self) -> &[DemandRecord] {
        &self.records
    }

    /// Latest observed date
    pub fn last_date(&self) -> Option<NaiveDate> {
        self.records.iter().map(|r| r.date).max()
    }

    /// Get the length of the series
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if the series is empty
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Parse a date string in one of the accepted formats
pub fn parse_date(value: &str) -> Result<NaiveDate> {
    let value = value.trim();

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            return Ok(date);
        }
    }
    for format in DATETIME_FORMATS {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(datetime.date());
        }
    }

    Err(ForecastError::ValidationError(format!(
        "Unparseable date '{}'",
        value
    )))
}

fn find_column(headers: &csv::StringRecord, name: &str) -> Result<usize> {
    headers.iter().position(|h| h == name).ok_or_else(|| {
        ForecastError::DataError(format!("Required column '{}' not found", name))
    })
}

fn field<'a>(record: &'a csv::StringRecord, idx: usize, line: usize) -> Result<&'a str> {
    record.get(idx).ok_or_else(|| {
        ForecastError::DataError(format!("line {}: missing field {}", line, idx + 1))
    })
}

fn parse_number(value: &str, column: &str, line: usize) -> Result<f64> {
    let parsed: f64 = value.parse().map_err(|_| {
        ForecastError::ValidationError(format!(
            "line {}: column '{}' has non-numeric value '{}'",
            line, column, value
        ))
    })?;

    if !parsed.is_finite() {
        return Err(ForecastError::ValidationError(format!(
            "line {}: column '{}' has non-finite value '{}'",
            line, column, value
        )));
    }

    Ok(parsed)
}
