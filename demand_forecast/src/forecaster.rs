//! Recursive multi-day forecasting
//!
//! Each step predicts one day ahead from the current feature row, then
//! synthesises the next row from that prediction: `Lag_1` takes the prediction,
//! `Lag_7` and `Lag_14` are read from history extended with the forecasts made
//! so far, and the rolling means advance by the configured [`RollingUpdate`].
//!
//! A failed step aborts the whole run. Points produced before the failure are
//! discarded so callers never see a truncated forecast.

use crate::config::{ForecastConfig, RollingUpdate};
use crate::error::{ForecastError, Result};
use crate::features::{FeatureRow, FeatureTable, MAX_LAG, MAX_WINDOW};
use crate::models::Regressor;
use chrono::{Days, NaiveDate};
use demand_math::lags::lagged_value;
use demand_math::moving_averages::{blended_mean, window_mean};
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tracing::{debug, info, warn};

/// One forecast day
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastPoint {
    /// Forecast date
    pub date: NaiveDate,
    /// Unrounded model output, fed back into the next step
    pub prediction: f64,
    /// Prediction rounded to whole units
    pub demand: f64,
    /// Confidence indicator in percent
    pub confidence: u32,
}

impl ForecastPoint {
    /// Weekday name, e.g. "Monday"
    pub fn weekday(&self) -> String {
        self.date.format("%A").to_string()
    }
}

/// Confidence for the `day`-th forecast day (1-based): 95% on day one,
/// two points less per further day, never below 50%
pub fn confidence_for_day(day: usize) -> u32 {
    let decay = day.saturating_sub(1).saturating_mul(2);
    95usize.saturating_sub(decay).max(50) as u32
}

/// Produces forecasts from a trained model and the latest feature row
#[derive(Debug)]
pub struct RecursiveForecaster<'a> {
    model: &'a dyn Regressor,
    last_row: FeatureRow,
    history: Vec<f64>,
    config: ForecastConfig,
}

impl<'a> RecursiveForecaster<'a> {
    /// Start from the table's last row, with history recovered by
    /// [`FeatureTable::demand_history`]
    pub fn new(model: &'a dyn Regressor, table: &FeatureTable, config: ForecastConfig) -> Result<Self> {
        let last_row = table
            .last_row()
            .cloned()
            .ok_or(ForecastError::InsufficientHistory {
                needed: 1,
                available: 0,
            })?;
        Self::from_parts(model, last_row, table.demand_history(), config)
    }

    /// Start from an explicit row and demand history; the last history value
    /// must be the demand of `last_row`'s day
    pub fn from_parts(
        model: &'a dyn Regressor,
        last_row: FeatureRow,
        history: Vec<f64>,
        config: ForecastConfig,
    ) -> Result<Self> {
        if history.is_empty() {
            return Err(ForecastError::InsufficientHistory {
                needed: 1,
                available: 0,
            });
        }
        if let Some(v) = history.iter().find(|v| !v.is_finite()) {
            return Err(ForecastError::ValidationError(format!(
                "History contains non-finite demand {}",
                v
            )));
        }

        Ok(Self {
            model,
            last_row,
            history,
            config,
        })
    }

    /// History length required before the first step
    fn required_history(&self) -> usize {
        match self.config.rolling {
            RollingUpdate::Blend => MAX_LAG,
            RollingUpdate::Exact => MAX_WINDOW - 1,
        }
    }

    /// Forecast `horizon` days after `anchor`, the date of the last observed row.
    ///
    /// A horizon of zero returns an empty forecast.
    pub fn forecast(&self, anchor: NaiveDate, horizon: usize) -> Result<Vec<ForecastPoint>> {
        if horizon > self.config.max_horizon {
            return Err(ForecastError::InvalidParameter(format!(
                "Horizon {} exceeds the maximum of {} days",
                horizon, self.config.max_horizon
            )));
        }
        if horizon == 0 {
            return Ok(Vec::new());
        }

        let needed = self.required_history();
        if self.history.len() < needed {
            return Err(ForecastError::InsufficientHistory {
                needed,
                available: self.history.len(),
            });
        }

        let n = self.history.len();
        let mut series = Vec::with_capacity(n + horizon);
        series.extend_from_slice(&self.history);

        let mut current = self.last_row.clone();
        let mut points: Vec<ForecastPoint> = Vec::with_capacity(horizon);

        for day in 1..=horizon {
            let step = self.step(&current, &mut series, anchor, day, n - 1 + day);
            let (point, next) = match step {
                Ok(result) => result,
                Err(e) => {
                    warn!(day, discarded = points.len(), error = %e, "forecast aborted");
                    return Err(e);
                }
            };

            debug!(day, date = %point.date, prediction = point.prediction, "forecast step");
            points.push(point);
            current = next;
        }

        info!(
            anchor = %anchor,
            horizon,
            rolling = ?self.config.rolling,
            "produced forecast"
        );
        Ok(points)
    }

    /// Predict one day from `current` and build the row for the next step.
    ///
    /// `index` is the position of this day in `series` once the prediction is appended.
    fn step(
        &self,
        current: &FeatureRow,
        series: &mut Vec<f64>,
        anchor: NaiveDate,
        day: usize,
        index: usize,
    ) -> Result<(ForecastPoint, FeatureRow)> {
        let prediction = self.model.predict(&current.features())?;
        if !prediction.is_finite() {
            return Err(ForecastError::InferenceError(format!(
                "Model returned non-finite prediction on day {}",
                day
            )));
        }
        series.push(prediction);

        let date = anchor.checked_add_days(Days::new(day as u64)).ok_or_else(|| {
            ForecastError::InvalidParameter(format!("Date {} + {} days is out of range", anchor, day))
        })?;

        let mut next = current.clone();
        next.set_date(date);
        next.demand = prediction;
        next.lag_1 = prediction;
        next.lag_7 = lagged_value(series, index, 7)?;
        next.lag_14 = lagged_value(series, index, MAX_LAG)?;

        match self.config.rolling {
            RollingUpdate::Blend => {
                next.rolling_mean_7 = blended_mean(current.rolling_mean_7, prediction, 7)?;
                next.rolling_mean_30 =
                    blended_mean(current.rolling_mean_30, prediction, MAX_WINDOW)?;
            }
            RollingUpdate::Exact => {
                next.rolling_mean_7 = window_mean(series, index, 7)?;
                next.rolling_mean_30 = window_mean(series, index, MAX_WINDOW)?;
            }
        }

        let point = ForecastPoint {
            date,
            prediction,
            demand: prediction.round(),
            confidence: confidence_for_day(day),
        };

        Ok((point, next))
    }
}

#[derive(Serialize)]
struct ForecastRecord {
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "Day")]
    day: String,
    #[serde(rename = "Demand")]
    demand: f64,
    #[serde(rename = "Confidence")]
    confidence: String,
}

/// Write forecast points as `Date,Day,Demand,Confidence` CSV
pub fn write_forecast<W: Write>(points: &[ForecastPoint], writer: W) -> Result<()> {
    let mut writer = csv::Writer::from_writer(writer);
    for point in points {
        writer.serialize(ForecastRecord {
            date: point.date.format("%Y-%m-%d").to_string(),
            day: point.weekday(),
            demand: point.demand,
            confidence: format!("{}%", point.confidence),
        })?;
    }
    writer.flush()?;
    Ok(())
}

/// Export forecast points to a CSV file
pub fn export_forecast<P: AsRef<Path>>(points: &[ForecastPoint], path: P) -> Result<()> {
    let file = File::create(path.as_ref())?;
    write_forecast(points, file)?;
    info!(path = %path.as_ref().display(), points = points.len(), "exported forecast");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidence_decreases_then_floors() {
        assert_eq!(confidence_for_day(1), 95);
        assert_eq!(confidence_for_day(2), 93);
        assert_eq!(confidence_for_day(23), 51);
        assert_eq!(confidence_for_day(24), 50);
        assert_eq!(confidence_for_day(30), 50);

        for day in 1..30 {
            assert!(confidence_for_day(day + 1) <= confidence_for_day(day));
        }
    }

    #[test]
    fn csv_export_layout() {
        let points = vec![ForecastPoint {
            date: NaiveDate::from_ymd_opt(2024, 5, 6).unwrap(),
            prediction: 1234.4,
            demand: 1234.0,
            confidence: 95,
        }];

        let mut buffer = Vec::new();
        write_forecast(&points, &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();

        assert_eq!(
            text,
            "Date,Day,Demand,Confidence\n2024-05-06,Monday,1234.0,95%\n"
        );
    }
}
