//! Key demand figures for a feature table

use crate::error::{ForecastError, Result};
use crate::features::FeatureTable;
use demand_math::{mean, peak};
use serde::Serialize;

/// Headline numbers shown next to a forecast
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DemandSummary {
    /// Demand on the latest day
    pub current: f64,
    /// Trailing 7-day average on the latest day
    pub average_7: f64,
    /// Trailing 30-day average on the latest day
    pub average_30: f64,
    /// Mean demand over the whole table
    pub mean: f64,
    /// Highest demand in the table
    pub peak: f64,
    /// Number of rows summarised
    pub days: usize,
}

impl DemandSummary {
    pub fn from_table(table: &FeatureTable) -> Result<Self> {
        let last = table
            .last_row()
            .ok_or_else(|| ForecastError::DataError("Feature table is empty".to_string()))?;
        let demand = table.demand_values();

        Ok(Self {
            current: last.demand,
            average_7: last.rolling_mean_7,
            average_30: last.rolling_mean_30,
            // Non-empty, checked above
            mean: mean(&demand).unwrap_or(last.demand),
            peak: peak(&demand).unwrap_or(last.demand),
            days: demand.len(),
        })
    }
}

impl std::fmt::Display for DemandSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Key Daily Metrics ({} days):", self.days)?;
        writeln!(f, "  Current Daily Demand: {:.0}", self.current)?;
        writeln!(f, "  7-Day Average:        {:.0}", self.average_7)?;
        writeln!(f, "  30-Day Average:       {:.0}", self.average_30)?;
        writeln!(f, "  Mean Demand:          {:.0}", self.mean)?;
        writeln!(f, "  Peak Demand:          {:.0}", self.peak)?;
        Ok(())
    }
}
