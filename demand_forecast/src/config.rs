//! Pipeline configuration
//!
//! Every field has a default, so an empty JSON
//! object (or no file at all) yields a usable configuration.

use crate::error::{ForecastError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Column names in the raw input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DataConfig {
    /// Name of the date column
    pub date_column: String,
    /// Name of the demand (target) column
    pub target_column: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            date_column: "Date".to_string(),
            target_column: "Gasoline_Demand".to_string(),
        }
    }
}

/// Train/test split and Random Forest hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrainingConfig {
    /// Share of rows held out for evaluation
    pub test_fraction: f64,
    /// Seed for the split shuffle and bootstrap sampling
    pub seed: u64,
    /// Number of trees in the forest
    pub n_estimators: usize,
    /// Maximum tree depth; unlimited when `None`
    pub max_depth: Option<usize>,
    /// Minimum number of samples required to split a node
    pub min_samples_split: usize,
    /// Minimum number of samples in each leaf
    pub min_samples_leaf: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            test_fraction: 0.2,
            seed: 42,
            n_estimators: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
        }
    }
}

/// How rolling means are advanced during recursive forecasting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RollingUpdate {
    /// `(old * (w - 1) + prediction) / w`, the oldest value is never evicted
    #[default]
    Blend,
    /// Recompute from history extended with the forecasts produced so far
    Exact,
}

/// Recursive forecast settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ForecastConfig {
    /// Largest accepted horizon in days
    pub max_horizon: usize,
    /// Rolling mean update rule
    pub rolling: RollingUpdate,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            max_horizon: 30,
            rolling: RollingUpdate::Blend,
        }
    }
}

/// Complete pipeline configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub data: DataConfig,
    pub training: TrainingConfig,
    pub forecast: ForecastConfig,
}

impl PipelineConfig {
    /// Load and validate a configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        if self.data.date_column.is_empty() || self.data.target_column.is_empty() {
            return Err(ForecastError::InvalidParameter(
                "Column names must not be empty".to_string(),
            ));
        }
        if self.data.date_column == self.data.target_column {
            return Err(ForecastError::InvalidParameter(
                "Date and target columns must differ".to_string(),
            ));
        }

        let t = &self.training;
        if !(t.test_fraction > 0.0 && t.test_fraction < 1.0) {
            return Err(ForecastError::InvalidParameter(format!(
                "test_fraction must be in (0, 1), got {}",
                t.test_fraction
            )));
        }
        if t.n_estimators == 0 {
            return Err(ForecastError::InvalidParameter(
                "n_estimators must be positive".to_string(),
            ));
        }
        if t.min_samples_split < 2 {
            return Err(ForecastError::InvalidParameter(
                "min_samples_split must be at least 2".to_string(),
            ));
        }
        if t.min_samples_leaf == 0 {
            return Err(ForecastError::InvalidParameter(
                "min_samples_leaf must be positive".to_string(),
            ));
        }
        if t.max_depth == Some(0) {
            return Err(ForecastError::InvalidParameter(
                "max_depth must be positive when set".to_string(),
            ));
        }

        if self.forecast.max_horizon == 0 {
            return Err(ForecastError::InvalidParameter(
                "max_horizon must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = PipelineConfig::default();
        assert_eq!(config.data.target_column, "Gasoline_Demand");
        assert_eq!(config.training.seed, 42);
        assert_eq!(config.training.n_estimators, 100);
        assert_eq!(config.forecast.max_horizon, 30);
        assert_eq!(config.forecast.rolling, RollingUpdate::Blend);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{"forecast": {"rolling": "exact"}}"#).unwrap();
        assert_eq!(config.forecast.rolling, RollingUpdate::Exact);
        assert_eq!(config.forecast.max_horizon, 30);
        assert_eq!(config.data, DataConfig::default());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let parsed: std::result::Result<PipelineConfig, _> =
            serde_json::from_str(r#"{"training": {"trees": 10}}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn validation_catches_bad_ranges() {
        let mut config = PipelineConfig::default();
        config.training.test_fraction = 0.0;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.training.min_samples_split = 1;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.data.target_column = "Date".to_string();
        assert!(config.validate().is_err());
    }
}
