//! # Fuel Demand
//!
//! Workspace facade re-exporting the demand math primitives and the
//! forecasting pipeline.
//!
//! ## Example
//!
//! ```
//! use fuel_demand_workspace::forecast::forecaster::confidence_for_day;
//! use fuel_demand_workspace::math::moving_averages::blended_mean;
//!
//! assert_eq!(confidence_for_day(1), 95);
//! assert_eq!(blended_mean(1000.0, 1000.0, 7).unwrap(), 1000.0);
//! ```

pub use demand_forecast as forecast;
pub use demand_math as math;

pub use demand_forecast::{
    DataLoader, FeatureBuilder, FeatureTable, ForecastError, ForecastPoint, ModelArtifact,
    PipelineConfig, RecursiveForecaster, Regressor, Trainer,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reexports_share_types() {
        let config = PipelineConfig::default();
        assert_eq!(config, forecast::PipelineConfig::default());
        assert_eq!(math::mean(&[2.0, 4.0]), Some(3.0));
    }
}
