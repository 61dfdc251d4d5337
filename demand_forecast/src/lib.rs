//! # Demand Forecast
//!
//! Feature engineering, model training and recursive multi-day forecasting for
//! daily fuel demand.
//!
//! ## Pipeline
//!
//! - [`features::FeatureBuilder`] turns a dated demand series into calendar,
//!   lag (1/7/14 days) and rolling-mean (7/30 days) features
//! - [`trainer::Trainer`] fits a Random Forest on a seeded 80/20 split and
//!   reports MAE, MSE, RMSE and R²
//! - [`forecaster::RecursiveForecaster`] feeds each prediction back in as the
//!   next day's features
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use demand_forecast::{DataLoader, FeatureBuilder, PipelineConfig, RecursiveForecaster, Trainer};
//!
//! let config = PipelineConfig::default();
//! let data = DataLoader::from_csv("data/fuel_demand_data.csv", &config.data)?;
//! let table = FeatureBuilder.build(&data)?;
//!
//! let (model, report) = Trainer::new(config.training.clone()).train(&table)?;
//! println!("{}", report);
//!
//! let anchor = data.last_date().expect("data is non-empty");
//! let forecaster = RecursiveForecaster::new(&model, &table, config.forecast.clone())?;
//! for point in forecaster.forecast(anchor, 7)? {
//!     println!("{} {} {:.0} {}%", point.date, point.weekday(), point.demand, point.confidence);
//! }
//! # Ok::<(), demand_forecast::ForecastError>(())
//! ```

pub mod config;
pub mod data;
pub mod error;
pub mod features;
pub mod forecaster;
pub mod metrics;
pub mod models;
pub mod summary;
pub mod trainer;

// Re-export commonly used types
pub use crate::config::{PipelineConfig, RollingUpdate};
pub use crate::data::{DataLoader, DemandData, DemandRecord};
pub use crate::error::ForecastError;
pub use crate::features::{FeatureBuilder, FeatureRow, FeatureTable};
pub use crate::forecaster::{ForecastPoint, RecursiveForecaster};
pub use crate::metrics::RegressionMetrics;
pub use crate::models::{ModelArtifact, Regressor};
pub use crate::summary::DemandSummary;
pub use crate::trainer::{Trainer, TrainingReport};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
