//! Regression models mapping a feature row to a demand prediction

use crate::error::{ForecastError, Result};
use std::fmt::Debug;

pub mod artifact;
pub mod baseline;
pub mod random_forest;
pub mod tree;

pub use artifact::{ModelArtifact, TrainedModel};
pub use baseline::{MeanModel, MeanRegressor};
pub use random_forest::{RandomForest, RandomForestParams};

/// A fitted model: one feature vector in, one demand scalar out.
///
/// Fitted models are immutable, so a single instance can serve any number of
/// forecast requests.
pub trait Regressor: Debug + Send + Sync {
    /// Predict demand for one feature vector
    fn predict(&self, features: &[f64]) -> Result<f64>;

    /// Number of features the model was fitted on
    fn n_features(&self) -> usize;

    /// Name of the model
    fn name(&self) -> &str;

    /// Predict every row of a feature matrix
    fn predict_many(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>> {
        rows.iter().map(|row| self.predict(row)).collect()
    }
}

/// Regression model that can be fitted on a feature matrix
pub trait RegressionModel: Debug + Clone {
    /// The type of fitted model produced
    type Fitted: Regressor;

    /// Fit the model on rows `x` with targets `y`
    fn fit(&self, x: &[Vec<f64>], y: &[f64]) -> Result<Self::Fitted>;

    /// Get the name of the model
    fn name(&self) -> &str;
}

/// Check a feature matrix before fitting and return its width
pub(crate) fn validate_training_data(x: &[Vec<f64>], y: &[f64]) -> Result<usize> {
    if x.is_empty() {
        return Err(ForecastError::TrainingError(
            "Cannot fit a model on zero rows".to_string(),
        ));
    }
    if x.len() != y.len() {
        return Err(ForecastError::TrainingError(format!(
            "Feature rows ({}) and targets ({}) differ in length",
            x.len(),
            y.len()
        )));
    }

    let width = x[0].len();
    if width == 0 {
        return Err(ForecastError::TrainingError(
            "Feature rows have no columns".to_string(),
        ));
    }
    if x.iter().any(|row| row.len() != width) {
        return Err(ForecastError::TrainingError(
            "Feature rows have inconsistent widths".to_string(),
        ));
    }
    if x.iter().flatten().chain(y).any(|v| !v.is_finite()) {
        return Err(ForecastError::TrainingError(
            "Training data contains non-finite values".to_string(),
        ));
    }

    Ok(width)
}

/// Check a single feature vector against a fitted model's width
pub(crate) fn validate_features(features: &[f64], expected: usize) -> Result<()> {
    if features.len() != expected {
        return Err(ForecastError::InferenceError(format!(
            "Expected {} features, got {}",
            expected,
            features.len()
        )));
    }
    if let Some(pos) = features.iter().position(|v| !v.is_finite()) {
        return Err(ForecastError::InferenceError(format!(
            "Feature {} is not a finite number",
            pos
        )));
    }
    Ok(())
}
