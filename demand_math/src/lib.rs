//! # Demand Math
//!
//! Window and lag calculations over daily demand series.
//! The feature pipeline and the recursive forecaster in `demand_forecast`
//! are built on these primitives.

use thiserror::Error;

pub mod lags;
pub mod moving_averages;

/// Errors that can occur in series calculations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MathError {
    #[error("Insufficient data for calculation: {0}")]
    InsufficientData(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for demand math operations
pub type Result<T> = std::result::Result<T, MathError>;

/// Arithmetic mean of a slice, `None` when the slice is empty
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Largest value of a slice, `None` when the slice is empty
pub fn peak(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_and_peak() {
        assert_eq!(mean(&[1.0, 2.0, 3.0, 6.0]), Some(3.0));
        assert_eq!(peak(&[1.0, 7.5, 3.0]), Some(7.5));
        assert_eq!(mean(&[]), None);
        assert_eq!(peak(&[]), None);
    }
}
