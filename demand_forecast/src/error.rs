//! Error types for the demand_forecast crate

use demand_math::MathError;
use thiserror::Error;

/// Custom error types for the demand_forecast crate
#[derive(Debug, Error)]
pub enum ForecastError {
    /// Error related to data loading or table shape
    #[error("Data error: {0}")]
    DataError(String),

    /// Malformed input values (dates, numbers, duplicates)
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Not enough history to derive a lookback value
    #[error("Insufficient history: need at least {needed} observations, have {available}")]
    InsufficientHistory { needed: usize, available: usize },

    /// Error from invalid parameters
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Error raised while fitting or evaluating a model
    #[error("Training error: {0}")]
    TrainingError(String),

    /// A feature row does not satisfy the model's input contract
    #[error("Inference error: {0}")]
    InferenceError(String),

    /// Error from IO operations
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error from CSV reading or writing
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    /// Error from JSON model artifacts or configuration files
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Error from window or lag calculations
    #[error("Math error: {0}")]
    MathError(#[from] MathError),
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, ForecastError>;
