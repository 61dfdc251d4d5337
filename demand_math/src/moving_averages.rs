//! Moving average calculations
//!
//! - Simple Moving Average (SMA), streaming
//! - Trailing rolling mean over a whole series
//! - Exact window mean at an arbitrary index
//! - Blended mean update used when the evicted value is not tracked

use crate::{MathError, Result};
use std::collections::VecDeque;

/// Simple Moving Average (SMA) implementation
#[derive(Debug, Clone)]
pub struct SimpleMovingAverage {
    period: usize,
    values: VecDeque<f64>,
    sum: f64,
}

impl SimpleMovingAverage {
    /// Create a new Simple Moving Average with the specified period
    pub fn new(period: usize) -> Result<Self> {
        if period == 0 {
            return Err(MathError::InvalidInput(
                "Period must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            period,
            values: VecDeque::with_capacity(period),
            sum: 0.0,
        })
    }

    /// Update the SMA with a new value
    pub fn update(&mut self, value: f64) -> Result<()> {
        if !value.is_finite() {
            return Err(MathError::InvalidInput(format!(
                "Cannot average non-finite value {}",
                value
            )));
        }

        self.values.push_back(value);
        self.sum += value;

        if self.values.len() > self.period {
            if let Some(old_value) = self.values.pop_front() {
                self.sum -= old_value;
            }
        }

        Ok(())
    }

    /// Get the current SMA value
    pub fn value(&self) -> Result<f64> {
        if !self.is_ready() {
            return Err(MathError::InsufficientData(format!(
                "Not enough data for SMA calculation. Need {} values, have {}.",
                self.period,
                self.values.len()
            )));
        }

        Ok(self.sum / self.period as f64)
    }

    /// Whether a full window has been observed
    pub fn is_ready(&self) -> bool {
        self.values.len() == self.period
    }

    /// Get the current period
    pub fn period(&self) -> usize {
        self.period
    }

    /// Reset the SMA, clearing all values
    pub fn reset(&mut self) {
        self.values.clear();
        self.sum = 0.0;
    }
}

/// Trailing mean of `window` values ending at each index.
///
/// Entry `i` is `None` until `window` values have been seen, i.e. for `i < window - 1`.
pub fn rolling_mean(values: &[f64], window: usize) -> Result<Vec<Option<f64>>> {
    let mut sma = SimpleMovingAverage::new(window)?;
    let mut result = Vec::with_capacity(values.len());

    for &value in values {
        sma.update(value)?;
        result.push(if sma.is_ready() { Some(sma.value()?) } else { None });
    }

    Ok(result)
}

/// Mean of the `window` values ending at `end` (inclusive), recomputed from scratch
pub fn window_mean(values: &[f64], end: usize, window: usize) -> Result<f64> {
    if window == 0 {
        return Err(MathError::InvalidInput(
            "Window must be greater than zero".to_string(),
        ));
    }
    if end >= values.len() || end + 1 < window {
        return Err(MathError::InsufficientData(format!(
            "Window of {} ending at index {} does not fit in {} values",
            window,
            end,
            values.len()
        )));
    }

    let slice = &values[end + 1 - window..=end];
    Ok(slice.iter().sum::<f64>() / window as f64)
}

/// Slide a mean forward by one value without knowing the evicted one.
///
/// The oldest point is assumed equal to the previous mean:
/// `(previous * (window - 1) + value) / window`.
pub fn blended_mean(previous: f64, value: f64, window: usize) -> Result<f64> {
    if window == 0 {
        return Err(MathError::InvalidInput(
            "Window must be greater than zero".to_string(),
        ));
    }

    let w = window as f64;
    Ok((previous * (w - 1.0) + value) / w)
}
