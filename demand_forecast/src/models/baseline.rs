//! Mean baseline: predicts the training mean for every row

use crate::error::Result;
use crate::models::{validate_features, validate_training_data, RegressionModel, Regressor};
use serde::{Deserialize, Serialize};

/// Unfitted mean baseline
#[derive(Debug, Clone, Default)]
pub struct MeanModel;

/// Fitted mean baseline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeanRegressor {
    mean: f64,
    n_features: usize,
}

impl MeanRegressor {
    /// The mean every prediction returns
    pub fn mean(&self) -> f64 {
        self.mean
    }
}

impl RegressionModel for MeanModel {
    type Fitted = MeanRegressor;

    fn fit(&self, x: &[Vec<f64>], y: &[f64]) -> Result<Self::Fitted> {
        let n_features = validate_training_data(x, y)?;
        Ok(MeanRegressor {
            mean: y.iter().sum::<f64>() / y.len() as f64,
            n_features,
        })
    }

    fn name(&self) -> &str {
        "Mean Baseline"
    }
}

impl Regressor for MeanRegressor {
    fn predict(&self, features: &[f64]) -> Result<f64> {
        validate_features(features, self.n_features)?;
        Ok(self.mean)
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn name(&self) -> &str {
        "Mean Baseline"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predicts_training_mean() {
        let x = vec![vec![0.0], vec![1.0], vec![2.0]];
        let model = MeanModel.fit(&x, &[2.0, 4.0, 9.0]).unwrap();
        assert_eq!(model.predict(&[100.0]).unwrap(), 5.0);
        assert!(model.predict(&[]).is_err());
    }
}
