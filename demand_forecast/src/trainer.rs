//! Model training with a seeded hold-out evaluation

use crate::config::TrainingConfig;
use crate::error::{ForecastError, Result};
use crate::features::FeatureTable;
use crate::metrics::RegressionMetrics;
use crate::models::{ModelArtifact, RandomForestParams, RegressionModel, Regressor, TrainedModel};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::info;

/// Shuffle `0..n` with `seed` and hold out `ceil(n * test_fraction)` indices.
///
/// Returns `(train, test)`. An empty partition on either side is an error.
pub fn train_test_split(n: usize, test_fraction: f64, seed: u64) -> Result<(Vec<usize>, Vec<usize>)> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(ForecastError::InvalidParameter(format!(
            "Test fraction must be in (0, 1), got {}",
            test_fraction
        )));
    }

    let n_test = (n as f64 * test_fraction).ceil() as usize;
    if n_test == 0 {
        return Err(ForecastError::TrainingError(format!(
            "Held-out partition is empty: {} rows with test fraction {}",
            n, test_fraction
        )));
    }
    if n_test >= n {
        return Err(ForecastError::TrainingError(format!(
            "Training partition is empty: {} rows with test fraction {}",
            n, test_fraction
        )));
    }

    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(&mut StdRng::seed_from_u64(seed));
    let train = indices.split_off(n_test);
    Ok((train, indices))
}

/// Outcome of a training run
#[derive(Debug, Clone)]
pub struct TrainingReport {
    /// Name of the fitted model
    pub model_name: String,
    /// Rows used for fitting
    pub n_train: usize,
    /// Rows held out for evaluation
    pub n_test: usize,
    /// Held-out metrics
    pub metrics: RegressionMetrics,
    /// Feature importances, highest first, when the model provides them
    pub feature_importances: Option<Vec<(String, f64)>>,
}

impl std::fmt::Display for TrainingReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "{} trained on {} rows, evaluated on {} rows",
            self.model_name, self.n_train, self.n_test
        )?;
        write!(f, "{}", self.metrics)?;
        if let Some(importances) = &self.feature_importances {
            writeln!(f, "Feature Importance:")?;
            for (name, value) in importances {
                writeln!(f, "  {:<16} {:.4}", name, value)?;
            }
        }
        Ok(())
    }
}

/// Fits models on feature tables
#[derive(Debug, Clone, Default)]
pub struct Trainer {
    config: TrainingConfig,
}

impl Trainer {
    pub fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    /// Train the configured Random Forest
    pub fn train(&self, table: &FeatureTable) -> Result<(ModelArtifact, TrainingReport)> {
        let params = RandomForestParams::from_config(&self.config)?;
        self.train_with(table, &params)
    }

    /// Train any supported model on the table's features against its target
    pub fn train_with<M>(
        &self,
        table: &FeatureTable,
        model: &M,
    ) -> Result<(ModelArtifact, TrainingReport)>
    where
        M: RegressionModel,
        M::Fitted: Into<TrainedModel>,
    {
        if table.is_empty() {
            return Err(ForecastError::TrainingError(
                "Feature table is empty; at least 30 days of history are required".to_string(),
            ));
        }

        let x: Vec<Vec<f64>> = table.rows().iter().map(|r| r.features()).collect();
        let y = table.demand_values();

        let (train_idx, test_idx) =
            train_test_split(table.len(), self.config.test_fraction, self.config.seed)?;

        let x_train: Vec<Vec<f64>> = train_idx.iter().map(|&i| x[i].clone()).collect();
        let y_train: Vec<f64> = train_idx.iter().map(|&i| y[i]).collect();

        let fitted = model.fit(&x_train, &y_train)?;

        let x_test: Vec<Vec<f64>> = test_idx.iter().map(|&i| x[i].clone()).collect();
        let y_test: Vec<f64> = test_idx.iter().map(|&i| y[i]).collect();
        let predicted = fitted.predict_many(&x_test)?;
        let metrics = RegressionMetrics::evaluate(&y_test, &predicted)?;

        info!(
            model = model.name(),
            train = train_idx.len(),
            test = test_idx.len(),
            mae = metrics.mae,
            rmse = metrics.rmse,
            r2 = metrics.r2,
            "trained model"
        );

        let artifact = ModelArtifact::new(
            table.target_name().to_string(),
            table.feature_names(),
            fitted,
        )?;

        let report = TrainingReport {
            model_name: model.name().to_string(),
            n_train: train_idx.len(),
            n_test: test_idx.len(),
            metrics,
            feature_importances: artifact.feature_importances(),
        };

        Ok((artifact, report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_is_deterministic_and_disjoint() {
        let (train_a, test_a) = train_test_split(50, 0.2, 42).unwrap();
        let (train_b, test_b) = train_test_split(50, 0.2, 42).unwrap();

        assert_eq!(train_a, train_b);
        assert_eq!(test_a, test_b);
        assert_eq!(test_a.len(), 10);
        assert_eq!(train_a.len(), 40);

        let mut all: Vec<usize> = train_a.iter().chain(&test_a).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn held_out_size_rounds_up() {
        let (train, test) = train_test_split(11, 0.2, 42).unwrap();
        assert_eq!(test.len(), 3);
        assert_eq!(train.len(), 8);

        let (_, test) = train_test_split(91, 0.2, 42).unwrap();
        assert_eq!(test.len(), 19);
    }

    #[test]
    fn empty_partitions_are_reported() {
        // One row leaves nothing to train on
        assert!(matches!(
            train_test_split(1, 0.2, 42),
            Err(ForecastError::TrainingError(_))
        ));
        assert!(matches!(
            train_test_split(0, 0.2, 42),
            Err(ForecastError::TrainingError(_))
        ));
        assert!(train_test_split(10, 0.0, 42).is_err());
        assert!(train_test_split(10, 1.0, 42).is_err());
    }
}
