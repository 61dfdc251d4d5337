use approx::assert_relative_eq;
use chrono::{Duration, NaiveDate};
use demand_forecast::config::{ForecastConfig, RollingUpdate};
use demand_forecast::error::Result;
use demand_forecast::features::{day_of_week, FeatureBuilder, FeatureTable};
use demand_forecast::{DemandData, ForecastError, RecursiveForecaster, Regressor};
use rstest::rstest;
use std::sync::Mutex;

// Positions in `FeatureRow::features` for a table without covariates
const DOW: usize = 0;
const LAG_1: usize = 2;
const LAG_7: usize = 3;
const LAG_14: usize = 4;
const MEAN_7: usize = 5;
const MEAN_30: usize = 6;

/// Returns 100 + call number and remembers every input row
#[derive(Debug, Default)]
struct Recording {
    inputs: Mutex<Vec<Vec<f64>>>,
    fail_on_call: Option<usize>,
}

impl Regressor for Recording {
    fn predict(&self, features: &[f64]) -> Result<f64> {
        let mut inputs = self.inputs.lock().unwrap();
        inputs.push(features.to_vec());
        let call = inputs.len();
        if self.fail_on_call == Some(call) {
            return Err(ForecastError::InferenceError("boom".to_string()));
        }
        Ok(100.0 + call as f64)
    }

    fn n_features(&self) -> usize {
        7
    }

    fn name(&self) -> &str {
        "Recording"
    }
}

fn anchor() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 2, 28).unwrap()
}

/// `n` days of demand `i` ending on the anchor date
fn table(n: usize) -> FeatureTable {
    let first = anchor() - Duration::days(n as i64 - 1);
    let dates = (0..n).map(|i| first + Duration::days(i as i64)).collect();
    let values = (0..n).map(|i| i as f64).collect();
    FeatureBuilder
        .build(&DemandData::from_values(dates, values).unwrap())
        .unwrap()
}

fn config(rolling: RollingUpdate) -> ForecastConfig {
    ForecastConfig {
        max_horizon: 30,
        rolling,
    }
}

#[rstest]
#[case(1)]
#[case(7)]
#[case(14)]
#[case(30)]
fn test_horizon_yields_consecutive_days(#[case] horizon: usize) {
    let model = Recording::default();
    let table = table(60);
    let forecaster = RecursiveForecaster::new(&model, &table, config(RollingUpdate::Blend)).unwrap();

    let points = forecaster.forecast(anchor(), horizon).unwrap();

    assert_eq!(points.len(), horizon);
    assert_eq!(points[0].date, anchor() + Duration::days(1));
    for pair in points.windows(2) {
        assert_eq!(pair[1].date - pair[0].date, Duration::days(1));
        assert!(pair[1].confidence <= pair[0].confidence);
    }
}

#[test]
fn test_horizon_zero_is_empty() {
    let model = Recording::default();
    let table = table(60);
    let forecaster = RecursiveForecaster::new(&model, &table, config(RollingUpdate::Blend)).unwrap();

    assert!(forecaster.forecast(anchor(), 0).unwrap().is_empty());
    assert!(model.inputs.lock().unwrap().is_empty());
}

#[test]
fn test_horizon_above_maximum_is_rejected() {
    let model = Recording::default();
    let table = table(60);
    let forecaster = RecursiveForecaster::new(&model, &table, config(RollingUpdate::Blend)).unwrap();

    assert!(matches!(
        forecaster.forecast(anchor(), 31),
        Err(ForecastError::InvalidParameter(_))
    ));
}

#[test]
fn test_feedback_rows() {
    let model = Recording::default();
    let table = table(60);
    let history = table.demand_history();
    // 31 table rows plus 14 recovered days: demand 15..=59
    assert_eq!(history, (15..60).map(|i| i as f64).collect::<Vec<_>>());

    let horizon = 20;
    let forecaster = RecursiveForecaster::new(&model, &table, config(RollingUpdate::Blend)).unwrap();
    let points = forecaster.forecast(anchor(), horizon).unwrap();

    let inputs = model.inputs.lock().unwrap();
    assert_eq!(inputs.len(), horizon);

    // The first call sees the last observed row unchanged
    let last = table.last_row().unwrap();
    assert_eq!(inputs[0], last.features());

    let n = history.len();
    let mut extended = history.clone();
    extended.extend(points.iter().map(|p| p.prediction));

    for k in 1..horizon {
        // Row fed to call k + 1 was built at step k
        let row = &inputs[k];
        let index = n - 1 + k;

        assert_eq!(row[LAG_1], points[k - 1].prediction);
        assert_eq!(row[LAG_7], extended[index - 7]);
        assert_eq!(row[LAG_14], extended[index - 14]);
        assert_eq!(
            row[DOW],
            day_of_week(anchor() + Duration::days(k as i64)) as f64
        );
    }

    // Step 8 reaches back into the forecasts for Lag_7
    assert_eq!(inputs[8][LAG_7], points[0].prediction);
    // Step 14 still reads history for Lag_14, step 15 the first forecast
    assert_eq!(inputs[14][LAG_14], history[n - 1]);
    assert_eq!(inputs[15][LAG_14], points[0].prediction);
}

#[test]
fn test_blend_rolling_update() {
    let model = Recording::default();
    let table = table(60);
    let last = table.last_row().unwrap().clone();
    let forecaster = RecursiveForecaster::new(&model, &table, config(RollingUpdate::Blend)).unwrap();
    forecaster.forecast(anchor(), 2).unwrap();

    let inputs = model.inputs.lock().unwrap();
    assert_relative_eq!(inputs[1][MEAN_7], (last.rolling_mean_7 * 6.0 + 101.0) / 7.0);
    assert_relative_eq!(inputs[1][MEAN_30], (last.rolling_mean_30 * 29.0 + 101.0) / 30.0);
}

#[test]
fn test_exact_rolling_update() {
    let model = Recording::default();
    let table = table(60);
    let history = table.demand_history();
    let forecaster = RecursiveForecaster::new(&model, &table, config(RollingUpdate::Exact)).unwrap();
    let points = forecaster.forecast(anchor(), 3).unwrap();

    let mut extended = history.clone();
    extended.extend(points.iter().map(|p| p.prediction));
    let end = history.len();

    let inputs = model.inputs.lock().unwrap();
    let mean_7 = extended[end - 6..=end].iter().sum::<f64>() / 7.0;
    let mean_30 = extended[end - 29..=end].iter().sum::<f64>() / 30.0;
    assert_relative_eq!(inputs[1][MEAN_7], mean_7);
    assert_relative_eq!(inputs[1][MEAN_30], mean_30);
}

#[test]
fn test_failure_discards_forecast() {
    let model = Recording {
        fail_on_call: Some(3),
        ..Default::default()
    };
    let table = table(60);
    let forecaster = RecursiveForecaster::new(&model, &table, config(RollingUpdate::Blend)).unwrap();

    let result = forecaster.forecast(anchor(), 10);
    assert!(matches!(result, Err(ForecastError::InferenceError(_))));
    // No retries after the failure
    assert_eq!(model.inputs.lock().unwrap().len(), 3);
}

#[test]
fn test_insufficient_history() {
    let model = Recording::default();

    // Six rows leave a gap eight days before the table
    let six = table(35);
    assert_eq!(six.demand_history().len(), 13);
    let blend = RecursiveForecaster::new(&model, &six, config(RollingUpdate::Blend)).unwrap();
    assert!(matches!(
        blend.forecast(anchor(), 5),
        Err(ForecastError::InsufficientHistory { needed: 14, available: 13 })
    ));

    // Seven rows recover all 14 preceding days
    let seven = table(36);
    assert_eq!(seven.demand_history().len(), 21);
    let blend = RecursiveForecaster::new(&model, &seven, config(RollingUpdate::Blend)).unwrap();
    assert_eq!(blend.forecast(anchor(), 5).unwrap().len(), 5);

    let exact = RecursiveForecaster::new(&model, &seven, config(RollingUpdate::Exact)).unwrap();
    assert!(matches!(
        exact.forecast(anchor(), 5),
        Err(ForecastError::InsufficientHistory { needed: 29, available: 21 })
    ));

    let empty = table(10);
    assert!(RecursiveForecaster::new(&model, &empty, config(RollingUpdate::Blend)).is_err());
}

#[test]
fn test_points_are_rounded_with_raw_prediction_kept() {
    #[derive(Debug)]
    struct Fractional;
    impl Regressor for Fractional {
        fn predict(&self, _features: &[f64]) -> Result<f64> {
            Ok(1234.6)
        }
        fn n_features(&self) -> usize {
            7
        }
        fn name(&self) -> &str {
            "Fractional"
        }
    }

    let table = table(60);
    let forecaster =
        RecursiveForecaster::new(&Fractional, &table, config(RollingUpdate::Blend)).unwrap();
    let point = &forecaster.forecast(anchor(), 1).unwrap()[0];

    assert_eq!(point.prediction, 1234.6);
    assert_eq!(point.demand, 1235.0);
    assert_eq!(point.confidence, 95);
}
