use chrono::{Duration, NaiveDate};
use demand_forecast::config::{ForecastConfig, TrainingConfig};
use demand_forecast::{
    DemandData, DemandSummary, FeatureBuilder, RecursiveForecaster, Trainer,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Fuel Demand: Basic Forecasting Example");
    println!("======================================\n");

    // Create sample data
    println!("Creating sample data...");
    let data = create_sample_daily_data()?;
    println!("Sample data created: {} daily points\n", data.len());

    // Derive lag and rolling features
    let table = FeatureBuilder.build(&data)?;
    println!("Feature table: {} rows, {} features\n", table.len(), table.feature_names().len());

    println!("{}", DemandSummary::from_table(&table)?);

    // Train a small forest
    println!("Training model...");
    let config = TrainingConfig {
        n_estimators: 50,
        ..TrainingConfig::default()
    };
    let (artifact, report) = Trainer::new(config).train(&table)?;
    println!("{}", report);

    // Forecast the coming week
    let anchor = data.last_date().ok_or("no data")?;
    let forecaster = RecursiveForecaster::new(&artifact, &table, ForecastConfig::default())?;
    let points = forecaster.forecast(anchor, 7)?;

    println!("7-Day Forecast:");
    for point in &points {
        println!(
            "  {} {:<9} {:>8.0} ({}%)",
            point.date,
            point.weekday(),
            point.demand,
            point.confidence
        );
    }

    println!("\nForecasting complete!");
    Ok(())
}

// Helper function to create sample daily demand with a weekly pattern and upward trend
fn create_sample_daily_data() -> Result<DemandData, Box<dyn std::error::Error>> {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).ok_or("invalid start date")?;
    let weekly = [0.0, 20.0, 35.0, 40.0, 80.0, 120.0, 60.0];

    let dates = (0..180).map(|i| start + Duration::days(i)).collect();
    let values = (0..180)
        .map(|i| 12_000.0 + weekly[i % 7] + 1.5 * i as f64)
        .collect();

    Ok(DemandData::from_values(dates, values)?)
}
