use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use demand_forecast::data::parse_date;
use demand_forecast::features::TableMetadata;
use demand_forecast::forecaster::export_forecast;
use demand_forecast::{
    DataLoader, DemandSummary, FeatureBuilder, FeatureTable, ModelArtifact, PipelineConfig,
    RecursiveForecaster, RollingUpdate, Trainer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "fuel-demand")]
#[command(about = "Daily fuel demand feature pipeline, training and forecasting", long_about = None)]
struct Cli {
    /// JSON pipeline configuration
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Demand column to model, overriding the configuration
    #[arg(long, global = true)]
    target: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Rolling {
    Blend,
    Exact,
}

impl From<Rolling> for RollingUpdate {
    fn from(value: Rolling) -> Self {
        match value {
            Rolling::Blend => RollingUpdate::Blend,
            Rolling::Exact => RollingUpdate::Exact,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Build the feature table from raw daily demand
    Preprocess {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long, default_value = "processed_data/gasoline_demand_cleaned.csv")]
        output: PathBuf,
    },
    /// Train a Random Forest on a feature table and save it
    Train {
        #[arg(short, long, default_value = "processed_data/gasoline_demand_cleaned.csv")]
        features: PathBuf,
        #[arg(short, long, default_value = "models/gasoline_demand_rf_model.json")]
        model: PathBuf,
        /// Override the configured seed
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Forecast demand for the coming days
    Forecast {
        #[arg(short, long, default_value = "processed_data/gasoline_demand_cleaned.csv")]
        features: PathBuf,
        #[arg(short, long, default_value = "models/gasoline_demand_rf_model.json")]
        model: PathBuf,
        #[arg(short, long, default_value_t = 7)]
        days: usize,
        /// Date of the last feature row; defaults to the date recorded by preprocess
        #[arg(long)]
        anchor: Option<String>,
        #[arg(long, value_enum)]
        rolling: Option<Rolling>,
        /// Write the forecast as CSV
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print key demand metrics for a feature table
    Summary {
        #[arg(short, long, default_value = "processed_data/gasoline_demand_cleaned.csv")]
        features: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if let Some(target) = cli.target {
        config.data.target_column = target;
    }
    config.validate()?;

    match cli.command {
        Commands::Preprocess { input, output } => {
            let data = DataLoader::from_csv(&input, &config.data)
                .with_context(|| format!("failed to load {}", input.display()))?;
            let table = FeatureBuilder.build(&data)?;
            if table.is_empty() {
                bail!(
                    "{} has {} days of data; at least 30 are needed for one feature row",
                    input.display(),
                    data.len()
                );
            }

            ensure_parent(&output)?;
            table.to_csv(&output)?;
            println!(
                "Preprocessing complete. {} rows saved to {}.",
                table.len(),
                output.display()
            );
            if let Some(last) = data.last_date() {
                TableMetadata::new(&table, last).save(&output)?;
                println!("Last observed date: {}", last);
            }
        }
        Commands::Train {
            features,
            model,
            seed,
        } => {
            if let Some(seed) = seed {
                config.training.seed = seed;
            }
            let table = load_table(&features, &config)?;
            let (artifact, report) = Trainer::new(config.training.clone()).train(&table)?;

            print!("{}", report);
            ensure_parent(&model)?;
            artifact
                .save(&model)
                .with_context(|| format!("failed to save model to {}", model.display()))?;
            println!("Model training complete. Model saved to {}.", model.display());
        }
        Commands::Forecast {
            features,
            model,
            days,
            anchor,
            rolling,
            output,
        } => {
            if let Some(rolling) = rolling {
                config.forecast.rolling = rolling.into();
            }
            let table = load_table(&features, &config)?;
            let anchor: NaiveDate = match anchor {
                Some(value) => parse_date(&value)?,
                None => default_anchor(&features, &table)?,
            };

            let artifact = ModelArtifact::load(&model)
                .with_context(|| format!("failed to load model {}", model.display()))?;
            artifact.check_schema(table.target_name(), &table.feature_names())?;

            let forecaster = RecursiveForecaster::new(&artifact, &table, config.forecast.clone())?;
            let points = forecaster.forecast(anchor, days)?;

            println!("{:<12} {:<10} {:>12} {:>10}", "Date", "Day", "Demand", "Confidence");
            for point in &points {
                println!(
                    "{:<12} {:<10} {:>12.0} {:>9}%",
                    point.date.format("%Y-%m-%d"),
                    point.weekday(),
                    point.demand,
                    point.confidence
                );
            }

            if let Some(output) = output {
                ensure_parent(&output)?;
                export_forecast(&points, &output)?;
                println!("Forecast written to {}.", output.display());
            }
        }
        Commands::Summary { features } => {
            let table = load_table(&features, &config)?;
            print!("{}", DemandSummary::from_table(&table)?);
        }
    }

    Ok(())
}

/// Last observed date recorded next to the feature table, or today when the
/// table was written without metadata
fn default_anchor(features: &Path, table: &FeatureTable) -> anyhow::Result<NaiveDate> {
    match TableMetadata::load(features)? {
        Some(metadata) => {
            metadata.check(table).with_context(|| {
                format!(
                    "{} is stale; rerun preprocess or pass --anchor",
                    TableMetadata::sidecar_path(features).display()
                )
            })?;
            Ok(metadata.last_date)
        }
        None => {
            let today = Utc::now().date_naive();
            tracing::warn!(
                features = %features.display(),
                anchor = %today,
                "no table metadata found, anchoring forecast at today"
            );
            Ok(today)
        }
    }
}

fn load_table(path: &Path, config: &PipelineConfig) -> anyhow::Result<FeatureTable> {
    FeatureTable::from_csv(path, &config.data.target_column)
        .with_context(|| format!("failed to load feature table {}", path.display()))
}

fn ensure_parent(path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    Ok(())
}
