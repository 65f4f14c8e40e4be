//! NZI command line interface
//!
//! Row calculations and target forecasts from the terminal, plus database
//! maintenance when built with the `database` feature.
//!
//! # Usage
//!
//! ```bash
//! # Tonnes for 1200 kWh at 0.20705 kgCO2e/kWh
//! nzi calc --quantity 1200 --factor 0.20705 --ghg-unit kgCO2e
//!
//! # Forecast from explicit targets
//! nzi forecast --baseline-year 2024 --s1 120.5 --s2 40 --s3 300 --format csv
//!
//! # Apply SQL migrations
//! nzi migrate --dir migrations
//! ```

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use std::io;
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::EnvFilter;

use nzi_pro::baseline::Baseline;
use nzi_pro::calculation::{calculate_row, RowInput};
use nzi_pro::forecast::{build_forecast, ForecastParams, ForecastTable};
use nzi_types::{ClientTargets, ScopeValues};

#[derive(Parser)]
#[command(name = "nzi")]
#[command(author = "nzi-pro")]
#[command(version)]
#[command(about = "Emissions calculation and net-zero forecasting for NZI Pro")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Table,
    Csv,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Calculate tCO2e for one activity row
    Calc {
        /// Activity or spend quantity
        #[arg(long)]
        quantity: f64,

        /// Emission factor value
        #[arg(long)]
        factor: Option<f64>,

        /// GHG unit of the factor (kgCO2e or tCO2e)
        #[arg(long)]
        ghg_unit: Option<String>,

        /// Manual tCO2e override
        #[arg(long = "override")]
        override_tco2e: Option<f64>,

        /// Reason for the override
        #[arg(long)]
        reason: Option<String>,
    },

    /// Forecast emissions from explicit targets
    Forecast {
        #[arg(long)]
        baseline_year: i32,

        #[arg(long, default_value_t = ClientTargets::DEFAULT_NET_ZERO_YEAR)]
        net_zero_year: i32,

        #[arg(long, default_value_t = ClientTargets::DEFAULT_INTERIM_YEAR)]
        interim_year: i32,

        /// Scope 1 reduction (%) by the interim year
        #[arg(long, default_value_t = ClientTargets::DEFAULT_INTERIM_PCT)]
        s1_pct: u8,

        #[arg(long, default_value_t = ClientTargets::DEFAULT_INTERIM_PCT)]
        s2_pct: u8,

        #[arg(long, default_value_t = ClientTargets::DEFAULT_INTERIM_PCT)]
        s3_pct: u8,

        /// Scope 1 baseline tCO2e
        #[arg(long, default_value_t = 0.0)]
        s1: f64,

        #[arg(long, default_value_t = 0.0)]
        s2: f64,

        #[arg(long, default_value_t = 0.0)]
        s3: f64,

        #[arg(long, default_value = "table", value_enum)]
        format: OutputFormat,
    },

    /// Apply pending SQL migrations (database builds)
    Migrate {
        /// Migrations folder (defaults to NZI_MIGRATIONS_DIR)
        #[arg(long)]
        dir: Option<std::path::PathBuf>,
    },

    /// Import an emission factor CSV into a dataset (database builds)
    IngestFactors {
        /// Existing dataset to import into
        #[arg(long)]
        dataset_id: Option<i64>,

        /// Name of a new dataset to create (when no --dataset-id)
        #[arg(long, requires_all = ["source", "year"], conflicts_with = "dataset_id")]
        name: Option<String>,

        #[arg(long)]
        source: Option<String>,

        #[arg(long)]
        year: Option<i32>,

        #[arg(long)]
        region: Option<String>,

        #[arg(long)]
        currency: Option<String>,

        #[arg(long)]
        dataset_version: Option<String>,

        /// CSV file to import
        #[arg(long)]
        file: std::path::PathBuf,
    },

    /// Forecast a stored client from its targets and history (database builds)
    ClientForecast {
        #[arg(long)]
        client_id: i64,

        /// Working year when the client has no baseline or reports
        #[arg(long)]
        working_year: Option<i32>,

        #[arg(long, default_value = "table", value_enum)]
        format: OutputFormat,
    },
}

// =============================================================================
// MAIN
// =============================================================================

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("nzi_pro=info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Calc {
            quantity,
            factor,
            ghg_unit,
            override_tco2e,
            reason,
        } => cmd_calc(quantity, factor, ghg_unit, override_tco2e, reason),
        Commands::Forecast {
            baseline_year,
            net_zero_year,
            interim_year,
            s1_pct,
            s2_pct,
            s3_pct,
            s1,
            s2,
            s3,
            format,
        } => {
            let params = ForecastParams::new(
                baseline_year,
                net_zero_year,
                interim_year,
                ScopeValues::new(s1_pct, s2_pct, s3_pct),
            );
            for warning in params.check_range() {
                eprintln!("warning: {}", warning);
            }
            let table = build_forecast(&params, &Baseline::new(s1, s2, s3));
            print_table(&table, format)
        }
        #[cfg(feature = "database")]
        Commands::Migrate { dir } => db::cmd_migrate(dir).await,
        #[cfg(feature = "database")]
        Commands::IngestFactors {
            dataset_id,
            name,
            source,
            year,
            region,
            currency,
            dataset_version,
            file,
        } => {
            let target = match (dataset_id, name, source, year) {
                (Some(id), _, _, _) => db::DatasetTarget::Existing(id),
                (None, Some(name), Some(source), Some(year)) => {
                    db::DatasetTarget::New(nzi_types::DatasetMeta {
                        dataset_id: 0,
                        name,
                        source,
                        region,
                        currency,
                        year,
                        version: dataset_version,
                    })
                }
                _ => anyhow::bail!("either --dataset-id or --name, --source and --year is required"),
            };
            db::cmd_ingest(target, &file).await
        }
        #[cfg(feature = "database")]
        Commands::ClientForecast {
            client_id,
            working_year,
            format,
        } => db::cmd_client_forecast(client_id, working_year, format).await,
        #[cfg(not(feature = "database"))]
        Commands::Migrate { .. } | Commands::IngestFactors { .. } | Commands::ClientForecast { .. } => {
            anyhow::bail!("this command needs a build with the `database` feature")
        }
    }
}

fn cmd_calc(
    quantity: f64,
    factor: Option<f64>,
    ghg_unit: Option<String>,
    override_tco2e: Option<f64>,
    reason: Option<String>,
) -> anyhow::Result<()> {
    let input = RowInput {
        quantity,
        factor_value: factor,
        ghg_unit,
        override_tco2e,
        override_reason: reason,
    };
    let row = calculate_row(&input)?;
    println!("{}", serde_json::to_string_pretty(&row)?);
    Ok(())
}

fn print_table(table: &ForecastTable, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Table => print!("{}", table),
        OutputFormat::Csv => table
            .write_csv(io::stdout())
            .context("Failed to write forecast CSV")?,
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(table)?),
    }
    Ok(())
}

#[cfg(feature = "database")]
mod db {
    use super::*;
    use nzi_pro::config::AppConfig;
    use nzi_pro::database::{DatabaseConfig, DatabaseManager};
    use nzi_pro::ingest::read_factors_from_path;
    use nzi_pro::services::TargetForecastService;
    use nzi_types::DatasetMeta;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    pub enum DatasetTarget {
        Existing(i64),
        New(DatasetMeta),
    }

    async fn connect() -> anyhow::Result<(AppConfig, DatabaseManager)> {
        let config = AppConfig::from_env()?;
        let db_config = DatabaseConfig::from_app_config(&config)?;
        let manager = DatabaseManager::new(db_config)
            .await
            .context("Failed to connect to database")?;
        Ok((config, manager))
    }

    pub async fn cmd_migrate(dir: Option<PathBuf>) -> anyhow::Result<()> {
        let (config, manager) = connect().await?;
        let dir = dir.unwrap_or(config.migrations_dir);
        let report = manager.run_migrations(&dir).await?;
        println!(
            "Applied {} migration(s), skipped {}",
            report.applied.len(),
            report.skipped.len()
        );
        for file in &report.checksum_mismatches {
            println!("warning: {} changed since it was applied", file);
        }
        manager.close().await;
        Ok(())
    }

    pub async fn cmd_ingest(target: DatasetTarget, file: &Path) -> anyhow::Result<()> {
        let (_, manager) = connect().await?;
        let repo = manager.factor_repository();

        let meta = match target {
            DatasetTarget::Existing(id) => repo
                .get_dataset(id)
                .await?
                .with_context(|| format!("Dataset {} not found", id))?,
            DatasetTarget::New(mut meta) => {
                meta.dataset_id = repo.create_dataset(&meta).await?;
                meta
            }
        };

        let factors = read_factors_from_path(file, &meta)?;
        let count = repo.insert_factors(&factors).await?;
        println!("Imported {} factor(s) into dataset {}", count, meta.dataset_id);
        manager.close().await;
        Ok(())
    }

    pub async fn cmd_client_forecast(
        client_id: i64,
        working_year: Option<i32>,
        format: OutputFormat,
    ) -> anyhow::Result<()> {
        let (config, manager) = connect().await?;
        let service = TargetForecastService::new(Arc::new(manager.client_repository()));
        let forecast = service
            .forecast_for_client(client_id, working_year.unwrap_or(config.default_year))
            .await?;

        eprintln!(
            "Baseline year {} ({:?})",
            forecast.baseline_year.year, forecast.baseline_year.source
        );
        for warning in &forecast.warnings {
            eprintln!("warning: {}", warning);
        }
        print_table(&forecast.table, format)?;
        manager.close().await;
        Ok(())
    }
}
