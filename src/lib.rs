//! NZI Pro - emissions calculation and net-zero target forecasting
//!
//! This crate holds the computational core of the NZI Pro portal: converting
//! activity and spend data into tonnes of CO2-equivalent, enforcing the
//! override policy, and projecting a client's emissions to its net-zero year.
//!
//! ## Layout
//! The pure core (`units`, `calculation`, `baseline`, `forecast`) has no I/O.
//! Services reach client and factor records through the traits in `sources`;
//! Postgres repositories implement them behind the `database` feature.
//!
//! ## Quick Start
//!
//! ```rust
//! use nzi_pro::calculation::{calculate_row, RowInput};
//!
//! let row = calculate_row(&RowInput::new(1000.0).with_factor(0.5, Some("kgCO2e"))).unwrap();
//! assert_eq!(row.used_tco2e, Some(0.5));
//! ```

// Core error handling
pub mod error;

// Pure calculation core
pub mod baseline;
pub mod calculation;
pub mod forecast;
pub mod units;

// Configuration and factor dataset ingestion
pub mod config;
pub mod ingest;

// Data-source seams and the services built on them
pub mod services;
pub mod sources;

// Database integration (when enabled)
#[cfg(feature = "database")]
pub mod database;

// REST API (when enabled)
#[cfg(feature = "server")]
pub mod api;

// Public re-exports
pub use baseline::{resolve_baseline_year, Baseline, BaselineYear, BaselineYearSource};
pub use calculation::{calculate_row, calculate_tco2e, RowCalculation, RowInput};
pub use config::AppConfig;
pub use error::{CalcError, ConfigError, IngestError, NziError, NziResult};
pub use forecast::{build_forecast, ForecastParams, ForecastTable, RangeWarning};
pub use services::{ScopeEntryService, TargetForecastService};
pub use sources::{ClientSource, FactorQuery, FactorSource};

// Database integration re-exports (when database feature is enabled)
#[cfg(feature = "database")]
pub use database::{DatabaseConfig, DatabaseManager};

pub use nzi_types::{FactorMethod, Scope, ScopeValues};
