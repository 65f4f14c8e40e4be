//! Error handling for the emissions core
//!
//! This module provides idiomatic Rust error types using thiserror, one enum per
//! concern plus a top-level [`NziError`] for callers that cross concerns.

use nzi_types::Scope;
use thiserror::Error;

/// Main error type for the NZI core
#[derive(Error, Debug)]
pub enum NziError {
    #[error("Calculation error: {0}")]
    Calculation(#[from] CalcError),

    #[error("Ingest error: {0}")]
    Ingest(#[from] IngestError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Migration error: {0}")]
    Migration(#[from] MigrationError),

    #[error("Not found: {entity} {id}")]
    NotFound { entity: String, id: i64 },

    #[error("{scope} is disabled for job {job_id}")]
    ScopeDisabled { job_id: i64, scope: Scope },

    #[error("Forecast spans {years} years; at most {max} are allowed")]
    ForecastTooLong { years: usize, max: usize },

    #[cfg(feature = "database")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl NziError {
    pub fn not_found(entity: impl Into<String>, id: i64) -> Self {
        NziError::NotFound {
            entity: entity.into(),
            id,
        }
    }

    /// True for errors the presentation layer should show inline instead of failing the request
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            NziError::Calculation(_)
                | NziError::ScopeDisabled { .. }
                | NziError::ForecastTooLong { .. }
        )
    }
}

/// Row calculation validation errors.
///
/// These are caller-surfaced: the presentation layer blocks the save and shows
/// the message next to the offending field.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CalcError {
    #[error("An override tCO2e of {value} requires a non-blank override reason")]
    OverrideWithoutReason { value: f64 },

    #[error("Emission factor {factor_id} has no factor value")]
    MissingFactorValue { factor_id: i64 },

    #[error("Emission factor value '{raw}' is not numeric")]
    NonNumericFactor { raw: String },

    #[error("Emission factor {factor_id} not found")]
    FactorNotFound { factor_id: i64 },
}

/// Emission factor CSV ingestion errors
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("CSV missing required columns: {missing}")]
    MissingColumns { missing: String },

    #[error("Row {row}: factor value '{raw}' is not numeric")]
    InvalidFactor { row: usize, raw: String },

    #[error("Row {row}: missing description text")]
    MissingText { row: usize },

    #[error("CSV read error: {0}")]
    Csv(#[from] csv::Error),
}

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Environment variable {name} has invalid value '{value}': expected {expected}")]
    InvalidEnv {
        name: String,
        value: String,
        expected: String,
    },

    #[error("Missing required setting: {0}")]
    Missing(String),

    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}

/// SQL migration runner errors
#[derive(Error, Debug)]
pub enum MigrationError {
    #[error("Migrations folder not found: {0}")]
    FolderNotFound(String),

    #[error("Failed to read migration {file}: {source}")]
    Read {
        file: String,
        #[source]
        source: std::io::Error,
    },

    #[cfg(feature = "database")]
    #[error("Migration {file} failed: {source}")]
    Apply {
        file: String,
        #[source]
        source: sqlx::Error,
    },
}

/// Result type aliases for convenience
pub type NziResult<T> = Result<T, NziError>;
pub type CalcResult<T> = Result<T, CalcError>;
pub type IngestResult<T> = Result<T, IngestError>;
