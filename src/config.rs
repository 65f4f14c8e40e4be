//! Application configuration
//!
//! Settings come from the environment (optionally seeded by a `.env` file) with
//! an optional YAML file, named by `NZI_CONFIG`, layered on top.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

use crate::error::ConfigError;

pub const DEFAULT_APP_TITLE: &str = "NZI Pro";
pub const DEFAULT_WORKING_YEAR: i32 = 2026;
pub const DEFAULT_MIGRATIONS_DIR: &str = "migrations";
pub const DEFAULT_POOL_SIZE: u32 = 10;

/// Database section of the application config
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub pool_size: u32,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: None,
            pool_size: DEFAULT_POOL_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    pub app_title: String,
    /// Working year used when a client has no baseline and no reports
    pub default_year: i32,
    pub migrations_dir: PathBuf,
    pub database: DatabaseSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app_title: DEFAULT_APP_TITLE.to_string(),
            default_year: DEFAULT_WORKING_YEAR,
            migrations_dir: PathBuf::from(DEFAULT_MIGRATIONS_DIR),
            database: DatabaseSettings::default(),
        }
    }
}

/// YAML overrides; every field is optional
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    app_title: Option<String>,
    default_year: Option<i32>,
    migrations_dir: Option<PathBuf>,
    database: FileDatabaseConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileDatabaseConfig {
    url: Option<String>,
    pool_size: Option<u32>,
}

fn parse_var<T: FromStr>(name: &str, value: String, expected: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        name: name.to_string(),
        value,
        expected: expected.to_string(),
    })
}

impl AppConfig {
    /// Load from `.env`, the process environment and `NZI_CONFIG` if set
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load using `lookup` in place of the process environment
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(title) = lookup("NZI_APP_TITLE").filter(|v| !v.trim().is_empty()) {
            config.app_title = title;
        }
        if let Some(year) = lookup("NZI_DEFAULT_YEAR") {
            config.default_year = parse_var("NZI_DEFAULT_YEAR", year, "a year such as 2026")?;
        }
        if let Some(dir) = lookup("NZI_MIGRATIONS_DIR").filter(|v| !v.trim().is_empty()) {
            config.migrations_dir = PathBuf::from(dir);
        }
        config.database.url = lookup("DATABASE_URL").filter(|v| !v.trim().is_empty());
        if let Some(size) = lookup("DATABASE_POOL_SIZE") {
            config.database.pool_size =
                parse_var("DATABASE_POOL_SIZE", size, "a positive integer")?;
        }

        if let Some(path) = lookup("NZI_CONFIG").filter(|v| !v.trim().is_empty()) {
            config.apply_file(Path::new(&path))?;
        }

        debug!(
            app_title = %config.app_title,
            default_year = config.default_year,
            migrations_dir = %config.migrations_dir.display(),
            "loaded configuration"
        );
        Ok(config)
    }

    /// Overlay values from a YAML file
    pub fn apply_file(&mut self, path: &Path) -> Result<(), ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        self.apply_yaml(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    fn apply_yaml(&mut self, raw: &str) -> Result<(), serde_yaml::Error> {
        if raw.trim().is_empty() {
            return Ok(());
        }
        let file: FileConfig = serde_yaml::from_str(raw)?;

        if let Some(title) = file.app_title {
            self.app_title = title;
        }
        if let Some(year) = file.default_year {
            self.default_year = year;
        }
        if let Some(dir) = file.migrations_dir {
            self.migrations_dir = dir;
        }
        if let Some(url) = file.database.url {
            self.database.url = Some(url);
        }
        if let Some(size) = file.database.pool_size {
            self.database.pool_size = size;
        }
        Ok(())
    }

    /// Database URL, or `ConfigError::Missing` when none is configured
    pub fn database_url(&self) -> Result<&str, ConfigError> {
        self.database
            .url
            .as_deref()
            .ok_or_else(|| ConfigError::Missing("DATABASE_URL".to_string()))
    }
}
