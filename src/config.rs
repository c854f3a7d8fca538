/// Service configuration loader - parses climate_api.toml
///
/// Keeps deployment details (listen address, worker count, database schema)
/// and the "recent observations" window out of the code. Every field has a
/// default, so a missing file means a runnable default configuration.

use chrono::NaiveDate;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration file looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "climate_api.toml";

/// Upper bound for `tobs.lookback_days` (about a century).
pub const MAX_LOOKBACK_DAYS: u32 = 36_500;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Root configuration structure for TOML parsing
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub tobs: TobsConfig,
}

/// HTTP listener settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Worker threads, each holding its own database connection.
    pub workers: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            workers: 4,
        }
    }
}

/// Database settings. The connection string itself comes from DATABASE_URL.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Schema holding the `measurement` and `station` tables.
    pub schema: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            schema: "public".to_string(),
        }
    }
}

/// Window served by `/api/v1.0/tobs`
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TobsConfig {
    /// Station whose observations are listed.
    pub station: String,
    /// End of the window. `None` resolves to the latest date in the dataset.
    pub reference_date: Option<NaiveDate>,
    /// Length of the window in days, counted back from the reference date.
    pub lookback_days: u32,
}

impl Default for TobsConfig {
    fn default() -> Self {
        Self {
            station: "USC00519281".to_string(),
            reference_date: None,
            lookback_days: 365,
        }
    }
}

impl AppConfig {
    /// Parses configuration from TOML text and validates it.
    pub fn from_toml_str(contents: &str, origin: &Path) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.workers == 0 {
            return Err(ConfigError::Invalid(
                "server.workers must be at least 1".to_string(),
            ));
        }
        if self.tobs.station.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "tobs.station must not be empty".to_string(),
            ));
        }
        if self.tobs.lookback_days > MAX_LOOKBACK_DAYS {
            return Err(ConfigError::Invalid(format!(
                "tobs.lookback_days must be at most {}, got {}",
                MAX_LOOKBACK_DAYS, self.tobs.lookback_days
            )));
        }
        if !is_valid_identifier(&self.database.schema) {
            return Err(ConfigError::Invalid(format!(
                "database.schema '{}' is not a plain SQL identifier",
                self.database.schema
            )));
        }
        Ok(())
    }
}

/// Loads configuration.
///
/// With an explicit path the file must exist. Without one, `climate_api.toml`
/// in the working directory is used when present, defaults otherwise.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => {
            let default = PathBuf::from(DEFAULT_CONFIG_FILE);
            if !default.exists() {
                return Ok(AppConfig::default());
            }
            default
        }
    };

    let contents = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
        path: path.clone(),
        source,
    })?;

    AppConfig::from_toml_str(&contents, &path)
}

/// Letters, digits and underscores, not starting with a digit.
fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
