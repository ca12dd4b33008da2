//! Application settings loaded from `settings.toml`.
//!
//! Every field has a default, so a missing file or a partial file is valid.
//! `DATABASE_URL` in the environment (usually from `.env`) overrides the file.

use crate::config::database::DEFAULT_DATABASE_URL;
use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info};

/// Configuration structure representing the entire settings.toml file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseSettings,
    pub aggregation: AggregationSettings,
    pub accounts: AccountSettings,
}

/// Where the document store lives
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub url: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_DATABASE_URL.to_string(),
        }
    }
}

/// Limits for household aggregation
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AggregationSettings {
    /// Upper bound on concurrent per-owner expense queries
    pub max_concurrent_fetches: usize,
    /// Number of expenses shown on the dashboard
    pub recent_expense_limit: usize,
}

impl Default for AggregationSettings {
    fn default() -> Self {
        Self {
            max_concurrent_fetches: 4,
            recent_expense_limit: 5,
        }
    }
}

/// Form rules for registration and child provisioning
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AccountSettings {
    pub min_password_length: usize,
    pub min_display_name_length: usize,
}

impl Default for AccountSettings {
    fn default() -> Self {
        Self {
            min_password_length: 6,
            min_display_name_length: 2,
        }
    }
}

/// Parses settings from a TOML string.
///
/// # Errors
/// Returns [`Error::Config`] when the TOML is malformed or a value has the wrong type.
pub fn parse_config(contents: &str) -> Result<AppConfig> {
    let config: AppConfig = toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse settings: {e}"),
    })?;
    if config.aggregation.max_concurrent_fetches == 0 {
        return Err(Error::Config {
            message: "aggregation.max_concurrent_fetches must be at least 1".to_string(),
        });
    }
    Ok(config)
}

/// Loads settings from `path`, falling back to defaults when the file does not exist.
///
/// # Errors
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let path_ref = path.as_ref();
    let mut config = if path_ref.exists() {
        debug!("Loading settings from {}", path_ref.display());
        let contents = std::fs::read_to_string(path_ref)?;
        parse_config(&contents)?
    } else {
        info!(
            "Settings file {} not found, using defaults",
            path_ref.display()
        );
        AppConfig::default()
    };

    if let Ok(url) = std::env::var("DATABASE_URL") {
        debug!("DATABASE_URL overrides configured database url");
        config.database.url = url;
    }

    Ok(config)
}
