//! Ledger configuration
//!
//! Loaded from TOML, then overridden from the environment:
//!
//! ```toml
//! database_path = "lunch_delivery.db"
//! store_timeout_ms = 5000
//! fulfilled_records = "locked"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Environment variable overriding [`LedgerConfig::database_path`]
pub const ENV_DATABASE_PATH: &str = "LUNCH_DATABASE_PATH";
/// Environment variable overriding [`LedgerConfig::store_timeout_ms`]
pub const ENV_STORE_TIMEOUT_MS: &str = "LUNCH_STORE_TIMEOUT_MS";

/// Errors raised while loading or validating configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read
    #[error("Failed to read config file {path}: {source}")]
    Read {
        /// File that was read
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// The file is not valid TOML for this schema
    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is present but unusable
    #[error("Invalid configuration: {field} - {reason}")]
    Invalid {
        /// Offending field
        field: &'static str,
        /// Why it was rejected
        reason: String,
    },
}

/// Whether delivered permissions may still be updated or deleted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FulfilledRecordPolicy {
    /// Delivered permissions are frozen; update and delete are refused
    #[default]
    Locked,
    /// Delivered permissions may be edited or removed like pending ones
    Mutable,
}

/// Configuration for one ledger instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LedgerConfig {
    /// SQLite database file
    pub database_path: PathBuf,
    /// Upper bound for a single store round trip, in milliseconds
    pub store_timeout_ms: u64,
    /// Treatment of permissions that are already delivered
    pub fulfilled_records: FulfilledRecordPolicy,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("lunch_delivery.db"),
            store_timeout_ms: 5_000,
            fulfilled_records: FulfilledRecordPolicy::Locked,
        }
    }
}

impl LedgerConfig {
    /// Parse configuration from TOML text
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed input or unknown keys.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] or [`ConfigError::Parse`].
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Apply overrides from the process environment
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if an override cannot be parsed.
    pub fn merge_with_env(&mut self) -> Result<(), ConfigError> {
        self.merge_with_vars(std::env::vars())
    }

    /// Apply overrides from an explicit set of variables
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if an override cannot be parsed.
    pub fn merge_with_vars<I, K, V>(&mut self, vars: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        for (key, value) in vars {
            match key.as_ref() {
                ENV_DATABASE_PATH => self.database_path = PathBuf::from(value.into()),
                ENV_STORE_TIMEOUT_MS => {
                    let value = value.into();
                    self.store_timeout_ms =
                        value.trim().parse().map_err(|e| ConfigError::Invalid {
                            field: "store_timeout_ms",
                            reason: format!("{value:?} is not a number of milliseconds: {e}"),
                        })?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid {
                field: "database_path",
                reason: "must not be empty".to_string(),
            });
        }
        if self.store_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "store_timeout_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Store round-trip bound as a [`Duration`]
    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}
