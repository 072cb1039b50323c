//! Configuration for the read filter.
//!
//! The configuration is read once when an [`AclRead`](crate::AclRead) module is
//! constructed and stays fixed for the module's lifetime.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;

use crate::{Error, Result};

/// Environment variable toggling read filtering in [`AclReadConfig::from_env`].
pub const ENABLED_ENV_VAR: &str = "ACLREAD_SEARCH_ENABLED";

/// Settings consumed by the read filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AclReadConfig {
    /// Whether searches are filtered at all. When false every search is
    /// forwarded to the backend untouched.
    pub enabled: bool,
}

impl Default for AclReadConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl AclReadConfig {
    /// A configuration with filtering turned off.
    pub fn disabled() -> Self {
        Self { enabled: false }
    }

    /// Parse a configuration from a JSON document. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Loads the configuration from a JSON file.
    ///
    /// # Arguments
    /// * `path` - The path to the configuration file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::FileIo {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&contents)
    }

    /// Builds the configuration from the process environment.
    ///
    /// An unset variable keeps the default (enabled).
    pub fn from_env() -> Result<Self> {
        match std::env::var(ENABLED_ENV_VAR) {
            Ok(value) => Ok(Self {
                enabled: parse_bool(ENABLED_ENV_VAR, &value)?,
            }),
            Err(std::env::VarError::NotPresent) => Ok(Self::default()),
            Err(std::env::VarError::NotUnicode(_)) => Err(ConfigError::InvalidValue {
                key: ENABLED_ENV_VAR.to_string(),
                value: "<non-unicode>".to_string(),
            }
            .into()),
        }
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        }
        .into()),
    }
}

/// Errors that can occur while loading configuration.
#[non_exhaustive]
#[derive(Debug, ThisError)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("Failed to read configuration file {path}")]
    FileIo {
        /// The path that failed to load
        path: String,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A configuration value could not be interpreted.
    #[error("Invalid value for {key}: {value}")]
    InvalidValue {
        /// The configuration key
        key: String,
        /// The rejected value
        value: String,
    },
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Config(err)
    }
}
