//! Process-wide defaults via `wideorm.toml`
//!
//! The configuration file only carries the lowest precedence tier of
//! per-operation options. It is read once at startup and converted to
//! [`GlobalDefaults`], which is what the context factory receives.

use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::path::Path;
use tracing::info;
use wideorm_core::{ConsistencyLevel, Error, GlobalDefaults, Result};

/// Conventional config file name
pub const CONFIG_FILE_NAME: &str = "wideorm.toml";

/// Mapping-layer configuration loaded from `wideorm.toml`.
///
/// # Example
///
/// ```toml
/// default_read_consistency = "ONE"
/// default_write_consistency = "QUORUM"
/// # default_ttl_seconds = 3600
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WideOrmConfig {
    /// Consistency for reads when neither the call nor the entity sets one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_read_consistency: Option<ConsistencyLevel>,
    /// Consistency for writes when neither the call nor the entity sets one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_write_consistency: Option<ConsistencyLevel>,
    /// TTL for writes when neither the call nor the entity sets one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_ttl_seconds: Option<u32>,
}

impl WideOrmConfig {
    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# WideORM configuration
#
# Lowest-precedence defaults. A value set on the call, then a value declared
# on the entity, take priority over these.
#
# Consistency levels: ANY, ONE, TWO, THREE, QUORUM, LOCAL_ONE,
# LOCAL_QUORUM, EACH_QUORUM, ALL. Leave unset to use the executor default.
# default_read_consistency = "ONE"
# default_write_consistency = "ONE"

# TTL in seconds applied to writes (must be positive). Unset = no expiry.
# default_ttl_seconds = 86400
"#
    }

    /// Parse config from TOML text.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the text does not parse or a value is invalid.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: WideOrmConfig = toml::from_str(content)
            .map_err(|e| Error::config(format!("Failed to parse configuration: {}", e)))?;
        config.defaults()?;
        Ok(config)
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config = Self::from_toml_str(&content).map_err(|e| match e {
            Error::Config(msg) => Error::config(format!("{} ({})", msg, path.display())),
            other => other,
        })?;
        info!(target: "wideorm::config", path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Write the default config file if it does not already exist.
    ///
    /// Returns `Ok(())` whether the file was created or already existed.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|e| {
                Error::config(format!(
                    "Failed to write default config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
            info!(target: "wideorm::config", path = %path.display(), "wrote default configuration");
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|e| {
            Error::config(format!(
                "Failed to write config file '{}': {}",
                path.display(),
                e
            ))
        })
    }

    /// Convert to the defaults handed to the context factory.
    ///
    /// # Errors
    ///
    /// Returns `Config` for a zero TTL.
    pub fn defaults(&self) -> Result<GlobalDefaults> {
        let ttl = match self.default_ttl_seconds {
            None => None,
            Some(secs) => Some(NonZeroU32::new(secs).ok_or_else(|| {
                Error::config("default_ttl_seconds must be positive")
            })?),
        };
        Ok(GlobalDefaults {
            read_consistency: self.default_read_consistency,
            write_consistency: self.default_write_consistency,
            ttl,
        })
    }
}
