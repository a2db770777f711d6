//! Configuration using Figment
//!
//! Configuration is loaded from:
//! 1. `config/rig.toml` (base configuration, optional)
//! 2. Environment variables prefixed with `RIG_COMM_`; nested keys are
//!    separated by a double underscore
//!
//! Every field has a default, so a missing file yields a usable
//! configuration.
//!
//! # Example
//! ```no_run
//! use rig_comm::config::RigConfig;
//!
//! # fn main() -> Result<(), rig_comm::LinkError> {
//! // RIG_COMM_SERIAL__BAUD_RATE=9600 overrides [serial] baud_rate
//! let config = RigConfig::load()?;
//! config.validate()?;
//! println!("Polling every {} ms", config.serial.poll_interval_ms);
//! # Ok(())
//! # }
//! ```

use crate::error::{LinkError, LinkResult};
use crate::link::{LinkSettings, DEFAULT_BAUD_RATE};
use crate::validation;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/rig.toml";

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "RIG_COMM_";

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RigConfig {
    /// Application settings
    pub application: ApplicationConfig,
    /// Serial link settings
    pub serial: SerialConfig,
    /// Credential store settings
    pub credentials: CredentialsConfig,
}

/// Application-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    /// Application name
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: "rig-comm".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Serial link configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Port to connect to; the first available port is used when unset
    pub port: Option<String>,
    /// Baud rate the firmware runs at
    pub baud_rate: u32,
    /// Bound on a single OS read, in milliseconds
    pub read_timeout_ms: u64,
    /// Wait after opening the port before trusting it, in milliseconds
    pub settle_delay_ms: u64,
    /// Period of the polling driver, in milliseconds
    pub poll_interval_ms: u64,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout_ms: 1000,
            settle_delay_ms: 2000,
            poll_interval_ms: 100,
        }
    }
}

impl SerialConfig {
    /// Connection timing for the controller.
    pub fn link_settings(&self) -> LinkSettings {
        LinkSettings::default()
            .with_read_timeout(Duration::from_millis(self.read_timeout_ms))
            .with_settle_delay(Duration::from_millis(self.settle_delay_ms))
    }

    /// Polling period for the driver loop.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Credential store configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialsConfig {
    /// Path of the `username, password` file
    pub path: PathBuf,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("database/user.txt"),
        }
    }
}

impl RigConfig {
    /// Load configuration from `config/rig.toml` and environment variables
    pub fn load() -> LinkResult<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific file path
    pub fn load_from<P: AsRef<Path>>(path: P) -> LinkResult<Self> {
        Ok(Self::figment(path.as_ref()).extract()?)
    }

    /// The provider stack: defaults, then the file, then the environment.
    pub fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(RigConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> LinkResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.to_lowercase().as_str()) {
            return Err(LinkError::Configuration(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            )));
        }

        validation::is_supported_baud_rate(self.serial.baud_rate).map_err(|e| {
            LinkError::Configuration(format!("serial.baud_rate {}: {}", self.serial.baud_rate, e))
        })?;

        if let Some(port) = &self.serial.port {
            validation::is_not_empty(port)
                .map_err(|e| LinkError::Configuration(format!("serial.port: {}", e)))?;
        }

        let timings = [
            ("read_timeout_ms", self.serial.read_timeout_ms),
            ("poll_interval_ms", self.serial.poll_interval_ms),
        ];
        for (name, value) in timings {
            validation::is_in_range(value, 1..=60_000).map_err(|e| {
                LinkError::Configuration(format!("serial.{} = {}: {}", name, value, e))
            })?;
        }
        validation::is_in_range(self.serial.settle_delay_ms, 0..=60_000).map_err(|e| {
            LinkError::Configuration(format!(
                "serial.settle_delay_ms = {}: {}",
                self.serial.settle_delay_ms, e
            ))
        })?;

        validation::is_valid_path(&self.credentials.path.to_string_lossy())
            .map_err(|e| LinkError::Configuration(format!("credentials.path: {}", e)))?;

        Ok(())
    }
}
