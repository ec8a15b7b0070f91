//! Configuration management for TurboVac
//!
//! This module handles loading, validation, and management of the device
//! server configuration from YAML files.

use crate::device::is_static_attribute;
use crate::error::{Result, TurbovacError};
use crate::status::{StatusFlag, SupervisoryState};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

mod defaults;

/// Environment variable naming an explicit configuration file
pub const CONFIG_ENV_VAR: &str = "TURBOVAC_CONFIG";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Pump connection parameters
    pub pump: PumpConfig,

    /// Refresh cadence
    pub polling: PollingConfig,

    /// Setpoint lifecycle and persistence
    pub setpoint: SetpointConfig,

    /// Optional companion pressure gauge
    pub companion: Option<CompanionConfig>,

    /// Ordered state rules; empty selects the built-in order
    pub state_rules: Vec<StateRuleConfig>,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Pump connection parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PumpConfig {
    /// Serial port of the USB COM port or RS485 adapter
    pub serial_port: String,

    /// Identity under which the setpoint is persisted
    pub device_identity: String,

    /// Upper bound for a single hardware call in milliseconds
    pub hardware_timeout_ms: u64,

    /// Drive a simulated pump instead of real hardware
    pub simulate: bool,
}

/// Refresh cadence
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Minimum seconds between hardware reads triggered by the keep-alive hook
    pub keepalive_min_interval_secs: f64,

    /// Period of the background keep-alive tick in seconds
    pub periodic_interval_secs: f64,
}

/// Setpoint lifecycle
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SetpointConfig {
    /// Restore the setpoint at startup and save it on every change
    pub persist: bool,

    /// Push the restored setpoint to the pump during initialization
    pub apply_on_startup: bool,

    /// Path of the JSON property store
    pub store_path: String,

    /// Upper bound for a single store call in milliseconds
    pub store_timeout_ms: u64,
}

/// Companion pressure gauge reachable on the bus
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompanionConfig {
    /// Bus service name of the gauge
    pub service: String,

    /// Object path of the pressure value
    pub path: String,

    /// Timeout of the startup probe and of each read in milliseconds
    pub probe_timeout_ms: u64,

    pub label: String,

    pub unit: String,
}

/// One entry of the ordered state rule list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateRuleConfig {
    /// Status bit codes; any active bit triggers the rule
    pub flags: Vec<u8>,

    /// State applied when the rule matches
    pub state: SupervisoryState,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    pub level: String,

    /// Path to log file
    pub file: String,

    /// Number of rotated files to keep
    pub backup_count: u32,

    /// Whether to log to console
    pub console_output: bool,

    /// Whether to use JSON format
    pub json_format: bool,
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration with validation.
    ///
    /// Lookup order: explicit path, `TURBOVAC_CONFIG`, default locations,
    /// built-in defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let config = if let Some(path) = explicit {
            Self::from_file(path)?
        } else if let Some(path) = std::env::var_os(CONFIG_ENV_VAR) {
            Self::from_file(path)?
        } else {
            let default_paths = [
                "turbovac_config.yaml",
                "/data/turbovac_config.yaml",
                "/etc/turbovac/config.yaml",
            ];
            match default_paths.iter().find(|p| Path::new(p).exists()) {
                Some(path) => Self::from_file(path)?,
                None => Config::default(),
            }
        };
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a YAML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.pump.serial_port.trim().is_empty() {
            return Err(TurbovacError::validation(
                "pump.serial_port",
                "Serial port cannot be empty",
            ));
        }

        if self.pump.device_identity.trim().is_empty() {
            return Err(TurbovacError::validation(
                "pump.device_identity",
                "Device identity cannot be empty",
            ));
        }

        if self.pump.hardware_timeout_ms == 0 {
            return Err(TurbovacError::validation(
                "pump.hardware_timeout_ms",
                "Must be greater than 0",
            ));
        }

        if Duration::try_from_secs_f64(self.polling.keepalive_min_interval_secs).is_err() {
            return Err(TurbovacError::validation(
                "polling.keepalive_min_interval_secs",
                "Must be a non-negative number of seconds within range",
            ));
        }

        if !(self.polling.periodic_interval_secs > 0.0
            && Duration::try_from_secs_f64(self.polling.periodic_interval_secs).is_ok())
        {
            return Err(TurbovacError::validation(
                "polling.periodic_interval_secs",
                "Must be greater than 0",
            ));
        }

        if self.setpoint.persist && self.setpoint.store_path.trim().is_empty() {
            return Err(TurbovacError::validation(
                "setpoint.store_path",
                "Store path cannot be empty when persist is enabled",
            ));
        }

        if self.setpoint.store_timeout_ms == 0 {
            return Err(TurbovacError::validation(
                "setpoint.store_timeout_ms",
                "Must be greater than 0",
            ));
        }

        if let Some(companion) = &self.companion {
            if companion.service.trim().is_empty() || companion.path.trim().is_empty() {
                return Err(TurbovacError::validation(
                    "companion",
                    "Service and path are required",
                ));
            }
            if companion.label.trim().is_empty() || is_static_attribute(&companion.label) {
                return Err(TurbovacError::validation(
                    "companion.label",
                    format!(
                        "'{}' is empty or already names a pump attribute",
                        companion.label
                    )
                    .as_str(),
                ));
            }
            if companion.probe_timeout_ms == 0 {
                return Err(TurbovacError::validation(
                    "companion.probe_timeout_ms",
                    "Must be greater than 0",
                ));
            }
        }

        for (i, rule) in self.state_rules.iter().enumerate() {
            if rule.flags.is_empty() {
                return Err(TurbovacError::validation(
                    format!("state_rules[{}].flags", i).as_str(),
                    "Must name at least one status bit",
                ));
            }
            for code in &rule.flags {
                StatusFlag::from_code(*code)?;
            }
        }

        Ok(())
    }
}
