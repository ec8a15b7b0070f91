//! Error types and handling for TurboVac
//!
//! This module defines the error taxonomy used throughout the controller.
//! Command paths surface `HardwareUnavailable` to their caller; refresh and
//! persistence paths log and swallow their failures.

use thiserror::Error;

/// Result type alias for TurboVac operations
pub type Result<T> = std::result::Result<T, TurbovacError>;

/// Main error type for TurboVac
#[derive(Debug, Error)]
pub enum TurbovacError {
    /// Serial/transport failure or timeout while talking to the pump
    #[error("Hardware unavailable: {message}")]
    HardwareUnavailable { message: String },

    /// Persistent setpoint store could not be read or written
    #[error("Setpoint store unavailable: {message}")]
    StoreUnavailable { message: String },

    /// Companion device did not answer the startup probe
    #[error("Companion device unreachable: {message}")]
    CompanionUnreachable { message: String },

    /// Operation requires an initialized controller
    #[error("Controller not initialized: {message}")]
    NotInitialized { message: String },

    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Validation errors
    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    /// Serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// File I/O errors
    #[error("I/O error: {message}")]
    Io { message: String },
}

impl TurbovacError {
    /// Create a new hardware error
    pub fn hardware<S: Into<String>>(message: S) -> Self {
        Self::HardwareUnavailable {
            message: message.into(),
        }
    }

    /// Create a new store error
    pub fn store<S: Into<String>>(message: S) -> Self {
        Self::StoreUnavailable {
            message: message.into(),
        }
    }

    /// Create a new companion error
    pub fn companion<S: Into<String>>(message: S) -> Self {
        Self::CompanionUnreachable {
            message: message.into(),
        }
    }

    pub fn not_initialized<S: Into<String>>(message: S) -> Self {
        Self::NotInitialized {
            message: message.into(),
        }
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(field: S, message: S) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Whether this error means the pump could not be reached
    pub fn is_hardware(&self) -> bool {
        matches!(self, Self::HardwareUnavailable { .. })
    }
}

impl From<std::io::Error> for TurbovacError {
    fn from(err: std::io::Error) -> Self {
        Self::io(err.to_string())
    }
}

impl From<serde_yaml::Error> for TurbovacError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for TurbovacError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<zbus::Error> for TurbovacError {
    fn from(err: zbus::Error) -> Self {
        Self::companion(format!("DBus call failed: {}", err))
    }
}
