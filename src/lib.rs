//! # TurboVac - turbomolecular vacuum pump controller
//!
//! Supervises a turbomolecular pump over its serial control interface and
//! exposes it to a control system as a device with typed attributes and
//! commands.
//!
//! ## Architecture
//!
//! - `status`: status bits, supervisory states and decoded snapshots
//! - `policy`: status bits to supervisory state and text views
//! - `throttle`: minimum interval between hardware reads
//! - `persistence`: setpoint store keyed by device identity
//! - `hardware`: pump interface seam and a simulated pump
//! - `controller`: controller state machine and commands
//! - `companion`: optional pressure gauge read over D-Bus
//! - `device`: host-facing attributes and commands
//! - `config`: YAML configuration and validation
//! - `logging`: structured logging and tracing

pub mod companion;
pub mod config;
pub mod controller;
pub mod device;
pub mod error;
pub mod hardware;
pub mod logging;
pub mod persistence;
pub mod policy;
pub mod status;
pub mod throttle;

// Re-export commonly used types
pub use config::Config;
pub use controller::{PumpCommand, PumpController};
pub use device::TurboPumpDevice;
pub use error::{Result, TurbovacError};
pub use status::{StatusFlag, StatusSnapshot, SupervisoryState};
