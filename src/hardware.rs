//! Hardware collaborator seam
//!
//! The serial transport and telegram codec live behind [`PumpInterface`].
//! The controller never interprets telegram bytes; it only sees decoded
//! [`StatusSnapshot`]s and success or failure of each call.

use crate::error::Result;
use crate::status::StatusSnapshot;

pub mod simulated;

pub use simulated::{SimulatedPump, SimulatedPumpControl};

#[async_trait::async_trait]
pub trait PumpInterface: Send + Sync {
    /// Open the control interface on `port`. The controller always passes
    /// `auto_refresh = false`; it drives refreshes itself.
    async fn open(&mut self, port: &str, auto_refresh: bool) -> Result<()>;

    fn is_open(&self) -> bool;

    /// Query the pump and decode its reply
    async fn refresh_status(&mut self) -> Result<StatusSnapshot>;

    /// Stage the on/off setpoint for the next telegram
    async fn write_setpoint(&mut self, pump_on: bool) -> Result<()>;

    /// Send staged writes now instead of waiting for the next refresh
    async fn apply_pending_writes(&mut self) -> Result<()>;

    /// Acknowledge and clear a latched pump error
    async fn reset_error(&mut self) -> Result<()>;
}
