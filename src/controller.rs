//! Pump controller state machine
//!
//! Owns the hardware collaborator, the latest status snapshot and the desired
//! on/off setpoint. Refreshes are fail-soft: a failed read keeps the previous
//! snapshot and is only logged. Commands surface hardware failures to the
//! caller.

use std::collections::BTreeSet;
use std::future::Future;
use std::time::{Duration, Instant};

use crate::config::Config;
use crate::error::{Result, TurbovacError};
use crate::hardware::PumpInterface;
use crate::logging::{StructuredLogger, get_device_logger};
use crate::persistence::SetpointPersistence;
use crate::policy::StatusBitPolicy;
use crate::status::{StatusFlag, StatusSnapshot, SupervisoryState};
use crate::throttle::PollingThrottle;

mod commands;
mod views;

pub use commands::PumpCommand;

/// Lifecycle phase of the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerPhase {
    Uninitialized,
    Active,
    ShutDown,
}

/// Refresh counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshStats {
    pub attempts: u64,
    pub successes: u64,
    pub failures: u64,
    /// Keep-alive calls skipped by the throttle
    pub throttled: u64,
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
}

/// Main controller for one pump
pub struct PumpController {
    hardware: Box<dyn PumpInterface>,
    policy: StatusBitPolicy,
    throttle: PollingThrottle,
    persistence: Option<SetpointPersistence>,
    hardware_timeout: Duration,
    apply_on_startup: bool,

    phase: ControllerPhase,
    port: Option<String>,
    snapshot: Option<StatusSnapshot>,
    state: SupervisoryState,
    /// Desired setpoint; may differ from what the pump last echoed
    pump_on: bool,
    /// Restored setpoint not yet written to the pump
    restore_pending: bool,
    last_refresh_at: Option<Instant>,
    stats: RefreshStats,

    logger: StructuredLogger,
}

impl PumpController {
    /// Build an uninitialized controller. Fails only on an invalid rule list.
    pub fn new(
        hardware: Box<dyn PumpInterface>,
        config: &Config,
        persistence: Option<SetpointPersistence>,
    ) -> Result<Self> {
        Ok(Self {
            hardware,
            policy: StatusBitPolicy::from_config(&config.state_rules)?,
            throttle: PollingThrottle::from_secs_f64(config.polling.keepalive_min_interval_secs),
            persistence,
            hardware_timeout: Duration::from_millis(config.pump.hardware_timeout_ms),
            apply_on_startup: config.setpoint.apply_on_startup,
            phase: ControllerPhase::Uninitialized,
            port: None,
            snapshot: None,
            state: SupervisoryState::Unknown,
            pump_on: false,
            restore_pending: false,
            last_refresh_at: None,
            stats: RefreshStats::default(),
            logger: get_device_logger("controller", &config.pump.device_identity),
        })
    }

    /// Open the pump, adopt the restored setpoint and capture a first
    /// snapshot.
    ///
    /// An `open` failure is returned, but the controller is Active anyway.
    /// Later refreshes retry the open and then push the restored setpoint.
    pub async fn initialize(&mut self, port: &str, persisted_setpoint: bool) -> Result<()> {
        if self.phase != ControllerPhase::Uninitialized {
            return Err(TurbovacError::validation(
                "phase",
                "controller already initialized",
            ));
        }

        self.logger.info(&format!(
            "Initializing pump on {} (restored pump_on={})",
            port, persisted_setpoint
        ));
        self.port = Some(port.to_string());
        self.pump_on = persisted_setpoint;
        self.restore_pending = self.apply_on_startup;
        self.phase = ControllerPhase::Active;

        if let Err(e) = self.open_hardware().await {
            self.logger
                .error(&format!("Pump unavailable at startup, will retry: {}", e));
            return Err(e);
        }

        self.apply_restored_setpoint().await;
        self.capture(Instant::now()).await;
        self.logger
            .info(&format!("Pump controller active, state {}", self.state));
        Ok(())
    }

    /// Throttled keep-alive refresh. Returns whether a new snapshot was
    /// captured; failures are logged, never returned.
    pub async fn refresh(&mut self, now: Instant) -> bool {
        if self.phase != ControllerPhase::Active {
            return false;
        }
        if !self.throttle.should_refresh(now, self.last_refresh_at) {
            self.stats.throttled += 1;
            return false;
        }
        self.capture(now).await
    }

    /// Refresh ignoring the throttle
    pub async fn force_refresh(&mut self, now: Instant) -> bool {
        if self.phase != ControllerPhase::Active {
            return false;
        }
        self.capture(now).await
    }

    pub async fn turn_on(&mut self) -> Result<()> {
        self.change_setpoint(true).await
    }

    pub async fn turn_off(&mut self) -> Result<()> {
        self.change_setpoint(false).await
    }

    /// Writable `pump_on` attribute
    pub async fn set_pump_on(&mut self, pump_on: bool) -> Result<()> {
        if pump_on {
            self.turn_on().await
        } else {
            self.turn_off().await
        }
    }

    /// Clear a latched pump error and leave the pump switched off
    pub async fn reset_error(&mut self) -> Result<()> {
        self.ensure_active()?;

        self.ensure_open().await?;
        let timeout = self.hardware_timeout;
        bounded(timeout, "reset error", self.hardware.reset_error()).await?;
        self.logger.info("Pump error reset");

        self.pump_on = false;
        self.restore_pending = false;
        if let Err(e) = self.push_setpoint(false).await {
            self.logger
                .warn(&format!("Failed to write setpoint after reset: {}", e));
        }
        self.persist(false).await;
        Ok(())
    }

    /// Persist the setpoint and stop serving. Never fails; repeated calls
    /// are no-ops.
    pub async fn shutdown(&mut self) {
        match self.phase {
            ControllerPhase::ShutDown => return,
            ControllerPhase::Active => self.persist(self.pump_on).await,
            ControllerPhase::Uninitialized => {}
        }
        self.phase = ControllerPhase::ShutDown;
        self.logger.info("Pump controller shut down");
    }

    async fn change_setpoint(&mut self, pump_on: bool) -> Result<()> {
        self.ensure_active()?;

        // A command supersedes a restored setpoint still waiting for the pump
        let previous = self.pump_on;
        let restore_pending = std::mem::replace(&mut self.restore_pending, false);
        self.pump_on = pump_on;
        if let Err(e) = self.push_setpoint(pump_on).await {
            self.pump_on = previous;
            self.restore_pending = restore_pending;
            self.logger.error(&format!(
                "Failed to switch pump {}: {}",
                if pump_on { "on" } else { "off" },
                e
            ));
            return Err(e);
        }

        self.logger.info(&format!(
            "Pump switched {}",
            if pump_on { "on" } else { "off" }
        ));
        self.persist(pump_on).await;
        Ok(())
    }

    /// Write-through plus immediate apply, bypassing the throttle
    async fn push_setpoint(&mut self, pump_on: bool) -> Result<()> {
        self.ensure_open().await?;
        self.write_through(pump_on).await
    }

    async fn write_through(&mut self, pump_on: bool) -> Result<()> {
        let timeout = self.hardware_timeout;
        bounded(timeout, "write setpoint", self.hardware.write_setpoint(pump_on)).await?;
        bounded(timeout, "apply writes", self.hardware.apply_pending_writes()).await
    }

    async fn capture(&mut self, now: Instant) -> bool {
        self.stats.attempts += 1;
        let timeout = self.hardware_timeout;
        let result = match self.ensure_open().await {
            Ok(()) => bounded(timeout, "refresh status", self.hardware.refresh_status()).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(snapshot) => {
                let state = self.policy.derive_state(&snapshot.active_flags);
                if state != self.state {
                    self.logger
                        .info(&format!("State changed {} -> {}", self.state, state));
                }
                if self.stats.consecutive_failures > 0 {
                    self.logger.info(&format!(
                        "Pump answering again after {} failed refreshes",
                        self.stats.consecutive_failures
                    ));
                }
                self.state = state;
                self.snapshot = Some(snapshot);
                self.last_refresh_at = Some(now);
                self.stats.successes += 1;
                self.stats.consecutive_failures = 0;
                true
            }
            Err(e) => {
                self.stats.failures += 1;
                self.stats.consecutive_failures = self.stats.consecutive_failures.saturating_add(1);
                let message = format!("Refresh failed, keeping last snapshot: {}", e);
                if self.stats.consecutive_failures == 1 {
                    self.logger.warn(&message);
                } else {
                    self.logger.debug(&message);
                }
                self.stats.last_error = Some(e.to_string());
                false
            }
        }
    }

    /// Reopen a closed link and deliver a restored setpoint the pump has
    /// not received yet
    async fn ensure_open(&mut self) -> Result<()> {
        if !self.hardware.is_open() {
            self.open_hardware().await?;
        }
        self.apply_restored_setpoint().await;
        Ok(())
    }

    async fn apply_restored_setpoint(&mut self) {
        if !self.restore_pending {
            return;
        }
        let pump_on = self.pump_on;
        match self.write_through(pump_on).await {
            Ok(()) => {
                self.restore_pending = false;
                self.logger
                    .info(&format!("Applied restored setpoint pump_on={}", pump_on));
            }
            Err(e) => self.logger.warn(&format!(
                "Failed to apply restored setpoint, will retry: {}",
                e
            )),
        }
    }

    async fn open_hardware(&mut self) -> Result<()> {
        let port = self
            .port
            .clone()
            .ok_or_else(|| TurbovacError::not_initialized("no serial port assigned"))?;
        let timeout = self.hardware_timeout;
        bounded(timeout, "open", self.hardware.open(&port, false)).await?;
        self.logger.debug(&format!("Opened {}", port));
        Ok(())
    }

    async fn persist(&self, pump_on: bool) {
        if let Some(persistence) = &self.persistence {
            persistence.save_best_effort(pump_on).await;
        }
    }

    fn ensure_active(&self) -> Result<()> {
        match self.phase {
            ControllerPhase::Active => Ok(()),
            ControllerPhase::Uninitialized => Err(TurbovacError::not_initialized(
                "controller not initialized",
            )),
            ControllerPhase::ShutDown => {
                Err(TurbovacError::not_initialized("controller shut down"))
            }
        }
    }

    pub fn phase(&self) -> ControllerPhase {
        self.phase
    }

    pub fn port(&self) -> Option<&str> {
        self.port.as_deref()
    }

    pub fn policy(&self) -> &StatusBitPolicy {
        &self.policy
    }

    fn active_flags(&self) -> BTreeSet<StatusFlag> {
        self.snapshot
            .as_ref()
            .map(|s| s.active_flags.clone())
            .unwrap_or_default()
    }
}

/// Run one hardware call under `timeout`. Every failure, including the
/// timeout itself, is reported as `HardwareUnavailable`.
async fn bounded<T>(
    timeout: Duration,
    operation: &str,
    call: impl Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(timeout, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) if e.is_hardware() => Err(e),
        Ok(Err(e)) => Err(TurbovacError::hardware(format!("{}: {}", operation, e))),
        Err(_) => Err(TurbovacError::hardware(format!(
            "{} timed out after {} ms",
            operation,
            timeout.as_millis()
        ))),
    }
}

#[cfg(test)]
mod tests;
