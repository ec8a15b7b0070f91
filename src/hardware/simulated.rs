//! Simulated turbopump
//!
//! Ramps the rotor frequency up and down on every status read and reports the
//! matching status bits. A [`SimulatedPumpControl`] handle injects link loss,
//! slow replies, latched errors and warnings.

use chrono::Utc;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use super::PumpInterface;
use crate::error::{Result, TurbovacError};
use crate::status::{StatusFlag, StatusSnapshot};

pub const NOMINAL_FREQUENCY_HZ: f64 = 820.0;
const RAMP_STEP_HZ: f64 = 205.0;
const SUPPLY_VOLTAGE_V: f64 = 24.0;

#[derive(Debug, Default)]
struct SimState {
    available: bool,
    reply_delay: Duration,
    open: bool,
    port: Option<String>,
    pending_setpoint: bool,
    applied_setpoint: bool,
    frequency_hz: f64,
    error_latched: bool,
    warnings: BTreeSet<StatusFlag>,
    refresh_count: u64,
    apply_count: u64,
    reset_count: u64,
}

impl SimState {
    fn step(&mut self) {
        let target = if self.applied_setpoint && !self.error_latched {
            NOMINAL_FREQUENCY_HZ
        } else {
            0.0
        };
        if self.frequency_hz < target {
            self.frequency_hz = (self.frequency_hz + RAMP_STEP_HZ).min(target);
        } else if self.frequency_hz > target {
            self.frequency_hz = (self.frequency_hz - RAMP_STEP_HZ).max(target);
        }
    }

    fn flags(&self) -> BTreeSet<StatusFlag> {
        let mut flags = BTreeSet::from([StatusFlag::ReadyToSwitchOn, StatusFlag::RemoteControl]);
        let turning = self.frequency_hz > 0.0;
        let running = self.applied_setpoint && !self.error_latched;

        if self.error_latched {
            flags.insert(StatusFlag::Error);
        } else {
            flags.insert(StatusFlag::ReadyForOperation);
            flags.insert(StatusFlag::OperationEnabled);
        }
        if turning {
            flags.insert(StatusFlag::PumpTurning);
        }
        if running && self.frequency_hz < NOMINAL_FREQUENCY_HZ {
            flags.insert(StatusFlag::Accelerating);
        }
        if !running && turning {
            flags.insert(StatusFlag::Decelerating);
        }
        if running && self.frequency_hz >= NOMINAL_FREQUENCY_HZ {
            flags.insert(StatusFlag::NormalOperation);
            flags.insert(StatusFlag::FrequencyReached);
        }
        flags.extend(self.warnings.iter().copied());
        flags
    }

    fn snapshot(&self) -> StatusSnapshot {
        let load = self.frequency_hz / NOMINAL_FREQUENCY_HZ;
        let accelerating = self.applied_setpoint && self.frequency_hz < NOMINAL_FREQUENCY_HZ;
        StatusSnapshot {
            frequency_hz: self.frequency_hz,
            temperature_c: 25.0 + 15.0 * load,
            current_a: if accelerating { 2.4 } else { 0.3 + 0.5 * load },
            voltage_v: SUPPLY_VOLTAGE_V,
            active_flags: self.flags(),
            pump_on_setpoint: self.applied_setpoint,
            captured_at: Utc::now(),
        }
    }
}

/// Test and demo handle onto a [`SimulatedPump`]
#[derive(Debug, Clone)]
pub struct SimulatedPumpControl {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedPumpControl {
    fn lock(&self) -> MutexGuard<'_, SimState> {
        // A panic while holding the lock only happens in a failing test
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Make every call fail as if the serial link were down
    pub fn set_available(&self, available: bool) {
        self.lock().available = available;
    }

    /// Delay every reply; longer than the controller timeout simulates a hang
    pub fn set_reply_delay(&self, delay: Duration) {
        self.lock().reply_delay = delay;
    }

    /// Latch a pump error; the rotor spins down until reset
    pub fn inject_error(&self) {
        self.lock().error_latched = true;
    }

    pub fn set_warning(&self, flag: StatusFlag, active: bool) {
        let mut state = self.lock();
        if active {
            state.warnings.insert(flag);
        } else {
            state.warnings.remove(&flag);
        }
    }

    /// Setpoint staged by the last write
    pub fn pending_setpoint(&self) -> bool {
        self.lock().pending_setpoint
    }

    /// Setpoint the pump is actually acting on
    pub fn applied_setpoint(&self) -> bool {
        self.lock().applied_setpoint
    }

    pub fn frequency_hz(&self) -> f64 {
        self.lock().frequency_hz
    }

    pub fn error_latched(&self) -> bool {
        self.lock().error_latched
    }

    pub fn port(&self) -> Option<String> {
        self.lock().port.clone()
    }

    pub fn refresh_count(&self) -> u64 {
        self.lock().refresh_count
    }

    pub fn apply_count(&self) -> u64 {
        self.lock().apply_count
    }

    pub fn reset_count(&self) -> u64 {
        self.lock().reset_count
    }
}

/// In-memory pump model implementing [`PumpInterface`]
#[derive(Debug)]
pub struct SimulatedPump {
    control: SimulatedPumpControl,
}

impl Default for SimulatedPump {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedPump {
    pub fn new() -> Self {
        let state = SimState {
            available: true,
            ..SimState::default()
        };
        Self {
            control: SimulatedPumpControl {
                state: Arc::new(Mutex::new(state)),
            },
        }
    }

    pub fn control(&self) -> SimulatedPumpControl {
        self.control.clone()
    }

    /// Wait out the configured reply delay, then fail if the link is down
    async fn link(&self) -> Result<()> {
        let delay = self.control.lock().reply_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let state = self.control.lock();
        if !state.available {
            return Err(TurbovacError::hardware("no reply from pump"));
        }
        if !state.open {
            return Err(TurbovacError::hardware("serial port not open"));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl PumpInterface for SimulatedPump {
    async fn open(&mut self, port: &str, _auto_refresh: bool) -> Result<()> {
        let mut state = self.control.lock();
        if !state.available {
            return Err(TurbovacError::hardware(format!("cannot open {}", port)));
        }
        state.open = true;
        state.port = Some(port.to_string());
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.control.lock().open
    }

    async fn refresh_status(&mut self) -> Result<StatusSnapshot> {
        self.link().await?;
        let mut state = self.control.lock();
        state.step();
        state.refresh_count += 1;
        Ok(state.snapshot())
    }

    async fn write_setpoint(&mut self, pump_on: bool) -> Result<()> {
        self.link().await?;
        self.control.lock().pending_setpoint = pump_on;
        Ok(())
    }

    async fn apply_pending_writes(&mut self) -> Result<()> {
        self.link().await?;
        let mut state = self.control.lock();
        state.applied_setpoint = state.pending_setpoint;
        state.apply_count += 1;
        Ok(())
    }

    async fn reset_error(&mut self) -> Result<()> {
        self.link().await?;
        let mut state = self.control.lock();
        state.error_latched = false;
        state.reset_count += 1;
        Ok(())
    }
}
