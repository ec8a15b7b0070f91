use std::collections::BTreeSet;
use std::time::Instant;

use super::{PumpController, RefreshStats};
use crate::status::{StatusFlag, StatusSnapshot, SupervisoryState};

impl PumpController {
    /// Latest successful snapshot, if any
    pub fn snapshot(&self) -> Option<&StatusSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn state(&self) -> SupervisoryState {
        self.state
    }

    /// Desired setpoint. Answered from memory, so it stays readable while
    /// the pump is unreachable.
    pub fn pump_on(&self) -> bool {
        self.pump_on
    }

    pub fn frequency(&self) -> Option<f64> {
        self.snapshot.as_ref().map(|s| s.frequency_hz)
    }

    pub fn temperature(&self) -> Option<f64> {
        self.snapshot.as_ref().map(|s| s.temperature_c)
    }

    pub fn current(&self) -> Option<f64> {
        self.snapshot.as_ref().map(|s| s.current_a)
    }

    pub fn voltage(&self) -> Option<f64> {
        self.snapshot.as_ref().map(|s| s.voltage_v)
    }

    pub fn status_flags(&self) -> BTreeSet<StatusFlag> {
        self.active_flags()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.policy.warnings(&self.active_flags())
    }

    pub fn errors(&self) -> Vec<String> {
        self.policy.errors(&self.active_flags())
    }

    pub fn status_descriptions(&self) -> Vec<String> {
        self.policy.describe(&self.active_flags())
    }

    pub fn status_text(&self) -> String {
        self.policy.status_text(&self.active_flags())
    }

    pub fn last_refresh_at(&self) -> Option<Instant> {
        self.last_refresh_at
    }

    pub fn stats(&self) -> &RefreshStats {
        &self.stats
    }
}
