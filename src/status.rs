//! Decoded pump status
//!
//! Status flags as reported in the pump's status word, the immutable
//! snapshot captured on every successful hardware read, and the coarse
//! supervisory state projected from it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::error::{Result, TurbovacError};

/// One bit of the pump status word.
///
/// Discriminants are the bit numbers used on the wire. `Ord` follows the
/// discriminant so a `BTreeSet<StatusFlag>` iterates in enumeration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum StatusFlag {
    ReadyToSwitchOn = 0,
    ReadyForOperation = 1,
    OperationEnabled = 2,
    Error = 3,
    Accelerating = 4,
    Decelerating = 5,
    Initializing = 6,
    TemperatureWarning = 7,
    ParameterChannelFault = 8,
    RemoteControl = 9,
    FrequencyReached = 10,
    NormalOperation = 11,
    PumpTurning = 12,
    OverloadWarning = 13,
    CollectiveWarning = 14,
}

impl StatusFlag {
    /// Every flag in enumeration order
    pub const ALL: [Self; 15] = [
        Self::ReadyToSwitchOn,
        Self::ReadyForOperation,
        Self::OperationEnabled,
        Self::Error,
        Self::Accelerating,
        Self::Decelerating,
        Self::Initializing,
        Self::TemperatureWarning,
        Self::ParameterChannelFault,
        Self::RemoteControl,
        Self::FrequencyReached,
        Self::NormalOperation,
        Self::PumpTurning,
        Self::OverloadWarning,
        Self::CollectiveWarning,
    ];

    /// Warning classes A, B and C
    pub const WARNINGS: [Self; 3] = [
        Self::TemperatureWarning,
        Self::OverloadWarning,
        Self::CollectiveWarning,
    ];

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Result<Self> {
        Self::ALL
            .get(usize::from(code))
            .copied()
            .ok_or_else(|| {
                TurbovacError::validation("status_flag", format!("unknown status bit {}", code).as_str())
            })
    }

    /// Human-readable description shown in the status attributes
    pub fn description(self) -> &'static str {
        match self {
            Self::ReadyToSwitchOn => "Ready to switch on",
            Self::ReadyForOperation => "Ready for operation",
            Self::OperationEnabled => "Operation enabled",
            Self::Error => "Error condition",
            Self::Accelerating => "Pump is accelerating",
            Self::Decelerating => "Pump is decelerating",
            Self::Initializing => "Initialization in progress",
            Self::TemperatureWarning => "Temperature warning",
            Self::ParameterChannelFault => "Parameter channel request rejected",
            Self::RemoteControl => "Control via serial interface active",
            Self::FrequencyReached => "Frequency reached or exceeded",
            Self::NormalOperation => "Normal operation (pump at speed)",
            Self::PumpTurning => "Pump is turning",
            Self::OverloadWarning => "Overload warning",
            Self::CollectiveWarning => "Collective warning",
        }
    }

    pub fn is_warning(self) -> bool {
        Self::WARNINGS.contains(&self)
    }

    pub fn is_error(self) -> bool {
        self == Self::Error
    }

    /// Decode a raw status word, ignoring bits above the known range
    pub fn from_status_word(word: u16) -> BTreeSet<Self> {
        Self::ALL
            .iter()
            .copied()
            .filter(|flag| word & (1 << flag.code()) != 0)
            .collect()
    }
}

impl fmt::Display for StatusFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Coarse operational state seen by the control system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SupervisoryState {
    #[default]
    Unknown,
    Init,
    On,
    Moving,
    Running,
    Alarm,
    Fault,
}

impl SupervisoryState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "UNKNOWN",
            Self::Init => "INIT",
            Self::On => "ON",
            Self::Moving => "MOVING",
            Self::Running => "RUNNING",
            Self::Alarm => "ALARM",
            Self::Fault => "FAULT",
        }
    }

    /// Headline used by the free-text status
    pub fn message(self) -> &'static str {
        match self {
            Self::Unknown => "The pump state is unknown.",
            Self::Init => "The pump is initializing.",
            Self::On => "The pump is ready.",
            Self::Moving => "The pump is changing speed.",
            Self::Running => "The pump is running at speed.",
            Self::Alarm => "The pump reports a warning.",
            Self::Fault => "The pump reports an error.",
        }
    }
}

impl fmt::Display for SupervisoryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decoded view of one hardware reply. Replaced wholesale on every
/// successful refresh, never mutated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub frequency_hz: f64,
    pub temperature_c: f64,
    pub current_a: f64,
    pub voltage_v: f64,
    pub active_flags: BTreeSet<StatusFlag>,
    /// On/off setpoint echoed by the pump
    pub pump_on_setpoint: bool,
    pub captured_at: DateTime<Utc>,
}

impl StatusSnapshot {
    pub fn has(&self, flag: StatusFlag) -> bool {
        self.active_flags.contains(&flag)
    }
}
