use std::fmt;
use std::str::FromStr;

use super::PumpController;
use crate::error::{Result, TurbovacError};

/// Commands accepted from the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpCommand {
    TurnOn,
    TurnOff,
    ResetError,
}

impl PumpCommand {
    pub fn name(self) -> &'static str {
        match self {
            Self::TurnOn => "TurnOn",
            Self::TurnOff => "TurnOff",
            Self::ResetError => "ResetError",
        }
    }
}

impl fmt::Display for PumpCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PumpCommand {
    type Err = TurbovacError;

    /// Accepts the command names plus the short console forms `on`, `off`
    /// and `reset`
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "turnon" | "turn_on" | "on" => Ok(Self::TurnOn),
            "turnoff" | "turn_off" | "off" => Ok(Self::TurnOff),
            "reseterror" | "reset_error" | "reset" => Ok(Self::ResetError),
            _ => Err(TurbovacError::validation(
                "command",
                format!("unknown command '{}'", s.trim()).as_str(),
            )),
        }
    }
}

impl PumpController {
    pub async fn execute(&mut self, command: PumpCommand) -> Result<()> {
        self.logger.debug(&format!("Executing {}", command));
        match command {
            PumpCommand::TurnOn => self.turn_on().await,
            PumpCommand::TurnOff => self.turn_off().await,
            PumpCommand::ResetError => self.reset_error().await,
        }
    }
}
