use serde::Serialize;
use std::fmt;

/// Descriptor of one attribute exposed to the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttributeSpec {
    pub name: String,
    pub label: String,
    pub unit: String,
    /// printf-style display format
    pub format: String,
    pub writable: bool,
}

impl AttributeSpec {
    fn new(name: &str, label: &str, unit: &str, format: &str) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            unit: unit.to_string(),
            format: format.to_string(),
            writable: false,
        }
    }

    fn writable(mut self) -> Self {
        self.writable = true;
        self
    }
}

/// Value read from or written to an attribute
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Bool(bool),
    Float(f64),
    Text(String),
    TextList(Vec<String>),
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", b),
            Self::Float(v) => write!(f, "{:.2}", v),
            Self::Text(s) => f.write_str(s),
            Self::TextList(items) => f.write_str(&items.join("; ")),
        }
    }
}

pub const PUMP_ON: &str = "pump_on";
pub const FREQUENCY: &str = "frequency";
pub const TEMPERATURE: &str = "temperature";
pub const CURRENT: &str = "current";
pub const VOLTAGE: &str = "voltage";
pub const EXTRA_STATUS: &str = "extra_status";
pub const WARNINGS: &str = "warnings";
pub const ERRORS: &str = "errors";
pub const STATE: &str = "state";
pub const STATUS: &str = "status";

/// Whether `name` is taken by one of the fixed pump attributes
pub fn is_static_attribute(name: &str) -> bool {
    [
        PUMP_ON,
        FREQUENCY,
        TEMPERATURE,
        CURRENT,
        VOLTAGE,
        EXTRA_STATUS,
        WARNINGS,
        ERRORS,
        STATE,
        STATUS,
    ]
    .contains(&name)
}

/// Attributes every pump device exposes
pub(crate) fn static_attributes() -> Vec<AttributeSpec> {
    vec![
        AttributeSpec::new(PUMP_ON, "Pump on", "", "%s").writable(),
        AttributeSpec::new(FREQUENCY, "Frequency", "Hz", "%2.2f"),
        AttributeSpec::new(TEMPERATURE, "Temperature", "C", "%2.2f"),
        AttributeSpec::new(CURRENT, "Current", "A", "%2.2f"),
        AttributeSpec::new(VOLTAGE, "Voltage", "V", "%2.2f"),
        AttributeSpec::new(EXTRA_STATUS, "Status flags", "", "%s"),
        AttributeSpec::new(WARNINGS, "Warnings", "", "%s"),
        AttributeSpec::new(ERRORS, "Errors", "", "%s"),
        AttributeSpec::new(STATE, "State", "", "%s"),
        AttributeSpec::new(STATUS, "Status", "", "%s"),
    ]
}

pub(crate) fn pressure_attribute(name: &str, unit: &str) -> AttributeSpec {
    AttributeSpec::new(name, "Pressure", unit, "%.3e")
}
