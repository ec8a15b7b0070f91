//! Host-facing pump device
//!
//! Assembles the controller, the setpoint store and the optional pressure
//! gauge, and exposes them as named attributes and commands. Every attribute
//! read runs the keep-alive hook first.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use crate::companion::{CompanionDevice, DynamicAttributeBinder, PressureReader};
use crate::config::Config;
use crate::controller::{PumpCommand, PumpController};
use crate::error::{Result, TurbovacError};
use crate::hardware::PumpInterface;
use crate::logging::{StructuredLogger, get_device_logger};
use crate::persistence::{SetpointPersistence, SetpointStore};

mod attributes;

pub use attributes::{AttributeSpec, AttributeValue, is_static_attribute};
use attributes::{
    CURRENT, ERRORS, EXTRA_STATUS, FREQUENCY, PUMP_ON, STATE, STATUS, TEMPERATURE, VOLTAGE,
    WARNINGS,
};

pub struct TurboPumpDevice {
    controller: Arc<Mutex<PumpController>>,
    pressure: Option<PressureReader>,
    attributes: Vec<AttributeSpec>,
    logger: StructuredLogger,
}

impl TurboPumpDevice {
    /// Restore the setpoint, initialize the controller and bind the optional
    /// pressure attribute.
    ///
    /// An unreachable pump does not fail startup; the controller keeps
    /// retrying on refresh. Only an invalid configuration is fatal.
    pub async fn start(
        config: &Config,
        hardware: Box<dyn PumpInterface>,
        store: Option<Arc<dyn SetpointStore>>,
        companion: Option<Arc<dyn CompanionDevice>>,
    ) -> Result<Self> {
        config.validate()?;
        let identity = config.pump.device_identity.as_str();
        let logger = get_device_logger("device", identity);

        let persistence = if config.setpoint.persist {
            store.map(|store| {
                SetpointPersistence::new(
                    store,
                    identity,
                    Duration::from_millis(config.setpoint.store_timeout_ms),
                )
            })
        } else {
            None
        };

        let restored = match &persistence {
            Some(p) => p.load().await.unwrap_or_else(|e| {
                logger.warn(&format!("Could not restore setpoint, assuming off: {}", e));
                false
            }),
            None => false,
        };

        let mut controller = PumpController::new(hardware, config, persistence)?;
        if let Err(e) = controller
            .initialize(&config.pump.serial_port, restored)
            .await
        {
            logger.warn(&format!("Started without pump connection: {}", e));
        }

        let companion_config = config.companion.clone().unwrap_or_default();
        let pressure = DynamicAttributeBinder::new(&companion_config)
            .try_bind(companion)
            .await;

        let mut attributes = attributes::static_attributes();
        if let Some(reader) = &pressure {
            attributes.push(attributes::pressure_attribute(reader.label(), reader.unit()));
        }

        logger.info(&format!(
            "Device started with {} attributes",
            attributes.len()
        ));

        Ok(Self {
            controller: Arc::new(Mutex::new(controller)),
            pressure,
            attributes,
            logger,
        })
    }

    /// Shared handle for the periodic keep-alive task
    pub fn controller(&self) -> Arc<Mutex<PumpController>> {
        Arc::clone(&self.controller)
    }

    /// Keep-alive: throttled refresh of the cached status
    pub async fn always_executed_hook(&self) -> bool {
        self.controller.lock().await.refresh(Instant::now()).await
    }

    pub fn attributes(&self) -> &[AttributeSpec] {
        &self.attributes
    }

    pub fn has_pressure(&self) -> bool {
        self.pressure.is_some()
    }

    pub async fn read_attribute(&self, name: &str) -> Result<AttributeValue> {
        self.always_executed_hook().await;

        if let Some(reader) = &self.pressure
            && name == reader.label()
        {
            return Ok(AttributeValue::Float(reader.read().await?));
        }

        let controller = self.controller.lock().await;
        let measurement = |value: Option<f64>| {
            value
                .map(AttributeValue::Float)
                .ok_or_else(|| TurbovacError::not_initialized("no status captured yet"))
        };

        match name {
            PUMP_ON => Ok(AttributeValue::Bool(controller.pump_on())),
            FREQUENCY => measurement(controller.frequency()),
            TEMPERATURE => measurement(controller.temperature()),
            CURRENT => measurement(controller.current()),
            VOLTAGE => measurement(controller.voltage()),
            EXTRA_STATUS => Ok(AttributeValue::TextList(controller.status_descriptions())),
            WARNINGS => Ok(AttributeValue::TextList(controller.warnings())),
            ERRORS => Ok(AttributeValue::TextList(controller.errors())),
            STATE => Ok(AttributeValue::Text(controller.state().to_string())),
            STATUS => Ok(AttributeValue::Text(controller.status_text())),
            _ => Err(unknown_attribute(name)),
        }
    }

    pub async fn write_attribute(&self, name: &str, value: AttributeValue) -> Result<()> {
        match (name, value) {
            (PUMP_ON, AttributeValue::Bool(on)) => {
                self.controller.lock().await.set_pump_on(on).await
            }
            (PUMP_ON, other) => Err(TurbovacError::validation(
                "pump_on",
                format!("expected a boolean, got {:?}", other).as_str(),
            )),
            (name, _) if self.attributes.iter().any(|a| a.name == name) => Err(
                TurbovacError::validation(name, "attribute is read-only"),
            ),
            (name, _) => Err(unknown_attribute(name)),
        }
    }

    pub async fn execute(&self, command: PumpCommand) -> Result<()> {
        let result = self.controller.lock().await.execute(command).await;
        if let Err(e) = &result {
            self.logger.warn(&format!("{} failed: {}", command, e));
        }
        result
    }

    pub async fn shutdown(&self) {
        self.controller.lock().await.shutdown().await;
    }
}

fn unknown_attribute(name: &str) -> TurbovacError {
    TurbovacError::validation("attribute", format!("unknown attribute '{}'", name).as_str())
}
