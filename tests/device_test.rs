use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use turbovac::companion::CompanionDevice;
use turbovac::config::{CompanionConfig, Config};
use turbovac::controller::PumpCommand;
use turbovac::device::{AttributeValue, TurboPumpDevice};
use turbovac::error::{Result, TurbovacError};
use turbovac::hardware::SimulatedPump;
use turbovac::persistence::{MemorySetpointStore, SetpointStore};

struct Gauge {
    alive: AtomicBool,
}

#[async_trait::async_trait]
impl CompanionDevice for Gauge {
    fn name(&self) -> String {
        "test/gauge".to_string()
    }

    async fn probe(&self) -> Result<()> {
        if self.alive.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(TurbovacError::companion("gauge offline"))
        }
    }

    async fn read_value(&self) -> Result<f64> {
        Ok(2.5e-6)
    }
}

fn test_config() -> Config {
    let mut config = Config::default();
    config.pump.hardware_timeout_ms = 50;
    config.companion = Some(CompanionConfig::default());
    config
}

async fn start(alive: bool) -> (TurboPumpDevice, Arc<Gauge>, Arc<MemorySetpointStore>) {
    let gauge = Arc::new(Gauge {
        alive: AtomicBool::new(alive),
    });
    let store = Arc::new(MemorySetpointStore::new());
    let device = TurboPumpDevice::start(
        &test_config(),
        Box::new(SimulatedPump::new()),
        Some(store.clone()),
        Some(gauge.clone()),
    )
    .await
    .unwrap();
    (device, gauge, store)
}

#[tokio::test]
async fn bound_companion_adds_pressure() {
    let (device, _gauge, _store) = start(true).await;
    assert!(device.has_pressure());
    assert!(device.attributes().iter().any(|a| a.name == "pressure"));
    assert_eq!(
        device.read_attribute("pressure").await.unwrap(),
        AttributeValue::Float(2.5e-6)
    );
}

#[tokio::test]
async fn failed_probe_omits_pressure_for_lifetime() {
    let (device, gauge, _store) = start(false).await;
    assert!(!device.has_pressure());

    gauge.alive.store(true, Ordering::SeqCst);
    assert!(device.attributes().iter().all(|a| a.name != "pressure"));
    assert!(matches!(
        device.read_attribute("pressure").await,
        Err(TurbovacError::Validation { .. })
    ));
    assert!(device.read_attribute("state").await.is_ok());
}

#[tokio::test]
async fn attributes_and_commands() {
    let (device, _gauge, store) = start(true).await;

    assert_eq!(
        device.read_attribute("state").await.unwrap(),
        AttributeValue::Text("ON".to_string())
    );
    assert_eq!(
        device.read_attribute("errors").await.unwrap(),
        AttributeValue::TextList(vec!["Clear".to_string()])
    );
    assert!(matches!(
        device.read_attribute("frequency").await.unwrap(),
        AttributeValue::Float(_)
    ));

    device
        .write_attribute("pump_on", AttributeValue::Bool(true))
        .await
        .unwrap();
    assert_eq!(
        device.read_attribute("pump_on").await.unwrap(),
        AttributeValue::Bool(true)
    );
    assert!(store.load("vacuum/turbovac/1").unwrap());

    device.execute(PumpCommand::TurnOff).await.unwrap();
    assert_eq!(
        device.read_attribute("pump_on").await.unwrap(),
        AttributeValue::Bool(false)
    );

    device.execute(PumpCommand::ResetError).await.unwrap();
    device.shutdown().await;
    assert!(device.execute(PumpCommand::TurnOn).await.is_err());
}

#[tokio::test]
async fn clashing_pressure_label_refused_at_start() {
    let mut config = test_config();
    config.companion = Some(CompanionConfig {
        label: "frequency".to_string(),
        ..CompanionConfig::default()
    });
    let gauge = Arc::new(Gauge {
        alive: AtomicBool::new(true),
    });
    let result =
        TurboPumpDevice::start(&config, Box::new(SimulatedPump::new()), None, Some(gauge)).await;
    assert!(matches!(result, Err(TurbovacError::Validation { .. })));
}

#[tokio::test]
async fn invalid_writes_are_rejected() {
    let (device, _gauge, _store) = start(true).await;
    assert!(
        device
            .write_attribute("pump_on", AttributeValue::Float(1.0))
            .await
            .is_err()
    );
    assert!(
        device
            .write_attribute("frequency", AttributeValue::Float(1.0))
            .await
            .is_err()
    );
    assert!(device.read_attribute("no_such").await.is_err());
}
