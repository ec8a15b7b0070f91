use super::*;
use crate::hardware::{SimulatedPump, SimulatedPumpControl};
use crate::persistence::{MemorySetpointStore, SetpointStore};
use std::sync::Arc;

fn test_config() -> Config {
    let mut config = Config::default();
    config.pump.hardware_timeout_ms = 50;
    config.pump.device_identity = "test/pump".to_string();
    config
}

fn controller_with(config: &Config) -> (PumpController, SimulatedPumpControl) {
    let pump = SimulatedPump::new();
    let control = pump.control();
    let controller = PumpController::new(Box::new(pump), config, None).unwrap();
    (controller, control)
}

#[tokio::test]
async fn initialize_applies_restored_setpoint() {
    let (mut controller, control) = controller_with(&test_config());
    controller.initialize("/dev/ttyUSB0", true).await.unwrap();

    assert_eq!(controller.phase(), ControllerPhase::Active);
    assert!(controller.pump_on());
    assert!(control.applied_setpoint());
    assert_eq!(control.port().as_deref(), Some("/dev/ttyUSB0"));
    assert!(controller.snapshot().is_some());
    assert_eq!(controller.state(), SupervisoryState::Moving);
}

#[tokio::test]
async fn initialize_without_apply_only_stages_desired_setpoint() {
    let mut config = test_config();
    config.setpoint.apply_on_startup = false;
    let (mut controller, control) = controller_with(&config);
    controller.initialize("/dev/ttyUSB0", true).await.unwrap();

    assert!(controller.pump_on());
    assert!(!control.applied_setpoint());
}

#[tokio::test]
async fn open_failure_still_activates_and_retries() {
    let (mut controller, control) = controller_with(&test_config());
    control.set_available(false);

    let err = controller.initialize("/dev/ttyUSB0", false).await.unwrap_err();
    assert!(err.is_hardware());
    assert_eq!(controller.phase(), ControllerPhase::Active);
    assert_eq!(controller.state(), SupervisoryState::Unknown);
    assert!(controller.snapshot().is_none());

    control.set_available(true);
    assert!(controller.refresh(Instant::now()).await);
    assert_eq!(controller.state(), SupervisoryState::On);
}

#[tokio::test]
async fn restored_setpoint_applied_after_late_open() {
    let (mut controller, control) = controller_with(&test_config());
    control.set_available(false);
    assert!(controller.initialize("/dev/ttyUSB0", true).await.is_err());
    assert!(controller.pump_on());
    assert!(!control.applied_setpoint());

    control.set_available(true);
    let mut now = Instant::now();
    for _ in 0..6 {
        now += Duration::from_secs(1);
        controller.refresh(now).await;
    }
    assert!(control.applied_setpoint());
    assert_eq!(controller.state(), SupervisoryState::Running);

    // Delivered once; later refreshes do not rewrite it
    let applies = control.apply_count();
    controller.force_refresh(now + Duration::from_secs(1)).await;
    assert_eq!(control.apply_count(), applies);
}

#[tokio::test]
async fn command_supersedes_pending_restore() {
    let (mut controller, control) = controller_with(&test_config());
    control.set_available(false);
    assert!(controller.initialize("/dev/ttyUSB0", true).await.is_err());

    control.set_available(true);
    controller.turn_off().await.unwrap();
    assert!(!controller.pump_on());
    assert!(!control.applied_setpoint());

    controller.force_refresh(Instant::now()).await;
    assert!(!control.applied_setpoint());
}

#[tokio::test]
async fn refresh_respects_throttle() {
    let (mut controller, control) = controller_with(&test_config());
    controller.initialize("/dev/ttyUSB0", false).await.unwrap();
    let last = controller.last_refresh_at().unwrap();
    let before = control.refresh_count();

    assert!(!controller.refresh(last + Duration::from_millis(100)).await);
    assert_eq!(control.refresh_count(), before);
    assert_eq!(controller.stats().throttled, 1);

    assert!(controller.refresh(last + Duration::from_millis(250)).await);
    assert_eq!(control.refresh_count(), before + 1);
}

#[tokio::test]
async fn force_refresh_ignores_throttle() {
    let (mut controller, _control) = controller_with(&test_config());
    controller.initialize("/dev/ttyUSB0", false).await.unwrap();
    let last = controller.last_refresh_at().unwrap();
    assert!(controller.force_refresh(last).await);
}

#[tokio::test]
async fn hanging_hardware_is_bounded() {
    let (mut controller, control) = controller_with(&test_config());
    controller.initialize("/dev/ttyUSB0", false).await.unwrap();
    control.set_reply_delay(Duration::from_millis(500));

    let err = controller.turn_on().await.unwrap_err();
    assert!(err.is_hardware());
    assert!(!controller.pump_on());
    assert!(!controller.force_refresh(Instant::now()).await);
    assert_eq!(controller.stats().consecutive_failures, 1);
}

#[tokio::test]
async fn reset_error_forces_off_and_persists() {
    let store = Arc::new(MemorySetpointStore::new());
    let persistence = SetpointPersistence::new(
        store.clone(),
        "test/pump",
        Duration::from_millis(200),
    );
    let pump = SimulatedPump::new();
    let control = pump.control();
    let mut controller =
        PumpController::new(Box::new(pump), &test_config(), Some(persistence)).unwrap();
    controller.initialize("/dev/ttyUSB0", false).await.unwrap();
    controller.turn_on().await.unwrap();
    assert!(store.load("test/pump").unwrap());

    control.inject_error();
    controller.force_refresh(Instant::now()).await;
    assert_eq!(controller.state(), SupervisoryState::Fault);

    controller.reset_error().await.unwrap();
    assert!(!controller.pump_on());
    assert!(!control.applied_setpoint());
    assert!(!control.error_latched());
    assert!(!store.load("test/pump").unwrap());
}

#[tokio::test]
async fn commands_rejected_outside_active_phase() {
    let (mut controller, _control) = controller_with(&test_config());
    assert!(matches!(
        controller.turn_on().await,
        Err(TurbovacError::NotInitialized { .. })
    ));
    assert!(!controller.refresh(Instant::now()).await);

    controller.initialize("/dev/ttyUSB0", false).await.unwrap();
    controller.shutdown().await;
    controller.shutdown().await;
    assert_eq!(controller.phase(), ControllerPhase::ShutDown);
    assert!(controller.execute(PumpCommand::TurnOff).await.is_err());
    assert!(!controller.refresh(Instant::now()).await);
}

#[tokio::test]
async fn second_initialize_is_rejected() {
    let (mut controller, _control) = controller_with(&test_config());
    controller.initialize("/dev/ttyUSB0", false).await.unwrap();
    assert!(matches!(
        controller.initialize("/dev/ttyUSB1", true).await,
        Err(TurbovacError::Validation { .. })
    ));
    assert_eq!(controller.port(), Some("/dev/ttyUSB0"));
}

#[test]
fn parses_console_commands() {
    assert_eq!("on".parse::<PumpCommand>().unwrap(), PumpCommand::TurnOn);
    assert_eq!("TurnOff".parse::<PumpCommand>().unwrap(), PumpCommand::TurnOff);
    assert_eq!(" reset ".parse::<PumpCommand>().unwrap(), PumpCommand::ResetError);
    assert!("spin".parse::<PumpCommand>().is_err());
}
