use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::interval;
use tracing::{error, info, warn};
use turbovac::companion::{CompanionDevice, DbusCompanion};
use turbovac::device::TurboPumpDevice;
use turbovac::hardware::{PumpInterface, SimulatedPump};
use turbovac::logging::init_logging;
use turbovac::persistence::{FileSetpointStore, SetpointStore};
use turbovac::{Config, PumpCommand};

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = Config::load(config_path.as_deref()).context("Failed to load configuration")?;
    init_logging(&config.logging).context("Failed to initialize logging")?;

    info!(
        "TurboVac pump controller {} starting on {}",
        env!("APP_VERSION"),
        config.pump.serial_port
    );

    let hardware: Box<dyn PumpInterface> = if config.pump.simulate {
        info!("Using simulated pump");
        Box::new(SimulatedPump::new())
    } else {
        anyhow::bail!(
            "No serial backend is built in for {}; set `pump.simulate: true` in the \
             configuration file (see turbovac_config.sample.yaml)",
            config.pump.serial_port
        );
    };

    let store: Option<Arc<dyn SetpointStore>> = if config.setpoint.persist {
        Some(Arc::new(FileSetpointStore::new(&config.setpoint.store_path)))
    } else {
        None
    };

    let companion: Option<Arc<dyn CompanionDevice>> = match &config.companion {
        Some(cfg) => match DbusCompanion::connect(cfg).await {
            Ok(c) => Some(Arc::new(c)),
            Err(e) => {
                warn!("Pressure gauge disabled: {}", e);
                None
            }
        },
        None => None,
    };

    let device = Arc::new(
        TurboPumpDevice::start(&config, hardware, store, companion)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to start device: {}", e))?,
    );

    // Periodic keep-alive; the controller throttles the actual reads
    let tick_device = Arc::clone(&device);
    let period = Duration::try_from_secs_f64(config.polling.periodic_interval_secs)
        .context("Invalid polling.periodic_interval_secs")?;
    let keepalive = tokio::spawn(async move {
        let mut ticker = interval(period);
        loop {
            ticker.tick().await;
            tick_device.always_executed_hook().await;
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => {
                        if !handle_console_line(&device, line.trim()).await {
                            break;
                        }
                    }
                    Ok(None) => {
                        // stdin closed; keep serving until interrupted
                        if let Err(e) = tokio::signal::ctrl_c().await {
                            error!("Failed to wait for shutdown signal: {}", e);
                        }
                        break;
                    }
                    Err(e) => {
                        error!("Console read failed: {}", e);
                        break;
                    }
                }
            }
        }
    }

    keepalive.abort();
    device.shutdown().await;
    info!("TurboVac shutdown complete");
    Ok(())
}

/// Returns false when the console asked to quit
async fn handle_console_line(device: &TurboPumpDevice, line: &str) -> bool {
    match line {
        "" => {}
        "quit" | "exit" => return false,
        "status" => {
            let mut out = serde_json::Map::new();
            for spec in device.attributes() {
                let value = match device.read_attribute(&spec.name).await {
                    Ok(v) => serde_json::to_value(v).unwrap_or(serde_json::Value::Null),
                    Err(e) => serde_json::json!({ "error": e.to_string() }),
                };
                out.insert(spec.name.clone(), value);
            }
            println!(
                "{}",
                serde_json::to_string_pretty(&out).unwrap_or_default()
            );
        }
        other => match other.parse::<PumpCommand>() {
            Ok(command) => match device.execute(command).await {
                Ok(()) => println!("{} ok", command),
                Err(e) => println!("{} failed: {}", command, e),
            },
            Err(e) => println!("{} (commands: on, off, reset, status, quit)", e),
        },
    }
    true
}
