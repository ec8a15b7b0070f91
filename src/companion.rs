//! Optional companion pressure gauge
//!
//! A gauge living in another process on the bus can add a `pressure`
//! attribute to the pump device. Liveness is probed once at startup; when the
//! probe fails the attribute is left out for the lifetime of the device.

use std::sync::Arc;
use std::time::Duration;

use zbus::Connection;
use zbus::zvariant::OwnedValue;

use crate::config::CompanionConfig;
use crate::error::{Result, TurbovacError};
use crate::logging::{StructuredLogger, get_logger};

const BUS_ITEM_INTERFACE: &str = "com.victronenergy.BusItem";

/// A device that can report one pressure value
#[async_trait::async_trait]
pub trait CompanionDevice: Send + Sync {
    /// Human-readable identity used in log messages
    fn name(&self) -> String;

    /// Cheap liveness check
    async fn probe(&self) -> Result<()>;

    async fn read_value(&self) -> Result<f64>;
}

/// Gauge exported as a `BusItem` on D-Bus
pub struct DbusCompanion {
    connection: Connection,
    service: String,
    path: String,
    timeout: Duration,
}

impl DbusCompanion {
    /// Connect to the system bus, falling back to the session bus
    pub async fn connect(config: &CompanionConfig) -> Result<Self> {
        let logger = get_logger("companion");
        let connection = match Connection::system().await {
            Ok(c) => c,
            Err(e_sys) => match Connection::session().await {
                Ok(c) => {
                    logger.warn(&format!(
                        "System bus unavailable ({}); using session bus",
                        e_sys
                    ));
                    c
                }
                Err(e_sess) => {
                    return Err(TurbovacError::companion(format!(
                        "DBus connect failed: system={} session={}",
                        e_sys, e_sess
                    )));
                }
            },
        };
        Ok(Self::with_connection(connection, config))
    }

    pub fn with_connection(connection: Connection, config: &CompanionConfig) -> Self {
        Self {
            connection,
            service: config.service.clone(),
            path: config.path.clone(),
            timeout: Duration::from_millis(config.probe_timeout_ms),
        }
    }

    async fn get_value(&self) -> Result<OwnedValue> {
        let proxy = tokio::time::timeout(
            self.timeout,
            zbus::Proxy::new(
                &self.connection,
                self.service.as_str(),
                self.path.as_str(),
                BUS_ITEM_INTERFACE,
            ),
        )
        .await
        .map_err(|_| TurbovacError::companion("DBus proxy creation timed out"))??;

        let value: OwnedValue = tokio::time::timeout(self.timeout, proxy.call("GetValue", &()))
            .await
            .map_err(|_| TurbovacError::companion("DBus GetValue timed out"))??;
        Ok(value)
    }
}

#[async_trait::async_trait]
impl CompanionDevice for DbusCompanion {
    fn name(&self) -> String {
        format!("{}{}", self.service, self.path)
    }

    async fn probe(&self) -> Result<()> {
        let value = self.get_value().await?;
        owned_value_to_f64(&value).map(|_| ())
    }

    async fn read_value(&self) -> Result<f64> {
        let value = self.get_value().await?;
        owned_value_to_f64(&value)
    }
}

/// Numeric payload of a `GetValue` reply. An invalid item is published as an
/// empty array and is reported as unreachable.
pub(crate) fn owned_value_to_f64(v: &OwnedValue) -> Result<f64> {
    if let Ok(f) = <f64 as TryFrom<&OwnedValue>>::try_from(v) {
        return Ok(f);
    }
    if let Ok(i) = <i64 as TryFrom<&OwnedValue>>::try_from(v) {
        return Ok(i as f64);
    }
    if let Ok(u) = <u64 as TryFrom<&OwnedValue>>::try_from(v) {
        return Ok(u as f64);
    }
    if let Ok(i) = <i32 as TryFrom<&OwnedValue>>::try_from(v) {
        return Ok(f64::from(i));
    }
    if let Ok(u) = <u32 as TryFrom<&OwnedValue>>::try_from(v) {
        return Ok(f64::from(u));
    }
    Err(TurbovacError::companion(format!(
        "non-numeric pressure value: {:?}",
        v
    )))
}

/// Live pressure reads from a companion that passed the startup probe
#[derive(Clone)]
pub struct PressureReader {
    device: Arc<dyn CompanionDevice>,
    label: String,
    unit: String,
    timeout: Duration,
}

impl PressureReader {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    /// Query the companion now; nothing is cached
    pub async fn read(&self) -> Result<f64> {
        match tokio::time::timeout(self.timeout, self.device.read_value()).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e @ TurbovacError::CompanionUnreachable { .. })) => Err(e),
            Ok(Err(e)) => Err(TurbovacError::companion(e.to_string())),
            Err(_) => Err(TurbovacError::companion(format!(
                "{} did not answer within {} ms",
                self.device.name(),
                self.timeout.as_millis()
            ))),
        }
    }
}

/// Decides once, at startup, whether the pressure attribute exists
pub struct DynamicAttributeBinder {
    label: String,
    unit: String,
    probe_timeout: Duration,
    logger: StructuredLogger,
}

impl DynamicAttributeBinder {
    pub fn new(config: &CompanionConfig) -> Self {
        Self {
            label: config.label.clone(),
            unit: config.unit.clone(),
            probe_timeout: Duration::from_millis(config.probe_timeout_ms),
            logger: get_logger("companion"),
        }
    }

    /// Probe the companion exactly once. Failure is logged and yields `None`;
    /// it is never retried.
    pub async fn try_bind(
        &self,
        companion: Option<Arc<dyn CompanionDevice>>,
    ) -> Option<PressureReader> {
        let device = companion?;
        let probe = match tokio::time::timeout(self.probe_timeout, device.probe()).await {
            Ok(result) => result,
            Err(_) => Err(TurbovacError::companion(format!(
                "probe timed out after {} ms",
                self.probe_timeout.as_millis()
            ))),
        };

        match probe {
            Ok(()) => {
                self.logger.info(&format!(
                    "Bound {} attribute to {}",
                    self.label,
                    device.name()
                ));
                Some(PressureReader {
                    device,
                    label: self.label.clone(),
                    unit: self.unit.clone(),
                    timeout: self.probe_timeout,
                })
            }
            Err(e) => {
                let err = match e {
                    TurbovacError::CompanionUnreachable { .. } => e,
                    other => TurbovacError::companion(other.to_string()),
                };
                self.logger.warn(&format!(
                    "{} not reachable, {} attribute disabled: {}",
                    device.name(),
                    self.label,
                    err
                ));
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use zbus::zvariant::Value;

    struct FakeGauge {
        alive: bool,
        reads: AtomicU32,
    }

    #[async_trait::async_trait]
    impl CompanionDevice for FakeGauge {
        fn name(&self) -> String {
            "fake/gauge".to_string()
        }

        async fn probe(&self) -> Result<()> {
            if self.alive {
                Ok(())
            } else {
                Err(TurbovacError::companion("no such service"))
            }
        }

        async fn read_value(&self) -> Result<f64> {
            let n = self.reads.fetch_add(1, Ordering::SeqCst);
            Ok(1.0e-3 * f64::from(n + 1))
        }
    }

    fn binder() -> DynamicAttributeBinder {
        DynamicAttributeBinder::new(&CompanionConfig::default())
    }

    #[tokio::test]
    async fn reader_reads_live_every_time() {
        let gauge = Arc::new(FakeGauge {
            alive: true,
            reads: AtomicU32::new(0),
        });
        let reader = binder().try_bind(Some(gauge.clone())).await.unwrap();
        assert_eq!(reader.label(), "pressure");
        let first = reader.read().await.unwrap();
        let second = reader.read().await.unwrap();
        assert_ne!(first, second);
        assert_eq!(gauge.reads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failed_probe_yields_no_reader() {
        let gauge = Arc::new(FakeGauge {
            alive: false,
            reads: AtomicU32::new(0),
        });
        assert!(binder().try_bind(Some(gauge.clone())).await.is_none());
        assert_eq!(gauge.reads.load(Ordering::SeqCst), 0);
        assert!(binder().try_bind(None).await.is_none());
    }

    #[test]
    fn numeric_values_convert() {
        let v = OwnedValue::try_from(Value::from(2.5f64)).unwrap();
        assert_eq!(owned_value_to_f64(&v).unwrap(), 2.5);
        let v = OwnedValue::try_from(Value::from(7i32)).unwrap();
        assert_eq!(owned_value_to_f64(&v).unwrap(), 7.0);
        let v = OwnedValue::try_from(Value::from("n/a")).unwrap();
        let err = owned_value_to_f64(&v).unwrap_err();
        assert!(matches!(err, TurbovacError::CompanionUnreachable { .. }));
        assert!(err.to_string().contains("non-numeric pressure value"));
    }
}
