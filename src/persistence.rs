//! Persistence layer for the pump setpoint
//!
//! The desired on/off setpoint survives restarts through a key-value store
//! keyed by device identity. Store calls are bounded and best-effort: a slow
//! or broken store never holds up hardware control.

use crate::error::{Result, TurbovacError};
use crate::logging::{StructuredLogger, get_device_logger};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Key-value property store for the boolean setpoint
pub trait SetpointStore: Send + Sync {
    /// Stored setpoint for `device_identity`, `false` when never saved
    fn load(&self, device_identity: &str) -> Result<bool>;

    /// Persist the setpoint; fails with `StoreUnavailable`
    fn save(&self, device_identity: &str, pump_on: bool) -> Result<()>;
}

/// One persisted entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetpointRecord {
    pub pump_on: bool,
    pub updated_at: DateTime<Utc>,
}

/// JSON file store: `{ "<device identity>": { "pump_on": .., "updated_at": .. } }`
pub struct FileSetpointStore {
    file_path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileSetpointStore {
    pub fn new<P: AsRef<Path>>(file_path: P) -> Self {
        Self {
            file_path: file_path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    fn read_all(&self) -> Result<BTreeMap<String, SetpointRecord>> {
        if !self.file_path.exists() {
            return Ok(BTreeMap::new());
        }
        let contents = std::fs::read_to_string(&self.file_path).map_err(|e| {
            TurbovacError::store(format!("read {}: {}", self.file_path.display(), e))
        })?;
        if contents.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&contents).map_err(|e| {
            TurbovacError::store(format!("parse {}: {}", self.file_path.display(), e))
        })
    }

    fn write_all(&self, records: &BTreeMap<String, SetpointRecord>) -> Result<()> {
        let contents = serde_json::to_string_pretty(records)?;
        let tmp = self.file_path.with_extension("json.tmp");
        std::fs::write(&tmp, contents)
            .and_then(|()| std::fs::rename(&tmp, &self.file_path))
            .map_err(|e| {
                TurbovacError::store(format!("write {}: {}", self.file_path.display(), e))
            })
    }
}

impl SetpointStore for FileSetpointStore {
    fn load(&self, device_identity: &str) -> Result<bool> {
        Ok(self
            .read_all()?
            .get(device_identity)
            .is_some_and(|r| r.pump_on))
    }

    fn save(&self, device_identity: &str, pump_on: bool) -> Result<()> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| TurbovacError::store("store lock poisoned"))?;
        let mut records = self.read_all()?;
        records.insert(
            device_identity.to_string(),
            SetpointRecord {
                pump_on,
                updated_at: Utc::now(),
            },
        );
        self.write_all(&records)
    }
}

/// In-process store; the setpoint lives only as long as the process
#[derive(Default)]
pub struct MemorySetpointStore {
    values: Mutex<HashMap<String, bool>>,
}

impl MemorySetpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SetpointStore for MemorySetpointStore {
    fn load(&self, device_identity: &str) -> Result<bool> {
        let values = self
            .values
            .lock()
            .map_err(|_| TurbovacError::store("store lock poisoned"))?;
        Ok(values.get(device_identity).copied().unwrap_or(false))
    }

    fn save(&self, device_identity: &str, pump_on: bool) -> Result<()> {
        let mut values = self
            .values
            .lock()
            .map_err(|_| TurbovacError::store("store lock poisoned"))?;
        values.insert(device_identity.to_string(), pump_on);
        Ok(())
    }
}

/// Store access for one device: runs calls on the blocking pool under a
/// timeout and maps every failure to `StoreUnavailable`
#[derive(Clone)]
pub struct SetpointPersistence {
    store: Arc<dyn SetpointStore>,
    device_identity: String,
    timeout: Duration,
    logger: StructuredLogger,
}

impl SetpointPersistence {
    pub fn new(store: Arc<dyn SetpointStore>, device_identity: &str, timeout: Duration) -> Self {
        Self {
            store,
            device_identity: device_identity.to_string(),
            timeout,
            logger: get_device_logger("persistence", device_identity),
        }
    }

    pub fn device_identity(&self) -> &str {
        &self.device_identity
    }

    pub async fn load(&self) -> Result<bool> {
        let store = Arc::clone(&self.store);
        let id = self.device_identity.clone();
        self.bounded(move || store.load(&id)).await
    }

    pub async fn save(&self, pump_on: bool) -> Result<()> {
        let store = Arc::clone(&self.store);
        let id = self.device_identity.clone();
        self.bounded(move || store.save(&id, pump_on)).await?;
        self.logger
            .debug(&format!("Persisted setpoint pump_on={}", pump_on));
        Ok(())
    }

    /// Save and log on failure; never returns an error
    pub async fn save_best_effort(&self, pump_on: bool) {
        if let Err(e) = self.save(pump_on).await {
            self.logger
                .warn(&format!("Failed to persist setpoint pump_on={}: {}", pump_on, e));
        }
    }

    async fn bounded<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        match tokio::time::timeout(self.timeout, tokio::task::spawn_blocking(op)).await {
            Ok(Ok(Ok(value))) => Ok(value),
            Ok(Ok(Err(TurbovacError::StoreUnavailable { message }))) => {
                Err(TurbovacError::StoreUnavailable { message })
            }
            Ok(Ok(Err(e))) => Err(TurbovacError::store(e.to_string())),
            Ok(Err(join)) => Err(TurbovacError::store(format!("store task failed: {}", join))),
            Err(_) => Err(TurbovacError::store(format!(
                "store did not answer within {} ms",
                self.timeout.as_millis()
            ))),
        }
    }
}
