//! Device record persistence.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::models::DeviceRecord;

/// Storage for paired device records.
#[async_trait]
pub trait DeviceStore: Send + Sync {
    /// Short label for status output.
    fn backend_name(&self) -> &'static str;

    async fn list(&self) -> Result<Vec<DeviceRecord>>;

    /// Insert or replace a record by id.
    async fn save(&self, device: &DeviceRecord) -> Result<()>;

    /// Returns whether a record was removed.
    async fn delete(&self, id: &str) -> Result<bool>;

    /// Create and store a new record for a phone number.
    async fn create(&self, phone: &str) -> Result<DeviceRecord> {
        let device = DeviceRecord::new(phone);
        self.save(&device).await?;
        Ok(device)
    }
}

/// Device records in a local JSON file.
pub struct FileDeviceStore {
    path: PathBuf,
    // Serializes read-modify-write cycles.
    lock: Mutex<()>,
}

impl FileDeviceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        info!("Using device file {}", path.display());
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> Result<Vec<DeviceRecord>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(Vec::new()),
            Ok(bytes) => serde_json::from_slice(&bytes)
                .with_context(|| format!("corrupt device file {}", self.path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e).with_context(|| format!("reading {}", self.path.display())),
        }
    }

    async fn store(&self, devices: &[DeviceRecord]) -> Result<()> {
        let json = serde_json::to_vec_pretty(devices)?;
        let tmp = tmp_path(&self.path);

        tokio::fs::write(&tmp, json)
            .await
            .with_context(|| format!("writing {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("replacing {}", self.path.display()))?;

        debug!("Wrote {} device records", devices.len());
        Ok(())
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

#[async_trait]
impl DeviceStore for FileDeviceStore {
    fn backend_name(&self) -> &'static str {
        "JSON file"
    }

    async fn list(&self) -> Result<Vec<DeviceRecord>> {
        let _guard = self.lock.lock().await;
        self.load().await
    }

    async fn save(&self, device: &DeviceRecord) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut devices = self.load().await?;

        match devices.iter_mut().find(|d| d.id == device.id) {
            Some(existing) => *existing = device.clone(),
            None => devices.push(device.clone()),
        }

        self.store(&devices).await
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let _guard = self.lock.lock().await;
        let mut devices = self.load().await?;

        let before = devices.len();
        devices.retain(|d| d.id != id);
        if devices.len() == before {
            return Ok(false);
        }

        self.store(&devices).await?;
        Ok(true)
    }
}
