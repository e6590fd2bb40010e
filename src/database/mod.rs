//! State stores and device persistence.

mod devices;
mod models;
mod mongo;
mod settings;
mod setup;

use std::sync::Arc;

use anyhow::Result;

use crate::config::StoreBackend;

pub use devices::{DeviceStore, FileDeviceStore};
pub use models::*;
pub use mongo::MongoDeviceStore;
pub use settings::{BotSettingsStore, SettingsStore};
pub use setup::PendingSetups;

/// Open the configured device store.
pub async fn open_device_store(backend: &StoreBackend) -> Result<Arc<dyn DeviceStore>> {
    Ok(match backend {
        StoreBackend::File(path) => Arc::new(FileDeviceStore::new(path.clone())),
        StoreBackend::Mongo { uri, database } => {
            Arc::new(MongoDeviceStore::connect(uri, database).await?)
        }
    })
}
