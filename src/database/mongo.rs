//! MongoDB device store.

use anyhow::Result;
use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::doc;
use mongodb::options::{ClientOptions, ReplaceOptions};
use mongodb::{Client, Collection};
use tracing::info;

use super::devices::DeviceStore;
use super::models::DeviceRecord;

/// Device records in a MongoDB collection.
#[derive(Debug, Clone)]
pub struct MongoDeviceStore {
    devices: Collection<DeviceRecord>,
}

impl MongoDeviceStore {
    /// Connect and verify the server answers a ping.
    pub async fn connect(uri: &str, db_name: &str) -> Result<Self> {
        let options = ClientOptions::parse(uri).await?;
        let client = Client::with_options(options)?;

        client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await?;

        info!("Successfully connected to MongoDB");

        Ok(Self {
            devices: client.database(db_name).collection("devices"),
        })
    }
}

#[async_trait]
impl DeviceStore for MongoDeviceStore {
    fn backend_name(&self) -> &'static str {
        "MongoDB"
    }

    async fn list(&self) -> Result<Vec<DeviceRecord>> {
        let cursor = self.devices.find(doc! {}).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn save(&self, device: &DeviceRecord) -> Result<()> {
        let options = ReplaceOptions::builder().upsert(true).build();

        self.devices
            .replace_one(doc! { "id": &device.id }, device)
            .with_options(options)
            .await?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let result = self.devices.delete_one(doc! { "id": id }).await?;
        Ok(result.deleted_count > 0)
    }
}
