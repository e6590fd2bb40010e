//! Fixtures shared by unit tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;

use super::dispatcher::AppState;
use super::session::Connector;
use crate::cache::{CacheConfig, CacheRegistry};
use crate::client::mock::MockClient;
use crate::client::{AccountIdentity, ClientError, Jid, MessageEvent, WaClient};
use crate::config::Config;
use crate::database::{DeviceRecord, DeviceStore};
use crate::plugins::CommandContext;

/// Gateway stand-in that hands out recording clients.
#[derive(Default)]
pub struct MockConnector {
    /// Sessions reported as connected.
    pub open: DashMap<String, ()>,
    pub deleted: Mutex<Vec<String>>,
    pub fail_code: AtomicBool,
    /// Per-session caches, registered the way the gateway does.
    pub cache: CacheRegistry,
}

#[async_trait]
impl Connector for MockConnector {
    async fn create_instance(&self, _session: &str, _number: &str) -> Result<(), ClientError> {
        Ok(())
    }

    async fn request_pairing_code(&self, _session: &str, _number: &str) -> Result<String, ClientError> {
        if self.fail_code.load(Ordering::SeqCst) {
            return Err(ClientError::Status {
                status: 500,
                body: "pairing unavailable".into(),
            });
        }
        Ok("ABCD-1234".to_string())
    }

    async fn connection_state(&self, session: &str) -> Result<String, ClientError> {
        Ok(if self.open.contains_key(session) { "open" } else { "close" }.to_string())
    }

    async fn delete_instance(&self, session: &str) -> Result<(), ClientError> {
        self.deleted.lock().push(session.to_string());
        Ok(())
    }

    fn client(&self, session: &str, identity: AccountIdentity) -> Arc<dyn WaClient> {
        self.cache
            .get_or_create::<String, ()>(&format!("sent_ids:{session}"), CacheConfig::default());
        let client = MockClient::new(session, "");
        client.set_identity(identity);
        Arc::new(client)
    }

    fn forget(&self, session: &str) {
        self.cache.remove(&format!("sent_ids:{session}"));
    }
}

/// Device records kept in memory.
#[derive(Default)]
pub struct MemoryDeviceStore {
    devices: Mutex<Vec<DeviceRecord>>,
}

#[async_trait]
impl DeviceStore for MemoryDeviceStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn list(&self) -> Result<Vec<DeviceRecord>> {
        Ok(self.devices.lock().clone())
    }

    async fn save(&self, device: &DeviceRecord) -> Result<()> {
        let mut devices = self.devices.lock();
        match devices.iter_mut().find(|d| d.id == device.id) {
            Some(existing) => *existing = device.clone(),
            None => devices.push(device.clone()),
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let mut devices = self.devices.lock();
        let before = devices.len();
        devices.retain(|d| d.id != id);
        Ok(devices.len() != before)
    }
}

pub fn test_state() -> AppState {
    test_state_with(Config::default())
}

pub fn test_state_with(config: Config) -> AppState {
    AppState::new(
        config,
        Arc::new(MemoryDeviceStore::default()),
        Arc::new(MockConnector::default()),
        reqwest::Client::new(),
        CacheRegistry::new(),
    )
}

fn jid(id: &str) -> Jid {
    if id.contains('@') {
        id.parse().unwrap()
    } else {
        Jid::user_jid(id)
    }
}

/// A message on session `s1` with id `M1`. Bare numbers become user ids.
pub fn message(sender: &str, chat: &str, text: &str) -> MessageEvent {
    MessageEvent {
        session: "s1".to_string(),
        id: "M1".to_string(),
        chat: jid(chat),
        sender: jid(sender),
        from_me: false,
        text: text.to_string(),
        media: None,
        quoted: None,
        mentions: Vec::new(),
    }
}

/// A message in a group (or broadcast) chat.
pub fn group_message(chat: &str, sender: &str, text: &str) -> MessageEvent {
    message(sender, chat, text)
}

pub fn context(client: Arc<MockClient>, event: MessageEvent, command: &str, args: &[&str]) -> CommandContext {
    CommandContext {
        client,
        event: Arc::new(event),
        state: test_state(),
        command: command.to_string(),
        args: args.iter().map(|a| a.to_string()).collect(),
    }
}
