//! Session registry, restore and phone pairing.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use futures::future::join_all;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::client::{AccountIdentity, ClientError, Gateway, WaClient};
use crate::database::{BotSettingsStore, DeviceRecord, DeviceStore, Toggle};
use crate::utils::jid::{clean_id, parse_phone, JidError};

/// What the session manager needs from the messaging service.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn create_instance(&self, session: &str, number: &str) -> Result<(), ClientError>;

    async fn request_pairing_code(&self, session: &str, number: &str) -> Result<String, ClientError>;

    async fn connection_state(&self, session: &str) -> Result<String, ClientError>;

    async fn delete_instance(&self, session: &str) -> Result<(), ClientError>;

    fn client(&self, session: &str, identity: AccountIdentity) -> Arc<dyn WaClient>;

    /// Release local state held for a session that is gone for good.
    fn forget(&self, session: &str);
}

#[async_trait]
impl Connector for Gateway {
    async fn create_instance(&self, session: &str, number: &str) -> Result<(), ClientError> {
        Gateway::create_instance(self, session, number).await
    }

    async fn request_pairing_code(&self, session: &str, number: &str) -> Result<String, ClientError> {
        Gateway::request_pairing_code(self, session, number).await
    }

    async fn connection_state(&self, session: &str) -> Result<String, ClientError> {
        Gateway::connection_state(self, session).await
    }

    async fn delete_instance(&self, session: &str) -> Result<(), ClientError> {
        Gateway::delete_instance(self, session).await
    }

    fn client(&self, session: &str, identity: AccountIdentity) -> Arc<dyn WaClient> {
        Arc::new(Gateway::client(self, session, identity))
    }

    fn forget(&self, session: &str) {
        Gateway::forget(self, session);
    }
}

/// Pairing failures, mapped to HTTP statuses by the API.
#[derive(Debug, Error)]
pub enum PairError {
    #[error(transparent)]
    InvalidNumber(#[from] JidError),

    #[error("{0} is already paired")]
    AlreadyPaired(String),

    #[error("gateway error: {0}")]
    Gateway(#[from] ClientError),

    #[error("device store error: {0}")]
    Store(#[from] anyhow::Error),
}

/// One row of the session listing.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SessionInfo {
    pub session: String,
    pub phone: Option<String>,
    pub connected: bool,
}

struct LiveSession {
    client: Arc<dyn WaClient>,
    connected: bool,
}

/// Registry of live clients keyed by session id.
pub struct SessionManager {
    connector: Arc<dyn Connector>,
    store: Arc<dyn DeviceStore>,
    bot_settings: BotSettingsStore,
    pairing_window: Duration,
    sessions: DashMap<String, LiveSession>,
    /// Pairings waiting for their first connect.
    pending: DashMap<String, oneshot::Sender<()>>,
}

impl SessionManager {
    pub fn new(
        connector: Arc<dyn Connector>,
        store: Arc<dyn DeviceStore>,
        bot_settings: BotSettingsStore,
        pairing_window: Duration,
    ) -> Self {
        Self {
            connector,
            store,
            bot_settings,
            pairing_window,
            sessions: DashMap::new(),
            pending: DashMap::new(),
        }
    }

    /// Reconnect every stored device. Records that never finished pairing
    /// and are not connected are discarded.
    pub async fn restore(&self) -> anyhow::Result<usize> {
        let devices = self.store.list().await?;
        info!("Restoring {} stored device(s)", devices.len());

        let results = join_all(devices.into_iter().map(|device| self.restore_one(device))).await;
        let restored = results.into_iter().filter(|ok| *ok).count();

        info!("{} session(s) restored", restored);
        Ok(restored)
    }

    async fn restore_one(&self, device: DeviceRecord) -> bool {
        let state = match self.connector.connection_state(&device.id).await {
            Ok(state) => state,
            Err(e) => {
                warn!("Could not query {}: {}", device.id, e);
                "unknown".to_string()
            }
        };
        let open = state == "open";

        if !device.paired && !open {
            info!("Discarding unfinished pairing {}", device.id);
            self.discard(&device.id).await;
            return false;
        }

        let identity = AccountIdentity {
            phone: Some(device.phone.clone()),
            lid: device.lid.clone(),
        };
        self.register(self.connector.client(&device.id, identity), open);

        if open {
            info!("Session {} ({}) connected", device.id, device.phone);
        } else {
            warn!("Session {} is {}; waiting for the gateway to reconnect", device.id, state);
        }
        true
    }

    /// Start pairing a number. Returns the code to type on the phone.
    ///
    /// The session is dropped again if it does not connect within the
    /// pairing window.
    pub async fn pair(self: &Arc<Self>, number: &str) -> Result<String, PairError> {
        let phone = parse_phone(number)?;

        let taken = self
            .sessions
            .iter()
            .any(|s| s.connected && s.client.identity().phone.as_deref().map(clean_id) == Some(phone.clone()));
        if taken {
            return Err(PairError::AlreadyPaired(phone));
        }

        let device = self.store.create(&phone).await?;
        let session = device.id.clone();
        info!("Pairing {} as {}", phone, session);

        let code = match self.start_pairing(&session, &phone).await {
            Ok(code) => code,
            Err(e) => {
                warn!("Pairing {} failed: {}", session, e);
                self.discard(&session).await;
                return Err(e.into());
            }
        };

        let identity = AccountIdentity {
            phone: Some(phone.clone()),
            lid: None,
        };
        self.register(self.connector.client(&session, identity), false);

        let (tx, rx) = oneshot::channel();
        self.pending.insert(session.clone(), tx);

        let manager = Arc::clone(self);
        let window = self.pairing_window;
        tokio::spawn(async move {
            match tokio::time::timeout(window, rx).await {
                Ok(Ok(())) => debug!("Pairing {} completed", session),
                _ => {
                    warn!("Pairing {} expired after {}s", session, window.as_secs());
                    manager.pending.remove(&session);
                    manager.discard(&session).await;
                }
            }
        });

        Ok(code)
    }

    /// Add a live client under its own session id.
    pub fn register(&self, client: Arc<dyn WaClient>, connected: bool) {
        self.sessions
            .insert(client.session_id().to_string(), LiveSession { client, connected });
    }

    async fn start_pairing(&self, session: &str, phone: &str) -> Result<String, ClientError> {
        self.connector.create_instance(session, phone).await?;
        self.connector.request_pairing_code(session, phone).await
    }

    /// Forget a session everywhere: live registry, device store, gateway.
    async fn discard(&self, session: &str) {
        if let Some((_, live)) = self.sessions.remove(session) {
            live.client.disconnect().await;
        }
        if let Err(e) = self.store.delete(session).await {
            warn!("Could not delete device record {}: {}", session, e);
        }
        if let Err(e) = self.connector.delete_instance(session).await {
            debug!("Could not delete gateway instance {}: {}", session, e);
        }
        self.connector.forget(session);
    }

    /// The account behind a session reported connected.
    pub async fn mark_connected(&self, session: &str, phone: Option<String>, lid: Option<String>) -> anyhow::Result<()> {
        let client = {
            let Some(mut live) = self.sessions.get_mut(session) else {
                debug!("Connect event for unknown session {}", session);
                return Ok(());
            };
            live.connected = true;
            Arc::clone(&live.client)
        };

        if let Some((_, tx)) = self.pending.remove(session) {
            let _ = tx.send(());
        }

        let mut identity = client.identity();
        if phone.is_some() {
            identity.phone = phone.map(|p| clean_id(&p));
        }
        if lid.is_some() {
            identity.lid = lid.map(|l| clean_id(&l));
        }
        client.set_identity(identity.clone());

        let devices = self.store.list().await?;
        if let Some(mut device) = devices.into_iter().find(|d| d.id == session) {
            device.paired = true;
            if let Some(phone) = identity.phone.clone() {
                device.phone = phone;
            }
            device.lid = identity.lid.clone();
            self.store.save(&device).await?;
        }

        info!(
            "Session {} online as {} (lid {})",
            session,
            identity.phone.as_deref().unwrap_or("?"),
            identity.lid.as_deref().unwrap_or("-")
        );

        if self.bot_settings.get(Toggle::AlwaysOnline) {
            if let Err(e) = client.send_presence(true).await {
                warn!("Presence update failed for {}: {}", session, e);
            }
        }
        Ok(())
    }

    pub fn mark_disconnected(&self, session: &str) {
        if let Some(mut live) = self.sessions.get_mut(session) {
            live.connected = false;
        }
    }

    pub fn client(&self, session: &str) -> Option<Arc<dyn WaClient>> {
        self.sessions.get(session).map(|s| Arc::clone(&s.client))
    }

    pub fn clients(&self) -> Vec<Arc<dyn WaClient>> {
        self.sessions.iter().map(|s| Arc::clone(&s.client)).collect()
    }

    /// Live sessions sorted by id.
    pub fn list(&self) -> Vec<SessionInfo> {
        let mut list: Vec<SessionInfo> = self
            .sessions
            .iter()
            .map(|s| SessionInfo {
                session: s.key().clone(),
                phone: s.client.identity().phone,
                connected: s.connected,
            })
            .collect();
        list.sort_by(|a, b| a.session.cmp(&b.session));
        list
    }

    pub async fn stored_count(&self) -> anyhow::Result<usize> {
        Ok(self.store.list().await?.len())
    }

    pub fn backend_name(&self) -> &'static str {
        self.store.backend_name()
    }

    pub async fn disconnect_all(&self) {
        let clients = self.clients();
        info!("Disconnecting {} session(s)", clients.len());
        join_all(clients.iter().map(|c| c.disconnect())).await;
    }
}
