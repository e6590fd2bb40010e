//! Event dispatcher.
//!
//! A single loop reads gateway events from a channel. Messages are queued
//! on a per-chat lane so one chat is always handled in arrival order while
//! different chats run in parallel. A global semaphore bounds how many
//! handlers run at once and every handler runs under a timeout.
//!
//! Idle lanes exit. A lane started for a chat whose previous lane is still
//! draining waits for that lane to finish first.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::session::{Connector, SessionManager};
use crate::cache::CacheRegistry;
use crate::client::{Event, MessageEvent, WaClient};
use crate::config::Config;
use crate::database::{BotSettings, BotSettingsStore, DeviceStore, PendingSetups, SettingsStore};
use crate::events;
use crate::permissions::Permissions;
use crate::plugins::{self, CommandRegistry};

/// Capacity of the gateway event channel.
pub const EVENT_QUEUE: usize = 1024;

const LANE_CAPACITY: usize = 256;
const LANE_IDLE: Duration = Duration::from_secs(30);

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,

    /// Process-wide switches and prefix.
    pub bot_settings: BotSettingsStore,

    /// Per-chat moderation settings.
    pub chats: SettingsStore,

    /// Security setup conversations in progress.
    pub setups: PendingSetups,

    /// Permission checker with group caching.
    pub permissions: Permissions,

    pub registry: Arc<CommandRegistry>,

    pub sessions: Arc<SessionManager>,

    /// Client for third-party APIs (downloaders, tools).
    pub http: reqwest::Client,

    pub started: Instant,
}

impl AppState {
    /// Create a new application state.
    pub fn new(
        config: Config,
        store: Arc<dyn DeviceStore>,
        connector: Arc<dyn Connector>,
        http: reqwest::Client,
        cache: CacheRegistry,
    ) -> Self {
        let bot_settings = BotSettingsStore::new(BotSettings::with_prefix(config.default_prefix.clone()));
        let chats = SettingsStore::new();
        let permissions = Permissions::new(&cache, config.owner_numbers.clone(), chats.clone());
        let setups = PendingSetups::new(&cache);
        let sessions = Arc::new(SessionManager::new(
            connector,
            store,
            bot_settings.clone(),
            config.pairing_window,
        ));

        Self {
            config: Arc::new(config),
            bot_settings,
            chats,
            setups,
            permissions,
            registry: Arc::new(plugins::build_registry()),
            sessions,
            http,
            started: Instant::now(),
        }
    }
}

/// Run every handler for one message: non-command handlers first, then
/// command dispatch unless the message was consumed.
pub async fn handle_message(state: &AppState, client: Arc<dyn WaClient>, event: Arc<MessageEvent>) {
    if events::on_message(state, client.as_ref(), &event).await {
        return;
    }
    plugins::handle_command(state, client, event).await;
}

struct Job {
    client: Arc<dyn WaClient>,
    event: Arc<MessageEvent>,
}

struct Lane {
    tx: mpsc::Sender<Job>,
    handle: JoinHandle<()>,
}

/// Routes gateway events to handlers.
pub struct Dispatcher {
    state: AppState,
    rx: mpsc::Receiver<Event>,
    lanes: HashMap<String, Lane>,
    permits: Arc<Semaphore>,
    lane_idle: Duration,
}

impl Dispatcher {
    pub fn new(state: AppState, rx: mpsc::Receiver<Event>) -> Self {
        let permits = Arc::new(Semaphore::new(state.config.worker_limit));
        Self {
            state,
            rx,
            lanes: HashMap::new(),
            permits,
            lane_idle: LANE_IDLE,
        }
    }

    #[cfg(test)]
    fn with_lane_idle(mut self, idle: Duration) -> Self {
        self.lane_idle = idle;
        self
    }

    /// Process events until every sender is dropped.
    pub async fn run(mut self) {
        info!(
            "Dispatcher running ({} workers, {}s handler timeout)",
            self.state.config.worker_limit,
            self.state.config.handler_timeout.as_secs()
        );

        while let Some(event) = self.rx.recv().await {
            self.route(event);
        }

        info!("Event channel closed, dispatcher stopping");
    }

    fn route(&mut self, event: Event) {
        match event {
            Event::Message(message) => self.route_message(*message),
            Event::GroupUpdate(update) => events::on_group_update(&self.state, &update),
            Event::Connected { session, phone, lid } => {
                let sessions = Arc::clone(&self.state.sessions);
                tokio::spawn(async move {
                    if let Err(e) = sessions.mark_connected(&session, phone, lid).await {
                        warn!("Failed to record connect for {}: {}", session, e);
                    }
                });
            }
            Event::Disconnected { session } => {
                info!("Session {} disconnected", session);
                self.state.sessions.mark_disconnected(&session);
            }
        }
    }

    fn route_message(&mut self, mut event: MessageEvent) {
        let Some(client) = self.state.sessions.client(&event.session) else {
            debug!("Message for unknown session {}", event.session);
            return;
        };

        if client.is_echo(&event.id) {
            debug!("Dropping echo of {}", event.id);
            return;
        }

        // Typed on the paired phone: the author is the account itself,
        // whatever the gateway put in the key.
        if event.from_me {
            if let Some(own) = client.identity().jid() {
                event.sender = own;
            }
        }

        let key = format!("{}|{}", event.session, event.chat);
        let job = Job {
            client,
            event: Arc::new(event),
        };

        let job = match self.lanes.get(&key) {
            Some(lane) => match lane.tx.try_send(job) {
                Ok(()) => return,
                Err(TrySendError::Full(job)) => {
                    warn!("Lane {} is full, dropping message {}", key, job.event.id);
                    return;
                }
                // The lane went idle; start a new one behind it.
                Err(TrySendError::Closed(job)) => job,
            },
            None => job,
        };

        let predecessor = self.lanes.remove(&key).map(|lane| lane.handle);
        self.lanes.retain(|_, lane| !lane.handle.is_finished());

        let (tx, rx) = mpsc::channel(LANE_CAPACITY);
        // Fresh channel with room to spare.
        let _ = tx.try_send(job);

        let handle = tokio::spawn(run_lane(
            key.clone(),
            rx,
            predecessor,
            self.state.clone(),
            Arc::clone(&self.permits),
            self.lane_idle,
        ));
        self.lanes.insert(key, Lane { tx, handle });
    }
}

async fn run_lane(
    key: String,
    mut rx: mpsc::Receiver<Job>,
    predecessor: Option<JoinHandle<()>>,
    state: AppState,
    permits: Arc<Semaphore>,
    idle: Duration,
) {
    if let Some(previous) = predecessor {
        let _ = previous.await;
    }
    debug!("Lane {} started", key);

    loop {
        match timeout(idle, rx.recv()).await {
            Ok(Some(job)) => process(&state, &permits, job).await,
            Ok(None) => break,
            Err(_) => {
                // Refuse new work, then finish what was already queued.
                rx.close();
                while let Some(job) = rx.recv().await {
                    process(&state, &permits, job).await;
                }
                break;
            }
        }
    }

    debug!("Lane {} finished", key);
}

async fn process(state: &AppState, permits: &Arc<Semaphore>, job: Job) {
    let Ok(_permit) = Arc::clone(permits).acquire_owned().await else {
        return;
    };

    let id = job.event.id.clone();
    let limit = state.config.handler_timeout;
    if timeout(limit, handle_message(state, job.client, job.event)).await.is_err() {
        warn!("Handler for message {} timed out after {}s", id, limit.as_secs());
    }
}
