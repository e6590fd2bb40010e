//! Wabot - multi-account WhatsApp command bot
//!
//! Pairs any number of WhatsApp accounts through a hosted gateway and runs
//! one command set and moderation layer across all of them.
//!
//! ## Architecture
//!
//! - `config` - Environment configuration
//! - `database` - Device persistence (JSON file or MongoDB) and in-memory settings
//! - `cache` - Moka-backed caches
//! - `client` - Messaging client abstraction and gateway implementation
//! - `permissions` - Owner/admin checks with group caching
//! - `bot` - Sessions, dispatcher and HTTP surface
//! - `plugins` - Command handlers
//! - `events` - Non-command handlers (status, auto-read, security)
//! - `utils` - Utility functions

mod bot;
mod cache;
mod client;
mod config;
mod database;
mod events;
mod permissions;
mod plugins;
mod utils;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use bot::{webhook, AppState, Dispatcher, EVENT_QUEUE};
use cache::CacheRegistry;
use client::Gateway;
use config::Config;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file first (before anything else)
    dotenvy::dotenv().ok();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("wabot=info,tower_http=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting Wabot...");

    let config = Config::from_env()?;
    info!("Configuration loaded successfully");

    if config.owner_numbers.is_empty() {
        info!("No extra owners configured (OWNER_NUMBERS is empty)");
    } else {
        info!("Bot owners: {:?}", config.owner_numbers);
    }

    let store = database::open_device_store(&config.store).await?;
    info!("Device store: {}", store.backend_name());

    let cache = CacheRegistry::new();

    let http = reqwest::Client::builder()
        .user_agent(concat!("wabot/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(15))
        .build()?;

    let gateway = Gateway::new(
        http.clone(),
        config.gateway_url.clone(),
        config.gateway_api_key.clone(),
        config.public_url.clone(),
        config.webhook_secret.clone(),
        cache.clone(),
    );
    info!("Gateway: {}", config.gateway_url);

    let port = config.http_port;
    let state = AppState::new(config, store, Arc::new(gateway), http, cache);

    match state.sessions.restore().await {
        Ok(count) => info!("{} session(s) ready", count),
        Err(e) => error!("Session restore failed: {}", e),
    }

    let (tx, rx) = mpsc::channel(EVENT_QUEUE);
    let dispatcher = tokio::spawn(Dispatcher::new(state.clone(), rx).run());

    let router = webhook::router(state.clone(), tx);
    webhook::serve(router, port, shutdown_signal()).await?;

    // The router (and with it the last event sender) is gone; let the
    // dispatcher drain.
    if tokio::time::timeout(Duration::from_secs(10), dispatcher).await.is_err() {
        warn!("Dispatcher did not stop in time");
    }

    state.sessions.disconnect_all().await;
    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("Received shutdown signal");
}
