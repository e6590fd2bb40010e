//! Event handler system.
//!
//! Everything that reacts to messages without being a command:
//!
//! 1. pending setup replies (consume the message)
//! 2. status broadcasts (consume the message)
//! 3. auto-read / auto-react
//! 4. group security (consumes the message on violation)
//!
//! Messages that get through are then classified as commands.

pub mod auto;
pub mod security;
pub mod setup;
pub mod status;

use tracing::{debug, error};

use crate::bot::dispatcher::AppState;
use crate::client::{GroupUpdateEvent, MessageEvent, WaClient};

/// Run the non-command handlers. Returns true when the message was
/// consumed and must not be treated as a command.
pub async fn on_message(state: &AppState, client: &dyn WaClient, event: &MessageEvent) -> bool {
    match setup::handle_setup_reply(state, client, event).await {
        Ok(true) => return true,
        Ok(false) => {}
        Err(e) => {
            error!("Setup reply error: {}", e);
            return true;
        }
    }

    if event.chat.is_status_broadcast() {
        status::on_status(state, client, event).await;
        return true;
    }

    auto::apply(state, client, event).await;

    match security::enforce(state, client, event).await {
        Ok(consumed) => consumed,
        Err(e) => {
            error!("Security check error: {}", e);
            false
        }
    }
}

/// Group metadata or membership changed: drop cached group info.
pub fn on_group_update(state: &AppState, update: &GroupUpdateEvent) {
    debug!(
        "Group {} changed on {} ({:?}, {} participants)",
        update.group,
        update.session,
        update.action,
        update.participants.len()
    );
    state.permissions.invalidate(&update.group);
}
