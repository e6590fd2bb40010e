//! Status broadcast handling: auto-view and auto-react.

use rand::seq::SliceRandom;
use tracing::{debug, warn};

use crate::bot::dispatcher::AppState;
use crate::client::{MessageEvent, WaClient};
use crate::utils::reply::ReplyExt;

const STATUS_REACTIONS: [&str; 5] = ["💚", "❤️", "🔥", "😍", "💯"];

/// View (and optionally react to) a status update.
pub async fn on_status(state: &AppState, client: &dyn WaClient, event: &MessageEvent) {
    let settings = state.bot_settings.snapshot();
    let poster = event.sender.clean();

    if !settings.auto_status || !settings.watches_status_of(&poster) {
        return;
    }

    debug!("Viewing status {} from {}", event.id, poster);
    if let Err(e) = client
        .mark_read(&event.chat, &event.sender, std::slice::from_ref(&event.id))
        .await
    {
        warn!("Failed to view status from {}: {}", poster, e);
        return;
    }

    if settings.status_react {
        let emoji = STATUS_REACTIONS
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or("💚");
        if let Err(e) = client.react(event, emoji).await {
            warn!("Failed to react to status from {}: {}", poster, e);
        }
    }
}
