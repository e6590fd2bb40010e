//! Auto-read and auto-react for ordinary messages.

use tracing::warn;

use crate::bot::dispatcher::AppState;
use crate::client::{MessageEvent, WaClient};
use crate::utils::reply::ReplyExt;

pub async fn apply(state: &AppState, client: &dyn WaClient, event: &MessageEvent) {
    let settings = state.bot_settings.snapshot();

    if settings.auto_read && !event.from_me {
        if let Err(e) = client
            .mark_read(&event.chat, &event.sender, std::slice::from_ref(&event.id))
            .await
        {
            warn!("Auto-read failed in {}: {}", event.chat, e);
        }
    }

    if settings.auto_react && !event.from_me {
        if let Err(e) = client.react(event, "❤️").await {
            warn!("Auto-react failed in {}: {}", event.chat, e);
        }
    }
}
