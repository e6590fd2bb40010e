//! Replies to a pending security setup.
//!
//! Started by the `antilink`/`antipic`/`antivideo`/`antisticker` commands.

use tracing::info;

use crate::bot::dispatcher::AppState;
use crate::client::{MessageEvent, WaClient};
use crate::database::{SetupStep, ViolationAction};
use crate::utils::reply::ReplyExt;

/// Consume the message if the sender has a setup waiting in this chat.
pub async fn handle_setup_reply(state: &AppState, client: &dyn WaClient, event: &MessageEvent) -> anyhow::Result<bool> {
    let sender = event.sender.clean();
    let chat = event.chat.to_string();

    let Some(setup) = state.setups.get(&sender, &chat) else {
        return Ok(false);
    };

    let answer = event.text.trim().to_lowercase();
    let feature = setup.feature;

    match setup.step {
        SetupStep::Enable => match answer.as_str() {
            "on" | "yes" | "enable" => {
                state.setups.advance(&sender, SetupStep::Action);
                client
                    .reply_card(
                        event,
                        &format!("🛡️ {} ACTION", feature.label().to_uppercase()),
                        &[
                            "What should happen to violations?".to_string(),
                            "1️⃣ *delete* - remove the message".to_string(),
                            "2️⃣ *warn* - remove and warn".to_string(),
                            "3️⃣ *kick* - remove the sender".to_string(),
                        ],
                    )
                    .await?;
            }
            "off" | "no" | "disable" => {
                state.setups.finish(&sender);
                state.chats.update(&chat, |s| s.set_enabled(feature, false));
                info!("{} disabled in {} by {}", feature.label(), chat, sender);
                client
                    .reply_card(
                        event,
                        &format!("🛡️ {}", feature.label().to_uppercase()),
                        &["📊 Status: ❌ OFF".to_string()],
                    )
                    .await?;
            }
            _ => {
                client.reply(event, "⚠️ Reply with *on* or *off*.").await?;
            }
        },
        SetupStep::Action => match ViolationAction::parse(&answer) {
            Some(action) => {
                state.setups.finish(&sender);
                state.chats.update(&chat, |s| {
                    s.set_enabled(feature, true);
                    s.action = action;
                });
                info!("{} enabled in {} ({}) by {}", feature.label(), chat, action.as_str(), sender);
                client
                    .reply_card(
                        event,
                        &format!("🛡️ {}", feature.label().to_uppercase()),
                        &[
                            "📊 Status: ✅ ON".to_string(),
                            format!("⚡ Action: {}", action.as_str().to_uppercase()),
                        ],
                    )
                    .await?;
            }
            None => {
                client
                    .reply(event, "⚠️ Reply with *delete*, *warn* or *kick* (1/2/3).")
                    .await?;
            }
        },
    }

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::testing::{group_message, test_state};
    use crate::client::mock::MockClient;
    use crate::database::{PendingSetup, SecurityFeature};

    const GROUP: &str = "120363000000000001@g.us";
    const ADMIN: &str = "923000000002";

    #[tokio::test]
    async fn test_full_setup_flow() {
        let state = test_state();
        let client = MockClient::new("s1", "923000000001");
        state
            .setups
            .begin(ADMIN, PendingSetup::new(GROUP, SecurityFeature::Link));

        let on = group_message(GROUP, ADMIN, "ON");
        assert!(handle_setup_reply(&state, &client, &on).await.unwrap());
        assert_eq!(state.setups.get(ADMIN, GROUP).unwrap().step, SetupStep::Action);

        let bogus = group_message(GROUP, ADMIN, "maybe");
        assert!(handle_setup_reply(&state, &client, &bogus).await.unwrap());
        assert!(state.setups.get(ADMIN, GROUP).is_some());

        let warn = group_message(GROUP, ADMIN, "2");
        assert!(handle_setup_reply(&state, &client, &warn).await.unwrap());
        assert!(state.setups.get(ADMIN, GROUP).is_none());

        let settings = state.chats.get(GROUP);
        assert!(settings.anti_link);
        assert_eq!(settings.action, ViolationAction::Warn);
        assert!(client.sent_texts().last().unwrap().contains("WARN"));
    }

    #[tokio::test]
    async fn test_off_disables_and_finishes() {
        let state = test_state();
        let client = MockClient::new("s1", "923000000001");
        state.chats.update(GROUP, |s| s.anti_video = true);
        state
            .setups
            .begin(ADMIN, PendingSetup::new(GROUP, SecurityFeature::Video));

        let off = group_message(GROUP, ADMIN, "off");
        assert!(handle_setup_reply(&state, &client, &off).await.unwrap());
        assert!(!state.chats.get(GROUP).anti_video);
        assert!(state.setups.get(ADMIN, GROUP).is_none());
    }

    #[tokio::test]
    async fn test_other_chat_or_sender_not_consumed() {
        let state = test_state();
        let client = MockClient::new("s1", "923000000001");
        state
            .setups
            .begin(ADMIN, PendingSetup::new(GROUP, SecurityFeature::Link));

        let elsewhere = group_message("120363000000000099@g.us", ADMIN, "on");
        assert!(!handle_setup_reply(&state, &client, &elsewhere).await.unwrap());

        let someone_else = group_message(GROUP, "923000000005", "on");
        assert!(!handle_setup_reply(&state, &client, &someone_else).await.unwrap());
        assert_eq!(client.sent_count(), 0);
    }
}
