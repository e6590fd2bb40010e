//! Group content protection.
//!
//! Applies the chat's anti-link / anti-media switches to every group
//! message and enforces the configured action on violations.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{info, warn};

use crate::bot::dispatcher::AppState;
use crate::client::{MediaKind, MessageEvent, ParticipantAction, WaClient};
use crate::database::{ChatSettings, SecurityFeature, ViolationAction};
use crate::utils::reply::ReplyExt;

static LINK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(https?://|www\.|chat\.whatsapp\.com/|wa\.me/)").expect("link pattern is valid")
});

/// Whether text carries a link.
pub fn contains_link(text: &str) -> bool {
    LINK_RE.is_match(text)
}

/// First enabled feature the message breaks, before exemptions.
fn violated_feature(settings: &ChatSettings, event: &MessageEvent) -> Option<SecurityFeature> {
    if settings.anti_link && contains_link(&event.text) {
        return Some(SecurityFeature::Link);
    }

    let feature = match event.media? {
        MediaKind::Image => SecurityFeature::Image,
        MediaKind::Video => SecurityFeature::Video,
        MediaKind::Sticker => SecurityFeature::Sticker,
        _ => return None,
    };
    settings.is_enabled(feature).then_some(feature)
}

/// Check a group message. Returns true when a violation was enforced and
/// the message should not be processed further.
pub async fn enforce(state: &AppState, client: &dyn WaClient, event: &MessageEvent) -> anyhow::Result<bool> {
    if !event.is_group() || event.from_me {
        return Ok(false);
    }

    let chat = event.chat.to_string();
    let settings = state.chats.get(&chat);

    let Some(feature) = violated_feature(&settings, event) else {
        return Ok(false);
    };

    if state.permissions.is_owner(client, &event.sender) {
        return Ok(false);
    }
    if feature == SecurityFeature::Link
        && settings.anti_link_admins_exempt
        && state.permissions.is_admin(client, &event.chat, &event.sender).await
    {
        return Ok(false);
    }

    info!(
        "{} violation by {} in {} ({})",
        feature.label(),
        event.sender,
        chat,
        settings.action.as_str()
    );

    if let Err(e) = client.revoke(&event.chat, &event.sender, &event.id).await {
        warn!("Could not delete violating message in {}: {}", chat, e);
    }

    let sender = event.sender.clean();
    let mention = vec![event.sender.to_non_device()];

    match settings.action {
        ViolationAction::Delete => {
            client
                .send_text(
                    &event.chat,
                    &format!("🚫 @{sender} {} is on here. Message deleted.", feature.label()),
                    mention,
                )
                .await?;
        }
        ViolationAction::Warn => {
            let limit = settings.warn_limit;
            let (count, reached) = state.chats.update(&chat, |s| s.add_warning(&sender));

            if reached {
                remove_member(client, event).await;
                client
                    .send_text(
                        &event.chat,
                        &format!("🚫 @{sender} reached {count}/{limit} warnings and was removed."),
                        mention,
                    )
                    .await?;
            } else {
                client
                    .send_text(
                        &event.chat,
                        &format!("⚠️ @{sender} warning {count}/{limit}: {} is on here.", feature.label()),
                        mention,
                    )
                    .await?;
            }
        }
        ViolationAction::Kick => {
            remove_member(client, event).await;
            client
                .send_text(
                    &event.chat,
                    &format!("🚫 @{sender} was removed ({}).", feature.label()),
                    mention,
                )
                .await?;
        }
    }

    Ok(true)
}

async fn remove_member(client: &dyn WaClient, event: &MessageEvent) {
    let target = [event.sender.to_non_device()];
    if let Err(e) = client
        .update_participants(&event.chat, &target, ParticipantAction::Remove)
        .await
    {
        warn!("Could not remove {} from {}: {}", event.sender, event.chat, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::testing::{group_message, test_state};
    use crate::client::mock::MockClient;
    use crate::client::Jid;

    const BOT: &str = "923000000001";
    const ADMIN: &str = "923000000002";
    const MEMBER: &str = "923000000003";
    const GROUP: &str = "120363000000000001@g.us";

    fn client() -> MockClient {
        let group: Jid = GROUP.parse().unwrap();
        MockClient::new("s1", BOT).with_group(&group, &[BOT, ADMIN, MEMBER], &[BOT, ADMIN])
    }

    #[test]
    fn test_contains_link() {
        assert!(contains_link("join https://chat.whatsapp.com/abc"));
        assert!(contains_link("see WWW.example.com"));
        assert!(contains_link("wa.me/923001234567"));
        assert!(!contains_link("no links here, just www"));
    }

    #[tokio::test]
    async fn test_disabled_features_do_nothing() {
        let state = test_state();
        let client = client();
        let event = group_message(GROUP, MEMBER, "https://example.com");
        assert!(!enforce(&state, &client, &event).await.unwrap());
        assert!(client.revoked.lock().is_empty());
    }

    #[tokio::test]
    async fn test_link_deleted_admin_exempt() {
        let state = test_state();
        state.chats.update(GROUP, |s| s.anti_link = true);
        let client = client();

        let from_admin = group_message(GROUP, ADMIN, "https://example.com");
        assert!(!enforce(&state, &client, &from_admin).await.unwrap());

        let from_member = group_message(GROUP, MEMBER, "https://example.com");
        assert!(enforce(&state, &client, &from_member).await.unwrap());
        assert_eq!(client.revoked.lock().as_slice(), &["M1".to_string()]);
        assert!(client.participant_updates.lock().is_empty());
    }

    #[tokio::test]
    async fn test_admins_not_exempt_when_configured() {
        let state = test_state();
        state.chats.update(GROUP, |s| {
            s.anti_link = true;
            s.anti_link_admins_exempt = false;
        });
        let client = client();

        let from_admin = group_message(GROUP, ADMIN, "www.example.com");
        assert!(enforce(&state, &client, &from_admin).await.unwrap());
    }

    #[tokio::test]
    async fn test_owner_always_exempt() {
        let state = test_state();
        state.chats.update(GROUP, |s| s.anti_image = true);
        let client = client();

        let mut event = group_message(GROUP, BOT, "");
        event.media = Some(MediaKind::Image);
        assert!(!enforce(&state, &client, &event).await.unwrap());
    }

    #[tokio::test]
    async fn test_warn_reaches_limit_and_kicks() {
        let state = test_state();
        state.chats.update(GROUP, |s| {
            s.anti_sticker = true;
            s.action = ViolationAction::Warn;
        });
        let client = client();

        let mut event = group_message(GROUP, MEMBER, "");
        event.media = Some(MediaKind::Sticker);

        for _ in 0..2 {
            assert!(enforce(&state, &client, &event).await.unwrap());
        }
        assert!(client.participant_updates.lock().is_empty());
        assert_eq!(state.chats.get(GROUP).warnings.get(MEMBER), Some(&2));

        assert!(enforce(&state, &client, &event).await.unwrap());
        let updates = client.participant_updates.lock();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].2, ParticipantAction::Remove);
        assert!(state.chats.get(GROUP).warnings.get(MEMBER).is_none());
        assert!(client.sent_texts().last().unwrap().contains("3/3"));
    }

    #[tokio::test]
    async fn test_kick_action() {
        let state = test_state();
        state.chats.update(GROUP, |s| {
            s.anti_video = true;
            s.action = ViolationAction::Kick;
        });
        let client = client();

        let mut event = group_message(GROUP, MEMBER, "");
        event.media = Some(MediaKind::Video);
        assert!(enforce(&state, &client, &event).await.unwrap());
        assert_eq!(client.participant_updates.lock().len(), 1);
        assert_eq!(client.revoked.lock().len(), 1);
    }
}
