//! Reply helper utilities.
//!
//! Every handler answers through these so replies look the same everywhere:
//! quoted to the triggering message, sent back through the session that
//! received it.

use async_trait::async_trait;

use crate::client::{ClientError, Jid, MediaKind, MessageEvent, OutgoingMessage, WaClient};

/// Box-drawn card used for bot replies.
///
/// ```text
/// ╔════════════════╗
/// ║ ⚡ PING STATUS
/// ╠════════════════╣
/// ║ 🚀 Speed: 12 MS
/// ╚════════════════╝
/// ```
pub fn framed(title: &str, lines: &[String]) -> String {
    const BAR: &str = "════════════════";
    let mut out = format!("╔{BAR}╗\n║ {title}\n");
    if !lines.is_empty() {
        out.push_str(&format!("╠{BAR}╣\n"));
        for line in lines {
            out.push_str(&format!("║ {line}\n"));
        }
    }
    out.push_str(&format!("╚{BAR}╝"));
    out
}

/// Convenience senders on top of any [`WaClient`].
#[async_trait]
pub trait ReplyExt {
    /// Text reply quoting `event`.
    async fn reply(&self, event: &MessageEvent, text: &str) -> Result<String, ClientError>;

    /// Text reply with a framed card.
    async fn reply_card(
        &self,
        event: &MessageEvent,
        title: &str,
        lines: &[String],
    ) -> Result<String, ClientError>;

    /// Plain text to a chat, optionally mentioning members.
    async fn send_text(&self, chat: &Jid, text: &str, mentions: Vec<Jid>) -> Result<String, ClientError>;

    /// React to `event` with an emoji.
    async fn react(&self, event: &MessageEvent, emoji: &str) -> Result<String, ClientError>;

    /// Media reply quoting `event`. A missing mimetype falls back to the
    /// kind's default.
    async fn send_media(
        &self,
        event: &MessageEvent,
        kind: MediaKind,
        data: Vec<u8>,
        mimetype: Option<String>,
        caption: Option<String>,
        file_name: Option<String>,
    ) -> Result<String, ClientError>;
}

#[async_trait]
impl<T: WaClient + ?Sized> ReplyExt for T {
    async fn reply(&self, event: &MessageEvent, text: &str) -> Result<String, ClientError> {
        self.send(
            &event.chat,
            OutgoingMessage::Text {
                text: text.to_string(),
                quoted: Some(event.quote_ref()),
                mentions: Vec::new(),
            },
        )
        .await
    }

    async fn reply_card(
        &self,
        event: &MessageEvent,
        title: &str,
        lines: &[String],
    ) -> Result<String, ClientError> {
        self.reply(event, &framed(title, lines)).await
    }

    async fn send_text(&self, chat: &Jid, text: &str, mentions: Vec<Jid>) -> Result<String, ClientError> {
        self.send(
            chat,
            OutgoingMessage::Text {
                text: text.to_string(),
                quoted: None,
                mentions,
            },
        )
        .await
    }

    async fn react(&self, event: &MessageEvent, emoji: &str) -> Result<String, ClientError> {
        self.send(
            &event.chat,
            OutgoingMessage::Reaction {
                target_id: event.id.clone(),
                target_sender: event.sender.clone(),
                from_me: event.from_me,
                emoji: emoji.to_string(),
            },
        )
        .await
    }

    async fn send_media(
        &self,
        event: &MessageEvent,
        kind: MediaKind,
        data: Vec<u8>,
        mimetype: Option<String>,
        caption: Option<String>,
        file_name: Option<String>,
    ) -> Result<String, ClientError> {
        self.send(
            &event.chat,
            OutgoingMessage::Media {
                kind,
                data,
                mimetype,
                caption,
                file_name,
                quoted: Some(event.quote_ref()),
            },
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_framed_card() {
        let card = framed("🆔 ID INFO", &["👤 User: 1".to_string()]);
        let lines: Vec<&str> = card.lines().collect();
        assert_eq!(lines.len(), 5);
        assert!(lines[0].starts_with('╔'));
        assert_eq!(lines[1], "║ 🆔 ID INFO");
        assert!(lines[2].starts_with('╠'));
        assert_eq!(lines[3], "║ 👤 User: 1");
        assert!(lines[4].starts_with('╚'));
    }

    #[test]
    fn test_framed_title_only() {
        assert_eq!(framed("x", &[]).lines().count(), 3);
    }
}
