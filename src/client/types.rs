//! Message and event types exchanged with the messaging client.

use std::fmt;
use std::str::FromStr;

use crate::utils::jid::{clean_id, JidError};

/// Server for regular user accounts.
pub const USER_SERVER: &str = "s.whatsapp.net";
/// Server for group chats.
pub const GROUP_SERVER: &str = "g.us";
/// Server for linked identifiers.
pub const LID_SERVER: &str = "lid";
/// Server for broadcast lists (including status updates).
pub const BROADCAST_SERVER: &str = "broadcast";

/// An addressable identifier: `user[:device]@server`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Jid {
    pub user: String,
    pub device: Option<u16>,
    pub server: String,
}

impl Jid {
    pub fn new(user: impl Into<String>, server: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            device: None,
            server: server.into(),
        }
    }

    /// A regular account identifier for a phone number.
    pub fn user_jid(number: &str) -> Self {
        Self::new(number, USER_SERVER)
    }

    pub fn is_group(&self) -> bool {
        self.server == GROUP_SERVER
    }

    pub fn is_status_broadcast(&self) -> bool {
        self.user == "status" && self.server == BROADCAST_SERVER
    }

    /// Normalized identity (no device, no server).
    pub fn clean(&self) -> String {
        clean_id(&self.user)
    }

    /// Same identifier without the device suffix.
    pub fn to_non_device(&self) -> Self {
        Self::new(self.user.clone(), self.server.clone())
    }
}

impl fmt::Display for Jid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.device {
            Some(device) => write!(f, "{}:{}@{}", self.user, device, self.server),
            None => write!(f, "{}@{}", self.user, self.server),
        }
    }
}

impl FromStr for Jid {
    type Err = JidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (user_part, server) = s
            .split_once('@')
            .ok_or_else(|| JidError::MissingServer(s.to_string()))?;

        if server.is_empty() {
            return Err(JidError::MissingServer(s.to_string()));
        }

        let (user, device) = match user_part.split_once(':') {
            Some((user, device)) => {
                let device = device
                    .parse::<u16>()
                    .map_err(|_| JidError::InvalidDevice(s.to_string()))?;
                (user, Some(device))
            }
            None => (user_part, None),
        };

        if user.is_empty() {
            return Err(JidError::EmptyUser(s.to_string()));
        }

        Ok(Self {
            user: user.to_string(),
            device,
            server: server.to_string(),
        })
    }
}

/// Kind of media carried by a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
    Audio,
    Sticker,
    Document,
}

impl MediaKind {
    /// Mimetype used when the caller does not provide one.
    pub fn default_mimetype(&self) -> &'static str {
        match self {
            Self::Image => "image/jpeg",
            Self::Video => "video/mp4",
            Self::Audio => "audio/mpeg",
            Self::Sticker => "image/webp",
            Self::Document => "application/octet-stream",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Sticker => "sticker",
            Self::Document => "document",
        }
    }
}

/// The message an inbound message replies to.
#[derive(Debug, Clone, Default)]
pub struct QuotedContext {
    pub message_id: String,
    pub participant: Option<Jid>,
    pub text: Option<String>,
    pub media: Option<MediaKind>,
    pub view_once: bool,
    /// Gateway representation of the quoted message, needed to fetch its media.
    pub raw: serde_json::Value,
}

/// An inbound chat message.
#[derive(Debug, Clone)]
pub struct MessageEvent {
    pub session: String,
    pub id: String,
    pub chat: Jid,
    pub sender: Jid,
    pub from_me: bool,
    pub text: String,
    pub media: Option<MediaKind>,
    pub quoted: Option<QuotedContext>,
    pub mentions: Vec<Jid>,
}

impl MessageEvent {
    pub fn is_group(&self) -> bool {
        self.chat.is_group()
    }

    /// Reference used to quote this message in a reply.
    pub fn quote_ref(&self) -> QuoteRef {
        QuoteRef {
            message_id: self.id.clone(),
            sender: self.sender.clone(),
            text: self.text.clone(),
        }
    }
}

/// Participant change kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticipantAction {
    Add,
    Remove,
    Promote,
    Demote,
}

impl ParticipantAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Remove => "remove",
            Self::Promote => "promote",
            Self::Demote => "demote",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "add" => Some(Self::Add),
            "remove" => Some(Self::Remove),
            "promote" => Some(Self::Promote),
            "demote" => Some(Self::Demote),
            _ => None,
        }
    }
}

/// A group metadata or membership change.
#[derive(Debug, Clone)]
pub struct GroupUpdateEvent {
    pub session: String,
    pub group: Jid,
    pub action: Option<ParticipantAction>,
    pub participants: Vec<Jid>,
}

/// Everything the client can report.
#[derive(Debug, Clone)]
pub enum Event {
    Message(Box<MessageEvent>),
    GroupUpdate(GroupUpdateEvent),
    Connected {
        session: String,
        phone: Option<String>,
        lid: Option<String>,
    },
    Disconnected {
        session: String,
    },
}

/// Reference to a message being quoted by an outgoing message.
#[derive(Debug, Clone)]
pub struct QuoteRef {
    pub message_id: String,
    pub sender: Jid,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct ListRow {
    pub id: String,
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct ListSection {
    pub title: String,
    pub rows: Vec<ListRow>,
}

/// Messages the bot can send.
#[derive(Debug, Clone)]
pub enum OutgoingMessage {
    Text {
        text: String,
        quoted: Option<QuoteRef>,
        mentions: Vec<Jid>,
    },
    Reaction {
        target_id: String,
        target_sender: Jid,
        from_me: bool,
        emoji: String,
    },
    Contact {
        display_name: String,
        phone: String,
    },
    List {
        title: String,
        description: String,
        button_text: String,
        footer: String,
        sections: Vec<ListSection>,
    },
    Media {
        kind: MediaKind,
        data: Vec<u8>,
        mimetype: Option<String>,
        caption: Option<String>,
        file_name: Option<String>,
        quoted: Option<QuoteRef>,
    },
}

impl OutgoingMessage {
    /// Short label for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Reaction { .. } => "reaction",
            Self::Contact { .. } => "contact",
            Self::List { .. } => "list",
            Self::Media { kind, .. } => kind.as_str(),
        }
    }
}

/// One group member.
#[derive(Debug, Clone)]
pub struct Participant {
    pub jid: Jid,
    /// Phone-number form of the member when `jid` is a linked identifier.
    pub phone: Option<Jid>,
    pub is_admin: bool,
    pub is_super_admin: bool,
}

impl Participant {
    /// Whether this member is the given identity under either addressing form.
    pub fn matches(&self, clean: &str) -> bool {
        self.jid.clean() == clean || self.phone.as_ref().is_some_and(|p| p.clean() == clean)
    }
}

/// Group metadata.
#[derive(Debug, Clone)]
pub struct GroupInfo {
    pub participants: Vec<Participant>,
}

/// The two ways an account can be addressed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountIdentity {
    pub phone: Option<String>,
    pub lid: Option<String>,
}

impl AccountIdentity {
    /// The account's own address: its phone number, else its linked id.
    pub fn jid(&self) -> Option<Jid> {
        match (&self.phone, &self.lid) {
            (Some(phone), _) if !phone.is_empty() => Some(Jid::user_jid(phone)),
            (_, Some(lid)) if !lid.is_empty() => Some(Jid::new(lid.clone(), LID_SERVER)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jid_round_trip_with_device() {
        let jid: Jid = "923001234567:61@s.whatsapp.net".parse().unwrap();
        assert_eq!(jid.user, "923001234567");
        assert_eq!(jid.device, Some(61));
        assert_eq!(jid.to_string(), "923001234567:61@s.whatsapp.net");
        assert_eq!(jid.to_non_device().to_string(), "923001234567@s.whatsapp.net");
    }

    #[test]
    fn test_jid_kinds() {
        let group: Jid = "120363000000000000@g.us".parse().unwrap();
        assert!(group.is_group());
        let status: Jid = "status@broadcast".parse().unwrap();
        assert!(status.is_status_broadcast());
        assert!(!status.is_group());
    }

    #[test]
    fn test_jid_parse_errors() {
        assert!(matches!("12345".parse::<Jid>(), Err(JidError::MissingServer(_))));
        assert!(matches!("@g.us".parse::<Jid>(), Err(JidError::EmptyUser(_))));
        assert!(matches!("1:x@lid".parse::<Jid>(), Err(JidError::InvalidDevice(_))));
    }

    #[test]
    fn test_identity_jid_prefers_phone() {
        let both = AccountIdentity {
            phone: Some("923001234567".into()),
            lid: Some("99887766".into()),
        };
        assert_eq!(both.jid().unwrap().to_string(), "923001234567@s.whatsapp.net");

        let lid_only = AccountIdentity {
            phone: Some(String::new()),
            lid: Some("99887766".into()),
        };
        assert_eq!(lid_only.jid().unwrap().to_string(), "99887766@lid");
        assert!(AccountIdentity::default().jid().is_none());
    }

    #[test]
    fn test_participant_matches_lid_or_phone() {
        let p = Participant {
            jid: "99887766:3@lid".parse().unwrap(),
            phone: Some(Jid::user_jid("923001234567")),
            is_admin: true,
            is_super_admin: false,
        };
        assert!(p.matches("99887766"));
        assert!(p.matches("923001234567"));
        assert!(!p.matches("111"));
    }
}
