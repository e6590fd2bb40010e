//! Per-chat moderation settings.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Who may run commands in a group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Mode {
    #[default]
    Public,
    Admin,
    Private,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Admin => "admin",
            Self::Private => "private",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "public" => Ok(Self::Public),
            "admin" => Ok(Self::Admin),
            "private" => Ok(Self::Private),
            other => Err(format!("unknown mode '{other}'")),
        }
    }
}

/// What happens to a message that breaks a security rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ViolationAction {
    #[default]
    Delete,
    /// Delete and count a warning; the limit removes the sender.
    Warn,
    /// Delete and remove the sender.
    Kick,
}

impl ViolationAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Delete => "delete",
            Self::Warn => "warn",
            Self::Kick => "kick",
        }
    }

    /// Parse a setup reply: a name or the menu number.
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_lowercase().as_str() {
            "1" | "delete" | "del" => Some(Self::Delete),
            "2" | "warn" => Some(Self::Warn),
            "3" | "kick" | "remove" => Some(Self::Kick),
            _ => None,
        }
    }
}

/// Content filters a group can switch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SecurityFeature {
    Link,
    Image,
    Video,
    Sticker,
}

impl SecurityFeature {
    pub const ALL: [Self; 4] = [Self::Link, Self::Image, Self::Video, Self::Sticker];

    /// Command that configures this feature.
    pub fn command(&self) -> &'static str {
        match self {
            Self::Link => "antilink",
            Self::Image => "antipic",
            Self::Video => "antivideo",
            Self::Sticker => "antisticker",
        }
    }

    pub fn from_command(cmd: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.command() == cmd)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Link => "Anti-Link",
            Self::Image => "Anti-Picture",
            Self::Video => "Anti-Video",
            Self::Sticker => "Anti-Sticker",
        }
    }
}

/// Warnings before a member is removed.
const DEFAULT_WARN_LIMIT: u32 = 3;

/// Moderation state of one chat.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatSettings {
    pub chat_id: String,
    pub mode: Mode,
    pub anti_link: bool,
    /// Admins may post links even with anti-link on.
    pub anti_link_admins_exempt: bool,
    pub anti_image: bool,
    pub anti_video: bool,
    pub anti_sticker: bool,
    pub action: ViolationAction,
    pub warn_limit: u32,
    /// Warning counts keyed by clean sender id.
    pub warnings: HashMap<String, u32>,
}

impl ChatSettings {
    pub fn new(chat_id: impl Into<String>) -> Self {
        Self {
            chat_id: chat_id.into(),
            mode: Mode::Public,
            anti_link: false,
            anti_link_admins_exempt: true,
            anti_image: false,
            anti_video: false,
            anti_sticker: false,
            action: ViolationAction::Delete,
            warn_limit: DEFAULT_WARN_LIMIT,
            warnings: HashMap::new(),
        }
    }

    pub fn is_enabled(&self, feature: SecurityFeature) -> bool {
        match feature {
            SecurityFeature::Link => self.anti_link,
            SecurityFeature::Image => self.anti_image,
            SecurityFeature::Video => self.anti_video,
            SecurityFeature::Sticker => self.anti_sticker,
        }
    }

    pub fn set_enabled(&mut self, feature: SecurityFeature, on: bool) {
        match feature {
            SecurityFeature::Link => self.anti_link = on,
            SecurityFeature::Image => self.anti_image = on,
            SecurityFeature::Video => self.anti_video = on,
            SecurityFeature::Sticker => self.anti_sticker = on,
        }
    }

    /// Count a warning for `sender`. Returns the new count and whether the
    /// limit was reached; reaching it resets the count.
    pub fn add_warning(&mut self, sender: &str) -> (u32, bool) {
        let count = self.warnings.entry(sender.to_string()).or_insert(0);
        *count += 1;
        let current = *count;

        if current >= self.warn_limit {
            self.warnings.remove(sender);
            (current, true)
        } else {
            (current, false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_chat_defaults() {
        let s = ChatSettings::new("1203@g.us");
        assert_eq!(s.mode, Mode::Public);
        assert!(SecurityFeature::ALL.iter().all(|f| !s.is_enabled(*f)));
        assert!(s.anti_link_admins_exempt);
        assert_eq!(s.action, ViolationAction::Delete);
        assert_eq!(s.warn_limit, 3);
    }

    #[test]
    fn test_warning_limit_resets_count() {
        let mut s = ChatSettings::new("g");
        assert_eq!(s.add_warning("u"), (1, false));
        assert_eq!(s.add_warning("u"), (2, false));
        assert_eq!(s.add_warning("u"), (3, true));
        assert!(!s.warnings.contains_key("u"));
        assert_eq!(s.add_warning("u"), (1, false));
    }

    #[test]
    fn test_parse_mode_and_action() {
        assert_eq!("ADMIN".parse::<Mode>(), Ok(Mode::Admin));
        assert!("everyone".parse::<Mode>().is_err());
        assert_eq!(ViolationAction::parse("2"), Some(ViolationAction::Warn));
        assert_eq!(ViolationAction::parse(" Kick "), Some(ViolationAction::Kick));
        assert_eq!(ViolationAction::parse("ban"), None);
        assert_eq!(SecurityFeature::from_command("antipic"), Some(SecurityFeature::Image));
    }
}
