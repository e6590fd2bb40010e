//! Process-wide bot settings.

/// Switches owners flip with a single command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    AutoRead,
    AutoStatus,
    StatusReact,
    AutoReact,
    AlwaysOnline,
}

impl Toggle {
    pub fn from_command(cmd: &str) -> Option<Self> {
        match cmd {
            "autoread" => Some(Self::AutoRead),
            "autostatus" => Some(Self::AutoStatus),
            "statusreact" => Some(Self::StatusReact),
            "autoreact" => Some(Self::AutoReact),
            "alwaysonline" => Some(Self::AlwaysOnline),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::AutoRead => "Auto Read",
            Self::AutoStatus => "Auto Status View",
            Self::StatusReact => "Status React",
            Self::AutoReact => "Auto React",
            Self::AlwaysOnline => "Always Online",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotSettings {
    pub prefix: String,
    pub auto_read: bool,
    pub auto_status: bool,
    pub status_react: bool,
    pub auto_react: bool,
    pub always_online: bool,
    /// Clean ids whose statuses are auto-viewed; empty means everyone.
    pub status_targets: Vec<String>,
}

impl BotSettings {
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            auto_read: false,
            auto_status: false,
            status_react: false,
            auto_react: false,
            always_online: false,
            status_targets: Vec::new(),
        }
    }

    pub fn get(&self, toggle: Toggle) -> bool {
        match toggle {
            Toggle::AutoRead => self.auto_read,
            Toggle::AutoStatus => self.auto_status,
            Toggle::StatusReact => self.status_react,
            Toggle::AutoReact => self.auto_react,
            Toggle::AlwaysOnline => self.always_online,
        }
    }

    fn slot(&mut self, toggle: Toggle) -> &mut bool {
        match toggle {
            Toggle::AutoRead => &mut self.auto_read,
            Toggle::AutoStatus => &mut self.auto_status,
            Toggle::StatusReact => &mut self.status_react,
            Toggle::AutoReact => &mut self.auto_react,
            Toggle::AlwaysOnline => &mut self.always_online,
        }
    }

    /// Flip a switch and return its new value.
    pub fn toggle(&mut self, toggle: Toggle) -> bool {
        let slot = self.slot(toggle);
        *slot = !*slot;
        *slot
    }

    pub fn set(&mut self, toggle: Toggle, value: bool) {
        *self.slot(toggle) = value;
    }

    /// Whether a status from `sender` (clean id) should be auto-viewed.
    pub fn watches_status_of(&self, sender: &str) -> bool {
        self.status_targets.is_empty() || self.status_targets.iter().any(|t| t == sender)
    }
}

impl Default for BotSettings {
    fn default() -> Self {
        Self::with_prefix("#")
    }
}
