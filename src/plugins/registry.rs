//! Command registry.
//!
//! Built once at startup. Maps every lowercase name and alias to its
//! [`Command`] and renders the menu from the same table.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::bot::dispatcher::AppState;
use crate::client::{MessageEvent, WaClient};
use crate::permissions::Access;
use crate::utils::reply::ReplyExt;

/// Everything a handler gets.
#[derive(Clone)]
pub struct CommandContext {
    /// Client of the session that received the message.
    pub client: Arc<dyn WaClient>,
    pub event: Arc<MessageEvent>,
    pub state: AppState,
    pub command: String,
    pub args: Vec<String>,
}

impl CommandContext {
    /// Arguments joined back with single spaces.
    pub fn arg_text(&self) -> String {
        self.args.join(" ")
    }

    /// Quoted text reply.
    pub async fn reply(&self, text: &str) -> anyhow::Result<()> {
        self.client.reply(&self.event, text).await?;
        Ok(())
    }

    /// Quoted framed card.
    pub async fn reply_card(&self, title: &str, lines: &[String]) -> anyhow::Result<()> {
        self.client.reply_card(&self.event, title, lines).await?;
        Ok(())
    }

    pub async fn react(&self, emoji: &str) -> anyhow::Result<()> {
        self.client.react(&self.event, emoji).await?;
        Ok(())
    }

    /// Prefix currently configured, for usage hints.
    pub fn prefix(&self) -> String {
        self.state.bot_settings.prefix()
    }
}

/// A command implementation.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn call(&self, ctx: CommandContext) -> anyhow::Result<()>;
}

#[async_trait]
impl<F, Fut> CommandHandler for F
where
    F: Fn(CommandContext) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn call(&self, ctx: CommandContext) -> anyhow::Result<()> {
        (self)(ctx).await
    }
}

/// Menu section a command is listed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Main,
    Downloader,
    Group,
    Settings,
    Tools,
}

impl Category {
    pub const ORDER: [Self; 5] = [Self::Main, Self::Downloader, Self::Group, Self::Settings, Self::Tools];

    pub fn title(&self) -> &'static str {
        match self {
            Self::Main => "MAIN",
            Self::Downloader => "DOWNLOADERS",
            Self::Group => "GROUP",
            Self::Settings => "SETTINGS",
            Self::Tools => "TOOLS",
        }
    }
}

/// One registered command.
pub struct Command {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub description: &'static str,
    pub access: Access,
    pub category: Category,
    /// Reaction sent before the handler runs.
    pub react: Option<&'static str>,
    pub handler: Arc<dyn CommandHandler>,
}

impl Command {
    pub fn new(name: &'static str, category: Category, handler: impl CommandHandler + 'static) -> Self {
        Self {
            name,
            aliases: &[],
            description: "",
            access: Access::Everyone,
            category,
            react: None,
            handler: Arc::new(handler),
        }
    }

    #[must_use]
    pub fn aliases(mut self, aliases: &'static [&'static str]) -> Self {
        self.aliases = aliases;
        self
    }

    #[must_use]
    pub fn describe(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    #[must_use]
    pub fn access(mut self, access: Access) -> Self {
        self.access = access;
        self
    }

    #[must_use]
    pub fn react(mut self, emoji: &'static str) -> Self {
        self.react = Some(emoji);
        self
    }
}

/// Name and alias lookup table.
#[derive(Default)]
pub struct CommandRegistry {
    commands: Vec<Arc<Command>>,
    index: HashMap<String, Arc<Command>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a command. Names already taken are skipped with a warning.
    pub fn register(&mut self, command: Command) -> &mut Self {
        let command = Arc::new(command);

        for name in std::iter::once(&command.name).chain(command.aliases.iter()) {
            let key = name.to_lowercase();
            if let Some(existing) = self.index.get(&key) {
                warn!("Command name '{}' already used by '{}'", key, existing.name);
                continue;
            }
            self.index.insert(key, Arc::clone(&command));
        }

        self.commands.push(command);
        self
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<Command>> {
        self.index.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn commands(&self) -> impl Iterator<Item = &Arc<Command>> {
        self.commands.iter()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Menu body: one section per category, sorted by name.
    pub fn render_menu(&self, prefix: &str) -> String {
        let mut out = String::new();

        for category in Category::ORDER {
            let mut entries: Vec<&Arc<Command>> =
                self.commands.iter().filter(|c| c.category == category).collect();
            if entries.is_empty() {
                continue;
            }
            entries.sort_by_key(|c| c.name);

            out.push_str(&format!("║  ╭──── {} ────╮\n", category.title()));
            for cmd in entries {
                if cmd.description.is_empty() {
                    out.push_str(&format!("║  │ 🔸 *{}{}*\n", prefix, cmd.name));
                } else {
                    out.push_str(&format!("║  │ 🔸 *{}{}* - {}\n", prefix, cmd.name, cmd.description));
                }
            }
            out.push_str("║  ╰──────────────╯\n");
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn noop(_ctx: CommandContext) -> anyhow::Result<()> {
        Ok(())
    }

    fn registry() -> CommandRegistry {
        let mut registry = CommandRegistry::new();
        registry
            .register(Command::new("ping", Category::Main, noop).describe("Speed"))
            .register(Command::new("tiktok", Category::Downloader, noop).aliases(&["tt"]))
            .register(Command::new("kick", Category::Group, noop).access(Access::GroupAdmin))
            .register(Command::new("tt", Category::Tools, noop));
        registry
    }

    #[test]
    fn test_lookup_by_name_and_alias() {
        let registry = registry();
        assert_eq!(registry.lookup("tt").unwrap().name, "tiktok");
        assert_eq!(registry.lookup("kick").unwrap().access, Access::GroupAdmin);
        assert!(registry.lookup("nosuch").is_none());
        assert!(registry.contains("ping"));
        assert_eq!(registry.len(), 4);
    }

    #[test]
    fn test_render_menu_groups_by_category() {
        let menu = registry().render_menu("#");
        let main = menu.find("MAIN").unwrap();
        let dl = menu.find("DOWNLOADERS").unwrap();
        let group = menu.find("GROUP").unwrap();
        assert!(main < dl && dl < group);
        assert!(menu.contains("*#ping* - Speed"));
        assert!(menu.contains("*#kick*"));
        assert!(!menu.contains("SETTINGS"));
    }
}
