//! Plugin system for command handlers.
//!
//! Add new plugins by:
//! 1. Creating a new file in this directory
//! 2. Adding `pub mod your_plugin;` below
//! 3. Registering its handlers in `build_registry()`

pub mod admin;
pub mod classifier;
pub mod downloader;
pub mod lookup;
pub mod menu;
pub mod ping;
pub mod registry;
pub mod security;
pub mod settings;
pub mod tools;

use std::sync::Arc;

use tracing::{debug, warn};

use crate::bot::dispatcher::AppState;
use crate::client::{MessageEvent, WaClient};
use crate::permissions::Access;
use crate::utils::reply::ReplyExt;

pub use classifier::{classify, Classified};
pub use registry::{Category, Command, CommandContext, CommandHandler, CommandRegistry};

/// Build the command table.
pub fn build_registry() -> CommandRegistry {
    use Category::*;

    let mut r = CommandRegistry::new();

    // Main
    r.register(
        Command::new("menu", Main, menu::menu_command)
            .aliases(&["help", "list"])
            .describe("Show this menu")
            .react("📜"),
    )
    .register(Command::new("ping", Main, ping::ping_command).describe("Check speed").react("⚡"))
    .register(Command::new("id", Main, menu::id_command).describe("Show chat and user ids").react("🆔"))
    .register(Command::new("owner", Main, menu::owner_command).describe("Owner info").react("👑"))
    .register(
        Command::new("listbots", Main, menu::listbots_command)
            .describe("Connected sessions")
            .access(Access::Owner),
    )
    .register(
        Command::new("data", Main, menu::data_command)
            .describe("Storage status")
            .access(Access::Owner)
            .react("📊"),
    );

    // Downloaders
    r.register(
        Command::new("tiktok", Downloader, downloader::tiktok_command)
            .aliases(&["tt"])
            .describe("TikTok video (add 'audio' for sound)"),
    )
    .register(
        Command::new("fb", Downloader, downloader::ytdlp_command)
            .aliases(&["facebook"])
            .describe("Facebook video"),
    )
    .register(
        Command::new("insta", Downloader, downloader::ytdlp_command)
            .aliases(&["ig"])
            .describe("Instagram reel"),
    )
    .register(
        Command::new("pin", Downloader, downloader::ytdlp_command)
            .aliases(&["pinterest"])
            .describe("Pinterest media"),
    )
    .register(Command::new("ytmp3", Downloader, downloader::ytdlp_command).describe("YouTube audio"))
    .register(Command::new("ytmp4", Downloader, downloader::ytdlp_command).describe("YouTube video"))
    .register(
        Command::new("twitter", Downloader, downloader::ytdlp_command)
            .aliases(&["x"])
            .describe("X video"),
    );

    // Group
    for (name, description) in [
        ("kick", "Remove members"),
        ("promote", "Make admin"),
        ("demote", "Remove admin"),
    ] {
        r.register(
            Command::new(name, Group, admin::member_command)
                .describe(description)
                .access(Access::GroupAdmin),
        );
    }
    r.register(
        Command::new("add", Group, admin::add_command)
            .describe("Add a number")
            .access(Access::GroupAdmin),
    )
    .register(
        Command::new("tagall", Group, admin::tagall_command)
            .describe("Mention everyone")
            .access(Access::GroupAdmin),
    )
    .register(
        Command::new("hidetag", Group, admin::hidetag_command)
            .describe("Silent mention")
            .access(Access::GroupAdmin),
    )
    .register(
        Command::new("group", Group, admin::group_command)
            .describe("open | close")
            .access(Access::GroupAdmin),
    )
    .register(
        Command::new("del", Group, admin::delete_command)
            .aliases(&["delete"])
            .describe("Delete the quoted message")
            .access(Access::GroupAdmin),
    );
    for (name, description) in [
        ("antilink", "Link protection"),
        ("antipic", "Image protection"),
        ("antivideo", "Video protection"),
        ("antisticker", "Sticker protection"),
    ] {
        r.register(
            Command::new(name, Group, security::security_command)
                .describe(description)
                .access(Access::GroupAdmin),
        );
    }

    // Settings
    for (name, description) in [
        ("alwaysonline", "Always online"),
        ("autoread", "Read every message"),
        ("autoreact", "React to every message"),
        ("autostatus", "View statuses"),
        ("statusreact", "React to statuses"),
    ] {
        r.register(
            Command::new(name, Settings, settings::toggle_command)
                .describe(description)
                .access(Access::Owner),
        );
    }
    r.register(
        Command::new("setprefix", Settings, settings::setprefix_command)
            .describe("Change prefix")
            .access(Access::Owner),
    )
    .register(
        Command::new("mode", Settings, settings::mode_command)
            .describe("public | admin | private")
            .access(Access::Owner),
    )
    .register(
        Command::new("addstatus", Settings, settings::status_target_command)
            .describe("Watch a number's status")
            .access(Access::Owner),
    )
    .register(
        Command::new("delstatus", Settings, settings::status_target_command)
            .describe("Stop watching a number")
            .access(Access::Owner),
    )
    .register(
        Command::new("liststatus", Settings, settings::liststatus_command)
            .describe("Watched numbers")
            .access(Access::Owner),
    )
    .register(
        Command::new("readallstatus", Settings, settings::readallstatus_command)
            .describe("View every status")
            .access(Access::Owner),
    );

    // Tools
    r.register(
        Command::new("sticker", Tools, tools::sticker_command)
            .aliases(&["s"])
            .describe("Image or video to sticker"),
    )
    .register(Command::new("toimg", Tools, tools::toimg_command).describe("Sticker to image"))
    .register(Command::new("tovideo", Tools, tools::tovideo_command).describe("Sticker to video"))
    .register(Command::new("removebg", Tools, tools::removebg_command).describe("Remove background"))
    .register(Command::new("remini", Tools, tools::remini_command).describe("Enhance image"))
    .register(Command::new("tourl", Tools, tools::tourl_command).describe("Upload media"))
    .register(Command::new("weather", Tools, lookup::weather_command).describe("Weather for a city"))
    .register(
        Command::new("translate", Tools, lookup::translate_command)
            .aliases(&["tr"])
            .describe("Translate text"),
    )
    .register(Command::new("vv", Tools, tools::vv_command).describe("Reveal view-once media"));

    r
}

/// Classify, authorize and run a command. Returns whether the text was a
/// registered command (even if it was denied).
pub async fn handle_command(state: &AppState, client: Arc<dyn WaClient>, event: Arc<MessageEvent>) -> bool {
    let prefix = state.bot_settings.prefix();
    let bare = state.config.bare_commands;
    let registry = &state.registry;

    let Some(Classified { command, args }) =
        classify(&event.text, &prefix, |name| bare && registry.contains(name))
    else {
        return false;
    };

    let Some(cmd) = registry.lookup(&command) else {
        debug!("Unknown command '{}' from {}", command, event.sender);
        return false;
    };

    if !state.permissions.authorize(cmd.access, client.as_ref(), &event).await {
        return true;
    }

    debug!("Running '{}' for {} in {}", cmd.name, event.sender, event.chat);

    if let Some(emoji) = cmd.react {
        if let Err(e) = client.react(&event, emoji).await {
            warn!("Failed to react for '{}': {}", cmd.name, e);
        }
    }

    let ctx = CommandContext {
        client,
        event,
        state: state.clone(),
        command,
        args,
    };

    if let Err(e) = cmd.handler.call(ctx).await {
        warn!("Command '{}' failed: {:#}", cmd.name, e);
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::testing::{message, test_state_with};
    use crate::client::mock::MockClient;
    use crate::client::OutgoingMessage;
    use crate::config::Config;

    const BOT: &str = "923000000001";
    const USER: &str = "923000000009";

    #[test]
    fn test_registry_has_every_command() {
        let registry = build_registry();
        for name in [
            "menu", "help", "list", "ping", "id", "owner", "listbots", "data", "setprefix", "mode",
            "alwaysonline", "autoread", "autoreact", "autostatus", "statusreact", "addstatus",
            "delstatus", "liststatus", "readallstatus", "antilink", "antipic", "antivideo",
            "antisticker", "kick", "add", "promote", "demote", "tagall", "hidetag", "group", "del",
            "delete", "tiktok", "tt", "fb", "facebook", "insta", "ig", "pin", "pinterest", "ytmp3",
            "ytmp4", "twitter", "x", "sticker", "s", "toimg", "tovideo", "removebg", "remini",
            "tourl", "weather", "translate", "tr", "vv",
        ] {
            assert!(registry.contains(name), "missing command {name}");
        }
        assert_eq!(registry.lookup("mode").unwrap().access, Access::Owner);
        assert_eq!(registry.lookup("kick").unwrap().access, Access::GroupAdmin);
    }

    #[tokio::test]
    async fn test_ping_runs_with_react() {
        let state = test_state_with(Config::default());
        let client = Arc::new(MockClient::new("s1", BOT));

        let handled = handle_command(&state, client.clone(), Arc::new(message(USER, USER, "#ping"))).await;

        assert!(handled);
        let sent = client.sent.lock();
        assert!(matches!(&sent[0].1, OutgoingMessage::Reaction { emoji, .. } if emoji == "⚡"));
        assert!(sent.iter().any(|(_, m)| matches!(m, OutgoingMessage::Text { text, .. } if text.contains("PING"))));
    }

    #[tokio::test]
    async fn test_bare_command_and_plain_chat() {
        let state = test_state_with(Config::default());
        let client = Arc::new(MockClient::new("s1", BOT));

        assert!(handle_command(&state, client.clone(), Arc::new(message(USER, USER, "Ping"))).await);
        assert!(!handle_command(&state, client.clone(), Arc::new(message(USER, USER, "pinging you later"))).await);

        let config = Config {
            bare_commands: false,
            ..Config::default()
        };
        let state = test_state_with(config);
        let quiet = Arc::new(MockClient::new("s1", BOT));
        assert!(!handle_command(&state, quiet.clone(), Arc::new(message(USER, USER, "ping"))).await);
        assert_eq!(quiet.sent_count(), 0);
    }

    #[tokio::test]
    async fn test_owner_command_denied_silently() {
        let state = test_state_with(Config::default());
        let client = Arc::new(MockClient::new("s1", BOT));

        let handled = handle_command(&state, client.clone(), Arc::new(message(USER, USER, "#autoread"))).await;

        assert!(handled);
        assert_eq!(client.sent_count(), 0);
        assert!(!state.bot_settings.snapshot().auto_read);
    }

    #[tokio::test]
    async fn test_owner_toggle_runs() {
        let state = test_state_with(Config::default());
        let client = Arc::new(MockClient::new("s1", BOT));

        handle_command(&state, client.clone(), Arc::new(message(BOT, BOT, "#autoread"))).await;

        assert!(state.bot_settings.snapshot().auto_read);
        assert!(client.sent_texts()[0].contains("ON"));
    }

    #[tokio::test]
    async fn test_unknown_prefixed_command_is_silent() {
        let state = test_state_with(Config::default());
        let client = Arc::new(MockClient::new("s1", BOT));

        assert!(!handle_command(&state, client.clone(), Arc::new(message(USER, USER, "#nosuch"))).await);
        assert_eq!(client.sent_count(), 0);
    }
}
