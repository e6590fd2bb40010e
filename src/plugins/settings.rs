//! Owner settings plugin.
//!
//! Bot-wide switches, prefix, status targets and per-chat mode.

use tracing::{info, warn};

use super::CommandContext;
use crate::database::{Mode, Toggle};
use crate::utils::jid::{clean_id, parse_phone};

const MAX_PREFIX_LEN: usize = 3;

/// Handle alwaysonline/autoread/autoreact/autostatus/statusreact.
pub async fn toggle_command(ctx: CommandContext) -> anyhow::Result<()> {
    let Some(toggle) = Toggle::from_command(&ctx.command) else {
        return Ok(());
    };

    let enabled = ctx.state.bot_settings.toggle(toggle);
    info!("{} set to {} by {}", toggle.label(), enabled, ctx.event.sender);

    if toggle == Toggle::AlwaysOnline {
        for session in ctx.state.sessions.clients() {
            if let Err(e) = session.send_presence(enabled).await {
                warn!("Presence update failed for {}: {}", session.session_id(), e);
            }
        }
    }

    let status = if enabled { "✅ ON" } else { "❌ OFF" };
    ctx.reply_card(
        &format!("⚙️ {}", toggle.label().to_uppercase()),
        &[format!("📊 Status: {status}")],
    )
    .await
}

/// Handle setprefix <prefix>.
pub async fn setprefix_command(ctx: CommandContext) -> anyhow::Result<()> {
    let Some(prefix) = ctx.args.first() else {
        return ctx
            .reply_card(
                "❌ USAGE",
                &[format!("{}setprefix <symbol>", ctx.prefix()), "Example: setprefix !".into()],
            )
            .await;
    };

    if prefix.chars().count() > MAX_PREFIX_LEN {
        return ctx
            .reply_card("❌ INVALID PREFIX", &[format!("At most {MAX_PREFIX_LEN} characters")])
            .await;
    }

    ctx.state.bot_settings.set_prefix(prefix);
    info!("Prefix changed to '{}'", prefix);

    ctx.reply_card("✅ PREFIX UPDATED", &[format!("🔣 New prefix: {prefix}")])
        .await
}

/// Handle mode public|admin|private (groups only).
pub async fn mode_command(ctx: CommandContext) -> anyhow::Result<()> {
    if !ctx.event.is_group() {
        return ctx.reply("❌ Mode can only be set inside a group.").await;
    }

    let chat = ctx.event.chat.to_string();

    let Some(mode) = ctx.args.first().and_then(|a| a.parse::<Mode>().ok()) else {
        let current = ctx.state.chats.get(&chat).mode;
        return ctx
            .reply_card(
                "🛡️ GROUP MODE",
                &[
                    format!("📊 Current: {}", current.as_str().to_uppercase()),
                    format!("{}mode public - everyone", ctx.prefix()),
                    format!("{}mode admin - admins only", ctx.prefix()),
                    format!("{}mode private - owner only", ctx.prefix()),
                ],
            )
            .await;
    };

    ctx.state.chats.update(&chat, |s| s.mode = mode);
    info!("Mode of {} set to {}", chat, mode);

    ctx.reply_card("✅ MODE UPDATED", &[format!("🛡️ Mode: {}", mode.as_str().to_uppercase())])
        .await
}

/// Handle addstatus/delstatus <number>.
pub async fn status_target_command(ctx: CommandContext) -> anyhow::Result<()> {
    let target = match ctx.args.first() {
        Some(arg) => match parse_phone(arg) {
            Ok(number) => number,
            Err(e) => return ctx.reply(&format!("❌ {e}")).await,
        },
        None => match ctx.event.quoted.as_ref().and_then(|q| q.participant.as_ref()) {
            Some(participant) => participant.clean(),
            None => {
                return ctx
                    .reply(&format!("❌ Usage: {}{} <number>", ctx.prefix(), ctx.command))
                    .await;
            }
        },
    };

    let settings = &ctx.state.bot_settings;
    let text = if ctx.command == "addstatus" {
        if settings.add_status_target(&target) {
            format!("✅ Added {target} to status list")
        } else {
            format!("ℹ️ {target} is already in the list")
        }
    } else if settings.remove_status_target(&target) {
        format!("🗑️ Removed {target} from status list")
    } else {
        format!("ℹ️ {target} is not in the list")
    };

    ctx.reply(&text).await
}

/// Handle liststatus.
pub async fn liststatus_command(ctx: CommandContext) -> anyhow::Result<()> {
    let targets = ctx.state.bot_settings.status_targets();

    let lines = if targets.is_empty() {
        vec!["👀 Watching everyone's status".to_string()]
    } else {
        targets
            .iter()
            .enumerate()
            .map(|(i, t)| format!("{}. {}", i + 1, clean_id(t)))
            .collect()
    };

    ctx.reply_card("📋 STATUS LIST", &lines).await
}

/// Handle readallstatus - switch on status viewing for everyone.
pub async fn readallstatus_command(ctx: CommandContext) -> anyhow::Result<()> {
    ctx.state.bot_settings.watch_all_statuses();
    info!("Auto status enabled for every contact by {}", ctx.event.sender);

    ctx.reply_card(
        "👀 READ ALL STATUS",
        &["✅ Auto status: ON".to_string(), "📋 Target list cleared".to_string()],
    )
    .await
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::bot::testing::{context, message};
    use crate::client::mock::MockClient;

    #[tokio::test]
    async fn test_readallstatus_turns_on_and_clears_targets() {
        let client = Arc::new(MockClient::new("s1", "923000000001"));
        let ctx = context(client.clone(), message("923000000001", "923000000001", "#readallstatus"), "readallstatus", &[]);
        let settings = ctx.state.bot_settings.clone();
        settings.add_status_target("923000000007");

        readallstatus_command(ctx.clone()).await.unwrap();
        readallstatus_command(ctx).await.unwrap();

        assert!(settings.get(Toggle::AutoStatus));
        assert!(settings.status_targets().is_empty());
        assert!(client.sent_texts()[0].contains("READ ALL STATUS"));
    }
}
