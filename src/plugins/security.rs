//! Security setup plugin.
//!
//! `antilink`, `antipic`, `antivideo` and `antisticker` start a short
//! conversation with the admin who sent them:
//!
//! 1. on or off?
//! 2. (when on) what to do with violations: delete, warn or kick
//!
//! The replies are picked up by `events::setup`.

use super::CommandContext;
use crate::database::{PendingSetup, SecurityFeature};

pub async fn security_command(ctx: CommandContext) -> anyhow::Result<()> {
    let Some(feature) = SecurityFeature::from_command(&ctx.command) else {
        return Ok(());
    };

    let chat = ctx.event.chat.to_string();
    let settings = ctx.state.chats.get(&chat);
    let current = if settings.is_enabled(feature) { "ON" } else { "OFF" };

    ctx.state
        .setups
        .begin(&ctx.event.sender.clean(), PendingSetup::new(chat, feature));

    ctx.reply_card(
        &format!("🛡️ {} SETUP", feature.label().to_uppercase()),
        &[
            format!("📊 Current: {current} ({})", settings.action.as_str()),
            "Reply with:".to_string(),
            "✅ *on* - enable".to_string(),
            "❌ *off* - disable".to_string(),
        ],
    )
    .await
}
