//! Group administration commands.
//!
//! All of these are registered with `Access::GroupAdmin`, so they only
//! run in groups, for group admins and owners.

use tracing::info;

use super::CommandContext;
use crate::client::{Jid, OutgoingMessage, ParticipantAction};
use crate::utils::jid::{clean_id, parse_phone};
use crate::utils::reply::ReplyExt;
use crate::utils::target::resolve_targets;

/// Reply and stop when the bot account cannot administer the group.
async fn require_bot_admin(ctx: &CommandContext) -> anyhow::Result<bool> {
    if ctx
        .state
        .permissions
        .bot_is_admin(ctx.client.as_ref(), &ctx.event.chat)
        .await
    {
        return Ok(true);
    }
    ctx.reply("❌ I need to be an admin to do that.").await?;
    Ok(false)
}

/// Handle kick/promote/demote - act on mentioned, quoted or listed members.
pub async fn member_command(ctx: CommandContext) -> anyhow::Result<()> {
    let action = match ctx.command.as_str() {
        "kick" => ParticipantAction::Remove,
        "promote" => ParticipantAction::Promote,
        "demote" => ParticipantAction::Demote,
        _ => return Ok(()),
    };

    let targets = match resolve_targets(&ctx.event, &ctx.args) {
        Ok(targets) => targets,
        Err(e) => return ctx.reply(&format!("❌ {e}")).await,
    };

    // Never act on the bot account itself.
    let own = ctx.client.identity().phone.as_deref().map(clean_id);
    let targets: Vec<Jid> = targets
        .into_iter()
        .filter(|t| own.as_deref() != Some(t.clean().as_str()))
        .collect();

    if targets.is_empty() {
        return ctx
            .reply(&format!(
                "❌ Mention, reply to, or give the number of a member.\nUsage: {}{} @user",
                ctx.prefix(),
                ctx.command
            ))
            .await;
    }

    if !require_bot_admin(&ctx).await? {
        return Ok(());
    }

    if let Err(e) = ctx
        .client
        .update_participants(&ctx.event.chat, &targets, action)
        .await
    {
        return ctx.reply(&format!("❌ Failed to {}: {e}", action.as_str())).await;
    }
    ctx.state.permissions.invalidate(&ctx.event.chat);

    info!("{} {} member(s) in {}", action.as_str(), targets.len(), ctx.event.chat);

    let verb = match action {
        ParticipantAction::Remove => "👢 Removed",
        ParticipantAction::Promote => "⬆️ Promoted",
        ParticipantAction::Demote => "⬇️ Demoted",
        ParticipantAction::Add => "➕ Added",
    };
    let names: Vec<String> = targets.iter().map(|t| format!("@{}", t.user)).collect();

    ctx.client
        .send(
            &ctx.event.chat,
            OutgoingMessage::Text {
                text: format!("{verb}: {}", names.join(", ")),
                quoted: Some(ctx.event.quote_ref()),
                mentions: targets,
            },
        )
        .await?;
    Ok(())
}

/// Handle add <number...>.
pub async fn add_command(ctx: CommandContext) -> anyhow::Result<()> {
    if ctx.args.is_empty() {
        return ctx
            .reply(&format!("❌ Usage: {}add 923001234567", ctx.prefix()))
            .await;
    }

    let numbers = match ctx
        .args
        .iter()
        .map(|a| parse_phone(a))
        .collect::<Result<Vec<_>, _>>()
    {
        Ok(numbers) => numbers,
        Err(e) => return ctx.reply(&format!("❌ {e}")).await,
    };

    if !require_bot_admin(&ctx).await? {
        return Ok(());
    }

    let jids: Vec<Jid> = numbers.iter().map(|n| Jid::user_jid(n)).collect();
    if let Err(e) = ctx
        .client
        .update_participants(&ctx.event.chat, &jids, ParticipantAction::Add)
        .await
    {
        return ctx.reply(&format!("❌ Failed to add: {e}")).await;
    }
    ctx.state.permissions.invalidate(&ctx.event.chat);

    ctx.reply(&format!("➕ Added: {}", numbers.join(", "))).await
}

/// Handle tagall [text] - mention every member, listing them.
pub async fn tagall_command(ctx: CommandContext) -> anyhow::Result<()> {
    let Some(info) = ctx
        .state
        .permissions
        .group_info(ctx.client.as_ref(), &ctx.event.chat)
        .await
    else {
        return ctx.reply("❌ Could not load the member list.").await;
    };

    let headline = if ctx.args.is_empty() {
        "📢 Attention everyone!".to_string()
    } else {
        ctx.arg_text()
    };

    let mut text = format!("╔════════════════╗\n║ {headline}\n╠════════════════╣\n");
    for p in &info.participants {
        text.push_str(&format!("║ 👤 @{}\n", p.jid.user));
    }
    text.push_str(&format!("╚════════════════╝\n👥 Total: {}", info.participants.len()));

    let mentions = info.participants.iter().map(|p| p.jid.clone()).collect();
    ctx.client.send_text(&ctx.event.chat, &text, mentions).await?;
    Ok(())
}

/// Handle hidetag [text] - mention every member without listing them.
pub async fn hidetag_command(ctx: CommandContext) -> anyhow::Result<()> {
    let Some(info) = ctx
        .state
        .permissions
        .group_info(ctx.client.as_ref(), &ctx.event.chat)
        .await
    else {
        return ctx.reply("❌ Could not load the member list.").await;
    };

    let text = if !ctx.args.is_empty() {
        ctx.arg_text()
    } else {
        ctx.event
            .quoted
            .as_ref()
            .and_then(|q| q.text.clone())
            .unwrap_or_else(|| "📢".to_string())
    };

    let mentions = info.participants.iter().map(|p| p.jid.clone()).collect();
    ctx.client.send_text(&ctx.event.chat, &text, mentions).await?;
    Ok(())
}

/// Handle group open|close.
pub async fn group_command(ctx: CommandContext) -> anyhow::Result<()> {
    let announce = match ctx.args.first().map(|a| a.to_lowercase()).as_deref() {
        Some("close") | Some("closed") | Some("lock") => true,
        Some("open") | Some("unlock") => false,
        _ => {
            return ctx
                .reply_card(
                    "⚙️ GROUP SETTINGS",
                    &[
                        format!("{}group open - everyone can send", ctx.prefix()),
                        format!("{}group close - admins only", ctx.prefix()),
                    ],
                )
                .await;
        }
    };

    if !require_bot_admin(&ctx).await? {
        return Ok(());
    }

    if let Err(e) = ctx.client.set_announce(&ctx.event.chat, announce).await {
        return ctx.reply(&format!("❌ Failed to update group: {e}")).await;
    }

    let text = if announce {
        "🔒 Group closed: only admins can send messages."
    } else {
        "🔓 Group opened: everyone can send messages."
    };
    ctx.reply(text).await
}

/// Handle del|delete - delete the quoted message for everyone.
pub async fn delete_command(ctx: CommandContext) -> anyhow::Result<()> {
    let Some(quoted) = ctx.event.quoted.as_ref() else {
        return ctx.reply("❌ Reply to the message you want deleted.").await;
    };

    let sender = quoted
        .participant
        .clone()
        .unwrap_or_else(|| ctx.event.chat.clone());

    if let Err(e) = ctx
        .client
        .revoke(&ctx.event.chat, &sender, &quoted.message_id)
        .await
    {
        return ctx.reply(&format!("❌ Could not delete: {e}")).await;
    }
    Ok(())
}
