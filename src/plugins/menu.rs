//! Menu and identity commands.

use crate::client::{ListRow, ListSection, OutgoingMessage};
use crate::utils::format_uptime;
use crate::utils::jid::clean_id;

use super::{Category, CommandContext};

/// Handle menu/help/list.
///
/// `list` sends an interactive list; the other names send the text menu.
pub async fn menu_command(ctx: CommandContext) -> anyhow::Result<()> {
    let prefix = ctx.prefix();
    let state = &ctx.state;

    if ctx.command == "list" {
        let sections = Category::ORDER
            .iter()
            .map(|category| ListSection {
                title: category.title().to_string(),
                rows: state
                    .registry
                    .commands()
                    .filter(|c| c.category == *category)
                    .map(|c| ListRow {
                        id: format!("{prefix}{}", c.name),
                        title: format!("{prefix}{}", c.name),
                        description: c.description.to_string(),
                    })
                    .collect(),
            })
            .filter(|s| !s.rows.is_empty())
            .collect();

        ctx.client
            .send(
                &ctx.event.chat,
                OutgoingMessage::List {
                    title: state.config.bot_name.clone(),
                    description: format!("Tap to pick a command (prefix {prefix})"),
                    button_text: "MENU".to_string(),
                    footer: format!("© {}", state.config.owner_name),
                    sections,
                },
            )
            .await?;
        return Ok(());
    }

    let mode = if ctx.event.is_group() {
        state.chats.get(&ctx.event.chat.to_string()).mode.as_str().to_uppercase()
    } else {
        "PRIVATE".to_string()
    };

    let menu = format!(
        "╔═════════════════╗\n\
         ║   {}\n\
         ╠═════════════════╣\n\
         ║ 👋 *Assalam-o-Alaikum*\n\
         ║ 👑 *Owner:* {}\n\
         ║ 🛡️ *Mode:* {}\n\
         ║ ⏳ *Uptime:* {}\n\
         ╠═════════════════╣\n\
         {}\
         ╠═════════════════╣\n\
         ║ 🔐 LID-Based Security\n\
         ╚═════════════════╝",
        state.config.bot_name,
        state.config.owner_name,
        mode,
        format_uptime(state.started.elapsed()),
        state.registry.render_menu(&prefix),
    );

    ctx.reply(&menu).await
}

/// Handle id - show the sender, chat and quoted ids.
pub async fn id_command(ctx: CommandContext) -> anyhow::Result<()> {
    let event = &ctx.event;
    let chat_type = if event.is_group() { "Group" } else { "Private" };

    let mut lines = vec![
        "👤 User ID:".to_string(),
        format!("`{}`", event.sender.user),
        "👥 Chat ID:".to_string(),
        format!("`{}`", event.chat.user),
        format!("🏷️ Type: {chat_type}"),
    ];

    if let Some(participant) = event.quoted.as_ref().and_then(|q| q.participant.as_ref()) {
        lines.push("↩️ Quoted User:".to_string());
        lines.push(format!("`{}`", participant.user));
    }

    ctx.reply_card("🆔 ID INFO", &lines).await
}

/// Handle owner - show how the bot sees the sender, then send the owner's contact.
pub async fn owner_command(ctx: CommandContext) -> anyhow::Result<()> {
    let identity = ctx.client.identity();
    let is_owner = ctx.state.permissions.is_owner(ctx.client.as_ref(), &ctx.event.sender);

    let status = if is_owner { "✅ YOU are Owner" } else { "❌ NOT Owner" };
    let show = |id: Option<&String>| id.map(|i| clean_id(i)).unwrap_or_else(|| "unknown".to_string());

    ctx.reply_card(
        "👑 OWNER CHECK",
        &[
            format!("🤖 Bot Num: {}", show(identity.phone.as_ref())),
            format!("🆔 Bot LID: {}", show(identity.lid.as_ref())),
            format!("👤 Sender: {}", ctx.event.sender.clean()),
            format!("📊 Status: {status}"),
        ],
    )
    .await?;

    let phone = ctx
        .state
        .config
        .owner_numbers
        .first()
        .cloned()
        .or_else(|| identity.phone.as_deref().map(clean_id));

    if let Some(phone) = phone {
        ctx.client
            .send(
                &ctx.event.chat,
                OutgoingMessage::Contact {
                    display_name: ctx.state.config.owner_name.clone(),
                    phone,
                },
            )
            .await?;
    }

    Ok(())
}

/// Handle listbots - list the live sessions.
pub async fn listbots_command(ctx: CommandContext) -> anyhow::Result<()> {
    let sessions = ctx.state.sessions.list();

    let mut lines: Vec<String> = sessions
        .iter()
        .enumerate()
        .map(|(i, s)| {
            let mark = if s.session == ctx.client.session_id() { " (this)" } else { "" };
            format!("{}. 🤖 {}{}", i + 1, s.phone.as_deref().unwrap_or("pairing…"), mark)
        })
        .collect();
    lines.push(format!("📊 Total: {}", sessions.len()));

    ctx.reply_card("🤖 ACTIVE BOTS", &lines).await
}

/// Handle data - storage and state overview.
pub async fn data_command(ctx: CommandContext) -> anyhow::Result<()> {
    let state = &ctx.state;
    let devices = state.sessions.stored_count().await;

    let devices = match devices {
        Ok(n) => n.to_string(),
        Err(e) => {
            tracing::warn!("Device store unavailable: {}", e);
            "unavailable".to_string()
        }
    };

    ctx.reply_card(
        "📂 DATA STATUS",
        &[
            format!("💾 Store: {}", state.sessions.backend_name()),
            format!("📱 Paired devices: {devices}"),
            format!("🟢 Live sessions: {}", state.sessions.list().len()),
            format!("💬 Chats with settings: {}", state.chats.len()),
            format!("🧩 Commands: {}", state.registry.len()),
        ],
    )
    .await
}
