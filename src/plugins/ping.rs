//! Ping command plugin.
//!
//! Measures gateway round-trip latency.

use std::time::Instant;

use super::CommandContext;
use crate::utils::format_uptime;

/// Handle the ping command - times a reaction round trip.
pub async fn ping_command(ctx: CommandContext) -> anyhow::Result<()> {
    let start = Instant::now();
    ctx.react("⚡").await?;
    let ms = start.elapsed().as_millis();

    let status = if ms < 300 {
        "🟢 System Running"
    } else if ms < 1000 {
        "🟡 System Slow"
    } else {
        "🔴 System Lagging"
    };

    ctx.reply_card(
        "⚡ PING STATUS",
        &[
            format!("🚀 Speed: {ms} MS"),
            format!("⏱️ Uptime: {}", format_uptime(ctx.state.started.elapsed())),
            format!("👑 Dev: {}", ctx.state.config.owner_name),
            status.to_string(),
        ],
    )
    .await
}
