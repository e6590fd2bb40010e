//! Downloader commands.
//!
//! TikTok goes through the tikwm API; everything else is fetched with
//! yt-dlp.

use serde::Deserialize;
use tracing::{debug, warn};

use crate::client::MediaKind;
use crate::utils::media::{self, MAX_MEDIA_BYTES};
use crate::utils::reply::ReplyExt;
use crate::utils::{first_url, format_size};

use super::CommandContext;

const TIKWM_API: &str = "https://www.tikwm.com/api/";

/// Processing notice shown while a download runs.
fn processing_card(ctx: &CommandContext, title: &str, platform: &str, body: &str) -> (String, Vec<String>) {
    (
        format!("✨ {} ✨", ctx.state.config.bot_name.to_uppercase()),
        vec![
            format!("🎬 Type: {title}"),
            format!("🌐 Source: {platform}"),
            format!("💬 {body}"),
            "⏳ Please wait...".to_string(),
        ],
    )
}

/// URL argument or a usage reply. `None` means the reply was already sent.
async fn require_url(ctx: &CommandContext, example: &str) -> anyhow::Result<Option<String>> {
    match first_url(&ctx.args) {
        Some(url) => Ok(Some(url.to_string())),
        None => {
            ctx.reply(&format!(
                "⚠️ Send a link.\nExample: {}{} {}",
                ctx.prefix(),
                ctx.command,
                example
            ))
            .await?;
            Ok(None)
        }
    }
}

/// Download with yt-dlp and send the result back, reacting ⏳ then ✅/❌.
async fn download_and_send(ctx: &CommandContext, url: &str, audio: bool) -> anyhow::Result<()> {
    ctx.react("⏳").await?;

    let config = &ctx.state.config;
    let file = match media::ytdlp_download(&config.ytdlp_path, url, audio).await {
        Ok(file) => file,
        Err(e) => {
            warn!("Download of {} failed: {}", url, e);
            ctx.react("❌").await?;
            ctx.reply("❌ Download failed. The link may be private, too large or unsupported.")
                .await?;
            return Ok(());
        }
    };

    debug!("Downloaded {} ({})", file.file_name, format_size(file.data.len() as u64));

    let sent = if audio {
        ctx.client
            .send_media(
                &ctx.event,
                MediaKind::Document,
                file.data,
                Some("audio/mpeg".to_string()),
                None,
                Some(mp3_name(&file.file_name)),
            )
            .await
    } else {
        ctx.client
            .send_media(
                &ctx.event,
                MediaKind::Video,
                file.data,
                None,
                Some("✅ Success".to_string()),
                None,
            )
            .await
    };

    match sent {
        Ok(_) => ctx.react("✅").await,
        Err(e) => {
            warn!("Sending downloaded media failed: {}", e);
            ctx.react("❌").await?;
            ctx.reply("❌ Could not upload the file.").await
        }
    }
}

fn mp3_name(file_name: &str) -> String {
    if file_name.to_lowercase().ends_with(".mp3") {
        file_name.to_string()
    } else {
        format!("{file_name}.mp3")
    }
}

/// Generic yt-dlp command: fb, insta, pin, twitter, ytmp3, ytmp4.
pub async fn ytdlp_command(ctx: CommandContext) -> anyhow::Result<()> {
    let (title, platform, body, audio) = match ctx.command.as_str() {
        "fb" | "facebook" => ("FB Video", "Facebook", "🎥 Fetching content...", false),
        "insta" | "ig" => ("Insta Reel", "Instagram", "📸 Extracting content...", false),
        "pin" | "pinterest" => ("Pin Media", "Pinterest", "📌 Extracting media...", false),
        "twitter" | "x" => ("X Video", "Twitter/X", "🐦 Speeding through X...", false),
        "ytmp3" => ("YouTube Audio", "YouTube", "🎵 Extracting audio...", true),
        _ => ("YouTube Video", "YouTube", "📺 Fetching video...", false),
    };

    let Some(url) = require_url(&ctx, "https://...").await? else {
        return Ok(());
    };

    let (card_title, lines) = processing_card(&ctx, title, platform, body);
    ctx.reply_card(&card_title, &lines).await?;

    download_and_send(&ctx, &url, audio).await
}

#[derive(Debug, Deserialize)]
struct TikwmResponse {
    code: i64,
    #[serde(default)]
    msg: String,
    data: Option<TikwmData>,
}

#[derive(Debug, Default, Deserialize)]
struct TikwmData {
    #[serde(default)]
    play: String,
    #[serde(default)]
    music: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    size: u64,
}

impl TikwmResponse {
    /// Usable payload, if the API reported success.
    fn into_data(self) -> Option<TikwmData> {
        if self.code != 0 {
            debug!("tikwm returned code {}: {}", self.code, self.msg);
            return None;
        }
        self.data.filter(|d| !d.play.is_empty())
    }
}

/// Handle tiktok/tt `<url> [audio]`.
pub async fn tiktok_command(ctx: CommandContext) -> anyhow::Result<()> {
    let Some(url) = require_url(&ctx, "https://vt.tiktok.com/...").await? else {
        return Ok(());
    };
    let audio = ctx
        .args
        .iter()
        .any(|a| matches!(a.to_lowercase().as_str(), "audio" | "mp3" | "2"));

    ctx.react("🎵").await?;

    let http = &ctx.state.http;
    let response = http
        .get(TIKWM_API)
        .query(&[("url", url.trim())])
        .send()
        .await
        .and_then(|r| r.error_for_status());

    let data = match response {
        Ok(resp) => resp.json::<TikwmResponse>().await.ok().and_then(TikwmResponse::into_data),
        Err(e) => {
            warn!("tikwm request failed: {}", e);
            None
        }
    };

    let Some(data) = data else {
        ctx.reply("❌ Could not fetch that TikTok.").await?;
        return Ok(());
    };

    if data.size > MAX_MEDIA_BYTES {
        ctx.reply(&format!("❌ Video is too large ({}).", format_size(data.size)))
            .await?;
        return Ok(());
    }

    let (card_title, lines) = processing_card(&ctx, "TikTok", "TikTok", &data.title);
    ctx.reply_card(&card_title, &lines).await?;

    let source = if audio { &data.music } else { &data.play };
    let bytes = match fetch_bytes(http, source).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("TikTok media fetch failed: {}", e);
            ctx.react("❌").await?;
            ctx.reply("❌ Download failed.").await?;
            return Ok(());
        }
    };

    let (kind, caption) = if audio {
        (MediaKind::Audio, None)
    } else {
        (MediaKind::Video, Some(format!("🎬 {}", data.title)))
    };
    ctx.client
        .send_media(&ctx.event, kind, bytes, None, caption, None)
        .await?;
    ctx.react("✅").await
}

/// GET a URL into memory, refusing bodies over the media cap.
pub async fn fetch_bytes(http: &reqwest::Client, url: &str) -> anyhow::Result<Vec<u8>> {
    let resp = http.get(url).send().await?.error_for_status()?;
    if resp.content_length().is_some_and(|len| len > MAX_MEDIA_BYTES) {
        anyhow::bail!("remote file exceeds {}", format_size(MAX_MEDIA_BYTES));
    }
    let bytes = resp.bytes().await?;
    if bytes.len() as u64 > MAX_MEDIA_BYTES {
        anyhow::bail!("remote file exceeds {}", format_size(MAX_MEDIA_BYTES));
    }
    Ok(bytes.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tikwm_response_parsing() {
        let ok: TikwmResponse = serde_json::from_str(
            r#"{"code":0,"msg":"success","data":{"play":"https://v/1.mp4","music":"https://m/1.mp3","title":"Clip","size":1024}}"#,
        )
        .unwrap();
        let data = ok.into_data().unwrap();
        assert_eq!(data.play, "https://v/1.mp4");
        assert_eq!(data.size, 1024);

        let failed: TikwmResponse =
            serde_json::from_str(r#"{"code":-1,"msg":"Url parsing is failed!"}"#).unwrap();
        assert!(failed.into_data().is_none());
    }

    #[test]
    fn test_mp3_name() {
        assert_eq!(mp3_name("song.mp3"), "song.mp3");
        assert_eq!(mp3_name("song"), "song.mp3");
    }
}
