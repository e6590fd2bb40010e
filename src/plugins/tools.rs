//! Media tools: sticker conversion, background removal, upscaling, uploads
//! and view-once recovery.

use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::warn;

use crate::client::MediaKind;
use crate::utils::media::{self, Conversion};
use crate::utils::reply::ReplyExt;

use super::downloader::fetch_bytes;
use super::CommandContext;

const CATBOX_API: &str = "https://catbox.moe/user/api.php";
const REMOVEBG_API: &str = "https://bk9.fun/tools/removebg";
const REMINI_API: &str = "https://remini.mobilz.pw/enhance";

/// Where the media a tool should work on lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct MediaSource {
    kind: MediaKind,
    quoted: bool,
}

/// Quoted media wins over the message's own attachment.
fn media_source(ctx: &CommandContext) -> Option<MediaSource> {
    let event = &ctx.event;
    if let Some(kind) = event.quoted.as_ref().and_then(|q| q.media) {
        return Some(MediaSource { kind, quoted: true });
    }
    event.media.map(|kind| MediaSource { kind, quoted: false })
}

/// Download the source media, or reply with `missing` and return `None`.
async fn source_bytes(
    ctx: &CommandContext,
    accept: &[MediaKind],
    missing: &str,
) -> anyhow::Result<Option<(MediaKind, Vec<u8>)>> {
    let Some(source) = media_source(ctx).filter(|s| accept.contains(&s.kind)) else {
        ctx.reply_card("❌ NO MEDIA FOUND", &[missing.to_string()]).await?;
        return Ok(None);
    };

    match ctx.client.download_media(&ctx.event, source.quoted).await {
        Ok(data) => Ok(Some((source.kind, data))),
        Err(e) => {
            warn!("Media download failed: {}", e);
            ctx.reply("❌ Could not download the media.").await?;
            Ok(None)
        }
    }
}

fn input_ext(kind: MediaKind) -> &'static str {
    match kind {
        MediaKind::Image => "jpg",
        MediaKind::Video => "mp4",
        MediaKind::Sticker => "webp",
        MediaKind::Audio => "mp3",
        MediaKind::Document => "bin",
    }
}

/// Upload bytes to catbox and return the public URL.
pub async fn upload_to_catbox(http: &reqwest::Client, data: Vec<u8>, file_name: &str) -> anyhow::Result<String> {
    let form = Form::new()
        .text("reqtype", "fileupload")
        .part("fileToUpload", Part::bytes(data).file_name(file_name.to_string()));

    let body = http
        .post(CATBOX_API)
        .multipart(form)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;

    let url = body.trim();
    if !url.starts_with("http") {
        anyhow::bail!("catbox rejected the upload: {}", url);
    }
    Ok(url.to_string())
}

/// Handle sticker/s - image or short video to sticker.
pub async fn sticker_command(ctx: CommandContext) -> anyhow::Result<()> {
    let Some((kind, data)) = source_bytes(
        &ctx,
        &[MediaKind::Image, MediaKind::Video],
        "Reply to an image or short video",
    )
    .await?
    else {
        return Ok(());
    };

    let conversion = Conversion::Sticker {
        animated: kind == MediaKind::Video,
    };
    convert_and_send(&ctx, data, kind, conversion, MediaKind::Sticker, None, None).await
}

/// Handle toimg - sticker to png.
pub async fn toimg_command(ctx: CommandContext) -> anyhow::Result<()> {
    let Some((kind, data)) = source_bytes(&ctx, &[MediaKind::Sticker], "Reply to a sticker").await? else {
        return Ok(());
    };
    convert_and_send(
        &ctx,
        data,
        kind,
        Conversion::StickerToImage,
        MediaKind::Image,
        Some("image/png"),
        Some("🖼️ Converted to Image"),
    )
    .await
}

/// Handle tovideo - animated sticker to mp4.
pub async fn tovideo_command(ctx: CommandContext) -> anyhow::Result<()> {
    let Some((kind, data)) = source_bytes(&ctx, &[MediaKind::Sticker], "Reply to an animated sticker").await?
    else {
        return Ok(());
    };
    convert_and_send(
        &ctx,
        data,
        kind,
        Conversion::ToVideo,
        MediaKind::Video,
        None,
        Some("✅ Converted to Video"),
    )
    .await
}

async fn convert_and_send(
    ctx: &CommandContext,
    data: Vec<u8>,
    from: MediaKind,
    conversion: Conversion,
    to: MediaKind,
    mimetype: Option<&str>,
    caption: Option<&str>,
) -> anyhow::Result<()> {
    ctx.react("⏳").await?;

    let ffmpeg = &ctx.state.config.ffmpeg_path;
    match media::convert(ffmpeg, &data, input_ext(from), conversion).await {
        Ok(out) => {
            ctx.client
                .send_media(
                    &ctx.event,
                    to,
                    out,
                    mimetype.map(str::to_string),
                    caption.map(str::to_string),
                    None,
                )
                .await?;
            ctx.react("✅").await
        }
        Err(e) => {
            warn!("Conversion {:?} failed: {}", conversion, e);
            ctx.react("❌").await?;
            ctx.reply("❌ Conversion failed.").await
        }
    }
}

/// Handle removebg.
pub async fn removebg_command(ctx: CommandContext) -> anyhow::Result<()> {
    ctx.react("✂️").await?;
    let Some((_, data)) = source_bytes(&ctx, &[MediaKind::Image], "Reply to an image to remove its background").await?
    else {
        return Ok(());
    };
    ctx.reply_card("✂️ BACKGROUND REMOVAL", &["⏳ Removing background...".to_string()])
        .await?;

    let http = &ctx.state.http;
    let result = async {
        let url = upload_to_catbox(http, data, "image.jpg").await?;
        let endpoint = reqwest::Url::parse_with_params(REMOVEBG_API, &[("url", url.as_str())])?;
        fetch_bytes(http, endpoint.as_str()).await
    }
    .await;

    match result {
        Ok(image) => {
            ctx.client
                .send_media(
                    &ctx.event,
                    MediaKind::Image,
                    image,
                    Some("image/png".to_string()),
                    Some("✂️ Background Removed".to_string()),
                    None,
                )
                .await?;
            Ok(())
        }
        Err(e) => {
            warn!("removebg failed: {}", e);
            ctx.reply("❌ Background removal failed. Try again later.").await
        }
    }
}

#[derive(Debug, Deserialize)]
struct EnhanceResponse {
    #[serde(default)]
    url: String,
}

/// Handle remini - upscale an image.
pub async fn remini_command(ctx: CommandContext) -> anyhow::Result<()> {
    ctx.react("✨").await?;
    let Some((_, data)) = source_bytes(&ctx, &[MediaKind::Image], "Reply to an image to enhance it").await? else {
        return Ok(());
    };
    ctx.reply_card("✨ IMAGE ENHANCEMENT", &["⏳ Enhancing image...".to_string()])
        .await?;

    let http = &ctx.state.http;
    let result = async {
        let url = upload_to_catbox(http, data, "image.jpg").await?;
        let enhanced: EnhanceResponse = http
            .get(REMINI_API)
            .query(&[("url", url.as_str())])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        if enhanced.url.is_empty() {
            anyhow::bail!("enhancer returned no image");
        }
        fetch_bytes(http, &enhanced.url).await
    }
    .await;

    match result {
        Ok(image) => {
            ctx.client
                .send_media(
                    &ctx.event,
                    MediaKind::Image,
                    image,
                    None,
                    Some("✨ Enhanced Image".to_string()),
                    None,
                )
                .await?;
            Ok(())
        }
        Err(e) => {
            warn!("remini failed: {}", e);
            ctx.reply("❌ Enhancement failed. Try again later.").await
        }
    }
}

/// Handle tourl - upload media and reply with its link.
pub async fn tourl_command(ctx: CommandContext) -> anyhow::Result<()> {
    let Some((kind, data)) = source_bytes(
        &ctx,
        &[
            MediaKind::Image,
            MediaKind::Video,
            MediaKind::Audio,
            MediaKind::Sticker,
            MediaKind::Document,
        ],
        "Reply to any media",
    )
    .await?
    else {
        return Ok(());
    };

    ctx.react("🔗").await?;
    let name = format!("file.{}", input_ext(kind));
    match upload_to_catbox(&ctx.state.http, data, &name).await {
        Ok(url) => ctx.reply_card("🔗 MEDIA URL", &[url]).await,
        Err(e) => {
            warn!("Upload failed: {}", e);
            ctx.reply("❌ Upload failed.").await
        }
    }
}

/// Handle vv - resend a quoted view-once message as normal media.
pub async fn vv_command(ctx: CommandContext) -> anyhow::Result<()> {
    let quoted = ctx.event.quoted.as_ref().filter(|q| q.view_once);
    let Some(kind) = quoted.and_then(|q| q.media) else {
        ctx.reply("⚠️ Reply to a view-once photo, video or voice note.").await?;
        return Ok(());
    };

    ctx.react("🫣").await?;
    match ctx.client.download_media(&ctx.event, true).await {
        Ok(data) => {
            ctx.client
                .send_media(&ctx.event, kind, data, None, Some("🔓 View once".to_string()), None)
                .await?;
            Ok(())
        }
        Err(e) => {
            warn!("View-once download failed: {}", e);
            ctx.reply("❌ The media has expired or cannot be downloaded.").await
        }
    }
}
