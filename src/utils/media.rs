//! External media tools (ffmpeg, yt-dlp).
//!
//! Each run gets its own temporary directory, removed when the run ends.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

/// Hard cap on anything we download or produce.
pub const MAX_MEDIA_BYTES: u64 = 100 * 1024 * 1024;

const TOOL_TIMEOUT: Duration = Duration::from_secs(240);

/// Run a tool to completion; non-zero exit becomes an error carrying the
/// end of stderr.
pub async fn run_tool(binary: &str, args: &[String], workdir: &Path) -> Result<()> {
    debug!("Running {} {:?}", binary, args);

    let mut process = Command::new(binary);
    process
        .args(args)
        .current_dir(workdir)
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .stdin(Stdio::null())
        .kill_on_drop(true);

    let output = match timeout(TOOL_TIMEOUT, process.output()).await {
        Ok(result) => result.map_err(|e| anyhow!("Failed to execute '{}': {}", binary, e))?,
        Err(_) => bail!("'{}' timed out after {}s", binary, TOOL_TIMEOUT.as_secs()),
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let tail: String = stderr.lines().rev().take(3).collect::<Vec<_>>().join(" | ");
        bail!(
            "'{}' exited with {}: {}",
            binary,
            output.status.code().unwrap_or(-1),
            tail
        );
    }

    Ok(())
}

/// Target formats for ffmpeg conversions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conversion {
    /// Image or short video to a 512px webp sticker.
    Sticker { animated: bool },
    /// Sticker to png.
    StickerToImage,
    /// Animated sticker or gif to mp4.
    ToVideo,
}

impl Conversion {
    fn output_name(&self) -> &'static str {
        match self {
            Self::Sticker { .. } => "out.webp",
            Self::StickerToImage => "out.png",
            Self::ToVideo => "out.mp4",
        }
    }

    fn args(&self, input: &str) -> Vec<String> {
        let scale = "scale=512:512:force_original_aspect_ratio=decrease,\
                     pad=512:512:(ow-iw)/2:(oh-ih)/2:color=0x00000000";

        let mut args: Vec<String> = vec!["-y".into(), "-i".into(), input.into()];
        let rest: Vec<&str> = match self {
            Self::Sticker { animated: false } => vec!["-vf", scale, "-vcodec", "libwebp", "-lossless", "0", "-q:v", "75"],
            Self::Sticker { animated: true } => vec![
                "-t", "8", "-vf", scale, "-vcodec", "libwebp", "-loop", "0", "-an", "-q:v", "50",
            ],
            Self::StickerToImage => vec!["-frames:v", "1"],
            Self::ToVideo => vec![
                "-movflags", "faststart", "-pix_fmt", "yuv420p", "-vf",
                "scale=trunc(iw/2)*2:trunc(ih/2)*2", "-an",
            ],
        };
        args.extend(rest.into_iter().map(String::from));
        args.push(self.output_name().into());
        args
    }
}

/// Convert media bytes with ffmpeg.
pub async fn convert(ffmpeg: &str, input: &[u8], input_ext: &str, conversion: Conversion) -> Result<Vec<u8>> {
    let dir = tempfile::tempdir().context("creating temp dir")?;
    let input_name = format!("in.{input_ext}");

    tokio::fs::write(dir.path().join(&input_name), input).await?;
    run_tool(ffmpeg, &conversion.args(&input_name), dir.path()).await?;

    let out = tokio::fs::read(dir.path().join(conversion.output_name()))
        .await
        .context("ffmpeg produced no output")?;
    if out.is_empty() {
        bail!("ffmpeg produced an empty file");
    }
    Ok(out)
}

/// A file fetched by yt-dlp.
#[derive(Debug)]
pub struct Downloaded {
    pub data: Vec<u8>,
    pub file_name: String,
}

/// Download a URL with yt-dlp, as mp3 audio or mp4 video.
pub async fn ytdlp_download(ytdlp: &str, url: &str, audio: bool) -> Result<Downloaded> {
    let dir = tempfile::tempdir().context("creating temp dir")?;
    let max = format!("{}M", MAX_MEDIA_BYTES / (1024 * 1024));

    let mut args: Vec<String> = if audio {
        vec!["-f", "bestaudio", "--extract-audio", "--audio-format", "mp3"]
    } else {
        vec![
            "-f",
            "bestvideo[height<=720][ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]/best",
            "--merge-output-format",
            "mp4",
        ]
    }
    .into_iter()
    .map(String::from)
    .collect();

    args.extend(
        ["--no-playlist", "--max-filesize", &max, "-o", "%(title).60s.%(ext)s", url]
            .into_iter()
            .map(String::from),
    );

    run_tool(ytdlp, &args, dir.path()).await?;

    let path = single_file(dir.path()).await?;
    let size = tokio::fs::metadata(&path).await?.len();
    if size > MAX_MEDIA_BYTES {
        bail!("file is too large ({} bytes)", size);
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "media".to_string());

    Ok(Downloaded {
        data: tokio::fs::read(&path).await?,
        file_name,
    })
}

/// The one output file in a download directory.
async fn single_file(dir: &Path) -> Result<PathBuf> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut found = None;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let partial = path
            .extension()
            .is_some_and(|e| e == "part" || e == "ytdl");
        if entry.file_type().await?.is_file() && !partial {
            found = Some(path);
        }
    }

    found.ok_or_else(|| anyhow!("download produced no file (size limit or restricted link)"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversion_args_end_with_output() {
        let args = Conversion::StickerToImage.args("in.webp");
        assert_eq!(&args[..3], &["-y", "-i", "in.webp"]);
        assert_eq!(args.last().map(String::as_str), Some("out.png"));

        let args = Conversion::Sticker { animated: true }.args("in.mp4");
        assert!(args.iter().any(|a| a == "-loop"));
        assert_eq!(args.last().map(String::as_str), Some("out.webp"));
    }

    #[tokio::test]
    async fn test_missing_tool_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = run_tool("definitely-not-a-real-binary-xyz", &[], dir.path())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Failed to execute"));
    }

    #[tokio::test]
    async fn test_single_file_skips_partials() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.mp4.part"), b"x").unwrap();
        assert!(single_file(dir.path()).await.is_err());

        std::fs::write(dir.path().join("clip.mp4"), b"x").unwrap();
        let found = single_file(dir.path()).await.unwrap();
        assert_eq!(found.file_name().unwrap(), "clip.mp4");
    }
}
