//! Configuration module.
//!
//! Loads configuration from environment variables (and `.env`).

use std::collections::HashSet;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use url::Url;

use crate::utils::jid::{clean_id, strip_phone_separators};

const DEFAULT_GATEWAY_URL: &str = "http://127.0.0.1:8081";

/// Where paired device records are kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    /// JSON file on local disk.
    File(PathBuf),
    Mongo { uri: String, database: String },
}

impl StoreBackend {
    /// Pick a backend from a `DATABASE_URL` value.
    ///
    /// `mongodb://` and `mongodb+srv://` select MongoDB, anything else is a
    /// file path (an optional `file:` prefix is stripped). Unset means
    /// `sessions.json` in the working directory.
    pub fn from_url(url: Option<&str>, mongo_database: &str) -> Self {
        match url.map(str::trim).filter(|u| !u.is_empty()) {
            Some(u) if u.starts_with("mongodb") => Self::Mongo {
                uri: u.to_string(),
                database: mongo_database.to_string(),
            },
            Some(u) => Self::File(PathBuf::from(u.strip_prefix("file:").unwrap_or(u))),
            None => Self::File(PathBuf::from("sessions.json")),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    // Persistence
    pub store: StoreBackend,

    // Gateway
    pub gateway_url: Url,
    pub gateway_api_key: Option<String>,
    /// Base URL the gateway uses to reach our webhook.
    pub public_url: String,
    pub webhook_secret: Option<String>,
    pub http_port: u16,

    // Identity
    pub bot_name: String,
    pub owner_name: String,
    /// Extra owner numbers, already normalized.
    pub owner_numbers: Vec<String>,

    // Commands
    pub default_prefix: String,
    pub bare_commands: bool,

    // Dispatcher
    pub worker_limit: usize,
    pub handler_timeout: Duration,
    pub pairing_window: Duration,

    // Tools
    pub translate_lang: String,
    pub ffmpeg_path: String,
    pub ytdlp_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store: StoreBackend::File(PathBuf::from("sessions.json")),
            gateway_url: Url::parse(DEFAULT_GATEWAY_URL).expect("default gateway URL is valid"),
            gateway_api_key: None,
            public_url: "http://127.0.0.1:8080".to_string(),
            webhook_secret: None,
            http_port: 8080,
            bot_name: "Wabot".to_string(),
            owner_name: "Owner".to_string(),
            owner_numbers: Vec::new(),
            default_prefix: "#".to_string(),
            bare_commands: true,
            worker_limit: 64,
            handler_timeout: Duration::from_secs(300),
            pairing_window: Duration::from_secs(120),
            translate_lang: "ur".to_string(),
            ffmpeg_path: "ffmpeg".to_string(),
            ytdlp_path: "yt-dlp".to_string(),
        }
    }
}

fn var(name: &str) -> Option<String> {
    env::var(name).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parsed<T: std::str::FromStr>(name: &str, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match var(name) {
        Some(raw) => raw
            .parse()
            .map_err(|e| anyhow::anyhow!("{name}={raw:?} is invalid: {e}")),
        None => Ok(default),
    }
}

/// Comma-separated owner numbers, normalized and de-duplicated.
pub fn parse_owner_numbers(raw: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.split(',')
        .map(|s| strip_phone_separators(&clean_id(s)))
        .filter(|s| !s.is_empty())
        .filter(|s| seen.insert(s.clone()))
        .collect()
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        let mongo_database = var("MONGODB_DATABASE").unwrap_or_else(|| "wabot".to_string());
        let store = StoreBackend::from_url(var("DATABASE_URL").as_deref(), &mongo_database);

        let gateway_url = match var("GATEWAY_URL") {
            Some(raw) => Url::parse(&raw).with_context(|| format!("GATEWAY_URL={raw:?} is not a URL"))?,
            None => defaults.gateway_url,
        };

        let http_port = parsed("HTTP_PORT", defaults.http_port)?;
        let public_url = var("PUBLIC_URL").unwrap_or_else(|| format!("http://127.0.0.1:{http_port}"));

        let bare_commands = match var("BARE_COMMANDS").map(|v| v.to_lowercase()) {
            Some(v) => matches!(v.as_str(), "1" | "true" | "yes" | "on"),
            None => defaults.bare_commands,
        };

        let worker_limit: usize = parsed("WORKER_LIMIT", defaults.worker_limit)?;
        if worker_limit == 0 {
            anyhow::bail!("WORKER_LIMIT must be at least 1");
        }

        Ok(Self {
            store,
            gateway_url,
            gateway_api_key: var("GATEWAY_API_KEY"),
            public_url: public_url.trim_end_matches('/').to_string(),
            webhook_secret: var("WEBHOOK_SECRET"),
            http_port,
            bot_name: var("BOT_NAME").unwrap_or(defaults.bot_name),
            owner_name: var("OWNER_NAME").unwrap_or(defaults.owner_name),
            owner_numbers: parse_owner_numbers(&var("OWNER_NUMBERS").unwrap_or_default()),
            default_prefix: var("DEFAULT_PREFIX").unwrap_or(defaults.default_prefix),
            bare_commands,
            worker_limit,
            handler_timeout: Duration::from_secs(parsed("HANDLER_TIMEOUT_SECS", 300u64)?),
            pairing_window: Duration::from_secs(parsed("PAIRING_WINDOW_SECS", 120u64)?),
            translate_lang: var("TRANSLATE_LANG").unwrap_or(defaults.translate_lang),
            ffmpeg_path: var("FFMPEG_PATH").unwrap_or(defaults.ffmpeg_path),
            ytdlp_path: var("YTDLP_PATH").unwrap_or(defaults.ytdlp_path),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_backend_selection() {
        assert_eq!(
            StoreBackend::from_url(None, "wabot"),
            StoreBackend::File(PathBuf::from("sessions.json"))
        );
        assert_eq!(
            StoreBackend::from_url(Some("file:/data/devices.json"), "wabot"),
            StoreBackend::File(PathBuf::from("/data/devices.json"))
        );
        assert_eq!(
            StoreBackend::from_url(Some("mongodb://localhost:27017"), "bots"),
            StoreBackend::Mongo {
                uri: "mongodb://localhost:27017".into(),
                database: "bots".into()
            }
        );
    }

    #[test]
    fn test_parse_owner_numbers() {
        assert_eq!(
            parse_owner_numbers("+923001234567, 923001234567:2@s.whatsapp.net,,441234"),
            vec!["923001234567".to_string(), "441234".to_string()]
        );
        assert!(parse_owner_numbers("").is_empty());
        assert_eq!(
            parse_owner_numbers("923001234567, 441234, +92 300-1234567, (441) 234"),
            vec!["923001234567".to_string(), "441234".to_string()]
        );
    }
}
