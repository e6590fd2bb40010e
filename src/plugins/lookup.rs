//! Weather and translation lookups.

use serde_json::Value;
use tracing::warn;

use super::CommandContext;

const WTTR_BASE: &str = "https://wttr.in/";
const TRANSLATE_API: &str = "https://translate.googleapis.com/translate_a/single";

/// Handle weather `<city>`.
pub async fn weather_command(ctx: CommandContext) -> anyhow::Result<()> {
    let city = ctx.arg_text();
    if city.is_empty() {
        ctx.reply_card(
            "🌤️ WEATHER",
            &[
                "Usage:".to_string(),
                format!("{}weather Karachi", ctx.prefix()),
            ],
        )
        .await?;
        return Ok(());
    }

    ctx.react("🌦️").await?;

    let url = format!("{WTTR_BASE}{}", urlencode_path(&city));
    let conditions = ctx
        .state
        .http
        .get(&url)
        .query(&[("format", "%C %t")])
        .send()
        .await
        .and_then(|r| r.error_for_status());

    let conditions = match conditions {
        Ok(resp) => resp.text().await.unwrap_or_default(),
        Err(e) => {
            warn!("Weather lookup for {} failed: {}", city, e);
            String::new()
        }
    };
    let conditions = conditions.trim();

    if conditions.is_empty() || conditions.starts_with("Unknown location") {
        ctx.reply_card(
            "❌ WEATHER FETCH FAILED",
            &["Could not get weather.".to_string(), "Check the city name.".to_string()],
        )
        .await?;
        return Ok(());
    }

    let mut lines = vec![format!("📍 *City:* {city}"), format!("🌡️ *Info:* {conditions}")];

    // Resolved area name, best effort.
    let area = ctx
        .state
        .http
        .get(&url)
        .query(&[("format", "j1")])
        .send()
        .await;
    if let Ok(resp) = area {
        if let Ok(json) = resp.json::<Value>().await {
            if let Some(name) = nearest_area(&json) {
                lines.push(format!("🗺️ *Area:* {name}"));
            }
        }
    }

    ctx.reply_card("🌤️ WEATHER INFO", &lines).await
}

fn urlencode_path(segment: &str) -> String {
    url::form_urlencoded::byte_serialize(segment.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

/// `"Karachi, Pakistan"` from a wttr.in j1 document.
fn nearest_area(json: &Value) -> Option<String> {
    let area = json.get("nearest_area")?.get(0)?;
    let field = |key: &str| {
        area.get(key)?
            .get(0)?
            .get("value")?
            .as_str()
            .map(str::to_string)
            .filter(|s| !s.is_empty())
    };

    match (field("areaName"), field("country")) {
        (Some(name), Some(country)) => Some(format!("{name}, {country}")),
        (Some(name), None) => Some(name),
        (None, country) => country,
    }
}

/// Handle translate/tr `[lang] <text>` or as a reply to a message.
///
/// The first argument is taken as a language code when it looks like one
/// (`en`, `ur`, `zh-CN`) and more text follows, or when replying.
pub async fn translate_command(ctx: CommandContext) -> anyhow::Result<()> {
    let quoted_text = ctx
        .event
        .quoted
        .as_ref()
        .and_then(|q| q.text.clone())
        .filter(|t| !t.trim().is_empty());

    let (lang, text) = split_lang(&ctx.args, quoted_text.is_some());
    let lang = lang.unwrap_or_else(|| ctx.state.config.translate_lang.clone());
    let text = if text.is_empty() { quoted_text.unwrap_or_default() } else { text };

    if text.is_empty() {
        ctx.reply_card(
            "🌍 TRANSLATOR",
            &[
                "Usage:".to_string(),
                format!("{}tr [lang] <text>", ctx.prefix()),
                "Or reply to a message with:".to_string(),
                format!("{}tr [lang]", ctx.prefix()),
            ],
        )
        .await?;
        return Ok(());
    }

    ctx.react("🌍").await?;

    let response = ctx
        .state
        .http
        .get(TRANSLATE_API)
        .query(&[
            ("client", "gtx"),
            ("sl", "auto"),
            ("tl", lang.as_str()),
            ("dt", "t"),
            ("q", text.as_str()),
        ])
        .send()
        .await
        .and_then(|r| r.error_for_status());

    let translated = match response {
        Ok(resp) => resp.json::<Value>().await.ok().and_then(|v| translated_text(&v)),
        Err(e) => {
            warn!("Translation request failed: {}", e);
            None
        }
    };

    match translated {
        Some(translated) => {
            ctx.reply_card(
                "🌍 TRANSLATION RESULT",
                &[
                    "📝 *Original:*".to_string(),
                    text,
                    format!("📝 *Translated ({lang}):*"),
                    translated,
                ],
            )
            .await
        }
        None => {
            ctx.reply_card(
                "❌ TRANSLATION FAILED",
                &["Could not translate text.".to_string(), "Please try again.".to_string()],
            )
            .await
        }
    }
}

fn looks_like_lang(token: &str) -> bool {
    let (base, region) = match token.split_once('-') {
        Some((base, region)) => (base, Some(region)),
        None => (token, None),
    };
    (2..=3).contains(&base.len())
        && base.chars().all(|c| c.is_ascii_lowercase())
        && region.is_none_or(|r| (2..=4).contains(&r.len()) && r.chars().all(|c| c.is_ascii_alphanumeric()))
}

/// Split an optional leading language code from the text to translate.
fn split_lang(args: &[String], has_quote: bool) -> (Option<String>, String) {
    match args.split_first() {
        Some((first, rest)) if looks_like_lang(first) && (!rest.is_empty() || has_quote) => {
            (Some(first.clone()), rest.join(" "))
        }
        _ => (None, args.join(" ")),
    }
}

/// Join the translated segments of a gtx response.
fn translated_text(json: &Value) -> Option<String> {
    let text: String = json
        .get(0)?
        .as_array()?
        .iter()
        .filter_map(|segment| segment.get(0)?.as_str())
        .collect();
    (!text.is_empty()).then_some(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(s: &str) -> Vec<String> {
        s.split_whitespace().map(String::from).collect()
    }

    #[test]
    fn test_split_lang() {
        assert_eq!(split_lang(&args("en kaise ho"), false), (Some("en".into()), "kaise ho".into()));
        assert_eq!(split_lang(&args("hello world"), false), (None, "hello world".into()));
        // A lone short word is text unless replying.
        assert_eq!(split_lang(&args("hi"), false), (None, "hi".into()));
        assert_eq!(split_lang(&args("fr"), true), (Some("fr".into()), String::new()));
        assert_eq!(split_lang(&args("zh-CN ni hao"), false).0.as_deref(), Some("zh-CN"));
    }

    #[test]
    fn test_translated_text_joins_segments() {
        let body = json!([[["Hello ", "Salam ", null], ["world", "dunya", null]], null, "ur"]);
        assert_eq!(translated_text(&body).as_deref(), Some("Hello world"));
        assert!(translated_text(&json!([])).is_none());
    }

    #[test]
    fn test_nearest_area() {
        let body = json!({
            "nearest_area": [{
                "areaName": [{"value": "Karachi"}],
                "country": [{"value": "Pakistan"}]
            }]
        });
        assert_eq!(nearest_area(&body).as_deref(), Some("Karachi, Pakistan"));
        assert!(nearest_area(&json!({})).is_none());
    }

    #[test]
    fn test_urlencode_path() {
        assert_eq!(urlencode_path("New York"), "New%20York");
    }
}
