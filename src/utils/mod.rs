//! Utility functions.
//!
//! Collection of helpers used across the bot.

pub mod jid;
pub mod media;
pub mod reply;
pub mod target;

use std::time::Duration;

/// Format an uptime like `2d 3h 4m 5s`, dropping leading zero units.
pub fn format_uptime(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    let (days, hours, mins, secs) = (secs / 86_400, (secs % 86_400) / 3600, (secs % 3600) / 60, secs % 60);

    if days > 0 {
        format!("{days}d {hours}h {mins}m {secs}s")
    } else if hours > 0 {
        format!("{hours}h {mins}m {secs}s")
    } else if mins > 0 {
        format!("{mins}m {secs}s")
    } else {
        format!("{secs}s")
    }
}

/// First `http(s)://` argument, if any.
pub fn first_url(args: &[String]) -> Option<&str> {
    args.iter()
        .map(String::as_str)
        .find(|a| a.starts_with("http://") || a.starts_with("https://"))
}

/// Human-readable byte size.
pub fn format_size(bytes: u64) -> String {
    const MB: f64 = 1024.0 * 1024.0;
    if bytes as f64 >= MB {
        format!("{:.1} MB", bytes as f64 / MB)
    } else {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_uptime() {
        assert_eq!(format_uptime(Duration::from_secs(5)), "5s");
        assert_eq!(format_uptime(Duration::from_secs(125)), "2m 5s");
        assert_eq!(format_uptime(Duration::from_secs(3 * 3600 + 1)), "3h 0m 1s");
        assert_eq!(format_uptime(Duration::from_secs(86_400 + 60)), "1d 0h 1m 0s");
    }

    #[test]
    fn test_first_url() {
        let args = vec!["hd".to_string(), "https://vt.tiktok.com/x".to_string()];
        assert_eq!(first_url(&args), Some("https://vt.tiktok.com/x"));
        assert_eq!(first_url(&["nope".to_string()]), None);
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0 MB");
    }
}
