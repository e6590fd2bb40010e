//! Identity normalization.
//!
//! The messaging service can address the same account in several ways:
//! with or without a device suffix (`923001234567:61@s.whatsapp.net`), by
//! phone number or by linked identifier (`1234567890@lid`). Every identity
//! comparison in the bot goes through [`clean_id`] so those forms compare
//! equal.
//!
//! Equivalence rules:
//! - the domain (everything from `@`) is dropped
//! - the device suffix (everything from `:` in the user part) is dropped
//! - surrounding whitespace is trimmed
//! - the result is lowercased

use thiserror::Error;

/// Errors produced while parsing identifiers.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum JidError {
    #[error("identifier '{0}' has no server part")]
    MissingServer(String),

    #[error("identifier '{0}' has an empty user part")]
    EmptyUser(String),

    #[error("invalid device suffix in '{0}'")]
    InvalidDevice(String),

    #[error("'{0}' is not a valid phone number")]
    InvalidPhone(String),
}

/// Reduce an identifier to its comparable core.
///
/// Returns an empty string for empty input.
pub fn clean_id(jid: &str) -> String {
    let user = jid.split('@').next().unwrap_or_default();
    let user = user.split(':').next().unwrap_or_default();
    user.trim().to_lowercase()
}

/// Compare two identifiers after normalization. Empty identifiers never match.
pub fn same_identity(a: &str, b: &str) -> bool {
    let a = clean_id(a);
    !a.is_empty() && a == clean_id(b)
}

/// Drop the punctuation people type inside phone numbers.
pub fn strip_phone_separators(input: &str) -> String {
    input
        .chars()
        .filter(|c| !matches!(c, '+' | ' ' | '-' | '(' | ')'))
        .collect()
}

/// Parse a human-entered phone number into bare digits.
///
/// Accepts `+92 300-1234567`, `(0092) 3001234567` style input.
pub fn parse_phone(input: &str) -> Result<String, JidError> {
    let stripped = strip_phone_separators(input);
    let digits = stripped.strip_prefix("00").unwrap_or(&stripped);

    let valid = (7..=15).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit());
    if !valid {
        return Err(JidError::InvalidPhone(input.trim().to_string()));
    }

    Ok(digits.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_id_strips_device_and_domain() {
        assert_eq!(clean_id("923001234567:61@s.whatsapp.net"), "923001234567");
        assert_eq!(clean_id("923001234567@s.whatsapp.net"), "923001234567");
        assert_eq!(
            clean_id("923001234567:61@s.whatsapp.net"),
            clean_id("923001234567@s.whatsapp.net")
        );
    }

    #[test]
    fn test_clean_id_lid_and_case() {
        assert_eq!(clean_id("  ABC123:4@lid "), "abc123");
        assert_eq!(clean_id("12345"), "12345");
        assert_eq!(clean_id(""), "");
    }

    #[test]
    fn test_same_identity() {
        assert!(same_identity("1234:2@s.whatsapp.net", "1234@s.whatsapp.net"));
        assert!(!same_identity("1234@s.whatsapp.net", "4321@s.whatsapp.net"));
        assert!(!same_identity("", "@s.whatsapp.net"));
    }

    #[test]
    fn test_parse_phone() {
        assert_eq!(parse_phone("+92 300-1234567").unwrap(), "923001234567");
        assert_eq!(parse_phone("(0092) 3001234567").unwrap(), "923001234567");
        assert!(matches!(parse_phone("12ab"), Err(JidError::InvalidPhone(_))));
        assert!(parse_phone("123").is_err());
        assert!(parse_phone("1234567890123456").is_err());
    }

    #[test]
    fn test_parse_phone_checks_length_after_international_prefix() {
        assert!(parse_phone("0012345").is_err());
        assert_eq!(parse_phone("001234567").unwrap(), "1234567");
    }
}
