//! Command classifier.
//!
//! Turns message text into a command token and its arguments.

/// A recognised command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classified {
    /// Lowercased command token.
    pub command: String,
    /// Remaining tokens, case kept.
    pub args: Vec<String>,
}

/// Classify message text.
///
/// Text starting with `prefix` is a command: the prefix is stripped and the
/// rest split on whitespace. Other text is a command only when its first
/// token (lowercased) satisfies `is_known`, so plain chat is never
/// misread. Returns `None` when nothing matches or nothing is left after
/// the prefix.
pub fn classify(text: &str, prefix: &str, is_known: impl Fn(&str) -> bool) -> Option<Classified> {
    let text = text.trim_start();

    let (body, prefixed) = match text.strip_prefix(prefix) {
        Some(rest) if !prefix.is_empty() => (rest, true),
        _ => (text, false),
    };

    let mut tokens = body.split_whitespace();
    let command = tokens.next()?.to_lowercase();

    if !prefixed && !is_known(&command) {
        return None;
    }

    Some(Classified {
        command,
        args: tokens.map(str::to_string).collect(),
    })
}
