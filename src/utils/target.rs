//! Target resolution for member commands.

use crate::client::{Jid, MessageEvent};
use crate::utils::jid::{parse_phone, JidError};

/// Members a command acts on.
///
/// Resolution order:
/// 1. mentioned members
/// 2. the author of the quoted message
/// 3. phone numbers in the arguments
///
/// Arguments that look like numbers but do not parse are reported as errors.
pub fn resolve_targets(event: &MessageEvent, args: &[String]) -> Result<Vec<Jid>, JidError> {
    if !event.mentions.is_empty() {
        return Ok(dedup(event.mentions.iter().map(Jid::to_non_device).collect()));
    }

    if let Some(participant) = event.quoted.as_ref().and_then(|q| q.participant.as_ref()) {
        return Ok(vec![participant.to_non_device()]);
    }

    let numbers = args
        .iter()
        .filter(|a| !a.starts_with('@'))
        .map(|a| parse_phone(a).map(|n| Jid::user_jid(&n)))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(dedup(numbers))
}

fn dedup(mut jids: Vec<Jid>) -> Vec<Jid> {
    let mut seen = std::collections::HashSet::new();
    jids.retain(|j| seen.insert(j.clean()));
    jids
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::QuotedContext;

    fn event() -> MessageEvent {
        MessageEvent {
            session: "s".into(),
            id: "1".into(),
            chat: "1203@g.us".parse().unwrap(),
            sender: Jid::user_jid("1"),
            from_me: false,
            text: String::new(),
            media: None,
            quoted: None,
            mentions: Vec::new(),
        }
    }

    #[test]
    fn test_mentions_win() {
        let mut e = event();
        e.mentions = vec![
            "923001111111:4@s.whatsapp.net".parse().unwrap(),
            Jid::user_jid("923001111111"),
        ];
        e.quoted = Some(QuotedContext {
            participant: Some(Jid::user_jid("922")),
            ..Default::default()
        });
        let targets = resolve_targets(&e, &["923002222222".into()]).unwrap();
        assert_eq!(targets, vec![Jid::user_jid("923001111111")]);
    }

    #[test]
    fn test_quoted_then_numbers() {
        let mut e = event();
        e.quoted = Some(QuotedContext {
            participant: Some(Jid::user_jid("923003333333")),
            ..Default::default()
        });
        assert_eq!(resolve_targets(&e, &[]).unwrap(), vec![Jid::user_jid("923003333333")]);

        let e = event();
        assert_eq!(
            resolve_targets(&e, &["+92 300".into()]).unwrap_err(),
            JidError::InvalidPhone("+92 300".into())
        );
        assert_eq!(
            resolve_targets(&e, &["923004444444".into()]).unwrap(),
            vec![Jid::user_jid("923004444444")]
        );
        assert!(resolve_targets(&e, &[]).unwrap().is_empty());
    }
}
