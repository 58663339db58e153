//! Agent-facing envelope formatting.
//!
//! Every line the reply resolver reads is wrapped in a small envelope that
//! names the channel, the conversation address, and (when known) the time,
//! so the agent can attribute text even after history folding.

use std::collections::HashMap;

use chrono::DateTime;

use magpie_common::types::{ChatType, InboundMsg};

/// Render one envelope line: `[<channel> <from> <time>] <body>`.
///
/// The timestamp is minute-precision UTC and omitted entirely when the
/// channel did not report one.
pub fn format_agent_envelope(
    channel: &str,
    from: &str,
    timestamp: Option<i64>,
    body: &str,
) -> String {
    match timestamp.and_then(|secs| DateTime::from_timestamp(secs, 0)) {
        Some(ts) => format!("[{channel} {from} {}] {body}", ts.format("%Y-%m-%d %H:%M UTC")),
        None => format!("[{channel} {from}] {body}"),
    }
}

/// Render the current inbound message as an envelope line.
///
/// Group messages carry a `sender:` prefix so the agent sees who is talking
/// even before the `[from: ...]` trailer is appended.
pub fn build_inbound_line(channel: &str, msg: &InboundMsg) -> String {
    let body = match (msg.chat_type, msg.sender_name.as_deref()) {
        (ChatType::Group, Some(name)) if !name.is_empty() => {
            format!("{name}: {}", msg.body)
        },
        _ => msg.body.clone(),
    };
    format_agent_envelope(channel, msg.conversation(), msg.timestamp, &body)
}

/// Render a group's participant list for the resolver's attribute bag.
///
/// Participants with a roster entry render as `Name (id)`; the rest keep
/// their raw id. An empty participant list falls back to the sender id.
pub fn format_group_members(
    participants: &[String],
    roster: Option<&HashMap<String, String>>,
    fallback: Option<&str>,
) -> Option<String> {
    if participants.is_empty() {
        return fallback
            .filter(|f| !f.is_empty())
            .map(ToString::to_string);
    }
    let rendered: Vec<String> = participants
        .iter()
        .map(|id| match roster.and_then(|r| r.get(id)) {
            Some(name) => format!("{name} ({id})"),
            None => id.clone(),
        })
        .collect();
    Some(rendered.join(", "))
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_with_and_without_timestamp() {
        assert_eq!(
            format_agent_envelope("WhatsApp", "g@g.us", Some(1756200000), "A: hi"),
            "[WhatsApp g@g.us 2025-08-26 09:20 UTC] A: hi"
        );
        assert_eq!(
            format_agent_envelope("WhatsApp", "g@g.us", None, "hi"),
            "[WhatsApp g@g.us] hi"
        );
    }

    #[test]
    fn inbound_line_prefixes_group_sender() {
        let msg = InboundMsg {
            from: "123@s.whatsapp.net".into(),
            conversation_id: Some("club@g.us".into()),
            chat_type: ChatType::Group,
            sender_name: Some("Ada".into()),
            body: "hello".into(),
            ..InboundMsg::default()
        };
        assert_eq!(
            build_inbound_line("WhatsApp", &msg),
            "[WhatsApp club@g.us] Ada: hello"
        );
    }

    #[test]
    fn inbound_line_direct_has_no_sender_prefix() {
        let msg = InboundMsg {
            from: "123@s.whatsapp.net".into(),
            sender_name: Some("Ada".into()),
            body: "hello".into(),
            ..InboundMsg::default()
        };
        assert_eq!(
            build_inbound_line("WhatsApp", &msg),
            "[WhatsApp 123@s.whatsapp.net] hello"
        );
    }

    #[test]
    fn group_members_uses_roster_names() {
        let mut roster = HashMap::new();
        roster.insert("a@s.whatsapp.net".to_string(), "Ada".to_string());
        let members = format_group_members(
            &["a@s.whatsapp.net".into(), "b@s.whatsapp.net".into()],
            Some(&roster),
            None,
        );
        assert_eq!(
            members.as_deref(),
            Some("Ada (a@s.whatsapp.net), b@s.whatsapp.net")
        );
    }

    #[test]
    fn group_members_falls_back_to_sender() {
        assert_eq!(
            format_group_members(&[], None, Some("+491700000001")).as_deref(),
            Some("+491700000001")
        );
        assert_eq!(format_group_members(&[], None, None), None);
    }
}
