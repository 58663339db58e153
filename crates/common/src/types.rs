use serde::{Deserialize, Serialize};

/// Kind of conversation a message belongs to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatType {
    /// One-on-one conversation.
    #[default]
    Dm,
    /// Multi-participant group conversation.
    Group,
}

impl ChatType {
    pub fn is_group(self) -> bool {
        matches!(self, Self::Group)
    }
}

/// A shared location attached to an inbound message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

/// Reference to the earlier message this one replies to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplyRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
}

/// One received channel message. Immutable once constructed by the channel
/// transport; everything downstream works on copies or derived context.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InboundMsg {
    /// Sender address in the channel's native form (e.g. a JID).
    pub from: String,
    /// Receiving account address.
    pub to: String,
    /// Explicit conversation id when the channel distinguishes it from
    /// the sender address (group chats do).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub chat_type: ChatType,
    #[serde(default)]
    pub body: String,
    /// Provider-assigned message id, when the channel supplies one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,
    /// Sender id in the channel's native form.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_jid: Option<String>,
    /// Sender id normalized to E.164.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_e164: Option<String>,
    /// Own number for the receiving account, used to detect self-chats.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub self_e164: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_subject: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub group_participants: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub was_mentioned: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<ReplyRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    /// Unix seconds, when the channel reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl InboundMsg {
    /// Canonical conversation id: the explicit id when present, else the
    /// sender address.
    pub fn conversation(&self) -> &str {
        self.conversation_id.as_deref().unwrap_or(&self.from)
    }
}

/// Flattened attribute bag handed to the reply resolver for one dispatch.
///
/// `body` is the *effective* body (history-folded for groups); `raw_body`
/// is the text exactly as received.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MsgContext {
    pub body: String,
    pub raw_body: String,
    pub from: String,
    pub to: String,
    pub session_key: String,
    pub account_id: String,
    pub channel: String,
    pub message_id: Option<String>,
    pub reply_to_id: Option<String>,
    pub reply_to_body: Option<String>,
    pub reply_to_sender: Option<String>,
    pub media_path: Option<String>,
    pub media_url: Option<String>,
    pub media_type: Option<String>,
    pub chat_type: ChatType,
    pub group_subject: Option<String>,
    pub group_members: Option<String>,
    pub sender_name: Option<String>,
    pub sender_id: Option<String>,
    pub sender_e164: Option<String>,
    pub was_mentioned: Option<bool>,
    pub location: Option<Location>,
    /// Conversation address the reply should go back to.
    pub originating_to: Option<String>,
}

/// Outbound reply content for a single block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplyPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub media_urls: Vec<String>,
}

impl ReplyPayload {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn has_media(&self) -> bool {
        self.media_url.is_some() || !self.media_urls.is_empty()
    }

    /// True when the payload carries non-empty text or any media reference.
    pub fn has_content(&self) -> bool {
        self.text.as_deref().is_some_and(|t| !t.trim().is_empty()) || self.has_media()
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversation_prefers_explicit_id() {
        let msg = InboundMsg {
            from: "123@s.whatsapp.net".into(),
            conversation_id: Some("group-1@g.us".into()),
            ..InboundMsg::default()
        };
        assert_eq!(msg.conversation(), "group-1@g.us");

        let msg = InboundMsg {
            from: "123@s.whatsapp.net".into(),
            ..InboundMsg::default()
        };
        assert_eq!(msg.conversation(), "123@s.whatsapp.net");
    }

    #[test]
    fn inbound_msg_deserializes_from_channel_json() {
        let raw = r#"{
            "from": "491700000001@s.whatsapp.net",
            "to": "491700000002@s.whatsapp.net",
            "conversation_id": "book-club@g.us",
            "chat_type": "group",
            "body": "hello",
            "sender_name": "Ada",
            "sender_e164": "+491700000001",
            "group_participants": ["a@s.whatsapp.net", "b@s.whatsapp.net"],
            "was_mentioned": true,
            "timestamp": 1756200000
        }"#;
        let msg: InboundMsg = serde_json::from_str(raw).unwrap();
        assert_eq!(msg.chat_type, ChatType::Group);
        assert_eq!(msg.conversation(), "book-club@g.us");
        assert_eq!(msg.group_participants.len(), 2);
        assert_eq!(msg.was_mentioned, Some(true));
        assert!(msg.media_url.is_none());
    }

    #[test]
    fn payload_content_checks() {
        assert!(!ReplyPayload::default().has_content());
        assert!(!ReplyPayload::text("   ").has_content());
        assert!(ReplyPayload::text("hi").has_content());

        let media_only = ReplyPayload {
            media_url: Some("https://example.test/cat.png".into()),
            ..ReplyPayload::default()
        };
        assert!(media_only.has_content());
        assert!(media_only.has_media());
    }
}
