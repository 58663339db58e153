use {
    async_trait::async_trait,
    magpie_common::types::ReplyPayload,
    serde::{Deserialize, Serialize},
};

use crate::Result;

// ── Block kinds ─────────────────────────────────────────────────────────────

/// Where a delivered payload sits in a streamed reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    /// A tool-use progress update.
    Tool,
    /// An intermediate content update.
    Block,
    /// The terminal reply. At most one per dispatch, always last.
    Final,
}

impl BlockKind {
    /// Human-readable label used when delivery of this kind fails.
    pub fn error_label(self) -> &'static str {
        match self {
            Self::Tool => "tool update",
            Self::Block => "block update",
            Self::Final => "auto-reply",
        }
    }

    pub fn is_final(self) -> bool {
        matches!(self, Self::Final)
    }
}

// ── Delivery ────────────────────────────────────────────────────────────────

/// Deliver one reply block to the channel transport.
///
/// Implementations own chunk fan-out to the wire, media upload, and retry
/// policy. A failed delivery is reported to the caller but must leave the
/// transport usable for subsequent blocks of the same dispatch.
#[async_trait]
pub trait DeliverySink: Send + Sync {
    async fn deliver(&self, payload: &ReplyPayload, kind: BlockKind) -> Result<()>;
}

// ── Acknowledgement ─────────────────────────────────────────────────────────

/// Addressing for an acknowledgement side effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AckRequest {
    pub conversation_id: String,
    pub agent_id: String,
    pub session_key: String,
    pub account_id: String,
}

/// Immediate acknowledgement side effect (read receipt or reaction) fired
/// on message receipt, before reply generation starts.
///
/// Best-effort: implementations catch and log their own failures, which is
/// why the method is infallible from the caller's point of view.
#[async_trait]
pub trait AckSink: Send + Sync {
    async fn send_ack(&self, req: AckRequest);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_labels_match_block_kinds() {
        assert_eq!(BlockKind::Tool.error_label(), "tool update");
        assert_eq!(BlockKind::Block.error_label(), "block update");
        assert_eq!(BlockKind::Final.error_label(), "auto-reply");
        assert!(BlockKind::Final.is_final());
        assert!(!BlockKind::Tool.is_final());
    }
}
