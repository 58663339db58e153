/// Resolved route: which agent handles a conversation and under which keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRoute {
    pub agent_id: String,
    /// Conversation-scoped session key.
    pub session_key: String,
    /// Account-scoped session key, used for cross-conversation bookkeeping.
    pub main_session_key: String,
    pub account_id: String,
}
