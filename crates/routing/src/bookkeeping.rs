use async_trait::async_trait;

/// Most recent recipient for a channel/account pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastRouteUpdate {
    pub agent_id: String,
    /// Account-scoped (main) session key.
    pub session_key: String,
    pub channel: String,
    /// Normalized (E.164) recipient address.
    pub recipient: String,
    pub account_id: String,
}

/// Persist last-route bookkeeping so "reply to the last person" style
/// commands can resolve a recipient later.
///
/// Called from background tasks only; latency and failures never touch the
/// inbound response path.
#[async_trait]
pub trait RouteBookkeeper: Send + Sync {
    async fn update_last_route(&self, update: LastRouteUpdate) -> anyhow::Result<()>;
}
