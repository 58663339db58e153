//! The per-message pipeline: effective body, echo gate, ack, dispatch,
//! then conditional history clearing and route bookkeeping.

use std::sync::Arc;

use {
    tracing::{debug, info},
    uuid::Uuid,
};

use {
    magpie_channels::{AckRequest, AckSink, DeliverySink},
    magpie_common::{
        InboundMsg, MsgContext,
        util::{elide, jid_to_e164, normalize_e164},
    },
    magpie_routing::{LastRouteUpdate, ResolvedRoute, RouteBookkeeper},
};

use crate::{
    dispatch::{DispatchHooks, DispatchOptions, ReplyResolver, dispatch_reply},
    echo::{EchoGuard, combined_echo_key},
    envelope::format_group_members,
    error::Result,
    history::{GroupHistoryEntry, GroupHistoryStore, GroupRosterStore, build_effective_body},
    prefix::DispatchContext,
    tasks::BackgroundTasks,
};

/// Entries kept per group before the oldest are dropped.
const GROUP_HISTORY_CAP: usize = 50;

/// Static configuration for one channel's pipeline.
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    /// Channel display name, as it appears in agent envelopes ("WhatsApp").
    pub channel: String,
    pub identity_name: Option<String>,
    pub response_prefix: Option<String>,
    /// Per-message character limit for outbound text; zero disables
    /// chunking.
    pub text_chunk_limit: usize,
    pub disable_block_streaming: bool,
}

/// Per-call overrides and hooks.
#[derive(Default)]
pub struct ProcessOptions {
    /// Keep group history after a delivered reply (used while a human
    /// operator is watching the same conversation).
    pub suppress_group_history_clear: bool,
    /// Caller-supplied history; when unset, group events use the shared
    /// store.
    pub group_history: Option<Vec<GroupHistoryEntry>>,
    pub text_chunk_limit: Option<usize>,
    pub on_reply_start: Option<Box<dyn Fn() + Send + Sync>>,
}

/// One channel's auto-reply pipeline. Cheap to clone; all state is shared.
#[derive(Clone)]
pub struct MessagePipeline {
    config: Arc<PipelineConfig>,
    echo: Arc<EchoGuard>,
    histories: GroupHistoryStore,
    rosters: GroupRosterStore,
    tasks: BackgroundTasks,
    resolver: Arc<dyn ReplyResolver>,
    sink: Arc<dyn DeliverySink>,
    ack: Arc<dyn AckSink>,
    bookkeeper: Arc<dyn RouteBookkeeper>,
}

impl MessagePipeline {
    pub fn new(
        config: PipelineConfig,
        resolver: Arc<dyn ReplyResolver>,
        sink: Arc<dyn DeliverySink>,
        ack: Arc<dyn AckSink>,
        bookkeeper: Arc<dyn RouteBookkeeper>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            echo: Arc::new(EchoGuard::new()),
            histories: GroupHistoryStore::new(),
            rosters: GroupRosterStore::new(),
            tasks: BackgroundTasks::new(),
            resolver,
            sink,
            ack,
            bookkeeper,
        }
    }

    pub fn echo(&self) -> &Arc<EchoGuard> {
        &self.echo
    }

    pub fn histories(&self) -> &GroupHistoryStore {
        &self.histories
    }

    pub fn rosters(&self) -> &GroupRosterStore {
        &self.rosters
    }

    pub fn tasks(&self) -> &BackgroundTasks {
        &self.tasks
    }

    /// Handle one inbound message end to end.
    ///
    /// Returns `Ok(true)` when a final reply was delivered, `Ok(false)` for
    /// suppressed events (echoes, silent replies). A resolver failure is an
    /// `Err`; anything delivered before the failure stays delivered and
    /// group history is left untouched.
    pub async fn process_message(
        &self,
        msg: &InboundMsg,
        route: &ResolvedRoute,
        opts: ProcessOptions,
    ) -> Result<bool> {
        let key = msg.conversation().to_string();
        let is_group = msg.chat_type.is_group();

        if is_group && let Some(name) = msg.sender_name.as_deref() {
            self.rosters
                .record(&key, msg.sender_jid.clone().unwrap_or_else(|| msg.from.clone()), name);
        }

        let history = match opts.group_history {
            Some(history) => history,
            None if is_group => {
                // The current event becomes the last entry, so the fold can
                // exclude it while keeping the clearing decision atomic with
                // the snapshot.
                self.histories
                    .append(&key, history_entry(msg), GROUP_HISTORY_CAP)
                    .await;
                self.histories.snapshot(&key).await
            },
            None => Vec::new(),
        };

        let effective =
            build_effective_body(&self.config.channel, msg, &history, opts.suppress_group_history_clear);

        if self
            .echo
            .check_and_consume(&combined_echo_key(&route.session_key, &effective.text))
        {
            debug!(from = %msg.from, "skipping auto-reply: detected echo for combined message");
            return Ok(false);
        }

        self.spawn_ack(&key, route);

        let correlation_id = msg
            .id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        info!(
            correlation_id = %correlation_id,
            channel = %self.config.channel,
            from = %msg.from,
            to = %msg.to,
            group = is_group,
            media = msg.media_url.is_some() || msg.media_path.is_some(),
            body = %elide(&msg.body, 240),
            "inbound message"
        );
        debug!(correlation_id = %correlation_id, effective = %elide(&effective.text, 400), "effective body");

        if !is_group {
            self.spawn_last_route_update(msg, route);
        }

        let ctx = self.build_context(msg, route, &effective.text, &key);
        let dispatch_opts = DispatchOptions {
            response_prefix: self.response_prefix(msg),
            text_chunk_limit: opts.text_chunk_limit.unwrap_or(self.config.text_chunk_limit),
            disable_block_streaming: self.config.disable_block_streaming,
        };
        let hooks = DispatchHooks {
            on_reply_start: opts.on_reply_start,
            on_error: None,
        };
        let prefix_ctx = DispatchContext::new(self.config.identity_name.clone());

        let outcome = dispatch_reply(
            self.resolver.as_ref(),
            &ctx,
            &dispatch_opts,
            prefix_ctx,
            self.sink.as_ref(),
            self.echo.as_ref(),
            &hooks,
        )
        .await?;

        if effective.should_clear_history && outcome.delivered_any {
            self.histories.clear(&key).await;
            debug!(conversation = %key, "cleared group history after reply");
        }

        if !outcome.queued_final {
            debug!(
                correlation_id = %correlation_id,
                "skipping auto-reply: silent token or no text/media returned from resolver"
            );
            return Ok(false);
        }
        Ok(true)
    }

    fn spawn_ack(&self, key: &str, route: &ResolvedRoute) {
        let ack = Arc::clone(&self.ack);
        let req = AckRequest {
            conversation_id: key.to_string(),
            agent_id: route.agent_id.clone(),
            session_key: route.session_key.clone(),
            account_id: route.account_id.clone(),
        };
        self.tasks.track("ack-reaction", async move {
            ack.send_ack(req).await;
            Ok(())
        });
    }

    fn spawn_last_route_update(&self, msg: &InboundMsg, route: &ResolvedRoute) {
        let Some(recipient) = recipient_e164(msg) else {
            return;
        };
        let bookkeeper = Arc::clone(&self.bookkeeper);
        let update = LastRouteUpdate {
            agent_id: route.agent_id.clone(),
            session_key: route.main_session_key.clone(),
            channel: self.config.channel.to_lowercase(),
            recipient,
            account_id: route.account_id.clone(),
        };
        self.tasks
            .track("last-route", async move { bookkeeper.update_last_route(update).await });
    }

    fn response_prefix(&self, msg: &InboundMsg) -> Option<String> {
        if let Some(prefix) = &self.config.response_prefix {
            return Some(prefix.clone());
        }
        // Self-chats would otherwise be indistinguishable from the user's
        // own typing on the paired device.
        if !msg.chat_type.is_group() && is_self_chat(msg) {
            let identity = self.config.identity_name.as_deref().unwrap_or("magpie");
            return Some(format!("[{identity}]"));
        }
        None
    }

    fn build_context(
        &self,
        msg: &InboundMsg,
        route: &ResolvedRoute,
        effective_body: &str,
        key: &str,
    ) -> MsgContext {
        let group_members = if msg.chat_type.is_group() {
            let roster = self.rosters.roster(key);
            format_group_members(
                &msg.group_participants,
                roster.as_ref(),
                msg.sender_e164.as_deref().or(msg.sender_jid.as_deref()),
            )
        } else {
            None
        };
        let sender_id = msg
            .sender_jid
            .as_deref()
            .map(str::trim)
            .filter(|jid| !jid.is_empty())
            .map(ToString::to_string)
            .or_else(|| msg.sender_e164.clone());

        MsgContext {
            body: effective_body.to_string(),
            raw_body: msg.body.clone(),
            from: msg.from.clone(),
            to: msg.to.clone(),
            session_key: route.session_key.clone(),
            account_id: route.account_id.clone(),
            channel: self.config.channel.clone(),
            message_id: msg.id.clone(),
            reply_to_id: msg.reply_to.as_ref().and_then(|r| r.id.clone()),
            reply_to_body: msg.reply_to.as_ref().and_then(|r| r.body.clone()),
            reply_to_sender: msg.reply_to.as_ref().and_then(|r| r.sender.clone()),
            media_path: msg.media_path.clone(),
            media_url: msg.media_url.clone(),
            media_type: msg.media_type.clone(),
            chat_type: msg.chat_type,
            group_subject: msg.group_subject.clone(),
            group_members,
            sender_name: msg.sender_name.clone(),
            sender_id,
            sender_e164: msg.sender_e164.clone(),
            was_mentioned: msg.was_mentioned,
            location: msg.location.clone(),
            originating_to: Some(msg.from.clone()),
        }
    }
}

fn history_entry(msg: &InboundMsg) -> GroupHistoryEntry {
    GroupHistoryEntry {
        sender: msg
            .sender_name
            .clone()
            .or_else(|| msg.sender_e164.clone())
            .unwrap_or_else(|| "Unknown".to_string()),
        body: msg.body.clone(),
        timestamp: msg.timestamp,
        id: msg.id.clone(),
        sender_jid: msg.sender_jid.clone(),
    }
}

/// E.164 recipient for last-route bookkeeping. JIDs are converted, raw
/// addresses normalized; `None` means the address has no usable number.
fn recipient_e164(msg: &InboundMsg) -> Option<String> {
    if let Some(e164) = msg.sender_e164.as_deref()
        && let Some(normalized) = normalize_e164(e164)
    {
        return Some(normalized);
    }
    if msg.from.contains('@') {
        return jid_to_e164(&msg.from);
    }
    normalize_e164(&msg.from)
}

fn is_self_chat(msg: &InboundMsg) -> bool {
    let Some(self_e164) = msg.self_e164.as_deref().and_then(normalize_e164) else {
        return false;
    };
    recipient_e164(msg).is_some_and(|sender| sender == self_e164)
}
