//! Streaming reply dispatch.
//!
//! The resolver produces an ordered stream of events over a bounded channel;
//! the consumer delivers them through the channel sink in arrival order. One
//! slow sink therefore backpressures the resolver instead of buffering
//! unbounded output.

use {
    async_trait::async_trait,
    tokio::sync::mpsc,
    tracing::{debug, info, warn},
};

use {
    magpie_channels::{BlockKind, DeliverySink},
    magpie_common::{MsgContext, ReplyPayload, util::elide},
};

use crate::{
    chunk::chunk_text,
    error::{Error, Result},
    prefix::{DispatchContext, ModelSelection, render_response_prefix},
};

/// Keepalive token some resolvers emit mid-generation; stripped before
/// delivery.
pub const HEARTBEAT_TOKEN: &str = "HEARTBEAT_OK";

/// Sentinel a resolver returns as the whole final text to decline replying.
pub const SILENT_TOKEN: &str = "NO_REPLY";

const BLOCK_STREAM_DEPTH: usize = 16;

// ── Event stream ────────────────────────────────────────────────────────────

/// One reply block emitted by the resolver.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub kind: BlockKind,
    pub payload: ReplyPayload,
}

/// Ordered event stream from the resolver. Model selection rides the same
/// channel as blocks so a selection emitted before the first block is
/// guaranteed to be applied before that block renders a prefix.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyEvent {
    ModelSelected(ModelSelection),
    Block(Block),
}

pub type ReplySender = mpsc::Sender<ReplyEvent>;

/// Options forwarded to the resolver.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolveOptions {
    pub disable_block_streaming: bool,
}

/// Produces the reply for one dispatch, emitting events as they become
/// available. Returning `Err` after emitting blocks is allowed; delivered
/// blocks stay delivered.
#[async_trait]
pub trait ReplyResolver: Send + Sync {
    async fn resolve(
        &self,
        ctx: &MsgContext,
        opts: &ResolveOptions,
        events: ReplySender,
    ) -> anyhow::Result<()>;
}

// ── Sent-text recording ─────────────────────────────────────────────────────

/// Context for one sent-text recording.
#[derive(Debug, Clone, Copy, Default)]
pub struct RememberSent<'a> {
    /// Effective (history-folded) body the reply answered, for
    /// session-scoped echo fingerprints.
    pub combined_body: Option<&'a str>,
    pub session_key: Option<&'a str>,
    pub log_verbose: bool,
}

/// Sink for fingerprints of text this process just sent.
pub trait SentRecorder: Send + Sync {
    fn remember_sent_text(&self, text: Option<&str>, opts: &RememberSent<'_>);
}

// ── Dispatch ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct DispatchOptions {
    /// Prefix template rendered in front of the final text (see
    /// [`render_response_prefix`]). `None` disables prefixing.
    pub response_prefix: Option<String>,
    /// Per-message character limit; zero disables chunking.
    pub text_chunk_limit: usize,
    pub disable_block_streaming: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DispatchOutcome {
    /// A final reply chunk was delivered (the reply was not silent).
    pub queued_final: bool,
    /// At least one block of any kind was delivered.
    pub delivered_any: bool,
}

type StartHook = Box<dyn Fn() + Send + Sync>;
type ErrorHook = Box<dyn Fn(&magpie_channels::Error, BlockKind) + Send + Sync>;

#[derive(Default)]
pub struct DispatchHooks {
    /// Fired once, before the first block is delivered.
    pub on_reply_start: Option<StartHook>,
    /// Fired per failed delivery; the stream keeps going.
    pub on_error: Option<ErrorHook>,
}

fn strip_heartbeat(text: &str) -> (String, bool) {
    if !text.contains(HEARTBEAT_TOKEN) {
        return (text.to_string(), false);
    }
    (text.replace(HEARTBEAT_TOKEN, "").trim().to_string(), true)
}

/// Run one reply dispatch to completion.
///
/// The resolver future and the delivery loop run concurrently; the bounded
/// channel between them preserves emission order. A resolver error is
/// reported only after every event it managed to emit has been handled.
pub async fn dispatch_reply(
    resolver: &dyn ReplyResolver,
    ctx: &MsgContext,
    opts: &DispatchOptions,
    mut prefix_ctx: DispatchContext,
    sink: &dyn DeliverySink,
    recorder: &dyn SentRecorder,
    hooks: &DispatchHooks,
) -> Result<DispatchOutcome> {
    let (events_tx, mut events_rx) = mpsc::channel(BLOCK_STREAM_DEPTH);
    let resolve_opts = ResolveOptions {
        disable_block_streaming: opts.disable_block_streaming,
    };

    let resolver_fut = resolver.resolve(ctx, &resolve_opts, events_tx);

    let consumer = async {
        let mut outcome = DispatchOutcome::default();
        let mut started = false;
        let mut heartbeat_logged = false;

        while let Some(event) = events_rx.recv().await {
            let block = match event {
                ReplyEvent::ModelSelected(selection) => {
                    prefix_ctx.apply(&selection);
                    continue;
                },
                ReplyEvent::Block(block) => block,
            };

            if !started {
                started = true;
                if let Some(on_start) = &hooks.on_reply_start {
                    on_start();
                }
            }

            let mut payload = block.payload;
            if let Some(text) = payload.text.as_deref() {
                let (stripped, had_heartbeat) = strip_heartbeat(text);
                if had_heartbeat {
                    if !heartbeat_logged {
                        heartbeat_logged = true;
                        debug!(to = %ctx.from, "stripped heartbeat token from reply");
                    }
                    payload.text = Some(stripped);
                }
            }

            if block.kind.is_final() {
                deliver_final(ctx, opts, &prefix_ctx, sink, recorder, hooks, payload, &mut outcome)
                    .await;
            } else {
                deliver_update(ctx, opts, sink, recorder, hooks, block.kind, payload, &mut outcome)
                    .await;
            }
        }
        outcome
    };

    let (resolved, outcome) = tokio::join!(resolver_fut, consumer);
    match resolved {
        Ok(()) => Ok(outcome),
        Err(source) => Err(Error::generation(source)),
    }
}

#[allow(clippy::too_many_arguments)]
async fn deliver_update(
    ctx: &MsgContext,
    opts: &DispatchOptions,
    sink: &dyn DeliverySink,
    recorder: &dyn SentRecorder,
    hooks: &DispatchHooks,
    kind: BlockKind,
    payload: ReplyPayload,
    outcome: &mut DispatchOutcome,
) {
    if opts.disable_block_streaming {
        debug!(label = kind.error_label(), "block streaming disabled; dropping update");
        return;
    }
    if !payload.has_content() {
        return;
    }
    match sink.deliver(&payload, kind).await {
        Ok(()) => {
            outcome.delivered_any = true;
            let remember = match kind {
                // Intermediate blocks answer the same effective body as the
                // final reply, so their echoes match the session fingerprint.
                BlockKind::Block => RememberSent {
                    combined_body: Some(&ctx.body),
                    session_key: Some(&ctx.session_key),
                    log_verbose: false,
                },
                _ => RememberSent::default(),
            };
            recorder.remember_sent_text(payload.text.as_deref(), &remember);
        },
        Err(err) => {
            warn!(label = kind.error_label(), to = %ctx.from, error = %err, "delivery failed");
            if let Some(on_error) = &hooks.on_error {
                on_error(&err, kind);
            }
        },
    }
}

#[allow(clippy::too_many_arguments)]
async fn deliver_final(
    ctx: &MsgContext,
    opts: &DispatchOptions,
    prefix_ctx: &DispatchContext,
    sink: &dyn DeliverySink,
    recorder: &dyn SentRecorder,
    hooks: &DispatchHooks,
    payload: ReplyPayload,
    outcome: &mut DispatchOutcome,
) {
    let text = payload.text.clone().unwrap_or_default();
    if text.trim() == SILENT_TOKEN || !payload.has_content() {
        debug!(to = %ctx.from, "skipping auto-reply: silent token or no text/media");
        return;
    }

    let mut text = text;
    if let Some(template) = opts.response_prefix.as_deref() {
        let prefix = render_response_prefix(template, prefix_ctx);
        if !prefix.is_empty() {
            text = format!("{prefix} {text}");
        }
    }

    let chunks = chunk_text(&text, opts.text_chunk_limit);
    let last = chunks.len() - 1;
    let mut last_delivered = false;
    for (i, chunk) in chunks.iter().enumerate() {
        let part = if i == last {
            ReplyPayload {
                text: Some(chunk.clone()),
                media_url: payload.media_url.clone(),
                media_urls: payload.media_urls.clone(),
            }
        } else {
            ReplyPayload::text(chunk.clone())
        };
        match sink.deliver(&part, BlockKind::Final).await {
            Ok(()) => {
                outcome.delivered_any = true;
                if i == last {
                    last_delivered = true;
                }
            },
            Err(err) => {
                warn!(
                    label = BlockKind::Final.error_label(),
                    to = %ctx.from,
                    error = %err,
                    "delivery failed"
                );
                if let Some(on_error) = &hooks.on_error {
                    on_error(&err, BlockKind::Final);
                }
            },
        }
    }

    if last_delivered {
        outcome.queued_final = true;
        recorder.remember_sent_text(
            Some(&text),
            &RememberSent {
                combined_body: Some(&ctx.body),
                session_key: Some(&ctx.session_key),
                log_verbose: true,
            },
        );
        info!(to = %ctx.from, chars = text.chars().count(), "auto-replied");
        debug!(reply = %elide(&text, 200), "final reply body");
    }
}
