//! Inbound-message auto-reply dispatch pipeline.
//!
//! Flow: inbound message → effective-body build (group history folding) →
//! echo gate → ack side effect → streaming reply dispatch → conditional
//! history clearing and background route bookkeeping.
//!
//! One logical task per inbound event; shared state (group histories, echo
//! fingerprints) is serialized per conversation key so concurrent events
//! never observe half-applied mutations.

pub mod chunk;
pub mod dispatch;
pub mod echo;
pub mod envelope;
pub mod error;
pub mod history;
pub mod prefix;
pub mod process;
pub mod tasks;

pub use {
    dispatch::{
        Block, DispatchHooks, DispatchOptions, DispatchOutcome, RememberSent, ReplyEvent,
        ReplyResolver, ReplySender, ResolveOptions, SentRecorder, dispatch_reply,
    },
    echo::EchoGuard,
    error::{Error, Result},
    history::{EffectiveBody, GroupHistoryEntry, GroupHistoryStore, GroupRosterStore},
    prefix::{DispatchContext, ModelSelection},
    process::{MessagePipeline, PipelineConfig, ProcessOptions},
    tasks::BackgroundTasks,
};
