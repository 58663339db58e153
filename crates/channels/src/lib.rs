//! Boundary traits between the auto-reply pipeline and concrete channel
//! transports.
//!
//! How a payload actually reaches a channel's network API lives behind
//! [`DeliverySink`]; acknowledgement side effects (read receipts, reactions)
//! behind [`AckSink`]. The pipeline only ever sees these traits.

pub mod error;
pub mod plugin;

pub use {
    error::{Error, Result},
    plugin::{AckRequest, AckSink, BlockKind, DeliverySink},
};
