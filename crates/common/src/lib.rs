//! Shared types and utilities used across all magpie crates.

pub mod types;
pub mod util;

pub use types::{ChatType, InboundMsg, Location, MsgContext, ReplyPayload, ReplyRef};
