//! Resolved addressing for a conversation.
//!
//! Route *resolution* (the binding cascade from peer to default agent)
//! lives outside this workspace. The pipeline consumes an already-resolved
//! [`ResolvedRoute`], immutable for the duration of one inbound event, and
//! persists last-used-recipient bookkeeping through [`RouteBookkeeper`].

pub mod bookkeeping;
pub mod route;

pub use {
    bookkeeping::{LastRouteUpdate, RouteBookkeeper},
    route::ResolvedRoute,
};
