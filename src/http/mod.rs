//! Read-only query API.
//!
//! Handlers only ever read the [`SnapshotStore`](crate::store::SnapshotStore)
//! and the [`RefreshMonitor`](crate::refresh::RefreshMonitor). They clone the
//! current snapshot `Arc` and serialize it, so a refresh cycle in progress
//! never delays a response.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod router;
pub mod state;

pub use router::create_router;
pub use state::AppState;
