//! Application state for the HTTP server.

use std::sync::Arc;
use std::time::Duration;

use crate::refresh::RefreshMonitor;
use crate::store::SnapshotStore;

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<SnapshotStore>,
    pub monitor: Arc<RefreshMonitor>,
    /// Age past which the status endpoint reports the snapshot as stale.
    pub max_snapshot_age: Duration,
}

impl AppState {
    pub fn new(store: Arc<SnapshotStore>, monitor: Arc<RefreshMonitor>, max_snapshot_age: Duration) -> Self {
        Self {
            store,
            monitor,
            max_snapshot_age,
        }
    }
}
