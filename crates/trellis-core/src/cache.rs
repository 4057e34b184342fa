//! Latest-snapshot cache
//!
//! Uses `arc-swap` so readers never block and never observe a half-built
//! snapshot: publishing swaps a single pointer.

use std::sync::Arc;

use arc_swap::ArcSwapOption;

use crate::model::GraphSnapshot;

/// Holds the most recent successful snapshot, or nothing before the first one.
#[derive(Debug, Default)]
pub struct GraphCache {
    current: ArcSwapOption<GraphSnapshot>,
}

impl GraphCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the stored snapshot in one atomic step.
    pub fn publish(&self, snapshot: Arc<GraphSnapshot>) {
        tracing::debug!(run = snapshot.run(), nodes = snapshot.graph().node_count(), "publishing snapshot");
        self.current.store(Some(snapshot));
    }

    #[inline]
    pub fn current(&self) -> Option<Arc<GraphSnapshot>> {
        self.current.load_full()
    }

    pub fn is_empty(&self) -> bool {
        self.current.load().is_none()
    }
}
