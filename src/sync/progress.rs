use std::sync::Arc;

use crate::{domain::models::ProgressState, error::SyncResult, storage::ProgressRepo};

/// Loads and persists the sync cursor between runs.
pub struct ProgressTracker {
    repo: Arc<dyn ProgressRepo>,
}

impl ProgressTracker {
    pub fn new(repo: Arc<dyn ProgressRepo>) -> Self {
        Self { repo }
    }

    /// Stored state, or the zeroed default when none exists or it cannot be read.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn load(&self) -> ProgressState {
        match self.repo.get().await {
            Ok(Some(state)) => state,
            Ok(None) => ProgressState::default(),
            Err(e) => {
                tracing::warn!(error = %e, "sync progress unreadable, starting from scratch");
                ProgressState::default()
            }
        }
    }

    /// Persist `state`; returns once the write is durable.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn save(&self, state: &ProgressState) -> SyncResult<()> {
        self.repo.set(*state).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryStore;

    #[tokio::test]
    async fn load_defaults_when_nothing_stored() {
        let tracker = ProgressTracker::new(Arc::new(MemoryStore::default()));
        assert_eq!(tracker.load().await, ProgressState::default());
    }

    #[tokio::test]
    async fn load_swallows_corruption() {
        let store = Arc::new(MemoryStore::default());
        store
            .set(ProgressState {
                cursor_index: 3,
                ..ProgressState::default()
            })
            .await
            .unwrap();
        store.corrupt_progress();
        let tracker = ProgressTracker::new(store);
        assert_eq!(tracker.load().await, ProgressState::default());
    }

    #[tokio::test]
    async fn save_then_load() {
        let tracker = ProgressTracker::new(Arc::new(MemoryStore::default()));
        let state = ProgressState {
            cursor_index: 7,
            cursor_id: Some(120),
            ceiling_id: Some(500),
            head_cursor_id: Some(610),
            head_top_id: Some(640),
            total_count: 500,
            last_run_at: 1,
        };
        tracker.save(&state).await.unwrap();
        assert_eq!(tracker.load().await, state);
    }
}
