// TTL snapshot of the store listing shared by query requests

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use tokio::sync::RwLock;

use crate::{domain::models::GameRecord, error::SyncResult, storage::GameRepo};

struct Snapshot {
    loaded_at: Instant,
    records: Arc<Vec<GameRecord>>,
}

/// Caches `GameRepo::list` for `ttl`. A zero ttl disables caching.
pub struct SnapshotCache {
    ttl: Duration,
    slot: RwLock<Option<Snapshot>>,
}

impl SnapshotCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slot: RwLock::new(None),
        }
    }

    /// Current listing, reloaded from `repo` once the snapshot has expired.
    /// Load failures are returned and leave any previous snapshot in place.
    #[tracing::instrument(level = "debug", skip(self, repo))]
    pub async fn get_or_load(&self, repo: &dyn GameRepo) -> SyncResult<Arc<Vec<GameRecord>>> {
        if let Some(records) = self.fresh().await {
            return Ok(records);
        }

        let mut slot = self.slot.write().await;
        // another request may have refreshed while we waited for the lock
        if let Some(snapshot) = slot.as_ref() {
            if snapshot.loaded_at.elapsed() < self.ttl {
                return Ok(snapshot.records.clone());
            }
        }
        let records = Arc::new(repo.list().await?);
        tracing::debug!(count = records.len(), "query snapshot reloaded");
        *slot = Some(Snapshot {
            loaded_at: Instant::now(),
            records: records.clone(),
        });
        Ok(records)
    }

    #[cfg(test)]
    pub async fn invalidate(&self) {
        *self.slot.write().await = None;
    }

    async fn fresh(&self) -> Option<Arc<Vec<GameRecord>>> {
        let slot = self.slot.read().await;
        slot.as_ref()
            .filter(|s| s.loaded_at.elapsed() < self.ttl)
            .map(|s| s.records.clone())
    }
}
