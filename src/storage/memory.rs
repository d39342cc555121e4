// In-memory repositories for exercising the sync core without a database

use std::{
    collections::HashMap,
    sync::{
        Mutex,
        atomic::{AtomicBool, Ordering},
    },
};

use super::{GameRepo, ProgressRepo};
use crate::{
    domain::models::{GameRecord, ProgressState},
    error::{SyncError, SyncResult},
};

#[derive(Debug, Default)]
pub struct MemoryStore {
    games: Mutex<HashMap<i64, GameRecord>>,
    progress: Mutex<Option<ProgressState>>,
    corrupt_progress: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn with_records(records: impl IntoIterator<Item = GameRecord>) -> Self {
        let store = Self::default();
        store
            .games
            .lock()
            .unwrap()
            .extend(records.into_iter().map(|r| (r.id, r)));
        store
    }

    /// Make the next progress reads fail as if the stored row were unreadable.
    pub fn corrupt_progress(&self) {
        self.corrupt_progress.store(true, Ordering::SeqCst);
    }

    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> HashMap<i64, GameRecord> {
        self.games.lock().unwrap().clone()
    }

    pub fn progress(&self) -> Option<ProgressState> {
        *self.progress.lock().unwrap()
    }
}

#[async_trait::async_trait]
impl GameRepo for MemoryStore {
    async fn get(&self, id: i64) -> SyncResult<Option<GameRecord>> {
        Ok(self.games.lock().unwrap().get(&id).cloned())
    }

    async fn put(&self, record: &GameRecord) -> SyncResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(SyncError::Persistence(sea_orm::DbErr::Custom(
                "disk full".into(),
            )));
        }
        self.games
            .lock()
            .unwrap()
            .insert(record.id, record.clone());
        Ok(())
    }

    async fn index(&self) -> SyncResult<HashMap<i64, i64>> {
        Ok(self
            .games
            .lock()
            .unwrap()
            .values()
            .map(|r| (r.id, r.updated_at))
            .collect())
    }

    async fn list(&self) -> SyncResult<Vec<GameRecord>> {
        let mut all: Vec<GameRecord> = self.games.lock().unwrap().values().cloned().collect();
        all.sort_by(|a, b| b.rating.total_cmp(&a.rating).then(a.id.cmp(&b.id)));
        Ok(all)
    }
}

#[async_trait::async_trait]
impl ProgressRepo for MemoryStore {
    async fn get(&self) -> SyncResult<Option<ProgressState>> {
        if self.corrupt_progress.load(Ordering::SeqCst) {
            return Err(SyncError::corruption("unreadable progress row"));
        }
        Ok(*self.progress.lock().unwrap())
    }

    async fn set(&self, progress: ProgressState) -> SyncResult<()> {
        *self.progress.lock().unwrap() = Some(progress);
        Ok(())
    }
}
