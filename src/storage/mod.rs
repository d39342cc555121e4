// Persistence traits for the sync core; sea-orm implementation in `sqlite`

use std::collections::HashMap;

use crate::{
    domain::models::{GameRecord, ProgressState},
    error::SyncResult,
};

#[cfg(test)]
pub mod memory;
pub mod sqlite;

pub use sqlite::SeaOrmStore;

#[async_trait::async_trait]
pub trait GameRepo: Send + Sync {
    async fn get(&self, id: i64) -> SyncResult<Option<GameRecord>>;
    /// Insert or overwrite the record stored under `record.id`.
    async fn put(&self, record: &GameRecord) -> SyncResult<()>;
    /// `id -> updated_at` for every stored record.
    async fn index(&self) -> SyncResult<HashMap<i64, i64>>;
    /// Full scan ordered by descending rating.
    async fn list(&self) -> SyncResult<Vec<GameRecord>>;
}

#[async_trait::async_trait]
pub trait ProgressRepo: Send + Sync {
    async fn get(&self) -> SyncResult<Option<ProgressState>>;
    async fn set(&self, progress: ProgressState) -> SyncResult<()>;
}
