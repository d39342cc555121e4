use std::{collections::HashMap, sync::Arc};

use entities::{game, string_list::StringList, sync_progress};
use sea_orm::{
    ActiveValue::Set, DatabaseConnection, EntityTrait, FromQueryResult, QueryOrder,
    QuerySelect, sea_query::OnConflict,
};

use super::{GameRepo, ProgressRepo};
use crate::{
    domain::models::{GameRecord, Platform, ProgressState},
    error::{SyncError, SyncResult},
};

/// sea-orm backed store for game records and the sync cursor.
#[derive(Clone, Debug)]
pub struct SeaOrmStore {
    db: Arc<DatabaseConnection>,
}

impl SeaOrmStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

fn to_active(record: &GameRecord) -> game::ActiveModel {
    game::ActiveModel {
        id: Set(record.id),
        title: Set(record.title.clone()),
        platforms: Set(StringList(
            record.platforms.iter().map(|p| p.as_str().to_string()).collect(),
        )),
        base_price: Set(record.base_price),
        discount: Set(record.discount),
        rating: Set(record.rating),
        dau: Set(i64::try_from(record.dau).unwrap_or(i64::MAX)),
        tags: Set(StringList(record.tags.clone())),
        cover: Set(record.cover.clone()),
        release_date: Set(record.release_date.clone()),
        description: Set(record.description.clone()),
        updated_at: Set(record.updated_at),
    }
}

/// A `games` row with the JSON list columns left undecoded, so one bad row
/// surfaces as corruption for that id instead of failing the whole query.
#[derive(Debug, FromQueryResult)]
struct GameRow {
    id: i64,
    title: String,
    platforms: String,
    base_price: Option<f64>,
    discount: f64,
    rating: f64,
    dau: i64,
    tags: String,
    cover: String,
    release_date: String,
    description: String,
    updated_at: i64,
}

fn decode_list(id: i64, column: &str, raw: &str) -> SyncResult<Vec<String>> {
    serde_json::from_str(raw)
        .map_err(|e| SyncError::corruption(format!("{column} of app {id}: {e}")))
}

fn to_record(row: GameRow) -> SyncResult<GameRecord> {
    let mut platforms: Vec<Platform> = decode_list(row.id, "platforms", &row.platforms)?
        .iter()
        .filter_map(|p| Platform::parse(p))
        .collect();
    if platforms.is_empty() {
        platforms.push(Platform::FALLBACK);
    }
    let tags = decode_list(row.id, "tags", &row.tags)?;
    let dau = u64::try_from(row.dau)
        .map_err(|_| SyncError::corruption(format!("negative dau for app {}", row.id)))?;

    Ok(GameRecord {
        id: row.id,
        title: row.title,
        platforms,
        base_price: row.base_price,
        discount: row.discount,
        rating: row.rating,
        dau,
        tags,
        cover: row.cover,
        release_date: row.release_date,
        description: row.description,
        updated_at: row.updated_at,
    })
}

#[async_trait::async_trait]
impl GameRepo for SeaOrmStore {
    #[tracing::instrument(level = "debug", skip(self))]
    async fn get(&self, id: i64) -> SyncResult<Option<GameRecord>> {
        let row = game::Entity::find_by_id(id)
            .into_model::<GameRow>()
            .one(self.db.as_ref())
            .await?;
        row.map(to_record).transpose()
    }

    #[tracing::instrument(level = "debug", skip(self, record), fields(id = record.id))]
    async fn put(&self, record: &GameRecord) -> SyncResult<()> {
        game::Entity::insert(to_active(record))
            .on_conflict(
                OnConflict::column(game::Column::Id)
                    .update_columns([
                        game::Column::Title,
                        game::Column::Platforms,
                        game::Column::BasePrice,
                        game::Column::Discount,
                        game::Column::Rating,
                        game::Column::Dau,
                        game::Column::Tags,
                        game::Column::Cover,
                        game::Column::ReleaseDate,
                        game::Column::Description,
                        game::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec(self.db.as_ref())
            .await?;
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn index(&self) -> SyncResult<HashMap<i64, i64>> {
        let rows = game::Entity::find()
            .select_only()
            .column(game::Column::Id)
            .column(game::Column::UpdatedAt)
            .into_tuple::<(i64, i64)>()
            .all(self.db.as_ref())
            .await?;
        Ok(rows.into_iter().collect())
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn list(&self) -> SyncResult<Vec<GameRecord>> {
        let rows = game::Entity::find()
            .order_by_desc(game::Column::Rating)
            .order_by_asc(game::Column::Id)
            .into_model::<GameRow>()
            .all(self.db.as_ref())
            .await?;
        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let id = row.id;
            match to_record(row) {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!(id, error = %e, "skipping unreadable game row"),
            }
        }
        Ok(records)
    }
}

#[async_trait::async_trait]
impl ProgressRepo for SeaOrmStore {
    #[tracing::instrument(level = "debug", skip(self))]
    async fn get(&self) -> SyncResult<Option<ProgressState>> {
        let Some(model) = sync_progress::Entity::find_by_id(sync_progress::SINGLETON_ID)
            .one(self.db.as_ref())
            .await?
        else {
            return Ok(None);
        };
        let cursor_index = u64::try_from(model.cursor_index)
            .map_err(|_| SyncError::corruption("negative cursor index"))?;
        let total_count = u64::try_from(model.total_count)
            .map_err(|_| SyncError::corruption("negative total count"))?;
        Ok(Some(ProgressState {
            cursor_index,
            cursor_id: model.cursor_id,
            ceiling_id: model.ceiling_id,
            head_cursor_id: model.head_cursor_id,
            head_top_id: model.head_top_id,
            total_count,
            last_run_at: model.last_run_at,
        }))
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn set(&self, progress: ProgressState) -> SyncResult<()> {
        let active = sync_progress::ActiveModel {
            id: Set(sync_progress::SINGLETON_ID),
            cursor_index: Set(i64::try_from(progress.cursor_index).unwrap_or(i64::MAX)),
            cursor_id: Set(progress.cursor_id),
            ceiling_id: Set(progress.ceiling_id),
            head_cursor_id: Set(progress.head_cursor_id),
            head_top_id: Set(progress.head_top_id),
            total_count: Set(i64::try_from(progress.total_count).unwrap_or(i64::MAX)),
            last_run_at: Set(progress.last_run_at),
        };
        sync_progress::Entity::insert(active)
            .on_conflict(
                OnConflict::column(sync_progress::Column::Id)
                    .update_columns([
                        sync_progress::Column::CursorIndex,
                        sync_progress::Column::CursorId,
                        sync_progress::Column::CeilingId,
                        sync_progress::Column::HeadCursorId,
                        sync_progress::Column::HeadTopId,
                        sync_progress::Column::TotalCount,
                        sync_progress::Column::LastRunAt,
                    ])
                    .to_owned(),
            )
            .exec(self.db.as_ref())
            .await?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use migration::MigratorTrait;
    use sea_orm::{ConnectOptions, ConnectionTrait, Database};

    use super::*;
    use crate::sync::reconciler::{Reconciler, UpsertOutcome};

    pub(crate) async fn memory_store() -> SeaOrmStore {
        let mut opts = ConnectOptions::new("sqlite::memory:");
        opts.max_connections(1).sqlx_logging(false);
        let db = Database::connect(opts).await.unwrap();
        migration::Migrator::up(&db, None).await.unwrap();
        SeaOrmStore::new(Arc::new(db))
    }

    fn record(id: i64, rating: f64) -> GameRecord {
        GameRecord {
            id,
            title: format!("Game {id}"),
            platforms: vec![Platform::Pc, Platform::Mac],
            base_price: Some(19.99),
            discount: 0.1,
            rating,
            dau: 1200,
            tags: vec!["Indie".into(), "Casual".into()],
            cover: "https://cdn.example.test/header.jpg".into(),
            release_date: "2020-01-01".into(),
            description: String::new(),
            updated_at: 1_700_000_000_000,
        }
    }

    #[tokio::test]
    async fn put_then_get_returns_same_record() {
        let store = memory_store().await;
        let r = record(10, 8.5);
        store.put(&r).await.unwrap();
        assert_eq!(GameRepo::get(&store, 10).await.unwrap(), Some(r));
        assert_eq!(GameRepo::get(&store, 11).await.unwrap(), None);
    }

    #[tokio::test]
    async fn put_overwrites_existing_id() {
        let store = memory_store().await;
        store.put(&record(10, 5.0)).await.unwrap();
        let mut newer = record(10, 9.0);
        newer.title = "Renamed".into();
        newer.base_price = None;
        store.put(&newer).await.unwrap();

        let all = store.list().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].title, "Renamed");
        assert_eq!(all[0].base_price, None);
    }

    #[tokio::test]
    async fn list_orders_by_rating_and_index_has_timestamps() {
        let store = memory_store().await;
        for (id, rating) in [(1, 3.0), (2, 9.1), (3, 7.4)] {
            store.put(&record(id, rating)).await.unwrap();
        }
        let ids: Vec<i64> = store.list().await.unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![2, 3, 1]);

        let index = store.index().await.unwrap();
        assert_eq!(index.len(), 3);
        assert_eq!(index.get(&2), Some(&1_700_000_000_000));
    }

    #[tokio::test]
    async fn progress_round_trips_through_singleton_row() {
        let store = memory_store().await;
        assert_eq!(ProgressRepo::get(&store).await.unwrap(), None);

        let first = ProgressState {
            cursor_index: 5,
            cursor_id: Some(900),
            ceiling_id: Some(1000),
            head_cursor_id: Some(1040),
            head_top_id: Some(1100),
            total_count: 1000,
            last_run_at: 42,
        };
        store.set(first).await.unwrap();
        let second = ProgressState {
            cursor_index: 10,
            ..first
        };
        store.set(second).await.unwrap();
        assert_eq!(ProgressRepo::get(&store).await.unwrap(), Some(second));
    }

    #[tokio::test]
    async fn malformed_json_row_is_isolated() {
        let store = memory_store().await;
        for (id, rating) in [(1, 9.0), (2, 8.0), (3, 7.0)] {
            store.put(&record(id, rating)).await.unwrap();
        }
        store
            .db
            .execute_unprepared("UPDATE games SET tags = 'not json' WHERE id = 2")
            .await
            .unwrap();

        let ids: Vec<i64> = store.list().await.unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 3]);
        assert!(matches!(
            GameRepo::get(&store, 2).await,
            Err(SyncError::PersistenceCorruption { .. })
        ));
        assert_eq!(GameRepo::get(&store, 1).await.unwrap(), Some(record(1, 9.0)));
    }

    #[tokio::test]
    async fn upsert_overwrites_malformed_row() {
        let store = Arc::new(memory_store().await);
        store.put(&record(2, 8.0)).await.unwrap();
        store
            .db
            .execute_unprepared("UPDATE games SET platforms = '[\"PC\"' WHERE id = 2")
            .await
            .unwrap();

        let reconciler = Reconciler::new(store.clone());
        let outcome = reconciler.upsert(record(2, 8.0), 1_800_000_000_000).await.unwrap();
        assert_eq!(outcome, UpsertOutcome::Inserted);

        let repaired = GameRepo::get(store.as_ref(), 2).await.unwrap().unwrap();
        assert_eq!(repaired.platforms, vec![Platform::Pc, Platform::Mac]);
        assert_eq!(store.list().await.unwrap().len(), 1);
    }
}
