use std::sync::Arc;

use crate::{
    domain::{
        mapping::{has_valid_price, validate},
        models::GameRecord,
    },
    error::{SyncError, SyncResult},
    storage::GameRepo,
};

/// What an upsert did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Replaced,
    /// Incoming record was sparser than the stored one and was dropped
    KeptExisting,
}

/// Completeness heuristic used to arbitrate between two versions of a record.
///
/// cover = 1, usable price = 2, at least one tag = 1, rating = 1.
pub fn quality_score(record: &GameRecord) -> u8 {
    let mut score = 0;
    if !record.cover.is_empty() {
        score += 1;
    }
    if has_valid_price(record) {
        score += 2;
    }
    if !record.tags.is_empty() {
        score += 1;
    }
    if record.rating > 0.0 {
        score += 1;
    }
    score
}

/// Owns writes to the game store. Records are keyed by id only.
#[derive(Clone)]
pub struct Reconciler {
    repo: Arc<dyn GameRepo>,
}

impl Reconciler {
    pub fn new(repo: Arc<dyn GameRepo>) -> Self {
        Self { repo }
    }

    pub fn repo(&self) -> &Arc<dyn GameRepo> {
        &self.repo
    }

    /// Merge `incoming` into the store.
    ///
    /// An existing record is replaced only when the incoming quality score is
    /// at least as high. `updated_at` becomes `now_ms`, or one past the stored
    /// value if the clock went backwards.
    #[tracing::instrument(level = "debug", skip(self, incoming), fields(id = incoming.id))]
    pub async fn upsert(&self, mut incoming: GameRecord, now_ms: i64) -> SyncResult<UpsertOutcome> {
        validate(&incoming)?;

        let existing = match self.repo.get(incoming.id).await {
            Ok(existing) => existing,
            Err(SyncError::PersistenceCorruption { message }) => {
                tracing::warn!(id = incoming.id, %message, "stored record unreadable, overwriting");
                None
            }
            Err(e) => return Err(e),
        };

        let outcome = match &existing {
            None => {
                incoming.updated_at = now_ms;
                UpsertOutcome::Inserted
            }
            Some(current) => {
                let (new_score, old_score) = (quality_score(&incoming), quality_score(current));
                if new_score < old_score {
                    tracing::debug!(new_score, old_score, "keeping richer stored record");
                    return Ok(UpsertOutcome::KeptExisting);
                }
                // the detail payload never carries dau; keep what we know
                if incoming.dau == 0 {
                    incoming.dau = current.dau;
                }
                incoming.updated_at = now_ms.max(current.updated_at.saturating_add(1));
                UpsertOutcome::Replaced
            }
        };

        self.repo.put(&incoming).await?;
        Ok(outcome)
    }
}
