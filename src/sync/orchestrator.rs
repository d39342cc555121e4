//! One bounded sync run: list, diff, iterate in paced batches, persist.
//!
//! The run is time-boxed by `SyncConfig::max_runtime`, checked at batch
//! boundaries only, so an in-flight batch always completes before exit. The
//! cursor is saved after every batch; a crash loses at most one batch.

use std::{
    fmt,
    sync::Arc,
    time::{Duration, Instant},
};

use chrono::Utc;
use futures::future::join_all;
use rand::{SeedableRng, rngs::StdRng};

use super::{
    differ::{Partition, SweepPlan, partition},
    progress::ProgressTracker,
    reconciler::{Reconciler, UpsertOutcome},
};
use crate::{
    config::SyncConfig,
    domain::{
        mapping::normalize,
        models::{CatalogEntryRef, ProgressState},
    },
    error::{SyncError, SyncResult},
    steam_client::{CatalogSource, ListSource},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    FetchingList,
    Diffing,
    Iterating,
    Saving,
    Done,
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncState::Idle => "idle",
            SyncState::FetchingList => "fetching_list",
            SyncState::Diffing => "diffing",
            SyncState::Iterating => "iterating",
            SyncState::Saving => "saving",
            SyncState::Done => "done",
        };
        f.write_str(name)
    }
}

/// Where an item in the run queue came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lane {
    /// Fresh id above the sweep ceiling
    Head,
    /// Fresh id below the sweep cursor
    Tail,
    Stale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemOutcome {
    Stored(UpsertOutcome),
    NotAGame,
    FetchFailed,
    Rejected,
}

/// Summary of one run, logged at the end and returned to the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub listed: usize,
    pub used_fallback_list: bool,
    pub fresh: usize,
    pub stale_candidates: usize,
    pub skipped_in_sweep: usize,
    pub deferred: usize,
    pub visited: usize,
    pub inserted: usize,
    pub replaced: usize,
    pub kept_existing: usize,
    pub not_a_game: usize,
    pub fetch_failed: usize,
    pub rejected: usize,
    pub budget_exhausted: bool,
    pub sweep_complete: bool,
}

impl RunReport {
    fn record(&mut self, outcome: ItemOutcome) {
        self.visited += 1;
        match outcome {
            ItemOutcome::Stored(UpsertOutcome::Inserted) => self.inserted += 1,
            ItemOutcome::Stored(UpsertOutcome::Replaced) => self.replaced += 1,
            ItemOutcome::Stored(UpsertOutcome::KeptExisting) => self.kept_existing += 1,
            ItemOutcome::NotAGame => self.not_a_game += 1,
            ItemOutcome::FetchFailed => self.fetch_failed += 1,
            ItemOutcome::Rejected => self.rejected += 1,
        }
    }
}

pub struct SyncOrchestrator {
    source: Arc<dyn CatalogSource>,
    reconciler: Reconciler,
    progress: ProgressTracker,
    config: SyncConfig,
    rng_seed: Option<u64>,
    state: SyncState,
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

impl SyncOrchestrator {
    pub fn new(
        source: Arc<dyn CatalogSource>,
        reconciler: Reconciler,
        progress: ProgressTracker,
        config: SyncConfig,
    ) -> Self {
        Self {
            source,
            reconciler,
            progress,
            config,
            rng_seed: None,
            state: SyncState::Idle,
        }
    }

    /// Fix the shuffle of stale candidates.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    fn enter(&mut self, next: SyncState) {
        tracing::debug!(from = %self.state, to = %next, "sync state");
        self.state = next;
    }

    /// Execute one run. Only list unavailability and persistence write
    /// failures are returned as errors; every per-item failure is counted in
    /// the report and skipped.
    #[tracing::instrument(skip(self))]
    pub async fn run(&mut self) -> SyncResult<RunReport> {
        let started = Instant::now();
        self.state = SyncState::Idle;
        let mut report = RunReport::default();

        self.enter(SyncState::FetchingList);
        let upstream = match self.fetch_list(&mut report).await {
            Ok(list) => list,
            Err(e) => {
                self.enter(SyncState::Done);
                return Err(e);
            }
        };

        self.enter(SyncState::Diffing);
        let existing = self.reconciler.repo().index().await?;
        let Partition {
            fresh,
            stale_candidates,
        } = {
            let mut rng = match self.rng_seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };
            partition(
                &upstream,
                &existing,
                now_ms(),
                self.config.freshness_window,
                &mut rng,
            )
        };

        let mut progress = self.progress.load().await;
        let plan = SweepPlan::new(&fresh, &progress);
        if !progress.sweep_in_progress() {
            progress = ProgressState {
                ceiling_id: fresh.first().copied(),
                ..ProgressState::default()
            };
        }
        if progress.head_cursor_id.is_none() {
            progress.head_top_id = plan.head.first().copied();
        }
        progress.total_count = upstream.len() as u64;

        report.listed = upstream.len();
        report.fresh = fresh.len();
        report.stale_candidates = stale_candidates.len();
        report.skipped_in_sweep = plan.skipped;
        report.deferred = plan.deferred;
        tracing::info!(
            listed = report.listed,
            stored = existing.len(),
            head = plan.head.len(),
            tail = plan.tail.len(),
            skipped = plan.skipped,
            deferred = plan.deferred,
            stale = stale_candidates.len(),
            "catalog diffed"
        );

        let queue: Vec<(i64, Lane)> = plan
            .head
            .iter()
            .map(|id| (*id, Lane::Head))
            .chain(plan.tail.iter().map(|id| (*id, Lane::Tail)))
            .chain(stale_candidates.iter().map(|id| (*id, Lane::Stale)))
            .collect();

        self.enter(SyncState::Iterating);
        let mut head_left = plan.head.len();
        let mut tail_left = plan.tail.len();
        let batch_size = self.config.batch_size.max(1);

        for (batch_no, batch) in queue.chunks(batch_size).enumerate() {
            if batch_no > 0 {
                tokio::time::sleep(self.config.delay).await;
                if started.elapsed() >= self.config.max_runtime {
                    tracing::info!(
                        elapsed_secs = started.elapsed().as_secs(),
                        visited = report.visited,
                        "run budget exhausted"
                    );
                    report.budget_exhausted = true;
                    break;
                }
            }

            let outcomes = join_all(batch.iter().map(|(id, _)| self.process(*id))).await;
            for ((id, lane), outcome) in batch.iter().zip(outcomes) {
                // a failed write ends the run; earlier batches are already saved
                let outcome = match outcome {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        tracing::error!(id, error = %e, "persistence failure, aborting run");
                        self.enter(SyncState::Done);
                        return Err(e);
                    }
                };
                report.record(outcome);
                match lane {
                    Lane::Head => {
                        head_left -= 1;
                        progress.head_cursor_id = Some(*id);
                    }
                    Lane::Tail => {
                        tail_left -= 1;
                        progress.cursor_id = Some(*id);
                        progress.cursor_index += 1;
                    }
                    Lane::Stale => {}
                }
            }

            progress.last_run_at = now_ms();
            self.progress.save(&progress).await?;
            tracing::info!(
                batch = batch_no + 1,
                visited = report.visited,
                remaining = queue.len() - report.visited,
                "batch done"
            );
        }

        self.enter(SyncState::Saving);
        if head_left == 0 {
            if let Some(top) = progress.head_top_id {
                progress.ceiling_id = Some(top);
            }
            progress.head_cursor_id = None;
            progress.head_top_id = None;
        }
        report.sweep_complete = tail_left == 0 && head_left == 0;
        if report.sweep_complete {
            progress = ProgressState {
                total_count: progress.total_count,
                ..ProgressState::default()
            };
        }
        progress.last_run_at = now_ms();
        self.progress.save(&progress).await?;

        self.enter(SyncState::Done);
        tracing::info!(
            visited = report.visited,
            inserted = report.inserted,
            replaced = report.replaced,
            kept = report.kept_existing,
            not_a_game = report.not_a_game,
            failed = report.fetch_failed,
            rejected = report.rejected,
            budget_exhausted = report.budget_exhausted,
            sweep_complete = report.sweep_complete,
            elapsed_secs = started.elapsed().as_secs(),
            "sync run finished"
        );
        Ok(report)
    }

    async fn fetch_list(&self, report: &mut RunReport) -> SyncResult<Vec<CatalogEntryRef>> {
        let primary = match self.source.fetch_app_list(ListSource::Primary).await {
            Ok(list) => return Ok(list),
            Err(e) => e,
        };
        tracing::warn!(error = %primary, "primary catalog list failed, trying fallback");
        match self.source.fetch_app_list(ListSource::Fallback).await {
            Ok(list) => {
                report.used_fallback_list = true;
                Ok(list)
            }
            Err(fallback) => {
                tracing::error!(%primary, %fallback, "catalog list unavailable");
                Err(SyncError::ListUnavailable { primary, fallback })
            }
        }
    }

    /// Fetch, normalize and merge one app. Only persistence errors escape.
    async fn process(&self, app_id: i64) -> SyncResult<ItemOutcome> {
        let envelope = match self.source.fetch_app_details(app_id).await {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(app_id, error = %e, "detail fetch failed, skipping");
                return Ok(ItemOutcome::FetchFailed);
            }
        };
        let Some(record) = normalize(app_id, envelope.as_ref()) else {
            tracing::debug!(app_id, "not a game, skipping");
            return Ok(ItemOutcome::NotAGame);
        };
        match self.reconciler.upsert(record, now_ms()).await {
            Ok(outcome) => Ok(ItemOutcome::Stored(outcome)),
            Err(SyncError::Validation { id, message }) => {
                tracing::warn!(id, %message, "record failed validation, dropped");
                Ok(ItemOutcome::Rejected)
            }
            Err(e) => Err(e),
        }
    }
}
