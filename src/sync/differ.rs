// Splits the upstream catalog into ids to discover and ids to refresh

use std::{
    collections::{HashMap, HashSet},
    time::Duration,
};

use rand::{Rng, seq::SliceRandom};

use crate::domain::models::{CatalogEntryRef, ProgressState};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Partition {
    /// Upstream ids missing locally, highest (newest) first
    pub fresh: Vec<i64>,
    /// Stored ids outside the freshness window, shuffled
    pub stale_candidates: Vec<i64>,
}

/// Partition the upstream list against the local `id -> updated_at` index.
///
/// Duplicate upstream ids collapse to one. Records updated less than
/// `freshness_window` before `now_ms` are left out of the refresh set.
pub fn partition<R: Rng + ?Sized>(
    upstream: &[CatalogEntryRef],
    existing: &HashMap<i64, i64>,
    now_ms: i64,
    freshness_window: Duration,
    rng: &mut R,
) -> Partition {
    let mut seen = HashSet::with_capacity(upstream.len());
    let mut fresh: Vec<i64> = upstream
        .iter()
        .map(|e| e.id)
        .filter(|id| !existing.contains_key(id))
        .filter(|id| seen.insert(*id))
        .collect();
    fresh.sort_unstable_by(|a, b| b.cmp(a));

    let window_ms = i64::try_from(freshness_window.as_millis()).unwrap_or(i64::MAX);
    let mut stale_candidates: Vec<i64> = existing
        .iter()
        .filter(|(_, updated_at)| now_ms.saturating_sub(**updated_at) >= window_ms)
        .map(|(id, _)| *id)
        .collect();
    // HashMap order is arbitrary; sort first so a seeded rng is reproducible
    stale_candidates.sort_unstable();
    stale_candidates.shuffle(rng);

    Partition {
        fresh,
        stale_candidates,
    }
}

/// Visiting order of the fresh ids for one run, honouring the stored cursor.
///
/// A sweep walks the fresh ids downwards from `ceiling_id`, recording the
/// lowest visited id in `cursor_id`. Ids released after the sweep started
/// sit above the ceiling and are walked the same way in a head pass that
/// records its own `head_cursor_id` below `head_top_id`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SweepPlan {
    /// Fresh ids above the sweep ceiling not yet visited in the head pass
    pub head: Vec<i64>,
    /// Fresh ids below the cursor: not yet visited in this sweep
    pub tail: Vec<i64>,
    /// Fresh ids inside a visited range, already tried and rejected
    pub skipped: usize,
    /// Fresh ids above an unfinished head pass, left for the next one
    pub deferred: usize,
}

impl SweepPlan {
    /// `fresh` must be in descending order, as produced by [`partition`].
    pub fn new(fresh: &[i64], progress: &ProgressState) -> Self {
        let (Some(cursor), Some(ceiling)) = (progress.cursor_id, progress.ceiling_id) else {
            return SweepPlan {
                head: Vec::new(),
                tail: fresh.to_vec(),
                skipped: 0,
                deferred: 0,
            };
        };
        let tail: Vec<i64> = fresh.iter().copied().filter(|id| *id < cursor).collect();
        let (head, deferred) = match (progress.head_cursor_id, progress.head_top_id) {
            (Some(head_cursor), Some(head_top)) => (
                fresh
                    .iter()
                    .copied()
                    .filter(|id| *id > ceiling && *id < head_cursor)
                    .collect::<Vec<i64>>(),
                fresh.iter().filter(|id| **id > head_top).count(),
            ),
            _ => (
                fresh.iter().copied().filter(|id| *id > ceiling).collect(),
                0,
            ),
        };
        let skipped = fresh
            .len()
            .saturating_sub(head.len() + tail.len() + deferred);
        SweepPlan {
            head,
            tail,
            skipped,
            deferred,
        }
    }
}
