// JSON export of the synced catalog

use std::path::Path;

use anyhow::Context;

use crate::{
    domain::{mapping::TAG_KEYWORDS, models::GameRecord},
    storage::GameRepo,
};

/// Records per inferred category, in `TAG_KEYWORDS` order.
pub fn tag_stats(records: &[GameRecord]) -> Vec<(&'static str, usize)> {
    TAG_KEYWORDS
        .iter()
        .map(|(category, _)| {
            let count = records
                .iter()
                .filter(|r| r.tags.iter().any(|t| t == category))
                .count();
            (*category, count)
        })
        .collect()
}

/// Write every stored record, highest rating first, as a pretty JSON array.
/// Returns the number of records written.
#[tracing::instrument(skip(repo))]
pub async fn export_catalog(repo: &dyn GameRepo, out: &Path) -> anyhow::Result<usize> {
    let records = repo.list().await.context("Failed to read games for export")?;
    let json = serde_json::to_vec_pretty(&records)?;
    if let Some(dir) = out.parent().filter(|d| !d.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    tokio::fs::write(out, json)
        .await
        .with_context(|| format!("Failed to write {}", out.display()))?;

    for (category, count) in tag_stats(&records) {
        tracing::info!(category, count, "tag stats");
    }
    tracing::info!(count = records.len(), path = %out.display(), "catalog exported");
    Ok(records.len())
}
