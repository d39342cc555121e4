use std::sync::Arc;

use poem_openapi::{OpenApi, param::Query};

use super::{
    cache::SnapshotCache,
    models::{GamesResponse, HealthResponse},
    services::{
        health::HealthService,
        query::{QueryService, RawQuery},
    },
};
use crate::{config::QueryConfig, storage::GameRepo};

pub struct GameQueryApi {
    pub repo: Arc<dyn GameRepo>,
    pub cache: Arc<SnapshotCache>,
    pub config: Arc<QueryConfig>,
}

#[OpenApi]
impl GameQueryApi {
    #[oai(path = "/health", method = "get")]
    #[tracing::instrument(level = "debug", skip(self))]
    async fn health(&self) -> HealthResponse {
        HealthService::new(self.repo.as_ref()).status().await
    }

    /// Search the synced catalog
    #[oai(path = "/games", method = "get")]
    #[allow(clippy::too_many_arguments)]
    #[tracing::instrument(
        level = "debug",
        skip(self, platform, tags, expectations, demand, keyword, sort, page, size)
    )]
    async fn games(
        &self,
        /// PC, Mac or Linux; an unrecognised name matches no game
        Query(platform): Query<Option<String>>,
        /// Comma or space separated; a game must carry at least one
        Query(tags): Query<Option<String>>,
        /// Comma separated expectation groups, e.g. "Story,Open World"
        Query(expectations): Query<Option<String>>,
        /// Any of Sale, Free, Positive, Trending; all must hold
        Query(demand): Query<Option<String>>,
        /// Substring matched against title and tags
        Query(keyword): Query<Option<String>>,
        /// rating (default), price_asc, price_desc or dau
        Query(sort): Query<Option<String>>,
        /// Page number starting at 1
        Query(page): Query<Option<u32>>,
        /// Items per page
        Query(size): Query<Option<u32>>,
    ) -> GamesResponse {
        let raw = RawQuery {
            platform,
            tags,
            expectations,
            demand,
            keyword,
            sort,
            page,
            size,
        };
        tracing::debug!(?raw, "handling /games");
        QueryService::new(self.repo.as_ref(), &self.cache, &self.config)
            .search(raw)
            .await
    }
}
