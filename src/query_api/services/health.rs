use poem_openapi::payload::Json;

use crate::{
    query_api::models::{HealthDto, HealthResponse},
    storage::GameRepo,
};

pub struct HealthService<'a> {
    pub repo: &'a dyn GameRepo,
}

impl<'a> HealthService<'a> {
    pub fn new(repo: &'a dyn GameRepo) -> Self {
        Self { repo }
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn status(&self) -> HealthResponse {
        let version = env!("CARGO_PKG_VERSION").to_string();
        match self.repo.index().await {
            Ok(index) => HealthResponse::Ok(Json(HealthDto {
                status: "ok".into(),
                games: index.len() as u64,
                version,
            })),
            Err(e) => {
                tracing::error!(error = %e, "health check could not read the store");
                HealthResponse::Unavailable(Json(HealthDto {
                    status: "degraded".into(),
                    games: 0,
                    version,
                }))
            }
        }
    }
}
