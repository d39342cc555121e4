use poem_openapi::{ApiResponse, Object, payload::Json};

use crate::domain::models::GameRecord;

#[derive(Debug, Clone, Object)]
#[oai(rename_all = "camelCase")]
pub struct GameDto {
    pub id: i64,
    pub title: String,
    pub platforms: Vec<String>,
    /// Absent when the price is unknown
    pub base_price: Option<f64>,
    /// Fraction between 0 and 1
    pub discount: f64,
    pub effective_price: Option<f64>,
    /// 0 - 10, 0 meaning unrated
    pub rating: f64,
    pub dau: u64,
    pub tags: Vec<String>,
    pub cover: String,
    pub release_date: String,
    pub description: String,
    /// Epoch milliseconds of the last sync write
    pub updated_at: i64,
    pub match_score: u32,
}

impl GameDto {
    pub fn from_record(record: &GameRecord, match_score: u32) -> Self {
        GameDto {
            id: record.id,
            title: record.title.clone(),
            platforms: record.platforms.iter().map(|p| p.to_string()).collect(),
            base_price: record.base_price,
            discount: record.discount,
            effective_price: record.effective_price(),
            rating: record.rating,
            dau: record.dau,
            tags: record.tags.clone(),
            cover: record.cover.clone(),
            release_date: record.release_date.clone(),
            description: record.description.clone(),
            updated_at: record.updated_at,
            match_score,
        }
    }
}

#[derive(Debug, Clone, Object)]
pub struct GamesPageDto {
    pub items: Vec<GameDto>,
    pub total: u64,
    /// 1-based
    pub page: u32,
    pub size: u32,
}

#[derive(Debug, Clone, Object)]
pub struct GamesBodyDto {
    /// 0 on success, 1 when the store could not be read
    pub code: i32,
    pub data: GamesPageDto,
}

#[derive(ApiResponse)]
pub enum GamesResponse {
    /// Matching games; an empty page when the store is unavailable
    #[oai(status = 200)]
    Ok(Json<GamesBodyDto>),
}

#[derive(Debug, Clone, Object)]
pub struct HealthDto {
    /// "ok" or "degraded"
    pub status: String,
    pub games: u64,
    pub version: String,
}

#[derive(ApiResponse)]
pub enum HealthResponse {
    #[oai(status = 200)]
    Ok(Json<HealthDto>),

    /// Store unreadable
    #[oai(status = 503)]
    Unavailable(Json<HealthDto>),
}
