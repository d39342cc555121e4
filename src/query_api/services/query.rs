use std::{cmp::Ordering, str::FromStr};

use poem_openapi::payload::Json;

use crate::{
    config::QueryConfig,
    domain::models::{GameRecord, Platform},
    query_api::{
        cache::SnapshotCache,
        models::{GameDto, GamesBodyDto, GamesPageDto, GamesResponse},
    },
    storage::GameRepo,
};

/// Keyword groups behind the "expectation" search chips.
pub const EXPECTATION_KEYWORDS: &[(&str, &[&str])] = &[
    ("Story", &["story rich", "story", "剧情", "narrative"]),
    ("Open World", &["open world", "开放世界"]),
    (
        "Multiplayer",
        &["multi-player", "multiplayer", "co-op", "coop", "online pvp", "pvp", "多人", "联机"],
    ),
    ("Graphics", &["beautiful", "visual", "画面", "高清"]),
    ("Hardcore", &["hardcore", "difficult", "souls", "高难度", "硬核"]),
    ("Relaxing", &["casual", "relax", "relaxing", "轻松", "解压"]),
    ("Indie", &["indie", "独立"]),
];

const TRENDING_DAU: u64 = 5_000;
const POSITIVE_RATING: f64 = 8.5;

const KEYWORD_SCORE: u32 = 8;
const TAG_SCORE: u32 = 6;
const EXPECTATION_SCORE: u32 = 4;
const DISCOUNT_SCORE: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemandFlag {
    Sale,
    Free,
    Positive,
    Trending,
}

impl DemandFlag {
    pub fn matches(&self, game: &GameRecord) -> bool {
        match self {
            DemandFlag::Sale => game.discount > 0.0,
            DemandFlag::Free => game.base_price == Some(0.0),
            DemandFlag::Positive => game.rating >= POSITIVE_RATING,
            DemandFlag::Trending => game.dau >= TRENDING_DAU || game.rating >= POSITIVE_RATING,
        }
    }
}

impl FromStr for DemandFlag {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sale" => Ok(DemandFlag::Sale),
            "free" => Ok(DemandFlag::Free),
            "positive" => Ok(DemandFlag::Positive),
            "trending" => Ok(DemandFlag::Trending),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    Rating,
    PriceAsc,
    PriceDesc,
    Dau,
}

impl FromStr for SortKey {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rating" => Ok(SortKey::Rating),
            "price_asc" => Ok(SortKey::PriceAsc),
            "price_desc" => Ok(SortKey::PriceDesc),
            "dau" => Ok(SortKey::Dau),
            _ => Err(()),
        }
    }
}

/// Platform constraint of a search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PlatformFilter {
    #[default]
    Any,
    Only(Platform),
    /// Named a platform no record can carry; matches nothing
    Unknown,
}

impl PlatformFilter {
    fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim).filter(|p| !p.is_empty()) {
            None => PlatformFilter::Any,
            Some(name) => {
                Platform::parse(name).map_or(PlatformFilter::Unknown, PlatformFilter::Only)
            }
        }
    }
}

/// Parsed search request. Text fields are lower-cased.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GameQuery {
    pub platform: PlatformFilter,
    pub tags: Vec<String>,
    pub expectations: Vec<String>,
    pub demand: Vec<DemandFlag>,
    pub keyword: Option<String>,
    pub sort: SortKey,
    /// 1-based
    pub page: u32,
    pub size: u32,
}

/// Raw query-string values as received by the route.
#[derive(Debug, Clone, Default)]
pub struct RawQuery {
    pub platform: Option<String>,
    pub tags: Option<String>,
    pub expectations: Option<String>,
    pub demand: Option<String>,
    pub keyword: Option<String>,
    pub sort: Option<String>,
    pub page: Option<u32>,
    pub size: Option<u32>,
}

/// Split on commas (ASCII or full-width) and whitespace.
fn split_terms(raw: Option<&str>) -> Vec<String> {
    raw.unwrap_or_default()
        .split(|c: char| c == ',' || c == '，' || c.is_whitespace())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

impl GameQuery {
    /// Lenient parse: unknown demand flags and sort keys are ignored and the
    /// page size is clamped into `1..=max_page_size`. An unknown platform
    /// filters everything out.
    pub fn parse(raw: &RawQuery, config: &QueryConfig) -> Self {
        let platform = PlatformFilter::parse(raw.platform.as_deref());
        // expectation groups are matched by name, which may contain spaces
        let expectations = raw
            .expectations
            .as_deref()
            .unwrap_or_default()
            .split([',', '，'])
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        let demand = split_terms(raw.demand.as_deref())
            .iter()
            .filter_map(|d| d.parse().ok())
            .collect();
        let keyword = raw
            .keyword
            .as_deref()
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty());
        let sort = raw
            .sort
            .as_deref()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default();
        let size = raw
            .size
            .unwrap_or(config.default_page_size)
            .clamp(1, config.max_page_size.max(1));

        GameQuery {
            platform,
            tags: split_terms(raw.tags.as_deref()),
            expectations,
            demand,
            keyword,
            sort,
            page: raw.page.unwrap_or(1).max(1),
            size,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Scored<'a> {
    pub game: &'a GameRecord,
    pub score: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryPage<'a> {
    pub items: Vec<Scored<'a>>,
    pub total: usize,
    pub page: u32,
    pub size: u32,
}

fn passes_filters(game: &GameRecord, text: &str, query: &GameQuery) -> bool {
    match query.platform {
        PlatformFilter::Any => {}
        PlatformFilter::Only(platform) if game.platforms.contains(&platform) => {}
        PlatformFilter::Only(_) | PlatformFilter::Unknown => return false,
    }
    if !query.tags.is_empty() && !query.tags.iter().any(|t| text.contains(t.as_str())) {
        return false;
    }
    if let Some(keyword) = &query.keyword {
        if !text.contains(keyword.as_str()) {
            return false;
        }
    }
    query.demand.iter().all(|d| d.matches(game))
}

/// Relevance of `game` for `query`; `text` is `game.search_text()`.
pub fn match_score(game: &GameRecord, text: &str, query: &GameQuery) -> u32 {
    let mut score = 0;
    if query.keyword.as_deref().is_some_and(|k| text.contains(k)) {
        score += KEYWORD_SCORE;
    }
    score += TAG_SCORE * query.tags.iter().filter(|t| text.contains(t.as_str())).count() as u32;
    for wanted in &query.expectations {
        let group = EXPECTATION_KEYWORDS
            .iter()
            .find(|(name, _)| name.to_lowercase() == *wanted);
        if let Some((_, keywords)) = group {
            if keywords.iter().any(|k| text.contains(k)) {
                score += EXPECTATION_SCORE;
            }
        }
    }
    if game.is_discounted() {
        score += DISCOUNT_SCORE;
    }
    score
}

/// Unknown prices sort after every known price in both directions.
fn cmp_price(a: Option<f64>, b: Option<f64>, ascending: bool) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) if ascending => a.total_cmp(&b),
        (Some(a), Some(b)) => b.total_cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn cmp_by_key(a: &GameRecord, b: &GameRecord, key: SortKey) -> Ordering {
    match key {
        SortKey::Rating => b.rating.total_cmp(&a.rating),
        SortKey::PriceAsc => cmp_price(a.effective_price(), b.effective_price(), true),
        SortKey::PriceDesc => cmp_price(a.effective_price(), b.effective_price(), false),
        SortKey::Dau => b.dau.cmp(&a.dau),
    }
}

/// Filter, score, sort and paginate `games`.
///
/// The requested sort key orders the result; match score breaks ties, then id.
pub fn run_query<'a>(games: &'a [GameRecord], query: &GameQuery) -> QueryPage<'a> {
    let mut hits: Vec<Scored<'a>> = games
        .iter()
        .filter_map(|game| {
            let text = game.search_text();
            passes_filters(game, &text, query).then(|| Scored {
                game,
                score: match_score(game, &text, query),
            })
        })
        .collect();

    hits.sort_by(|a, b| {
        cmp_by_key(a.game, b.game, query.sort)
            .then(b.score.cmp(&a.score))
            .then(a.game.id.cmp(&b.game.id))
    });

    let total = hits.len();
    let start = (query.page as usize)
        .saturating_sub(1)
        .saturating_mul(query.size as usize);
    let items = hits
        .into_iter()
        .skip(start)
        .take(query.size as usize)
        .collect();
    QueryPage {
        items,
        total,
        page: query.page,
        size: query.size,
    }
}

pub struct QueryService<'a> {
    pub repo: &'a dyn GameRepo,
    pub cache: &'a SnapshotCache,
    pub config: &'a QueryConfig,
}

impl<'a> QueryService<'a> {
    pub fn new(repo: &'a dyn GameRepo, cache: &'a SnapshotCache, config: &'a QueryConfig) -> Self {
        Self {
            repo,
            cache,
            config,
        }
    }

    /// Always answers 200; a store failure yields an empty page with code 1.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn search(&self, raw: RawQuery) -> GamesResponse {
        let query = GameQuery::parse(&raw, self.config);
        let games = match self.cache.get_or_load(self.repo).await {
            Ok(games) => games,
            Err(e) => {
                tracing::error!(error = %e, "failed to load games for query");
                return GamesResponse::Ok(Json(GamesBodyDto {
                    code: 1,
                    data: GamesPageDto {
                        items: Vec::new(),
                        total: 0,
                        page: query.page,
                        size: query.size,
                    },
                }));
            }
        };

        let page = run_query(&games, &query);
        tracing::debug!(total = page.total, returned = page.items.len(), "query answered");
        GamesResponse::Ok(Json(GamesBodyDto {
            code: 0,
            data: GamesPageDto {
                items: page
                    .items
                    .iter()
                    .map(|hit| GameDto::from_record(hit.game, hit.score))
                    .collect(),
                total: page.total as u64,
                page: page.page,
                size: page.size,
            },
        }))
    }
}
