// Mapping from Steam appdetails DTOs to canonical game records

use super::models::{GameRecord, Platform};
use crate::{
    error::SyncError,
    steam_client::{AppDetails, AppDetailsEnvelope, PriceOverview},
};

/// Highest plausible base price in major currency units.
pub const PRICE_CEILING: f64 = 10_000.0;

/// Categories copied into the tag set alongside genres.
const RELEVANT_CATEGORIES: [&str; 5] = ["Single-player", "Multi-player", "Co-op", "PvP", "Online PvP"];

/// Keyword lists per inferred category. A category is added when any keyword
/// is a substring of the lower-cased title and tags.
pub const TAG_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "Horror",
        &["horror", "zombie", "scary", "ghost", "undead", "survival horror", "vampire", "gore"],
    ),
    ("Racing", &["racing", "drift", "driver", "kart", "speed", "moto", "car"]),
    (
        "Sports",
        &["sport", "soccer", "football", "basketball", "hockey", "tennis", "golf", "manager", "skate"],
    ),
    (
        "Simulation",
        &["simulation", "simulator", "sim", "flight", "train", "bus", "farm"],
    ),
    (
        "Strategy",
        &["strategy", "rts", "tbs", "tower defense", "card", "turn-based", "grand strategy"],
    ),
    ("RPG", &["rpg", "role-playing", "role playing", "jrpg", "dungeon"]),
    (
        "Action",
        &["action", "shooter", "fps", "fight", "combat", "hack and slash", "battle"],
    ),
    (
        "Adventure",
        &["adventure", "quest", "exploration", "puzzle", "visual novel"],
    ),
    (
        "Casual",
        &["casual", "puzzle", "hidden object", "match 3", "card", "board"],
    ),
];

/// Map one appdetails entry into a `GameRecord`.
///
/// Returns `None` when the entry is absent, unsuccessful, carries no data, or
/// is not of type "game" (DLC, software, hardware, ...). The result does not
/// depend on the clock: `updated_at` is left at 0 and stamped on upsert.
pub fn normalize(app_id: i64, entry: Option<&AppDetailsEnvelope>) -> Option<GameRecord> {
    let entry = entry?;
    if !entry.success {
        return None;
    }
    let data = entry.data.as_ref()?;
    if data.app_type.as_deref() != Some("game") {
        return None;
    }

    let title = data
        .name
        .as_deref()
        .map(str::trim)
        .unwrap_or_default()
        .to_string();
    let (base_price, discount) = map_price(data);
    let tags = infer_tags(&title, &collect_tags(data));

    Some(GameRecord {
        id: app_id,
        title,
        platforms: map_platforms(data),
        base_price,
        discount,
        rating: map_rating(data),
        dau: 0,
        tags,
        cover: data.header_image.clone().unwrap_or_default(),
        release_date: data
            .release_date
            .as_ref()
            .and_then(|r| r.date.clone())
            .unwrap_or_default(),
        description: data.short_description.clone().unwrap_or_default(),
        updated_at: 0,
    })
}

fn map_platforms(data: &AppDetails) -> Vec<Platform> {
    let flags = data.platforms.unwrap_or_default();
    let mut platforms = Vec::with_capacity(3);
    if flags.windows {
        platforms.push(Platform::Pc);
    }
    if flags.mac {
        platforms.push(Platform::Mac);
    }
    if flags.linux {
        platforms.push(Platform::Linux);
    }
    if platforms.is_empty() {
        platforms.push(Platform::FALLBACK);
    }
    platforms
}

fn map_price(data: &AppDetails) -> (Option<f64>, f64) {
    if data.is_free {
        return (Some(0.0), 0.0);
    }
    match &data.price_overview {
        Some(PriceOverview {
            initial,
            discount_percent,
            ..
        }) => {
            let base = initial.and_then(|minor| sanitize_price(minor / 100.0));
            (base, normalize_discount(*discount_percent))
        }
        None => (None, 0.0),
    }
}

/// Clamp a major-unit price into `[0, PRICE_CEILING]`.
///
/// Values above the ceiling are assumed to be in the wrong unit: multiples of
/// 1000 are scaled down, anything else becomes unknown.
pub fn sanitize_price(value: f64) -> Option<f64> {
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    let value = if value > PRICE_CEILING {
        if value.fract() == 0.0 && value % 1000.0 == 0.0 {
            value / 1000.0
        } else {
            return None;
        }
    } else {
        value
    };
    (value <= PRICE_CEILING).then(|| round2(value))
}

/// Percent (0 - 100) to fraction; anything out of range becomes 0.
pub fn normalize_discount(percent: Option<f64>) -> f64 {
    let Some(percent) = percent else {
        return 0.0;
    };
    let fraction = percent / 100.0;
    if !fraction.is_finite() || !(0.0..=1.0).contains(&fraction) {
        return 0.0;
    }
    round2(fraction)
}

fn map_rating(data: &AppDetails) -> f64 {
    data.metacritic
        .as_ref()
        .and_then(|m| m.score)
        .filter(|s| s.is_finite() && *s > 0.0 && *s <= 100.0)
        .map(|s| s / 10.0)
        .unwrap_or(0.0)
}

fn collect_tags(data: &AppDetails) -> Vec<String> {
    let genres = data.genres.iter().filter_map(|g| g.description.as_deref());
    let categories = data
        .categories
        .iter()
        .filter_map(|c| c.description.as_deref())
        .filter(|c| RELEVANT_CATEGORIES.contains(c));

    let mut tags: Vec<String> = Vec::new();
    for tag in genres.chain(categories).map(str::trim) {
        if !tag.is_empty() && !tags.iter().any(|t| t == tag) {
            tags.push(tag.to_string());
        }
    }
    tags
}

/// Add every keyword category matching `title` and `tags`.
///
/// Runs to a fixed point, so feeding the output back in yields the same set.
pub fn infer_tags(title: &str, tags: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        if !out.contains(tag) {
            out.push(tag.clone());
        }
    }
    loop {
        let text = format!("{} {}", title, out.join(" ")).to_lowercase();
        let added: Vec<&str> = TAG_KEYWORDS
            .iter()
            .filter(|(category, _)| !out.iter().any(|t| t.as_str() == *category))
            .filter(|(_, keywords)| keywords.iter().any(|k| text.contains(k)))
            .map(|(category, _)| *category)
            .collect();
        if added.is_empty() {
            return out;
        }
        out.extend(added.into_iter().map(String::from));
    }
}

pub fn has_valid_price(record: &GameRecord) -> bool {
    record
        .base_price
        .is_some_and(|p| p.is_finite() && (0.0..=PRICE_CEILING).contains(&p))
}

/// Check the invariants a stored record must hold.
pub fn validate(record: &GameRecord) -> Result<(), SyncError> {
    if record.id <= 0 {
        return Err(SyncError::validation(record.id, "id must be positive"));
    }
    if record.platforms.is_empty() {
        return Err(SyncError::validation(record.id, "no platforms"));
    }
    if record.base_price.is_some() && !has_valid_price(record) {
        return Err(SyncError::validation(record.id, "base price out of range"));
    }
    if !record.discount.is_finite() || !(0.0..=1.0).contains(&record.discount) {
        return Err(SyncError::validation(record.id, "discount out of range"));
    }
    if !record.rating.is_finite() || !(0.0..=10.0).contains(&record.rating) {
        return Err(SyncError::validation(record.id, "rating out of range"));
    }
    Ok(())
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
