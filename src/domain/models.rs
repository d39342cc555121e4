// Canonical records shared by the sync pipeline, the store and the query API

use std::fmt;

use serde::{Deserialize, Serialize};

/// Platform tags a record can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Platform {
    #[serde(rename = "PC")]
    Pc,
    Mac,
    Linux,
    PlayStation,
    Xbox,
    Switch,
}

impl Platform {
    /// Used when upstream reports no platform at all.
    pub const FALLBACK: Platform = Platform::Pc;

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Pc => "PC",
            Platform::Mac => "Mac",
            Platform::Linux => "Linux",
            Platform::PlayStation => "PlayStation",
            Platform::Xbox => "Xbox",
            Platform::Switch => "Switch",
        }
    }

    /// Case-insensitive lookup; unknown labels yield `None`.
    pub fn parse(label: &str) -> Option<Platform> {
        match label.trim().to_ascii_lowercase().as_str() {
            "pc" | "windows" => Some(Platform::Pc),
            "mac" | "macos" => Some(Platform::Mac),
            "linux" => Some(Platform::Linux),
            "playstation" | "ps" | "ps5" | "ps4" => Some(Platform::PlayStation),
            "xbox" => Some(Platform::Xbox),
            "switch" => Some(Platform::Switch),
            _ => None,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the upstream catalog list. Only lives during a list fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntryRef {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameRecord {
    pub id: i64,
    pub title: String,
    pub platforms: Vec<Platform>,
    /// `None` means the price is unknown
    pub base_price: Option<f64>,
    /// 0.0 - 1.0 fraction
    pub discount: f64,
    /// 0 - 10, 0 meaning no rating
    pub rating: f64,
    pub dau: u64,
    pub tags: Vec<String>,
    pub cover: String,
    pub release_date: String,
    pub description: String,
    pub updated_at: i64,
}

impl GameRecord {
    /// Price after discount, or `None` when the base price is unknown.
    pub fn effective_price(&self) -> Option<f64> {
        self.base_price.map(|p| p * (1.0 - self.discount))
    }

    /// Lower-cased title and tags, the text every keyword match runs against.
    pub fn search_text(&self) -> String {
        format!("{} {}", self.title, self.tags.join(" ")).to_lowercase()
    }

    pub fn is_discounted(&self) -> bool {
        self.discount > 0.0
    }
}

/// Sync cursor persisted between runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProgressState {
    /// Items visited in the current descending sweep
    pub cursor_index: u64,
    /// Lowest fresh id visited in the current sweep
    pub cursor_id: Option<i64>,
    /// Highest upstream id when the current sweep started
    pub ceiling_id: Option<i64>,
    /// Lowest id visited in the current pass above the ceiling
    pub head_cursor_id: Option<i64>,
    /// Highest id of the current pass above the ceiling
    pub head_top_id: Option<i64>,
    pub total_count: u64,
    /// Epoch milliseconds
    pub last_run_at: i64,
}

impl ProgressState {
    pub fn sweep_in_progress(&self) -> bool {
        self.cursor_id.is_some() && self.ceiling_id.is_some()
    }
}
