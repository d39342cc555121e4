use std::{str::FromStr, time::Duration};

use anyhow::Context;

#[derive(Debug, Clone)]
pub struct Config {
    pub db_connection_string: String,
    pub steam: SteamConfig,
    pub sync: SyncConfig,
    pub query: QueryConfig,
    pub bind_addr: String,
}

/// Upstream endpoints and HTTP behaviour of the fetch client.
#[derive(Debug, Clone)]
pub struct SteamConfig {
    pub applist_url: String,
    pub applist_fallback_url: String,
    pub api_base: String,
    pub region: String,
    pub locale: String,
    pub user_agent: String,
    pub request_timeout: Duration,
    pub rate_limit_cooldown: Duration,
    pub rate_limit_max_retries: u32,
}

#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub batch_size: usize,
    pub delay: Duration,
    pub max_runtime: Duration,
    pub freshness_window: Duration,
}

#[derive(Debug, Clone)]
pub struct QueryConfig {
    pub default_page_size: u32,
    pub max_page_size: u32,
    pub cache_ttl: Duration,
}

const DEFAULT_DB_CONNECTION_STRING: &str = "sqlite://steam_games.sqlite?mode=rwc";
const DEFAULT_APPLIST_URL: &str = "https://api.steampowered.com/ISteamApps/GetAppList/v2/";
const DEFAULT_APPLIST_FALLBACK_URL: &str =
    "https://raw.githubusercontent.com/dgibbs64/SteamCMD-AppID-List/master/steamcmd_appid.json";
const DEFAULT_API_BASE: &str = "https://store.steampowered.com/api";
const DEFAULT_REGION: &str = "cn";
const DEFAULT_LOCALE: &str = "schinese";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

const MAX_BATCH_SIZE: usize = 10;

impl Default for SteamConfig {
    fn default() -> Self {
        SteamConfig {
            applist_url: DEFAULT_APPLIST_URL.into(),
            applist_fallback_url: DEFAULT_APPLIST_FALLBACK_URL.into(),
            api_base: DEFAULT_API_BASE.into(),
            region: DEFAULT_REGION.into(),
            locale: DEFAULT_LOCALE.into(),
            user_agent: format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
            request_timeout: Duration::from_secs(10),
            rate_limit_cooldown: Duration::from_secs(60),
            rate_limit_max_retries: 5,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            batch_size: 5,
            delay: Duration::from_millis(1500),
            max_runtime: Duration::from_secs(20 * 60),
            freshness_window: Duration::from_secs(24 * 60 * 60),
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        QueryConfig {
            default_page_size: 24,
            max_page_size: 100,
            cache_ttl: Duration::from_secs(30),
        }
    }
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let steam_defaults = SteamConfig::default();
        let sync_defaults = SyncConfig::default();
        let query_defaults = QueryConfig::default();

        let steam = SteamConfig {
            applist_url: env_or("STEAM_APPLIST_URL", steam_defaults.applist_url),
            applist_fallback_url: env_or(
                "STEAM_APPLIST_FALLBACK_URL",
                steam_defaults.applist_fallback_url,
            ),
            api_base: env_or("STEAM_API_BASE", steam_defaults.api_base),
            region: env_or("STEAM_REGION", steam_defaults.region),
            locale: env_or("STEAM_LOCALE", steam_defaults.locale),
            user_agent: env_or("USER_AGENT", steam_defaults.user_agent),
            request_timeout: Duration::from_secs(env_parse(
                "REQUEST_TIMEOUT_SECS",
                steam_defaults.request_timeout.as_secs(),
            )?),
            rate_limit_cooldown: Duration::from_secs(env_parse(
                "RATE_LIMIT_COOLDOWN_SECS",
                steam_defaults.rate_limit_cooldown.as_secs(),
            )?),
            rate_limit_max_retries: env_parse(
                "RATE_LIMIT_MAX_RETRIES",
                steam_defaults.rate_limit_max_retries,
            )?,
        };

        let sync = SyncConfig {
            batch_size: env_parse("SYNC_BATCH_SIZE", sync_defaults.batch_size)?,
            delay: Duration::from_millis(env_parse(
                "SYNC_DELAY_MS",
                sync_defaults.delay.as_millis() as u64,
            )?),
            max_runtime: Duration::from_secs(env_parse(
                "MAX_RUNTIME_SECS",
                sync_defaults.max_runtime.as_secs(),
            )?),
            freshness_window: Duration::from_secs(env_parse(
                "FRESHNESS_WINDOW_SECS",
                sync_defaults.freshness_window.as_secs(),
            )?),
        };

        let query = QueryConfig {
            default_page_size: env_parse(
                "QUERY_DEFAULT_PAGE_SIZE",
                query_defaults.default_page_size,
            )?,
            max_page_size: env_parse("QUERY_MAX_PAGE_SIZE", query_defaults.max_page_size)?,
            cache_ttl: Duration::from_secs(env_parse(
                "QUERY_CACHE_TTL_SECS",
                query_defaults.cache_ttl.as_secs(),
            )?),
        };

        Ok(Config {
            db_connection_string: env_or("DB_CONNECTION_STRING", DEFAULT_DB_CONNECTION_STRING.into()),
            steam,
            sync,
            query,
            bind_addr: env_or("BIND_ADDR", DEFAULT_BIND_ADDR.into()),
        })
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.db_connection_string.is_empty() {
            return Err("DB_CONNECTION_STRING is missing".into());
        }
        if self.steam.applist_url.is_empty() || self.steam.api_base.is_empty() {
            return Err("STEAM_APPLIST_URL and STEAM_API_BASE must be set".into());
        }
        if self.sync.batch_size == 0 || self.sync.batch_size > MAX_BATCH_SIZE {
            return Err(format!(
                "SYNC_BATCH_SIZE must be between 1 and {MAX_BATCH_SIZE}"
            ));
        }
        if self.sync.max_runtime.is_zero() {
            return Err("MAX_RUNTIME_SECS must be positive".into());
        }
        if self.query.max_page_size == 0 {
            return Err("QUERY_MAX_PAGE_SIZE must be positive".into());
        }
        if self.query.default_page_size == 0
            || self.query.default_page_size > self.query.max_page_size
        {
            return Err("QUERY_DEFAULT_PAGE_SIZE must be between 1 and QUERY_MAX_PAGE_SIZE".into());
        }
        Ok(())
    }
}

fn env_or(key: &str, default: String) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or(default)
}

fn env_parse<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Invalid {}: {}", key, raw)),
        _ => Ok(default),
    }
}
