// Rate-limited client for the Steam catalog list and appdetails endpoints

use std::{collections::HashMap, time::Duration};

use reqwest::{StatusCode, header::RETRY_AFTER};
use serde::{Deserialize, de::DeserializeOwned};

use crate::{config::SteamConfig, domain::models::CatalogEntryRef, error::FetchError};

/// Which catalog list endpoint to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListSource {
    Primary,
    Fallback,
}

/// Upstream catalog as seen by the sync orchestrator.
#[async_trait::async_trait]
pub trait CatalogSource: Send + Sync {
    async fn fetch_app_list(&self, source: ListSource) -> Result<Vec<CatalogEntryRef>, FetchError>;

    /// `Ok(None)` when the response carries no entry for `app_id`.
    async fn fetch_app_details(&self, app_id: i64)
    -> Result<Option<AppDetailsEnvelope>, FetchError>;
}

#[derive(Clone, Debug)]
pub struct SteamClient {
    config: SteamConfig,
    client: reqwest::Client,
}

enum Attempt<T> {
    Done(T),
    RateLimited(Option<Duration>),
}

impl SteamClient {
    pub fn new(config: SteamConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(config.user_agent.clone())
            .build()?;
        tracing::debug!(api_base = %config.api_base, region = %config.region, "creating SteamClient");
        Ok(SteamClient { config, client })
    }

    fn api_url(&self, path: &str) -> String {
        let base = self.config.api_base.trim_end_matches('/');
        if path.starts_with('/') {
            format!("{}{}", base, path)
        } else {
            format!("{}/{}", base, path)
        }
    }

    /// Detail endpoint URL for one app in the configured region and locale.
    pub fn details_url(&self, app_id: i64) -> String {
        format!(
            "{}?appids={}&cc={}&l={}",
            self.api_url("/appdetails"),
            app_id,
            self.config.region,
            self.config.locale
        )
    }

    fn list_url(&self, source: ListSource) -> &str {
        match source {
            ListSource::Primary => &self.config.applist_url,
            ListSource::Fallback => &self.config.applist_fallback_url,
        }
    }

    async fn get_once<T: DeserializeOwned>(&self, url: &str) -> Result<Attempt<T>, FetchError> {
        let resp = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| FetchError::network(e.to_string()))?;

        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = resp
                .headers()
                .get(RETRY_AFTER)
                .and_then(|h| h.to_str().ok())
                .and_then(|s| s.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            return Ok(Attempt::RateLimited(retry_after));
        }
        if status != StatusCode::OK {
            return Err(FetchError::HttpStatus {
                code: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = resp
            .text()
            .await
            .map_err(|e| FetchError::network(e.to_string()))?;
        match serde_json::from_str::<T>(&body) {
            Ok(parsed) => Ok(Attempt::Done(parsed)),
            Err(e) => {
                let snippet_len = body.len().min(500);
                let snippet = body.get(..snippet_len).unwrap_or_default();
                tracing::debug!(error = %e, %url, body_snippet = %snippet, "failed to parse response");
                Err(e.into())
            }
        }
    }

    /// GET `url` and decode JSON, backing off on HTTP 429.
    ///
    /// Waits the configured cooldown (or a longer `Retry-After`) and retries up
    /// to `rate_limit_max_retries` times. Any other failure is returned at once.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn fetch_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, FetchError> {
        let mut retries = 0u32;
        loop {
            match self.get_once::<T>(url).await? {
                Attempt::Done(parsed) => return Ok(parsed),
                Attempt::RateLimited(retry_after) => {
                    if retries >= self.config.rate_limit_max_retries {
                        return Err(FetchError::RateLimited {
                            attempts: retries + 1,
                        });
                    }
                    let wait = cooldown(self.config.rate_limit_cooldown, retry_after);
                    retries += 1;
                    tracing::warn!(
                        %url,
                        wait_secs = wait.as_secs(),
                        retry = retries,
                        max_retries = self.config.rate_limit_max_retries,
                        "rate limited, backing off"
                    );
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }
}

fn cooldown(configured: Duration, retry_after: Option<Duration>) -> Duration {
    match retry_after {
        Some(ra) if ra > configured => ra,
        _ => configured,
    }
}

#[async_trait::async_trait]
impl CatalogSource for SteamClient {
    #[tracing::instrument(level = "debug", skip(self))]
    async fn fetch_app_list(&self, source: ListSource) -> Result<Vec<CatalogEntryRef>, FetchError> {
        let url = self.list_url(source).to_string();
        tracing::debug!(%url, ?source, "GET app list");
        let parsed: AppListResponse = self.fetch_json(&url).await?;
        Ok(parsed.into_entries())
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn fetch_app_details(
        &self,
        app_id: i64,
    ) -> Result<Option<AppDetailsEnvelope>, FetchError> {
        let url = self.details_url(app_id);
        let mut parsed: HashMap<String, AppDetailsEnvelope> = self.fetch_json(&url).await?;
        Ok(parsed.remove(&app_id.to_string()))
    }
}

// ============ App list ============

#[derive(Debug, Deserialize, PartialEq)]
pub struct AppListResponse {
    pub applist: AppList,
}

#[derive(Debug, Deserialize, PartialEq)]
pub struct AppList {
    pub apps: Vec<AppListEntry>,
}

#[derive(Debug, Deserialize, PartialEq)]
pub struct AppListEntry {
    pub appid: i64,
    #[serde(default, deserialize_with = "crate::steam_client::de::string_or_number")]
    pub name: String,
}

impl AppListResponse {
    /// Drops non-positive ids, which the list uses for placeholders.
    pub fn into_entries(self) -> Vec<CatalogEntryRef> {
        self.applist
            .apps
            .into_iter()
            .filter(|a| a.appid > 0)
            .map(|a| CatalogEntryRef {
                id: a.appid,
                name: a.name,
            })
            .collect()
    }
}

// ============ App details ============

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct AppDetailsEnvelope {
    pub success: bool,
    #[serde(default, deserialize_with = "crate::steam_client::de::object_or_none")]
    pub data: Option<AppDetails>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct AppDetails {
    #[serde(rename = "type")]
    pub app_type: Option<String>,
    pub name: Option<String>,
    pub steam_appid: Option<i64>,
    #[serde(default)]
    pub is_free: bool,
    pub short_description: Option<String>,
    pub header_image: Option<String>,
    pub platforms: Option<PlatformFlags>,
    pub price_overview: Option<PriceOverview>,
    pub metacritic: Option<Metacritic>,
    #[serde(default)]
    pub genres: Vec<Description>,
    #[serde(default)]
    pub categories: Vec<Description>,
    pub release_date: Option<ReleaseDate>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq)]
pub struct PlatformFlags {
    #[serde(default)]
    pub windows: bool,
    #[serde(default)]
    pub mac: bool,
    #[serde(default)]
    pub linux: bool,
}

/// Prices are in currency minor units.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct PriceOverview {
    pub currency: Option<String>,
    pub initial: Option<f64>,
    #[serde(rename = "final")]
    pub final_price: Option<f64>,
    pub discount_percent: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct Metacritic {
    /// 0 - 100
    pub score: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct Description {
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ReleaseDate {
    #[serde(default)]
    pub coming_soon: bool,
    pub date: Option<String>,
}

/// Internal serde helpers
pub mod de {
    use serde::{Deserialize, Deserializer, de::DeserializeOwned};

    /// Accept a name given as a string or a bare number; null -> "".
    pub fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum NumOrStr {
            Num(i64),
            Str(String),
        }

        let val: Option<NumOrStr> = Option::deserialize(deserializer)?;
        Ok(match val {
            None => String::new(),
            Some(NumOrStr::Num(n)) => n.to_string(),
            Some(NumOrStr::Str(s)) => s,
        })
    }

    /// Steam sends `"data": []` for apps without a payload; treat anything that
    /// is not an object as absent.
    pub fn object_or_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        let val = serde_json::Value::deserialize(deserializer)?;
        if !val.is_object() {
            return Ok(None);
        }
        serde_json::from_value(val)
            .map(Some)
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use super::*;

    fn client() -> SteamClient {
        let config = SteamConfig {
            api_base: "https://store.example.test/api/".into(),
            ..SteamConfig::default()
        };
        SteamClient::new(config).unwrap()
    }

    #[test]
    fn build_details_url_with_region_and_locale() {
        assert_eq!(
            client().details_url(570),
            "https://store.example.test/api/appdetails?appids=570&cc=cn&l=schinese"
        );
    }

    #[test]
    fn list_url_follows_source() {
        let c = client();
        assert!(c.list_url(ListSource::Primary).contains("GetAppList"));
        assert!(c.list_url(ListSource::Fallback).contains("steamcmd_appid.json"));
    }

    #[test]
    fn retry_after_only_extends_cooldown() {
        let base = Duration::from_secs(60);
        assert_eq!(cooldown(base, None), base);
        assert_eq!(cooldown(base, Some(Duration::from_secs(5))), base);
        assert_eq!(
            cooldown(base, Some(Duration::from_secs(120))),
            Duration::from_secs(120)
        );
    }

    #[test]
    fn app_list_deserialize_and_filter() {
        let json = r#"{ "applist": { "apps": [
            { "appid": 10, "name": "Counter-Strike" },
            { "appid": 0, "name": "placeholder" },
            { "appid": 20, "name": 1942 },
            { "appid": 30 }
        ] } }"#;
        let parsed: AppListResponse = serde_json::from_str(json).unwrap();
        let entries = parsed.into_entries();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].name, "Counter-Strike");
        assert_eq!(entries[1].name, "1942");
        assert_eq!(entries[2].name, "");
    }

    #[test]
    fn app_details_deserialize_example() {
        let json = r#"{
            "620": {
                "success": true,
                "data": {
                    "type": "game",
                    "name": "Portal 2",
                    "steam_appid": 620,
                    "is_free": false,
                    "short_description": "The sequel.",
                    "header_image": "https://cdn.example.test/620/header.jpg",
                    "platforms": { "windows": true, "mac": true, "linux": true },
                    "price_overview": { "currency": "CNY", "initial": 5999, "final": 2999, "discount_percent": 50 },
                    "metacritic": { "score": 95, "url": "https://www.metacritic.com/game/pc/portal-2" },
                    "genres": [{ "id": "1", "description": "Action" }, { "id": "25", "description": "Adventure" }],
                    "categories": [{ "id": 2, "description": "Single-player" }, { "id": 9, "description": "Co-op" }],
                    "release_date": { "coming_soon": false, "date": "2011-04-18" }
                }
            }
        }"#;
        let mut parsed: HashMap<String, AppDetailsEnvelope> = serde_json::from_str(json).unwrap();
        let env = parsed.remove("620").unwrap();
        assert!(env.success);
        let data = env.data.unwrap();
        assert_eq!(data.app_type.as_deref(), Some("game"));
        assert_eq!(data.price_overview.unwrap().initial, Some(5999.0));
        assert_eq!(data.genres.len(), 2);
        assert_eq!(data.release_date.unwrap().date.as_deref(), Some("2011-04-18"));
    }

    #[test]
    fn unsuccessful_envelope_without_data() {
        let json = r#"{ "20": { "success": false } }"#;
        let parsed: HashMap<String, AppDetailsEnvelope> = serde_json::from_str(json).unwrap();
        assert_eq!(
            parsed.get("20"),
            Some(&AppDetailsEnvelope {
                success: false,
                data: None
            })
        );
    }

    #[test]
    fn empty_array_data_is_absent() {
        let json = r#"{ "success": true, "data": [] }"#;
        let env: AppDetailsEnvelope = serde_json::from_str(json).unwrap();
        assert!(env.success);
        assert!(env.data.is_none());
    }

    /// Serve the same canned HTTP response on a local port, counting requests.
    async fn canned_server(status: &str, body: &'static str) -> (String, Arc<AtomicUsize>) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        let counter = hits.clone();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                counter.fetch_add(1, Ordering::SeqCst);
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });
        (format!("http://{addr}/api/appdetails?appids=10"), hits)
    }

    fn local_client(max_retries: u32) -> SteamClient {
        SteamClient {
            config: SteamConfig {
                rate_limit_cooldown: Duration::ZERO,
                rate_limit_max_retries: max_retries,
                ..SteamConfig::default()
            },
            client: reqwest::Client::builder().no_proxy().build().unwrap(),
        }
    }

    #[tokio::test]
    async fn persistent_429_gives_up_after_max_retries() {
        let (url, hits) = canned_server("429 Too Many Requests", "").await;
        let err = local_client(2)
            .fetch_json::<serde_json::Value>(&url)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::RateLimited { attempts: 3 }));
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn server_error_is_not_retried() {
        let (url, hits) = canned_server("500 Internal Server Error", "{}").await;
        let err = local_client(2)
            .fetch_json::<serde_json::Value>(&url)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::HttpStatus { code: 500, .. }));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn malformed_body_is_a_parse_error_without_retry() {
        let (url, hits) = canned_server("200 OK", "{\"10\": ").await;
        let err = local_client(2)
            .fetch_json::<serde_json::Value>(&url)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Parse { .. }));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
