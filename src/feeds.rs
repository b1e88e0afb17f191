//! Feed loading: market data (required), bid schedule and news (optional).
//!
//! Each feed is tried once on its primary path and once on a root-relative
//! fallback. The three feeds are fetched concurrently and initialization
//! waits for all of them.

use std::path::{Component, Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::bids::BidRecord;
use crate::market::{DecodedMarket, MarketDataset};
use crate::news::NewsItem;

pub const DEFAULT_HTTP_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("HTTP client build error: {0}")]
    HttpClientBuild(String),
    #[error("invalid feed base '{base}': {message}")]
    InvalidBase { base: String, message: String },
    #[error("HTTP request failed for {url}: {message}")]
    HttpRequest { url: String, message: String },
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{feed} feed could not be decoded: {message}")]
    Decode { feed: &'static str, message: String },
    #[error("{feed} feed unavailable (primary: {primary}; fallback: {fallback})")]
    Unavailable {
        feed: &'static str,
        primary: String,
        fallback: String,
    },
    #[error("{feed} feed worker panicked")]
    WorkerPanicked { feed: &'static str },
}

/// Byte source for feed locations relative to the dashboard page.
pub trait HttpFetcher: Send + Sync {
    fn get_bytes(&self, location: &str) -> Result<Vec<u8>, FeedError>;
}

pub struct ReqwestBlockingFetcher {
    client: reqwest::blocking::Client,
    page_url: reqwest::Url,
}

impl ReqwestBlockingFetcher {
    /// `page_url` is the dashboard page location that relative feed paths resolve against.
    pub fn new(page_url: &str, timeout_ms: u64) -> Result<Self, FeedError> {
        let page_url = reqwest::Url::parse(page_url).map_err(|err| FeedError::InvalidBase {
            base: page_url.to_string(),
            message: err.to_string(),
        })?;
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .map_err(|err| FeedError::HttpClientBuild(err.to_string()))?;
        Ok(Self { client, page_url })
    }
}

impl HttpFetcher for ReqwestBlockingFetcher {
    fn get_bytes(&self, location: &str) -> Result<Vec<u8>, FeedError> {
        let url = self
            .page_url
            .join(location)
            .map_err(|err| FeedError::HttpRequest {
                url: location.to_string(),
                message: err.to_string(),
            })?;

        let response = self
            .client
            .get(url.clone())
            .send()
            .map_err(|err| FeedError::HttpRequest {
                url: url.to_string(),
                message: err.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::HttpRequest {
                url: url.to_string(),
                message: format!("unexpected HTTP status {status}"),
            });
        }

        response
            .bytes()
            .map(|bytes| bytes.to_vec())
            .map_err(|err| FeedError::HttpRequest {
                url: url.to_string(),
                message: err.to_string(),
            })
    }
}

/// Serves feed locations from disk the way a static file server would.
///
/// Relative locations resolve against `page_dir`; root-relative ones against
/// its parent, the site root. Query strings are ignored.
#[derive(Debug, Clone)]
pub struct FsFetcher {
    page_dir: PathBuf,
}

impl FsFetcher {
    pub fn new(page_dir: impl Into<PathBuf>) -> Self {
        Self {
            page_dir: page_dir.into(),
        }
    }

    fn resolve(&self, location: &str) -> PathBuf {
        let path = location.split(['?', '#']).next().unwrap_or_default();
        let (mut resolved, relative) = match path.strip_prefix('/') {
            Some(rest) => (site_root(&self.page_dir), rest),
            None => (self.page_dir.clone(), path),
        };

        for component in Path::new(relative).components() {
            match component {
                Component::ParentDir => {
                    resolved.pop();
                }
                Component::Normal(part) => resolved.push(part),
                _ => {}
            }
        }
        resolved
    }
}

fn site_root(page_dir: &Path) -> PathBuf {
    page_dir
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| page_dir.to_path_buf())
}

impl HttpFetcher for FsFetcher {
    fn get_bytes(&self, location: &str) -> Result<Vec<u8>, FeedError> {
        let path = self.resolve(location);
        std::fs::read(&path).map_err(|source| FeedError::Read { path, source })
    }
}

/// `http(s)://` bases get the reqwest backend, anything else is a page directory on disk.
pub fn fetcher_for_base(base: &str, timeout_ms: u64) -> Result<Box<dyn HttpFetcher>, FeedError> {
    let trimmed = base.trim();
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        let page_url = if trimmed.ends_with('/') {
            trimmed.to_string()
        } else {
            format!("{trimmed}/")
        };
        Ok(Box::new(ReqwestBlockingFetcher::new(&page_url, timeout_ms)?))
    } else {
        Ok(Box::new(FsFetcher::new(trimmed)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedPath {
    pub primary: String,
    pub fallback: String,
}

impl FeedPath {
    fn for_file(file_name: &str) -> Self {
        Self {
            primary: format!("../data/{file_name}"),
            fallback: format!("/data/{file_name}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedPaths {
    pub market: FeedPath,
    pub bids: FeedPath,
    pub news: FeedPath,
}

impl Default for FeedPaths {
    fn default() -> Self {
        Self {
            market: FeedPath::for_file("katsuo_market_data.json"),
            bids: FeedPath::for_file("katsuo_bid_schedule.json"),
            news: FeedPath::for_file("katsuo_news.json"),
        }
    }
}

pub fn cache_busted(path: &str, stamp_ms: i64) -> String {
    let separator = if path.contains('?') { '&' } else { '?' };
    format!("{path}{separator}t={stamp_ms}")
}

/// Primary path, then exactly one attempt on the fallback path.
pub fn fetch_with_fallback(
    fetcher: &dyn HttpFetcher,
    feed: &'static str,
    path: &FeedPath,
    stamp_ms: i64,
) -> Result<Vec<u8>, FeedError> {
    let primary_err = match fetcher.get_bytes(&cache_busted(&path.primary, stamp_ms)) {
        Ok(bytes) => return Ok(bytes),
        Err(err) => err,
    };

    warn!(
        component = "feeds",
        event = "feed.fetch.fallback",
        feed,
        primary = %path.primary,
        fallback = %path.fallback,
        error = %primary_err
    );

    fetcher
        .get_bytes(&cache_busted(&path.fallback, stamp_ms))
        .map_err(|fallback_err| FeedError::Unavailable {
            feed,
            primary: primary_err.to_string(),
            fallback: fallback_err.to_string(),
        })
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadedFeeds {
    pub market: DecodedMarket,
    pub bids: Vec<BidRecord>,
    pub news: Vec<NewsItem>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    Ready(LoadedFeeds),
    Failed { reason: String },
}

impl LoadOutcome {
    /// User-facing text for the error state.
    pub fn error_message(&self) -> Option<String> {
        match self {
            Self::Ready(_) => None,
            Self::Failed { reason } => Some(load_failure_message(reason)),
        }
    }
}

pub fn load_failure_message(reason: &str) -> String {
    format!("データの読み込みに失敗しました。時間をおいて再読み込みしてください。（{reason}）")
}

fn load_market(
    fetcher: &dyn HttpFetcher,
    path: &FeedPath,
    stamp_ms: i64,
) -> Result<DecodedMarket, FeedError> {
    let bytes = fetch_with_fallback(fetcher, "market", path, stamp_ms)?;
    MarketDataset::from_json_slice(&bytes).map_err(|err| FeedError::Decode {
        feed: "market",
        message: err.to_string(),
    })
}

fn load_optional<T: DeserializeOwned>(
    fetcher: &dyn HttpFetcher,
    feed: &'static str,
    path: &FeedPath,
    stamp_ms: i64,
) -> Vec<T> {
    let decoded = fetch_with_fallback(fetcher, feed, path, stamp_ms).and_then(|bytes| {
        serde_json::from_slice::<Vec<T>>(&bytes).map_err(|err| FeedError::Decode {
            feed,
            message: err.to_string(),
        })
    });

    match decoded {
        Ok(items) => items,
        Err(err) => {
            warn!(
                component = "feeds",
                event = "feed.optional.unavailable",
                feed,
                error = %err
            );
            Vec::new()
        }
    }
}

/// Fetches all three feeds concurrently. Never panics and always returns.
pub fn load_feeds(fetcher: &dyn HttpFetcher, paths: &FeedPaths) -> LoadOutcome {
    let started = Instant::now();
    let stamp_ms = Utc::now().timestamp_millis();
    info!(component = "feeds", event = "feed.load.start", stamp_ms);

    // Workers log through the caller's subscriber, not the global one.
    let dispatch = tracing::dispatcher::get_default(|current| current.clone());
    let (market, bids, news) = std::thread::scope(|scope| {
        let market = scope.spawn(|| {
            tracing::dispatcher::with_default(&dispatch, || {
                load_market(fetcher, &paths.market, stamp_ms)
            })
        });
        let bids = scope.spawn(|| {
            tracing::dispatcher::with_default(&dispatch, || {
                load_optional::<BidRecord>(fetcher, "bids", &paths.bids, stamp_ms)
            })
        });
        let news = scope.spawn(|| {
            tracing::dispatcher::with_default(&dispatch, || {
                load_optional::<NewsItem>(fetcher, "news", &paths.news, stamp_ms)
            })
        });

        (
            market
                .join()
                .unwrap_or(Err(FeedError::WorkerPanicked { feed: "market" })),
            bids.join().unwrap_or_default(),
            news.join().unwrap_or_default(),
        )
    });

    let elapsed_ms = started.elapsed().as_millis() as u64;
    match market {
        Ok(market) => {
            info!(
                component = "feeds",
                event = "feed.load.finish",
                ports = market.dataset.port_names().count(),
                port_issues = market.issues.len(),
                bids = bids.len(),
                news = news.len(),
                elapsed_ms
            );
            LoadOutcome::Ready(LoadedFeeds { market, bids, news })
        }
        Err(err) => {
            error!(
                component = "feeds",
                event = "feed.load.failed",
                error = %err,
                elapsed_ms
            );
            LoadOutcome::Failed {
                reason: err.to_string(),
            }
        }
    }
}
