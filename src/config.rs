//! Environment-driven dashboard settings.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;
use tracing::warn;

use crate::feeds::DEFAULT_HTTP_TIMEOUT_MS;
use crate::moving_average::{MovingAverageConfig, MovingAveragePolicy};

pub const DEFAULT_DASHBOARD_ADDR: &str = "127.0.0.1:8000";
pub const DEFAULT_DATA_BASE: &str = "web";
pub const DEFAULT_PREFS_PATH: &str = "data/preferences.sqlite3";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardConfig {
    pub addr: SocketAddr,
    /// Dashboard page location: an `http(s)://` URL or a directory on disk.
    pub data_base: String,
    pub prefs_path: PathBuf,
    pub moving_average: MovingAverageConfig,
    pub http_timeout_ms: u64,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 8000)),
            data_base: DEFAULT_DATA_BASE.to_string(),
            prefs_path: PathBuf::from(DEFAULT_PREFS_PATH),
            moving_average: MovingAverageConfig::default(),
            http_timeout_ms: DEFAULT_HTTP_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid KATSUO_DASHBOARD_ADDR '{value}': {source}")]
    InvalidAddr {
        value: String,
        #[source]
        source: std::net::AddrParseError,
    },
}

/// The bind address must parse; every other setting falls back to its default.
pub fn dashboard_config_from_env() -> Result<DashboardConfig, ConfigError> {
    let mut config = DashboardConfig::default();

    if let Some(raw) = non_empty_var("KATSUO_DASHBOARD_ADDR") {
        config.addr = raw
            .parse()
            .map_err(|source| ConfigError::InvalidAddr { value: raw, source })?;
    }

    if let Some(base) = non_empty_var("KATSUO_DATA_BASE") {
        config.data_base = base;
    }

    if let Some(path) = non_empty_var("KATSUO_PREFS_PATH") {
        config.prefs_path = PathBuf::from(path);
    }

    if let Some(raw) = non_empty_var("KATSUO_MA_WINDOW") {
        match raw.parse::<usize>() {
            Ok(window) if window > 0 => config.moving_average.window = window,
            _ => ignored("KATSUO_MA_WINDOW", &raw),
        }
    }

    if let Some(raw) = non_empty_var("KATSUO_MA_POLICY") {
        match MovingAveragePolicy::parse(&raw) {
            Some(policy) => config.moving_average.policy = policy,
            None => ignored("KATSUO_MA_POLICY", &raw),
        }
    }

    if let Some(raw) = non_empty_var("KATSUO_HTTP_TIMEOUT_MS") {
        match raw.parse::<u64>() {
            Ok(timeout) if timeout > 0 => config.http_timeout_ms = timeout,
            _ => ignored("KATSUO_HTTP_TIMEOUT_MS", &raw),
        }
    }

    Ok(config)
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
}

fn ignored(key: &'static str, value: &str) {
    warn!(
        component = "config",
        event = "config.value.ignored",
        key,
        value
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::test_env::with_env_vars;

    const KEYS: [&str; 6] = [
        "KATSUO_DASHBOARD_ADDR",
        "KATSUO_DATA_BASE",
        "KATSUO_PREFS_PATH",
        "KATSUO_MA_WINDOW",
        "KATSUO_MA_POLICY",
        "KATSUO_HTTP_TIMEOUT_MS",
    ];

    fn unset_all() -> Vec<(&'static str, Option<&'static str>)> {
        KEYS.iter().map(|key| (*key, None)).collect()
    }

    #[test]
    fn defaults_when_env_missing() {
        let cfg = with_env_vars(&unset_all(), dashboard_config_from_env).unwrap();
        assert_eq!(cfg, DashboardConfig::default());
        assert_eq!(cfg.addr.to_string(), DEFAULT_DASHBOARD_ADDR);
    }

    #[test]
    fn parses_every_setting() {
        let cfg = with_env_vars(
            &[
                ("KATSUO_DASHBOARD_ADDR", Some("0.0.0.0:9000")),
                ("KATSUO_DATA_BASE", Some("https://example.invalid/web/")),
                ("KATSUO_PREFS_PATH", Some("/tmp/prefs.db")),
                ("KATSUO_MA_WINDOW", Some("7")),
                ("KATSUO_MA_POLICY", Some("trailing")),
                ("KATSUO_HTTP_TIMEOUT_MS", Some("2500")),
            ],
            dashboard_config_from_env,
        )
        .unwrap();

        assert_eq!(cfg.addr.port(), 9000);
        assert_eq!(cfg.data_base, "https://example.invalid/web/");
        assert_eq!(cfg.prefs_path, PathBuf::from("/tmp/prefs.db"));
        assert_eq!(cfg.moving_average.window, 7);
        assert_eq!(cfg.moving_average.policy, MovingAveragePolicy::TrailingPartial);
        assert_eq!(cfg.http_timeout_ms, 2500);
    }

    #[test]
    fn bad_numbers_fall_back_but_bad_addr_is_an_error() {
        let mut vars = unset_all();
        vars[3] = ("KATSUO_MA_WINDOW", Some("0"));
        vars[4] = ("KATSUO_MA_POLICY", Some("ema"));
        vars[5] = ("KATSUO_HTTP_TIMEOUT_MS", Some("soon"));
        let cfg = with_env_vars(&vars, dashboard_config_from_env).unwrap();
        assert_eq!(cfg.moving_average, MovingAverageConfig::default());
        assert_eq!(cfg.http_timeout_ms, DEFAULT_HTTP_TIMEOUT_MS);

        vars[0] = ("KATSUO_DASHBOARD_ADDR", Some("not-an-addr"));
        let err = with_env_vars(&vars, dashboard_config_from_env).unwrap_err();
        assert!(err.to_string().contains("not-an-addr"));
    }
}
