//! Tracing setup for the katsuo binaries plus the lifecycle events they share.
//!
//! Every event carries `component` (the binary or module) and a dotted
//! `event` name so JSON output can be filtered without parsing messages.

use std::env;
use std::net::SocketAddr;
use std::path::Path;

use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

const LEVEL_VAR: &str = "KATSUO_LOG_LEVEL";
const FORMAT_VAR: &str = "KATSUO_LOG_FORMAT";
const TARGET_VAR: &str = "KATSUO_LOG_TARGET";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
    /// Single-line human output, handy for the CLI tools.
    Compact,
}

impl LogFormat {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "pretty" => Some(Self::Pretty),
            "compact" => Some(Self::Compact),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// `EnvFilter` directive string.
    pub level: String,
    pub format: LogFormat,
    pub include_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            include_target: true,
        }
    }
}

#[derive(Debug, Error)]
pub enum LoggingInitError {
    #[error("logging already initialized: {0}")]
    AlreadyInitialized(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Reads `KATSUO_LOG_*`; blank or unrecognised values keep the default.
pub fn logging_config_from_env() -> LoggingConfig {
    let defaults = LoggingConfig::default();
    let var = |name: &str| env::var(name).ok().filter(|raw| !raw.trim().is_empty());

    LoggingConfig {
        level: var(LEVEL_VAR)
            .map(|raw| raw.trim().to_string())
            .unwrap_or(defaults.level),
        format: var(FORMAT_VAR)
            .and_then(|raw| LogFormat::parse(&raw))
            .unwrap_or(defaults.format),
        include_target: var(TARGET_VAR)
            .and_then(|raw| parse_switch(&raw))
            .unwrap_or(defaults.include_target),
    }
}

pub fn init_logging(config: &LoggingConfig) -> Result<(), LoggingInitError> {
    let filter = EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.include_target)
        .with_ansi(config.format != LogFormat::Json);

    match config.format {
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish())?,
        LogFormat::Pretty => tracing::subscriber::set_global_default(builder.pretty().finish())?,
        LogFormat::Compact => tracing::subscriber::set_global_default(builder.compact().finish())?,
    }
    Ok(())
}

pub fn log_app_start(binary: &'static str, config: &LoggingConfig) {
    info!(
        component = binary,
        event = "app.start",
        version = env!("CARGO_PKG_VERSION"),
        log_level = %config.level,
        log_format = ?config.format
    );
}

pub fn log_app_bind(bound_addr: SocketAddr) {
    let page = format!("http://{bound_addr}/dashboard");
    info!(
        component = "dashboard_server",
        event = "app.bind",
        bind_addr = %bound_addr,
        page = %page
    );
}

/// Where feeds come from and whether preferences persist across restarts.
pub fn log_data_source(data_base: &str, prefs_path: Option<&Path>) {
    let backend = if data_base.starts_with("http://") || data_base.starts_with("https://") {
        "http"
    } else {
        "filesystem"
    };
    let prefs = prefs_path.map_or_else(|| "in-memory".to_string(), |p| p.display().to_string());
    info!(
        component = "dashboard_server",
        event = "data.source.selected",
        data_base,
        backend,
        prefs = %prefs
    );
}

fn parse_switch(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
