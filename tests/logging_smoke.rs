use std::io;
use std::io::Write;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::sync::{Arc, Mutex, RwLock};

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use katsuo::{
    dashboard_router, generate_candidates, load_feeds, log_app_bind, log_app_start,
    log_data_source, AppState, FeedError, FeedPaths, HttpFetcher, InsightConfig, LoadOutcome,
    LoadedFeeds, LoggingConfig, MarketDataset, PreferenceStore,
};
use tower::util::ServiceExt;
use tracing::dispatcher::with_default;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriter;

#[derive(Clone, Default)]
struct SharedWriter {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl SharedWriter {
    fn output_string(&self) -> String {
        let bytes = self
            .inner
            .lock()
            .expect("writer lock should not be poisoned");
        String::from_utf8_lossy(&bytes).to_string()
    }
}

struct SharedWriterGuard {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl<'a> MakeWriter<'a> for SharedWriter {
    type Writer = SharedWriterGuard;

    fn make_writer(&'a self) -> Self::Writer {
        SharedWriterGuard {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Write for SharedWriterGuard {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut out = self
            .inner
            .lock()
            .expect("writer lock should not be poisoned");
        out.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn capture_logs(max_level: Level, f: impl FnOnce()) -> String {
    let writer = SharedWriter::default();
    let subscriber = tracing_subscriber::fmt()
        .json()
        .with_ansi(false)
        .with_max_level(max_level)
        .with_writer(writer.clone())
        .finish();
    let dispatch = tracing::Dispatch::new(subscriber);

    with_default(&dispatch, f);
    writer.output_string()
}

struct UnreachableFetcher;

impl HttpFetcher for UnreachableFetcher {
    fn get_bytes(&self, location: &str) -> Result<Vec<u8>, FeedError> {
        Err(FeedError::HttpRequest {
            url: location.to_string(),
            message: "simulated outage".to_string(),
        })
    }
}

const MARKET: &str = r#"{
    "枕崎": {"4.5kg上": [
        {"date": "2025-05-01", "price": 300, "volume": 10},
        {"date": "2025-05-02", "price": 330, "volume": 12}
    ]},
    "山川": 42
}"#;

#[test]
fn feed_outage_logs_fallback_and_failure() {
    let logs = capture_logs(Level::INFO, || {
        let outcome = load_feeds(&UnreachableFetcher, &FeedPaths::default());
        assert!(matches!(outcome, LoadOutcome::Failed { .. }));
    });

    assert!(logs.contains("\"event\":\"feed.load.start\""));
    assert!(logs.contains("\"event\":\"feed.fetch.fallback\""));
    assert!(logs.contains("\"event\":\"feed.optional.unavailable\""));
    assert!(logs.contains("\"event\":\"feed.load.failed\""));
}

#[test]
fn malformed_port_logs_decode_failure() {
    let logs = capture_logs(Level::INFO, || {
        let decoded = MarketDataset::from_json_slice(MARKET.as_bytes()).unwrap();
        assert_eq!(decoded.issues.len(), 1);
    });

    assert!(logs.contains("\"event\":\"market.port.decode_failed\""));
    assert!(logs.contains("山川"));
}

#[test]
fn insight_generation_logs_at_debug() {
    let logs = capture_logs(Level::DEBUG, || {
        let decoded = MarketDataset::from_json_slice(MARKET.as_bytes()).unwrap();
        let candidates = generate_candidates(&decoded.dataset, &InsightConfig::default());
        assert_eq!(candidates.len(), 1);
    });

    assert!(logs.contains("\"event\":\"insights.generated\""));
    assert!(logs.contains("\"candidate_count\":1"));
}

#[test]
fn corrupt_preference_logs_warning() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("prefs.sqlite3");
    {
        let store = PreferenceStore::open(&path).unwrap();
        store.set_enabled_ports(&["枕崎".to_string()]).unwrap();
    }
    let conn = rusqlite::Connection::open(&path).unwrap();
    conn.execute(
        "UPDATE preferences SET value = '[broken' WHERE key = 'enabled_ports'",
        [],
    )
    .unwrap();
    drop(conn);

    let logs = capture_logs(Level::INFO, || {
        let store = PreferenceStore::open(&path).unwrap();
        assert_eq!(store.enabled_ports().unwrap(), None);
    });

    assert!(logs.contains("\"event\":\"preferences.value.corrupt\""));
}

#[test]
fn server_lifecycle_helpers_emit_baseline_events() {
    let logs = capture_logs(Level::INFO, || {
        let cfg = LoggingConfig::default();
        log_app_start("dashboard_server", &cfg);
        log_data_source("web", Some(Path::new("data/preferences.sqlite3")));
        log_app_bind(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 8000));
    });

    assert!(logs.contains("\"event\":\"app.start\""));
    assert!(logs.contains("\"event\":\"data.source.selected\""));
    assert!(logs.contains("\"backend\":\"filesystem\""));
    assert!(logs.contains("\"event\":\"app.bind\""));
}

#[test]
fn view_route_emits_http_view_event() {
    let logs = capture_logs(Level::INFO, || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("single-thread runtime should build");

        rt.block_on(async {
            let decoded = MarketDataset::from_json_slice(MARKET.as_bytes()).unwrap();
            let state = AppState::ready(LoadedFeeds {
                market: decoded,
                ..LoadedFeeds::default()
            });
            let app = dashboard_router(Arc::new(RwLock::new(state)));

            let response = app
                .oneshot(
                    Request::builder()
                        .uri("/dashboard/view")
                        .body(Body::empty())
                        .expect("request should build"),
                )
                .await
                .expect("view request should succeed");

            assert_eq!(response.status(), StatusCode::OK);
        });
    });

    assert!(logs.contains("\"event\":\"http.view.request\""));
}
