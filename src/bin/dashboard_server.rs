use std::sync::{Arc, RwLock};

use katsuo::{
    dashboard_config_from_env, dashboard_router, fetcher_for_base, init_logging, load_feeds,
    log_app_bind, log_app_start, log_data_source, logging_config_from_env, AppState, FeedPaths,
    PreferenceStore,
};
use tracing::warn;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let logging_cfg = logging_config_from_env();
    init_logging(&logging_cfg)?;
    log_app_start("dashboard_server", &logging_cfg);

    let cfg = dashboard_config_from_env()?;

    let data_base = cfg.data_base.clone();
    let timeout_ms = cfg.http_timeout_ms;
    let outcome = tokio::task::spawn_blocking(move || {
        let fetcher = fetcher_for_base(&data_base, timeout_ms)?;
        Ok::<_, katsuo::FeedError>(load_feeds(fetcher.as_ref(), &FeedPaths::default()))
    })
    .await??;

    let mut state = AppState::from_outcome(outcome).with_moving_average(cfg.moving_average);
    match PreferenceStore::open(&cfg.prefs_path) {
        Ok(store) => {
            log_data_source(&cfg.data_base, Some(&cfg.prefs_path));
            state = state.with_preferences(Arc::new(store))?;
        }
        Err(err) => {
            warn!(
                component = "dashboard_server",
                event = "preferences.open.failed",
                path = %cfg.prefs_path.display(),
                error = %err
            );
            log_data_source(&cfg.data_base, None);
        }
    }

    let app = dashboard_router(Arc::new(RwLock::new(state)));
    let listener = tokio::net::TcpListener::bind(cfg.addr).await?;
    let bound_addr = listener.local_addr()?;

    log_app_bind(bound_addr);
    axum::serve(listener, app).await?;

    Ok(())
}
