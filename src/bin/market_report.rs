//! Loads the feeds once and prints the dashboard view plus every insight
//! candidate as JSON.

use katsuo::{
    dashboard_config_from_env, fetcher_for_base, init_logging, load_feeds, log_app_start,
    logging_config_from_env, market_today, AppState, FeedPaths, RangeSelector, ViewOverrides,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let logging_cfg = logging_config_from_env();
    init_logging(&logging_cfg)?;
    log_app_start("market_report", &logging_cfg);
    let cfg = dashboard_config_from_env()?;

    let range = std::env::var("KATSUO_REPORT_RANGE")
        .map(|raw| RangeSelector::parse(&raw))
        .unwrap_or_default();

    let fetcher = fetcher_for_base(&cfg.data_base, cfg.http_timeout_ms)?;
    let outcome = load_feeds(fetcher.as_ref(), &FeedPaths::default());
    if let Some(message) = outcome.error_message() {
        return Err(message.into());
    }

    let state = AppState::from_outcome(outcome).with_moving_average(cfg.moving_average);
    let mut rng = rand::rng();
    let overrides = ViewOverrides {
        range: Some(range),
        ..ViewOverrides::default()
    };

    let report = serde_json::json!({
        "view": state.view(&overrides, market_today(), &mut rng),
        "insights": state.insights(&mut rng),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
