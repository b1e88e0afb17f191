use std::path::PathBuf;

use katsuo::{init_logging, log_app_start, logging_config_from_env, merge_news_file};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let logging_cfg = logging_config_from_env();
    init_logging(&logging_cfg)?;
    log_app_start("merge_news", &logging_cfg);

    let incoming = std::env::var("KATSUO_NEWS_INPUT")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("data/news_incoming.json"));
    let target = std::env::var("KATSUO_NEWS_OUTPUT")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("data/katsuo_news.json"));

    let report = merge_news_file(&target, &incoming)?;

    println!(
        "Merged {} into {}: {} stored, {} incoming, {} kept",
        incoming.display(),
        target.display(),
        report.stored_before,
        report.incoming,
        report.stored_after
    );
    Ok(())
}
