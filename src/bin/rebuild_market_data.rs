use std::path::PathBuf;

use katsuo::{
    import_market_csv_file, init_logging, log_app_start, logging_config_from_env,
    write_market_json,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let logging_cfg = logging_config_from_env();
    init_logging(&logging_cfg)?;
    log_app_start("rebuild_market_data", &logging_cfg);

    let input = std::env::var("KATSUO_CSV_INPUT")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("data/market_input.csv"));
    let output = std::env::var("KATSUO_MARKET_OUTPUT")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("data/katsuo_market_data.json"));

    let report = import_market_csv_file(&input)?;
    write_market_json(&output, &report.dataset)?;

    println!(
        "Rebuilt {} from {} ({}): {} rows read, {} blank, {} outliers, {} duplicate dates replaced",
        output.display(),
        input.display(),
        report.encoding,
        report.rows_read,
        report.rows_skipped_blank,
        report.rows_outlier,
        report.duplicate_dates_replaced
    );
    Ok(())
}
