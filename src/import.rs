//! Offline maintenance of the data files: rebuilding the market feed from a
//! flat CSV export and folding fresh news into the stored news feed.
//!
//! Expected CSV header: `date,port,size,price,volume` with an optional
//! `vessel` column. Column order does not matter. Spreadsheet exports in
//! Shift_JIS are accepted when the bytes are not valid UTF-8.

use std::borrow::Cow;
use std::fs;
use std::io::{ErrorKind, Read, Write};
use std::path::Path;

use csv::StringRecord;
use encoding_rs::{Encoding, SHIFT_JIS, UTF_8};
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::market::{parse_feed_date, MarketDataset, ObservationPoint};
use crate::news::{merge_news, NewsItem};

/// Prices outside this open interval are treated as data-entry outliers.
pub const PRICE_FLOOR: f64 = 10.0;
pub const PRICE_CEILING: f64 = 600.0;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON encode error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("CSV header is missing required column '{0}'")]
    MissingColumn(&'static str),
    #[error("line {line}: failed to parse {field} value '{value}'")]
    ParseField {
        line: u64,
        field: &'static str,
        value: String,
    },
    #[error("invalid output path: {0}")]
    InvalidOutputPath(String),
    #[error("CSV is neither UTF-8 nor Shift_JIS")]
    UnknownEncoding,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportReport {
    #[serde(skip)]
    pub dataset: MarketDataset,
    /// Name of the text encoding the CSV was read as.
    pub encoding: &'static str,
    pub rows_read: usize,
    pub rows_skipped_blank: usize,
    pub rows_outlier: usize,
    pub duplicate_dates_replaced: usize,
}

struct Columns {
    date: usize,
    port: usize,
    size: usize,
    price: usize,
    volume: usize,
    vessel: Option<usize>,
}

impl Columns {
    fn from_headers(headers: &StringRecord) -> Result<Self, ImportError> {
        let find = |name: &'static str| headers.iter().position(|h| h.trim() == name);
        let require = |name: &'static str| find(name).ok_or(ImportError::MissingColumn(name));
        Ok(Self {
            date: require("date")?,
            port: require("port")?,
            size: require("size")?,
            price: require("price")?,
            volume: require("volume")?,
            vessel: find("vessel"),
        })
    }
}

fn field<'r>(record: &'r StringRecord, idx: usize) -> &'r str {
    record.get(idx).unwrap_or_default().trim()
}

fn parse_f64(
    record: &StringRecord,
    idx: usize,
    field_name: &'static str,
) -> Result<f64, ImportError> {
    let raw = field(record, idx);
    raw.parse::<f64>().map_err(|_| ImportError::ParseField {
        line: record.position().map(|p| p.line()).unwrap_or_default(),
        field: field_name,
        value: raw.to_string(),
    })
}

/// UTF-8 first (a leading BOM is dropped), then Shift_JIS.
fn decode_csv_text(bytes: &[u8]) -> Result<(Cow<'_, str>, &'static Encoding), ImportError> {
    if let Some(text) = UTF_8.decode_without_bom_handling_and_without_replacement(bytes) {
        let text = match text {
            Cow::Borrowed(raw) => Cow::Borrowed(raw.strip_prefix('\u{feff}').unwrap_or(raw)),
            Cow::Owned(raw) => Cow::Owned(raw.trim_start_matches('\u{feff}').to_string()),
        };
        return Ok((text, UTF_8));
    }
    SHIFT_JIS
        .decode_without_bom_handling_and_without_replacement(bytes)
        .map(|text| (text, SHIFT_JIS))
        .ok_or(ImportError::UnknownEncoding)
}

pub fn import_market_csv<R: Read>(mut input: R) -> Result<ImportReport, ImportError> {
    let mut bytes = Vec::new();
    input.read_to_end(&mut bytes)?;
    let (text, encoding) = decode_csv_text(&bytes)?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());
    let columns = Columns::from_headers(reader.headers()?)?;

    let mut report = ImportReport {
        encoding: encoding.name(),
        ..ImportReport::default()
    };
    for record in reader.records() {
        let record = record?;
        report.rows_read += 1;

        let (raw_date, port) = (field(&record, columns.date), field(&record, columns.port));
        if raw_date.is_empty() || port.is_empty() {
            report.rows_skipped_blank += 1;
            continue;
        }

        let date = parse_feed_date(raw_date).ok_or_else(|| ImportError::ParseField {
            line: record.position().map(|p| p.line()).unwrap_or_default(),
            field: "date",
            value: raw_date.to_string(),
        })?;
        let price = parse_f64(&record, columns.price, "price")?;
        let volume = parse_f64(&record, columns.volume, "volume")?;

        if !(price > PRICE_FLOOR && price < PRICE_CEILING) {
            report.rows_outlier += 1;
            continue;
        }

        let vessel = columns
            .vessel
            .map(|idx| field(&record, idx))
            .filter(|v| !v.is_empty())
            .map(str::to_string);

        report
            .dataset
            .port_mut_or_insert(port)
            .get_mut_or_insert(field(&record, columns.size))
            .push(ObservationPoint {
                date,
                price,
                volume,
                vessel,
            });
    }

    for series in report.dataset.iter_mut() {
        for points in series.iter_mut() {
            report.duplicate_dates_replaced += sort_and_dedupe(points);
        }
    }

    info!(
        component = "import",
        event = "import.csv.finish",
        encoding = report.encoding,
        rows_read = report.rows_read,
        rows_skipped_blank = report.rows_skipped_blank,
        rows_outlier = report.rows_outlier,
        duplicate_dates_replaced = report.duplicate_dates_replaced
    );

    Ok(report)
}

pub fn import_market_csv_file(path: &Path) -> Result<ImportReport, ImportError> {
    import_market_csv(fs::File::open(path)?)
}

/// Date-ascending; a later row for the same date replaces the earlier one.
fn sort_and_dedupe(points: &mut Vec<ObservationPoint>) -> usize {
    points.sort_by_key(|point| point.date);
    let before = points.len();
    let mut deduped: Vec<ObservationPoint> = Vec::with_capacity(before);
    for point in points.drain(..) {
        match deduped.last_mut() {
            Some(last) if last.date == point.date => *last = point,
            _ => deduped.push(point),
        }
    }
    *points = deduped;
    before - points.len()
}

pub fn write_market_json(path: &Path, dataset: &MarketDataset) -> Result<(), ImportError> {
    write_json_atomic(path, dataset)
}

/// Pretty JSON written to `<name>.tmp` and renamed over `path`.
fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), ImportError> {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .ok_or_else(|| ImportError::InvalidOutputPath(path.display().to_string()))?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let tmp_path = path.with_file_name(format!("{file_name}.tmp"));
    let bytes = serde_json::to_vec_pretty(value)?;

    {
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
    }

    fs::rename(tmp_path, path)?;
    Ok(())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NewsMergeReport {
    pub stored_before: usize,
    pub incoming: usize,
    pub stored_after: usize,
}

/// Merges the news array in `incoming` into the feed at `target`.
///
/// A missing `target` counts as an empty feed; the result replaces it atomically.
pub fn merge_news_file(target: &Path, incoming: &Path) -> Result<NewsMergeReport, ImportError> {
    let existing: Vec<NewsItem> = match fs::read(target) {
        Ok(bytes) => serde_json::from_slice(&bytes)?,
        Err(err) if err.kind() == ErrorKind::NotFound => Vec::new(),
        Err(err) => return Err(err.into()),
    };
    let fresh: Vec<NewsItem> = serde_json::from_slice(&fs::read(incoming)?)?;

    let mut report = NewsMergeReport {
        stored_before: existing.len(),
        incoming: fresh.len(),
        stored_after: 0,
    };
    let merged = merge_news(existing, fresh);
    report.stored_after = merged.len();
    write_json_atomic(target, &merged)?;

    info!(
        component = "import",
        event = "import.news.merged",
        stored_before = report.stored_before,
        incoming = report.incoming,
        stored_after = report.stored_after
    );
    Ok(report)
}
