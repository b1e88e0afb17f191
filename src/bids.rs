//! Bid schedule: current/archive partition and sea-area map links.

use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub const MAPS_SEARCH_URL: &str = "https://www.google.com/maps/search/";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BidRecord {
    pub vessel_name: String,
    #[serde(with = "crate::market::feed_date")]
    pub bid_date: NaiveDate,
    #[serde(default)]
    pub delivery_date: String,
    #[serde(default)]
    pub tonnage: Option<f64>,
    #[serde(default)]
    pub sea_area: SeaArea,
    #[serde(default)]
    pub items: Vec<BidItem>,
    #[serde(default)]
    pub total_volume: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeaArea {
    #[serde(default)]
    pub lat: String,
    #[serde(default)]
    pub lon: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BidItem {
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub size: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub volume: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BidSchedule {
    pub current: Option<BidRecord>,
    pub archive: Vec<BidRecord>,
}

/// Newest bid date first; ties keep feed order.
pub fn partition_bids(mut records: Vec<BidRecord>) -> BidSchedule {
    records.sort_by(|a, b| b.bid_date.cmp(&a.bid_date));
    let mut iter = records.into_iter();
    BidSchedule {
        current: iter.next(),
        archive: iter.collect(),
    }
}

/// `N33°12` → 33.2; `W140°30` → -140.5. `None` when the text does not parse.
pub fn parse_coordinate(raw: &str) -> Option<f64> {
    static COORD_RE: OnceLock<Regex> = OnceLock::new();
    let re = COORD_RE.get_or_init(|| {
        Regex::new(concat!(
            r"^\s*([NSEWnsew])\s*(\d{1,3}(?:\.\d+)?)",
            r"\s*(?:[°º˚度]\s*(?:(\d{1,2}(?:\.\d+)?)\s*['′分]?)?)?\s*$",
        ))
        .expect("coordinate pattern is valid")
    });

    let caps = re.captures(raw)?;
    let hemisphere = caps.get(1)?.as_str().to_ascii_uppercase();
    let degrees: f64 = caps.get(2)?.as_str().parse().ok()?;
    let minutes: f64 = match caps.get(3) {
        Some(m) => m.as_str().parse().ok()?,
        None => 0.0,
    };
    if minutes >= 60.0 {
        return None;
    }

    let limit = if hemisphere == "N" || hemisphere == "S" {
        90.0
    } else {
        180.0
    };
    let value = degrees + minutes / 60.0;
    if value > limit {
        return None;
    }

    if hemisphere == "S" || hemisphere == "W" {
        Some(-value)
    } else {
        Some(value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapLink {
    pub url: String,
    pub coordinates: Option<(f64, f64)>,
}

/// Coordinate query when both axes parse, otherwise a text search on the raw strings.
pub fn map_link(area: &SeaArea) -> MapLink {
    let coordinates = parse_coordinate(&area.lat).zip(parse_coordinate(&area.lon));
    let query = match coordinates {
        Some((lat, lon)) => format!("{lat:.4},{lon:.4}"),
        None => format!("{} {}", area.lat.trim(), area.lon.trim())
            .trim()
            .to_string(),
    };

    let url = reqwest::Url::parse_with_params(MAPS_SEARCH_URL, &[("api", "1"), ("query", &query)])
        .map(String::from)
        .unwrap_or_else(|_| MAPS_SEARCH_URL.to_string());

    MapLink { url, coordinates }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BidView {
    pub record: BidRecord,
    pub map_link: MapLink,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BidScheduleView {
    pub current: Option<BidView>,
    pub archive: Vec<BidView>,
}

pub fn bid_schedule_view(schedule: &BidSchedule) -> BidScheduleView {
    let to_view = |record: &BidRecord| BidView {
        map_link: map_link(&record.sea_area),
        record: record.clone(),
    };
    BidScheduleView {
        current: schedule.current.as_ref().map(to_view),
        archive: schedule.archive.iter().map(to_view).collect(),
    }
}
