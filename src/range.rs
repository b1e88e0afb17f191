//! Trailing day-window filter over a port's size series.

use std::borrow::Cow;
use std::fmt;

use chrono::{NaiveDate, Utc};
use chrono_tz::Asia::Tokyo;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::market::{ObservationPoint, SizeSeries};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RangeSelector {
    #[default]
    All,
    Days(u32),
}

impl RangeSelector {
    /// Lenient parse: anything that is not a non-negative day count means `All`.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().parse::<u32>() {
            Ok(days) => Self::Days(days),
            Err(_) => Self::All,
        }
    }

    pub fn contains(self, date: NaiveDate, today: NaiveDate) -> bool {
        match self {
            Self::All => true,
            Self::Days(days) => (today - date).num_days() <= i64::from(days),
        }
    }
}

impl fmt::Display for RangeSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::Days(days) => write!(f, "{days}"),
        }
    }
}

impl Serialize for RangeSelector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RangeSelector {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = serde_json::Value::deserialize(deserializer)?;
        Ok(match raw {
            serde_json::Value::String(text) => Self::parse(&text),
            serde_json::Value::Number(number) => number
                .as_u64()
                .and_then(|days| u32::try_from(days).ok())
                .map(Self::Days)
                .unwrap_or(Self::All),
            _ => Self::All,
        })
    }
}

/// Calendar date of "now" at the auction ports.
pub fn market_today() -> NaiveDate {
    Utc::now().with_timezone(&Tokyo).date_naive()
}

/// Keeps points dated within the last `days` days of `today`.
///
/// `All` hands the input back untouched. Future-dated points are kept.
pub fn filter_by_range(
    series: &SizeSeries,
    selector: RangeSelector,
    today: NaiveDate,
) -> Cow<'_, SizeSeries> {
    if selector == RangeSelector::All {
        return Cow::Borrowed(series);
    }

    let filtered: SizeSeries = series
        .iter()
        .map(|(size, points)| {
            let kept: Vec<ObservationPoint> = points
                .iter()
                .filter(|point| selector.contains(point.date, today))
                .cloned()
                .collect();
            (size.to_string(), kept)
        })
        .collect();

    Cow::Owned(filtered)
}

pub fn filter_by_range_now(series: &SizeSeries, selector: RangeSelector) -> Cow<'_, SizeSeries> {
    filter_by_range(series, selector, market_today())
}
