//! Market dataset model: port → size category → dated observations.
//!
//! Ports and size categories keep the order in which the feed lists them.
//! A port whose payload does not decode is reported as a [`PortIssue`] and
//! left out of the dataset; the remaining ports still load.

use std::fmt;

use chrono::NaiveDate;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::value::RawValue;
use tracing::warn;

pub const DATE_FORMAT: &str = "%Y-%m-%d";
const SLASH_DATE_FORMAT: &str = "%Y/%m/%d";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationPoint {
    #[serde(with = "feed_date")]
    pub date: NaiveDate,
    pub price: f64,
    #[serde(default)]
    pub volume: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vessel: Option<String>,
}

impl ObservationPoint {
    pub fn new(date: NaiveDate, price: f64, volume: f64) -> Self {
        Self {
            date,
            price,
            volume,
            vessel: None,
        }
    }
}

/// Accepts `YYYY-MM-DD` and `YYYY/MM/DD`.
pub fn parse_feed_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    NaiveDate::parse_from_str(trimmed, DATE_FORMAT)
        .or_else(|_| NaiveDate::parse_from_str(trimmed, SLASH_DATE_FORMAT))
        .ok()
}

pub(crate) mod feed_date {
    use chrono::NaiveDate;
    use serde::{de, Deserialize, Deserializer, Serializer};

    use super::{parse_feed_date, DATE_FORMAT};

    pub fn serialize<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&date.format(DATE_FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_feed_date(&raw).ok_or_else(|| de::Error::custom(format!("invalid date '{raw}'")))
    }
}

/// Size category → observations, in feed order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SizeSeries {
    entries: Vec<(String, Vec<ObservationPoint>)>,
}

impl SizeSeries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the series for `size` in place, or appends a new category.
    pub fn insert(&mut self, size: impl Into<String>, points: Vec<ObservationPoint>) {
        let size = size.into();
        match self.entries.iter_mut().find(|(name, _)| *name == size) {
            Some((_, existing)) => *existing = points,
            None => self.entries.push((size, points)),
        }
    }

    pub fn get(&self, size: &str) -> Option<&[ObservationPoint]> {
        self.entries
            .iter()
            .find(|(name, _)| name == size)
            .map(|(_, points)| points.as_slice())
    }

    pub(crate) fn get_mut_or_insert(&mut self, size: &str) -> &mut Vec<ObservationPoint> {
        let index = match self.entries.iter().position(|(name, _)| name == size) {
            Some(index) => index,
            None => {
                self.entries.push((size.to_string(), Vec::new()));
                self.entries.len() - 1
            }
        };
        &mut self.entries[index].1
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[ObservationPoint])> {
        self.entries
            .iter()
            .map(|(name, points)| (name.as_str(), points.as_slice()))
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Vec<ObservationPoint>> {
        self.entries.iter_mut().map(|(_, points)| points)
    }

    pub fn sizes(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Most recent date across every size category of the port.
    pub fn latest_date(&self) -> Option<NaiveDate> {
        self.entries
            .iter()
            .filter_map(|(_, points)| points.last().map(|point| point.date))
            .max()
    }
}

impl FromIterator<(String, Vec<ObservationPoint>)> for SizeSeries {
    fn from_iter<T: IntoIterator<Item = (String, Vec<ObservationPoint>)>>(iter: T) -> Self {
        let mut series = SizeSeries::new();
        for (size, points) in iter {
            series.insert(size, points);
        }
        series
    }
}

impl Serialize for SizeSeries {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (size, points) in &self.entries {
            map.serialize_entry(size, points)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for SizeSeries {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SizeSeriesVisitor;

        impl<'de> Visitor<'de> for SizeSeriesVisitor {
            type Value = SizeSeries;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of size category to observation arrays")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<SizeSeries, A::Error> {
                let mut series = SizeSeries::new();
                while let Some((size, points)) =
                    map.next_entry::<String, Vec<ObservationPoint>>()?
                {
                    series.insert(size, points);
                }
                Ok(series)
            }
        }

        deserializer.deserialize_map(SizeSeriesVisitor)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortIssue {
    pub port: String,
    pub message: String,
}

/// Full market feed: port → [`SizeSeries`], in feed order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarketDataset {
    ports: Vec<(String, SizeSeries)>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedMarket {
    pub dataset: MarketDataset,
    pub issues: Vec<PortIssue>,
}

impl MarketDataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_port(&mut self, port: impl Into<String>, series: SizeSeries) {
        let port = port.into();
        match self.ports.iter_mut().find(|(name, _)| *name == port) {
            Some((_, existing)) => *existing = series,
            None => self.ports.push((port, series)),
        }
    }

    pub fn port(&self, port: &str) -> Option<&SizeSeries> {
        self.ports
            .iter()
            .find(|(name, _)| name == port)
            .map(|(_, series)| series)
    }

    pub(crate) fn port_mut_or_insert(&mut self, port: &str) -> &mut SizeSeries {
        let index = match self.ports.iter().position(|(name, _)| name == port) {
            Some(index) => index,
            None => {
                self.ports.push((port.to_string(), SizeSeries::new()));
                self.ports.len() - 1
            }
        };
        &mut self.ports[index].1
    }

    pub fn series(&self, port: &str, size: &str) -> Option<&[ObservationPoint]> {
        self.port(port).and_then(|series| series.get(size))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SizeSeries)> {
        self.ports
            .iter()
            .map(|(name, series)| (name.as_str(), series))
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut SizeSeries> {
        self.ports.iter_mut().map(|(_, series)| series)
    }

    pub fn port_names(&self) -> impl Iterator<Item = &str> {
        self.ports.iter().map(|(name, _)| name.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    /// Decodes the market feed, isolating malformed ports.
    ///
    /// Fails only when the payload is not a JSON object at all.
    pub fn from_json_slice(bytes: &[u8]) -> Result<DecodedMarket, serde_json::Error> {
        let raw: RawPorts = serde_json::from_slice(bytes)?;
        let mut decoded = DecodedMarket::default();

        for (port, value) in raw.0 {
            // Decoded from the raw text so size categories keep document order.
            match serde_json::from_str::<SizeSeries>(value.get()) {
                Ok(series) => decoded.dataset.ports.push((port, series)),
                Err(err) => {
                    warn!(
                        component = "market",
                        event = "market.port.decode_failed",
                        port = %port,
                        error = %err
                    );
                    decoded.issues.push(PortIssue {
                        port,
                        message: err.to_string(),
                    });
                }
            }
        }

        Ok(decoded)
    }
}

impl Serialize for MarketDataset {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.ports.len()))?;
        for (port, series) in &self.ports {
            map.serialize_entry(port, series)?;
        }
        map.end()
    }
}

/// Top-level feed object with each port left undecoded, in document order.
struct RawPorts(Vec<(String, Box<RawValue>)>);

impl<'de> Deserialize<'de> for RawPorts {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RawPortsVisitor;

        impl<'de> Visitor<'de> for RawPortsVisitor {
            type Value = RawPorts;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of port name to size categories")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<RawPorts, A::Error> {
                let mut ports = Vec::new();
                while let Some((port, value)) = map.next_entry::<String, Box<RawValue>>()? {
                    ports.push((port, value));
                }
                Ok(RawPorts(ports))
            }
        }

        deserializer.deserialize_map(RawPortsVisitor)
    }
}

/// Last two observations of a series as `(latest, previous)`.
pub fn latest_pair(points: &[ObservationPoint]) -> Option<(&ObservationPoint, &ObservationPoint)> {
    match points {
        [.., previous, latest] => Some((latest, previous)),
        _ => None,
    }
}

/// Entry dated `date` and the one immediately before it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DatedLookup<'a> {
    pub latest: Option<&'a ObservationPoint>,
    pub previous: Option<&'a ObservationPoint>,
}

pub fn lookup_on_date(points: &[ObservationPoint], date: NaiveDate) -> DatedLookup<'_> {
    match points.iter().rposition(|point| point.date == date) {
        Some(index) => DatedLookup {
            latest: points.get(index),
            previous: index.checked_sub(1).and_then(|prev| points.get(prev)),
        },
        None => DatedLookup {
            latest: None,
            previous: points.last(),
        },
    }
}
