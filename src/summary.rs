//! Summary cards and per-port detail breakdowns as typed view records.

use chrono::NaiveDate;
use serde::Serialize;

use crate::market::{lookup_on_date, MarketDataset, ObservationPoint, SizeSeries};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
    Equal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceChange {
    pub direction: Direction,
    /// Absolute difference.
    pub delta: f64,
    pub label: String,
}

impl PriceChange {
    pub fn between(latest: f64, previous: f64) -> Self {
        let diff = latest - previous;
        let (direction, label) = if diff > 0.0 {
            (Direction::Up, format!("▲{diff:.1}"))
        } else if diff < 0.0 {
            (Direction::Down, format!("▼{:.1}", diff.abs()))
        } else {
            (Direction::Equal, "±0".to_string())
        };
        Self {
            direction,
            delta: diff.abs(),
            label,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    pub size: String,
    pub price: Option<f64>,
    pub change: Option<PriceChange>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryCard {
    pub port: String,
    #[serde(with = "crate::market::feed_date")]
    pub latest_date: NaiveDate,
    pub rows: Vec<SummaryRow>,
}

/// `None` when the port has no observations at all.
///
/// Sizes that did not trade on the port's latest date get a row without a price.
pub fn build_summary_card(port: &str, series: &SizeSeries) -> Option<SummaryCard> {
    let latest_date = series.latest_date()?;

    let rows = series
        .iter()
        .map(|(size, points)| {
            let lookup = lookup_on_date(points, latest_date);
            let price = lookup.latest.map(|point| point.price);
            let change = lookup
                .latest
                .zip(lookup.previous)
                .map(|(latest, previous)| PriceChange::between(latest.price, previous.price));
            SummaryRow {
                size: size.to_string(),
                price,
                change,
            }
        })
        .collect();

    Some(SummaryCard {
        port: port.to_string(),
        latest_date,
        rows,
    })
}

/// One card per listed port that exists in the dataset and has data.
pub fn build_summary<'a>(
    dataset: &MarketDataset,
    ports: impl IntoIterator<Item = &'a str>,
) -> Vec<SummaryCard> {
    ports
        .into_iter()
        .filter_map(|port| {
            dataset
                .port(port)
                .and_then(|series| build_summary_card(port, series))
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SizeDetail {
    pub size: String,
    pub latest: Option<ObservationPoint>,
    pub previous: Option<ObservationPoint>,
    pub change: Option<PriceChange>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub average_price: Option<f64>,
    pub total_volume: f64,
    pub observations: usize,
    pub latest_vessel: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortDetail {
    pub port: String,
    pub latest_date: Option<String>,
    pub sizes: Vec<SizeDetail>,
}

fn size_detail(size: &str, points: &[ObservationPoint]) -> SizeDetail {
    let latest = points.last();
    let previous = points.len().checked_sub(2).and_then(|index| points.get(index));
    let prices = points.iter().map(|point| point.price);

    let min_price = prices.clone().reduce(f64::min);
    let max_price = prices.clone().reduce(f64::max);
    let average_price = if points.is_empty() {
        None
    } else {
        Some(prices.sum::<f64>() / points.len() as f64)
    };

    SizeDetail {
        size: size.to_string(),
        latest: latest.cloned(),
        previous: previous.cloned(),
        change: latest
            .zip(previous)
            .map(|(latest, previous)| PriceChange::between(latest.price, previous.price)),
        min_price,
        max_price,
        average_price,
        total_volume: points.iter().map(|point| point.volume).sum(),
        observations: points.len(),
        latest_vessel: points.iter().rev().find_map(|point| point.vessel.clone()),
    }
}

/// Detail breakdown over an already range-filtered series.
pub fn build_port_detail(port: &str, series: &SizeSeries) -> PortDetail {
    PortDetail {
        port: port.to_string(),
        latest_date: series
            .latest_date()
            .map(|date| date.format(crate::market::DATE_FORMAT).to_string()),
        sizes: series
            .iter()
            .map(|(size, points)| size_detail(size, points))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::parse_feed_date;

    fn point(date: &str, price: f64, volume: f64) -> ObservationPoint {
        ObservationPoint::new(parse_feed_date(date).unwrap(), price, volume)
    }

    fn makurazaki() -> SizeSeries {
        let mut series = SizeSeries::new();
        series.insert(
            "4.5kg上",
            vec![point("2025-05-01", 300.0, 10.0), point("2025-05-02", 312.5, 12.0)],
        );
        series.insert(
            "2.5kg上",
            vec![point("2025-04-30", 250.0, 5.0), point("2025-05-02", 240.0, 6.0)],
        );
        series.insert("1.8kg上", vec![point("2025-05-01", 200.0, 3.0)]);
        series.insert("empty", Vec::new());
        series
    }

    #[test]
    fn card_uses_latest_date_across_sizes() {
        let card = build_summary_card("枕崎", &makurazaki()).unwrap();
        assert_eq!(card.latest_date, parse_feed_date("2025-05-02").unwrap());

        let big = &card.rows[0];
        assert_eq!(big.price, Some(312.5));
        let change = big.change.as_ref().unwrap();
        assert_eq!(change.direction, Direction::Up);
        assert_eq!(change.label, "▲12.5");

        let mid = card.rows[1].change.as_ref().unwrap();
        assert_eq!(mid.direction, Direction::Down);
        assert_eq!(mid.label, "▼10.0");
    }

    #[test]
    fn size_without_trade_on_latest_date_has_no_price() {
        let card = build_summary_card("枕崎", &makurazaki()).unwrap();
        assert_eq!(card.rows[2].size, "1.8kg上");
        assert_eq!(card.rows[2].price, None);
        assert!(card.rows[2].change.is_none());
        assert_eq!(card.rows[3].price, None);
    }

    #[test]
    fn equal_prices_are_marked_flat() {
        let change = PriceChange::between(200.0, 200.0);
        assert_eq!(change.direction, Direction::Equal);
        assert_eq!(change.label, "±0");
    }

    #[test]
    fn summary_skips_missing_and_empty_ports() {
        let mut dataset = MarketDataset::new();
        dataset.insert_port("枕崎", makurazaki());
        let mut empty = SizeSeries::new();
        empty.insert("4.5kg上", Vec::new());
        dataset.insert_port("山川", empty);

        let cards = build_summary(&dataset, ["枕崎", "焼津", "山川"]);
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].port, "枕崎");
    }

    #[test]
    fn detail_aggregates_each_size() {
        let mut series = makurazaki();
        series.insert(
            "vessel",
            vec![
                ObservationPoint {
                    vessel: Some("第八丸".to_string()),
                    ..point("2025-05-01", 100.0, 1.0)
                },
                point("2025-05-02", 120.0, 2.0),
            ],
        );
        let detail = build_port_detail("枕崎", &series);
        assert_eq!(detail.latest_date.as_deref(), Some("2025-05-02"));

        let big = &detail.sizes[0];
        assert_eq!(big.min_price, Some(300.0));
        assert_eq!(big.max_price, Some(312.5));
        assert_eq!(big.average_price, Some(306.25));
        assert_eq!(big.total_volume, 22.0);
        assert_eq!(big.observations, 2);

        let empty = &detail.sizes[3];
        assert_eq!(empty.average_price, None);
        assert!(empty.latest.is_none());

        assert_eq!(detail.sizes[4].latest_vessel.as_deref(), Some("第八丸"));
    }
}
