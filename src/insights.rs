//! Heuristic market insights.
//!
//! Candidate generation is a deterministic pass over the full dataset.
//! Picking the one candidate to display is random and takes the RNG as an
//! argument so callers (and tests) control it.
//!
//! Rules:
//! - volatility: day-over-day price move of at least `volatility_threshold`
//! - supply/demand: volume and price moving together past their thresholds
//! - port spread: reference ports' latest prices on the same date far apart
//! - size skew: largest size rising while the smallest does not

use std::sync::OnceLock;

use chrono::NaiveDate;
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::market::{latest_pair, MarketDataset, ObservationPoint, SizeSeries};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightKind {
    Surge,
    Drop,
    DemandOutpacingSupply,
    SupplyOutpacingDemand,
    PortSpread,
    LargeSizeFavored,
    Stable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightCandidate {
    pub kind: InsightKind,
    pub title: String,
    pub text: String,
    pub memo: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightConfig {
    pub volatility_threshold: f64,
    pub demand_volume_threshold: f64,
    pub demand_price_threshold: f64,
    pub supply_rule_enabled: bool,
    pub spread_threshold: f64,
    pub spread_ports: (String, String),
    pub spread_sizes: Vec<String>,
    pub skew_port: String,
    pub skew_large_min_rise: f64,
    pub skew_small_max_change: f64,
}

impl Default for InsightConfig {
    fn default() -> Self {
        Self {
            volatility_threshold: 10.0,
            demand_volume_threshold: 20.0,
            demand_price_threshold: 2.0,
            supply_rule_enabled: true,
            spread_threshold: 20.0,
            spread_ports: ("焼津".to_string(), "枕崎".to_string()),
            spread_sizes: vec![
                "1.8kg上".to_string(),
                "2.5kg上".to_string(),
                "4.5kg上".to_string(),
            ],
            skew_port: "焼津".to_string(),
            skew_large_min_rise: 5.0,
            skew_small_max_change: 0.0,
        }
    }
}

pub fn generate_candidates(dataset: &MarketDataset, cfg: &InsightConfig) -> Vec<InsightCandidate> {
    let mut out = Vec::new();

    for (port, series) in dataset.iter() {
        for (size, points) in series.iter() {
            if let Some(candidate) = volatility_candidate(port, size, points, cfg) {
                out.push(candidate);
            }
            if let Some(candidate) = supply_demand_candidate(port, size, points, cfg) {
                out.push(candidate);
            }
        }
    }

    out.extend(spread_candidates(dataset, cfg));

    if let Some(series) = dataset.port(&cfg.skew_port) {
        if let Some(candidate) = size_skew_candidate(&cfg.skew_port, series, cfg) {
            out.push(candidate);
        }
    }

    debug!(
        component = "insights",
        event = "insights.generated",
        candidate_count = out.len()
    );

    out
}

/// Uniform pick among `candidates`, or the stable-market fallback when empty.
pub fn select_insight<R: Rng>(
    candidates: &[InsightCandidate],
    rng: &mut R,
) -> InsightCandidate {
    if candidates.is_empty() {
        return stable_market_insight();
    }
    candidates[rng.random_range(0..candidates.len())].clone()
}

pub fn stable_market_insight() -> InsightCandidate {
    InsightCandidate {
        kind: InsightKind::Stable,
        title: "相場は安定".to_string(),
        text: "目立った価格変動はありません。各港とも落ち着いた取引が続いています。"
            .to_string(),
        memo: "安定".to_string(),
    }
}

fn volatility_candidate(
    port: &str,
    size: &str,
    points: &[ObservationPoint],
    cfg: &InsightConfig,
) -> Option<InsightCandidate> {
    let (latest, previous) = latest_pair(points)?;
    let diff = latest.price - previous.price;
    if diff.abs() < cfg.volatility_threshold {
        return None;
    }

    let delta = format_delta(diff);
    let candidate = if diff > 0.0 {
        InsightCandidate {
            kind: InsightKind::Surge,
            title: format!("{port} {size} 急騰"),
            text: format!(
                "{port}の{size}が前回比 {delta}円/kg 上昇し、{}円/kgを付けました（{}）。",
                format_price(latest.price),
                latest.date
            ),
            memo: format!("+{delta}"),
        }
    } else {
        InsightCandidate {
            kind: InsightKind::Drop,
            title: format!("{port} {size} 急落"),
            text: format!(
                "{port}の{size}が前回比 {delta}円/kg 下落し、{}円/kgとなりました（{}）。",
                format_price(latest.price),
                latest.date
            ),
            memo: format!("-{delta}"),
        }
    };

    Some(candidate)
}

fn supply_demand_candidate(
    port: &str,
    size: &str,
    points: &[ObservationPoint],
    cfg: &InsightConfig,
) -> Option<InsightCandidate> {
    let (latest, previous) = latest_pair(points)?;
    let price_diff = latest.price - previous.price;
    let volume_diff = latest.volume - previous.volume;

    if volume_diff >= cfg.demand_volume_threshold && price_diff >= cfg.demand_price_threshold {
        return Some(InsightCandidate {
            kind: InsightKind::DemandOutpacingSupply,
            title: format!("{port} {size} 需要が供給を上回る"),
            text: format!(
                "水揚量が {}t 増えたにもかかわらず、単価は {}円/kg 上昇しました。買い需要が新たな供給を吸収しています。",
                format_delta(volume_diff),
                format_delta(price_diff)
            ),
            memo: "需要超過".to_string(),
        });
    }

    if cfg.supply_rule_enabled
        && volume_diff <= -cfg.demand_volume_threshold
        && price_diff <= -cfg.demand_price_threshold
    {
        return Some(InsightCandidate {
            kind: InsightKind::SupplyOutpacingDemand,
            title: format!("{port} {size} 需要の後退"),
            text: format!(
                "水揚量が {}t 減ったにもかかわらず、単価は {}円/kg 下落しました。買い意欲が弱まっています。",
                format_delta(volume_diff),
                format_delta(price_diff)
            ),
            memo: "需要減退".to_string(),
        });
    }

    None
}

fn spread_candidates(dataset: &MarketDataset, cfg: &InsightConfig) -> Vec<InsightCandidate> {
    let (port_a, port_b) = (&cfg.spread_ports.0, &cfg.spread_ports.1);
    let mut out = Vec::new();

    for size in &cfg.spread_sizes {
        let latest_a = dataset.series(port_a, size).and_then(<[_]>::last);
        let latest_b = dataset.series(port_b, size).and_then(<[_]>::last);
        let (Some(a), Some(b)) = (latest_a, latest_b) else {
            continue;
        };
        if a.date != b.date {
            continue;
        }

        let diff = a.price - b.price;
        if diff.abs() < cfg.spread_threshold {
            continue;
        }

        let (high_port, low_port) = if diff > 0.0 {
            (port_a, port_b)
        } else {
            (port_b, port_a)
        };
        let delta = format_delta(diff);
        out.push(InsightCandidate {
            kind: InsightKind::PortSpread,
            title: format!("{size} 港間価格差"),
            text: format!(
                "{}の{size}は{high_port}が{low_port}より {delta}円/kg 高値です。",
                a.date
            ),
            memo: format!("{high_port}高 {delta}"),
        });
    }

    out
}

fn size_skew_candidate(
    port: &str,
    series: &SizeSeries,
    cfg: &InsightConfig,
) -> Option<InsightCandidate> {
    let weighted: Vec<(&str, f64, &[ObservationPoint])> = series
        .iter()
        .filter_map(|(size, points)| Some((size, size_weight(size)?, points)))
        .collect();

    // Extremes are picked by label weight; one with fewer than two points silences the rule.
    let largest = weighted
        .iter()
        .copied()
        .reduce(|best, item| if item.1 > best.1 { item } else { best })?;
    let smallest = weighted
        .iter()
        .copied()
        .reduce(|best, item| if item.1 < best.1 { item } else { best })?;
    if largest.1 <= smallest.1 {
        return None;
    }

    let change = |points: &[ObservationPoint]| {
        latest_pair(points).map(|(latest, previous)| latest.price - previous.price)
    };
    let (large_size, large_change) = (largest.0, change(largest.2)?);
    let (small_size, small_change) = (smallest.0, change(smallest.2)?);
    if large_change < cfg.skew_large_min_rise || small_change > cfg.skew_small_max_change {
        return None;
    }

    Some(InsightCandidate {
        kind: InsightKind::LargeSizeFavored,
        title: format!("{port} 大型サイズ選好"),
        text: format!(
            "{port}では{large_size}が {}円/kg 上昇する一方、{small_size}は伸び悩んでいます。大型サイズに引き合いが集まっています。",
            format_delta(large_change)
        ),
        memo: "大型選好".to_string(),
    })
}

/// First decimal number in a size label, e.g. `4.5kg上` → 4.5.
pub fn size_weight(label: &str) -> Option<f64> {
    static WEIGHT_RE: OnceLock<Regex> = OnceLock::new();
    let re = WEIGHT_RE.get_or_init(|| {
        Regex::new(r"(\d+(?:\.\d+)?)").expect("size weight pattern is valid")
    });
    re.captures(label)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Rising,
    Falling,
    Flat,
}

/// Headline for the key port: direction of its first size category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketOverview {
    pub port: String,
    pub size: String,
    pub trend: Trend,
    #[serde(with = "crate::market::feed_date")]
    pub latest_date: NaiveDate,
    pub message: String,
}

pub fn market_overview(dataset: &MarketDataset, port: &str) -> Option<MarketOverview> {
    let (size, points) = dataset.port(port)?.iter().next()?;
    let (latest, previous) = latest_pair(points)?;

    let (trend, message) = if latest.price > previous.price {
        (
            Trend::Rising,
            "上昇傾向: 直近の水揚量減少に伴い、単価が反発しています。",
        )
    } else if latest.price < previous.price {
        (
            Trend::Falling,
            "下落傾向: 水揚が安定しており、単価は落ち着いた動きを見せています。",
        )
    } else {
        (
            Trend::Flat,
            "横ばい: 相場は拮抗しており、現状維持の展開が予想されます。",
        )
    };

    Some(MarketOverview {
        port: port.to_string(),
        size: size.to_string(),
        trend,
        latest_date: latest.date,
        message: message.to_string(),
    })
}

fn format_delta(value: f64) -> String {
    format!("{:.1}", value.abs())
}

fn format_price(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value:.1}")
    }
}
