//! Sliding-window moving average over a dated price series.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_WINDOW: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovingAveragePolicy {
    /// No value until `window` points exist, then the mean of exactly `window` points.
    #[default]
    StrictWindow,
    /// The window shrinks near the start; the first value equals the first point.
    TrailingPartial,
}

impl MovingAveragePolicy {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "strict" | "strict_window" => Some(Self::StrictWindow),
            "trailing" | "trailing_partial" => Some(Self::TrailingPartial),
            _ => None,
        }
    }
}

impl fmt::Display for MovingAveragePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::StrictWindow => "strict_window",
            Self::TrailingPartial => "trailing_partial",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovingAverageConfig {
    pub window: usize,
    pub policy: MovingAveragePolicy,
}

impl Default for MovingAverageConfig {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            policy: MovingAveragePolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MovingAverageError {
    #[error("moving average window must be >= 1")]
    ZeroWindow,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DatedValue {
    #[serde(with = "crate::market::feed_date")]
    pub date: NaiveDate,
    pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AveragePoint {
    #[serde(with = "crate::market::feed_date")]
    pub date: NaiveDate,
    pub value: Option<f64>,
}

pub fn moving_average_values(
    values: &[f64],
    window: usize,
    policy: MovingAveragePolicy,
) -> Result<Vec<Option<f64>>, MovingAverageError> {
    if window == 0 {
        return Err(MovingAverageError::ZeroWindow);
    }

    let averaged = (0..values.len())
        .map(|index| {
            let start = (index + 1).saturating_sub(window);
            let slice = &values[start..=index];
            if policy == MovingAveragePolicy::StrictWindow && slice.len() < window {
                return None;
            }
            Some(slice.iter().sum::<f64>() / slice.len() as f64)
        })
        .collect();

    Ok(averaged)
}

pub fn moving_average(
    points: &[DatedValue],
    config: &MovingAverageConfig,
) -> Result<Vec<AveragePoint>, MovingAverageError> {
    let values: Vec<f64> = points.iter().map(|point| point.value).collect();
    let averaged = moving_average_values(&values, config.window, config.policy)?;

    Ok(points
        .iter()
        .zip(averaged)
        .map(|(point, value)| AveragePoint {
            date: point.date,
            value,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_window_emits_leading_nones_then_exact_means() {
        let out = moving_average_values(
            &[10.0, 20.0, 30.0, 40.0, 50.0],
            3,
            MovingAveragePolicy::StrictWindow,
        )
        .unwrap();
        assert_eq!(out, vec![None, None, Some(20.0), Some(30.0), Some(40.0)]);
    }

    #[test]
    fn strict_window_leading_none_count_is_window_minus_one() {
        let values: Vec<f64> = (1..=12).map(f64::from).collect();
        for window in 1..=values.len() {
            let out =
                moving_average_values(&values, window, MovingAveragePolicy::StrictWindow).unwrap();
            assert_eq!(out.len(), values.len());
            assert_eq!(out.iter().take_while(|v| v.is_none()).count(), window - 1);

            for (index, value) in out.iter().enumerate().skip(window - 1) {
                let slice = &values[index + 1 - window..=index];
                let mean = slice.iter().sum::<f64>() / window as f64;
                assert!((value.unwrap() - mean).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn strict_window_on_short_series_is_all_none() {
        let out =
            moving_average_values(&[1.0, 2.0], 5, MovingAveragePolicy::StrictWindow).unwrap();
        assert_eq!(out, vec![None, None]);
    }

    #[test]
    fn trailing_partial_shrinks_window_at_start() {
        let out = moving_average_values(
            &[10.0, 20.0, 30.0, 40.0, 50.0],
            3,
            MovingAveragePolicy::TrailingPartial,
        )
        .unwrap();
        assert_eq!(
            out,
            vec![Some(10.0), Some(15.0), Some(20.0), Some(30.0), Some(40.0)]
        );
    }

    #[test]
    fn zero_window_is_rejected() {
        assert_eq!(
            moving_average_values(&[1.0], 0, MovingAveragePolicy::TrailingPartial).unwrap_err(),
            MovingAverageError::ZeroWindow
        );
    }

    #[test]
    fn empty_input_gives_empty_output() {
        let out = moving_average_values(&[], 5, MovingAveragePolicy::StrictWindow).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn dated_average_keeps_dates_aligned() {
        let base = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let points: Vec<DatedValue> = (0..4)
            .map(|offset| DatedValue {
                date: base + chrono::Days::new(offset),
                value: 100.0 + offset as f64 * 10.0,
            })
            .collect();

        let out = moving_average(
            &points,
            &MovingAverageConfig {
                window: 2,
                policy: MovingAveragePolicy::StrictWindow,
            },
        )
        .unwrap();

        assert_eq!(out.len(), 4);
        assert_eq!(out[0].date, base);
        assert_eq!(out[0].value, None);
        assert_eq!(out[3].value, Some(125.0));
    }

    #[test]
    fn policy_parse_accepts_short_and_long_names() {
        assert_eq!(
            MovingAveragePolicy::parse("Strict"),
            Some(MovingAveragePolicy::StrictWindow)
        );
        assert_eq!(
            MovingAveragePolicy::parse("trailing_partial"),
            Some(MovingAveragePolicy::TrailingPartial)
        );
        assert_eq!(MovingAveragePolicy::parse("ema"), None);
    }
}
