//! Chart projection: filtered size series → price, moving-average and volume
//! series tagged with a stable per-size color.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::market::SizeSeries;
use crate::moving_average::{
    moving_average, AveragePoint, DatedValue, MovingAverageConfig, MovingAverageError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub fn rgba(self, alpha: f32) -> String {
        format!("rgba({}, {}, {}, {alpha})", self.0, self.1, self.2)
    }
}

pub const BASE_COLORS: [Rgb; 8] = [
    Rgb(75, 192, 192),
    Rgb(255, 159, 64),
    Rgb(153, 102, 255),
    Rgb(255, 99, 132),
    Rgb(54, 162, 235),
    Rgb(255, 206, 86),
    Rgb(231, 76, 60),
    Rgb(46, 204, 113),
];

const KEYWORD_COLORS: [(&str, usize); 3] = [("1.8", 0), ("2.5", 1), ("4.5", 2)];

/// Keyword match on the label first, then the palette slot for `index`.
pub fn size_color(size: &str, index: usize) -> Rgb {
    KEYWORD_COLORS
        .iter()
        .find(|(keyword, _)| size.contains(keyword))
        .map(|(_, slot)| BASE_COLORS[*slot])
        .unwrap_or(BASE_COLORS[index % BASE_COLORS.len()])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    #[default]
    Dark,
    Light,
    Ocean,
}

impl Theme {
    pub const ALL: [Theme; 3] = [Theme::Dark, Theme::Light, Theme::Ocean];

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "dark" => Some(Self::Dark),
            "light" => Some(Self::Light),
            "ocean" => Some(Self::Ocean),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dark => "dark",
            Self::Light => "light",
            Self::Ocean => "ocean",
        }
    }

    pub fn palette(self) -> ThemePalette {
        match self {
            Self::Dark => ThemePalette {
                text: "#8b949e",
                grid: "rgba(48, 54, 61, 0.3)",
                tooltip_bg: "rgba(13, 17, 23, 0.9)",
            },
            Self::Light => ThemePalette {
                text: "#656d76",
                grid: "rgba(208, 215, 222, 0.5)",
                tooltip_bg: "rgba(255, 255, 255, 0.95)",
            },
            Self::Ocean => ThemePalette {
                text: "#aabccf",
                grid: "rgba(0, 77, 153, 0.4)",
                tooltip_bg: "rgba(0, 26, 51, 0.95)",
            },
        }
    }

    fn volume_fill_alpha(self) -> f32 {
        match self {
            Self::Light => 0.4,
            Self::Dark | Self::Ocean => 0.2,
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ThemePalette {
    pub text: &'static str,
    pub grid: &'static str,
    pub tooltip_bg: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SizeChartSeries {
    pub size: String,
    pub color: String,
    pub price_line: Vec<DatedValue>,
    pub moving_average: Vec<AveragePoint>,
    pub volume_bars: Vec<DatedValue>,
    pub volume_fill: String,
    pub volume_border: String,
    pub volume_hidden: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortChart {
    pub port: String,
    pub theme: Theme,
    pub palette: ThemePalette,
    pub moving_average_window: usize,
    pub series: Vec<SizeChartSeries>,
}

/// Projects one port's (already range-filtered) series into chart descriptors.
///
/// Empty size categories are skipped but still consume their palette slot.
pub fn project_port_chart(
    port: &str,
    filtered: &SizeSeries,
    ma: &MovingAverageConfig,
    theme: Theme,
) -> Result<PortChart, MovingAverageError> {
    let mut series = Vec::with_capacity(filtered.len());

    for (index, (size, points)) in filtered.iter().enumerate() {
        if points.is_empty() {
            continue;
        }

        let price_line: Vec<DatedValue> = points
            .iter()
            .map(|point| DatedValue {
                date: point.date,
                value: point.price,
            })
            .collect();
        let volume_bars = points
            .iter()
            .map(|point| DatedValue {
                date: point.date,
                value: point.volume,
            })
            .collect();
        let color = size_color(size, index);

        series.push(SizeChartSeries {
            size: size.to_string(),
            color: color.rgba(1.0),
            moving_average: moving_average(&price_line, ma)?,
            price_line,
            volume_bars,
            volume_fill: color.rgba(theme.volume_fill_alpha()),
            volume_border: color.rgba(0.5),
            volume_hidden: index > 0,
        });
    }

    Ok(PortChart {
        port: port.to_string(),
        theme,
        palette: theme.palette(),
        moving_average_window: ma.window,
        series,
    })
}
