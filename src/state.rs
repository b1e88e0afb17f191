//! Application state and the typed dashboard view-model.
//!
//! [`AppState::apply`] is the only way state changes. Every view is rebuilt
//! from scratch by [`AppState::view`].

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::bids::{bid_schedule_view, partition_bids, BidSchedule, BidScheduleView};
use crate::chart::{project_port_chart, PortChart, Theme, ThemePalette};
use crate::feeds::{load_failure_message, LoadOutcome, LoadedFeeds};
use crate::insights::{
    generate_candidates, market_overview, select_insight, InsightCandidate, InsightConfig,
    MarketOverview,
};
use crate::market::{MarketDataset, PortIssue};
use crate::moving_average::MovingAverageConfig;
use crate::news::{NewsPage, NewsPager};
use crate::preferences::{FontSize, PreferenceError, PreferenceStore, Toggles};
use crate::range::{filter_by_range, RangeSelector};
use crate::summary::{build_port_detail, build_summary, PortDetail, SummaryCard};

/// Hides the insight panel when switched off.
pub const TOGGLE_INSIGHT: &str = "insight";
/// Drops moving-average lines from chart projections when switched off.
pub const TOGGLE_MOVING_AVERAGE: &str = "moving_average";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tab {
    #[default]
    Summary,
    Charts,
    Bids,
    News,
}

impl Tab {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "summary" => Some(Self::Summary),
            "charts" => Some(Self::Charts),
            "bids" => Some(Self::Bids),
            "news" => Some(Self::News),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Summary => "summary",
            Self::Charts => "charts",
            Self::Bids => "bids",
            Self::News => "news",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UiEvent {
    SelectTab {
        tab: Tab,
    },
    SelectRange {
        range: RangeSelector,
    },
    SelectTheme {
        theme: Theme,
    },
    SetFontSize {
        font_size: FontSize,
    },
    LoadMoreNews,
    TogglePort {
        port: String,
    },
    SetToggle {
        name: String,
        enabled: bool,
    },
    SaveMemo {
        #[serde(with = "crate::market::feed_date")]
        date: NaiveDate,
        port: String,
        text: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum LoadState {
    Ready,
    Failed { reason: String },
}

/// Per-request selections that do not touch stored state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ViewOverrides {
    pub range: Option<RangeSelector>,
    pub theme: Option<Theme>,
    pub tab: Option<Tab>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortToggle {
    pub port: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewStatus {
    Ready,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardView {
    pub status: ViewStatus,
    pub error: Option<String>,
    pub tab: Tab,
    pub theme: Theme,
    pub palette: ThemePalette,
    pub range: RangeSelector,
    pub font_size: FontSize,
    pub moving_average: MovingAverageConfig,
    pub toggles: Toggles,
    pub ports: Vec<PortToggle>,
    pub summary: Vec<SummaryCard>,
    pub charts: Vec<PortChart>,
    pub overview: Option<MarketOverview>,
    pub insight: Option<InsightCandidate>,
    pub bids: BidScheduleView,
    pub news: NewsPage,
    pub issues: Vec<PortIssue>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InsightReport {
    pub candidates: Vec<InsightCandidate>,
    pub selected: InsightCandidate,
}

pub struct AppState {
    load: LoadState,
    dataset: MarketDataset,
    issues: Vec<PortIssue>,
    bids: BidSchedule,
    news: NewsPager,
    tab: Tab,
    range: RangeSelector,
    theme: Theme,
    font_size: FontSize,
    enabled_ports: Vec<String>,
    toggles: Toggles,
    moving_average: MovingAverageConfig,
    insight_config: InsightConfig,
    preferences: Option<Arc<PreferenceStore>>,
    memos: BTreeMap<(NaiveDate, String), String>,
}

impl AppState {
    pub fn ready(feeds: LoadedFeeds) -> Self {
        let enabled_ports = feeds
            .market
            .dataset
            .port_names()
            .map(str::to_string)
            .collect();
        Self {
            load: LoadState::Ready,
            dataset: feeds.market.dataset,
            issues: feeds.market.issues,
            bids: partition_bids(feeds.bids),
            news: NewsPager::new(feeds.news),
            enabled_ports,
            ..Self::empty()
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            load: LoadState::Failed {
                reason: reason.into(),
            },
            ..Self::empty()
        }
    }

    pub fn from_outcome(outcome: LoadOutcome) -> Self {
        match outcome {
            LoadOutcome::Ready(feeds) => Self::ready(feeds),
            LoadOutcome::Failed { reason } => Self::failed(reason),
        }
    }

    fn empty() -> Self {
        Self {
            load: LoadState::Ready,
            dataset: MarketDataset::new(),
            issues: Vec::new(),
            bids: BidSchedule::default(),
            news: NewsPager::default(),
            tab: Tab::default(),
            range: RangeSelector::default(),
            theme: Theme::default(),
            font_size: FontSize::default(),
            enabled_ports: Vec::new(),
            toggles: Toggles::new(),
            moving_average: MovingAverageConfig::default(),
            insight_config: InsightConfig::default(),
            preferences: None,
            memos: BTreeMap::new(),
        }
    }

    pub fn with_moving_average(mut self, config: MovingAverageConfig) -> Self {
        self.moving_average = config;
        self
    }

    pub fn with_insight_config(mut self, config: InsightConfig) -> Self {
        self.insight_config = config;
        self
    }

    /// Attaches the store and restores the saved theme, font size, toggles and port list.
    pub fn with_preferences(
        mut self,
        store: Arc<PreferenceStore>,
    ) -> Result<Self, PreferenceError> {
        self.theme = store.theme()?;
        self.font_size = store.font_size()?;
        self.toggles = store.toggles()?;
        if let Some(saved) = store.enabled_ports()? {
            self.enabled_ports = saved;
        }
        self.preferences = Some(store);
        Ok(self)
    }

    pub fn load_error(&self) -> Option<String> {
        match &self.load {
            LoadState::Ready => None,
            LoadState::Failed { reason } => Some(load_failure_message(reason)),
        }
    }

    pub fn dataset(&self) -> &MarketDataset {
        &self.dataset
    }

    pub fn tab(&self) -> Tab {
        self.tab
    }

    pub fn range(&self) -> RangeSelector {
        self.range
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn font_size(&self) -> FontSize {
        self.font_size
    }

    pub fn enabled_ports(&self) -> &[String] {
        &self.enabled_ports
    }

    /// A toggle that was never set counts as on.
    pub fn toggle_enabled(&self, name: &str) -> bool {
        self.toggles.get(name).copied().unwrap_or(true)
    }

    /// Applies one UI event. In-memory state changes even when persisting it fails.
    pub fn apply(&mut self, event: UiEvent) -> Result<(), PreferenceError> {
        info!(component = "state", event = "state.event.apply", ui_event = ?event);
        match event {
            UiEvent::SelectTab { tab } => {
                self.tab = tab;
                Ok(())
            }
            UiEvent::SelectRange { range } => {
                self.range = range;
                Ok(())
            }
            UiEvent::SelectTheme { theme } => {
                self.theme = theme;
                self.persist(|store| store.set_theme(theme))
            }
            UiEvent::SetFontSize { font_size } => {
                self.font_size = font_size;
                self.persist(|store| store.set_font_size(font_size))
            }
            UiEvent::LoadMoreNews => {
                self.news.load_more();
                Ok(())
            }
            UiEvent::TogglePort { port } => {
                match self.enabled_ports.iter().position(|name| *name == port) {
                    Some(index) => {
                        self.enabled_ports.remove(index);
                    }
                    None => self.enabled_ports.push(port),
                }
                let ports = self.enabled_ports.clone();
                self.persist(|store| store.set_enabled_ports(&ports))
            }
            UiEvent::SetToggle { name, enabled } => {
                self.toggles.insert(name.clone(), enabled);
                self.persist(|store| store.set_toggle(&name, enabled))
            }
            UiEvent::SaveMemo { date, port, text } => match &self.preferences {
                Some(store) => store.set_memo(date, &port, &text),
                None => {
                    if text.trim().is_empty() {
                        self.memos.remove(&(date, port));
                    } else {
                        self.memos.insert((date, port), text);
                    }
                    Ok(())
                }
            },
        }
    }

    fn persist(
        &self,
        write: impl FnOnce(&PreferenceStore) -> Result<(), PreferenceError>,
    ) -> Result<(), PreferenceError> {
        match &self.preferences {
            Some(store) => write(store),
            None => Ok(()),
        }
    }

    pub fn memo(&self, date: NaiveDate, port: &str) -> Result<Option<String>, PreferenceError> {
        match &self.preferences {
            Some(store) => store.memo(date, port),
            None => Ok(self.memos.get(&(date, port.to_string())).cloned()),
        }
    }

    fn port_toggles(&self) -> Vec<PortToggle> {
        self.dataset
            .port_names()
            .map(|port| PortToggle {
                port: port.to_string(),
                enabled: self.enabled_ports.iter().any(|name| name == port),
            })
            .collect()
    }

    /// Enabled ports in dataset order.
    fn active_ports(&self) -> impl Iterator<Item = &str> {
        self.dataset
            .port_names()
            .filter(|port| self.enabled_ports.iter().any(|name| name == port))
    }

    pub fn insights<R: Rng>(&self, rng: &mut R) -> InsightReport {
        let candidates = generate_candidates(&self.dataset, &self.insight_config);
        let selected = select_insight(&candidates, rng);
        InsightReport {
            candidates,
            selected,
        }
    }

    pub fn port_detail(
        &self,
        port: &str,
        range: Option<RangeSelector>,
        today: NaiveDate,
    ) -> Option<PortDetail> {
        let series = self.dataset.port(port)?;
        let filtered = filter_by_range(series, range.unwrap_or(self.range), today);
        Some(build_port_detail(port, &filtered))
    }

    pub fn view<R: Rng>(
        &self,
        overrides: &ViewOverrides,
        today: NaiveDate,
        rng: &mut R,
    ) -> DashboardView {
        let tab = overrides.tab.unwrap_or(self.tab);
        let theme = overrides.theme.unwrap_or(self.theme);
        let range = overrides.range.unwrap_or(self.range);

        let mut view = DashboardView {
            status: ViewStatus::Ready,
            error: None,
            tab,
            theme,
            palette: theme.palette(),
            range,
            font_size: self.font_size,
            moving_average: self.moving_average,
            toggles: self.toggles.clone(),
            ports: self.port_toggles(),
            summary: Vec::new(),
            charts: Vec::new(),
            overview: None,
            insight: None,
            bids: BidScheduleView::default(),
            news: NewsPage::from(&self.news),
            issues: self.issues.clone(),
        };

        if let Some(message) = self.load_error() {
            view.status = ViewStatus::Failed;
            view.error = Some(message);
            return view;
        }

        view.summary = build_summary(&self.dataset, self.active_ports());

        for port in self.active_ports() {
            let Some(series) = self.dataset.port(port) else {
                continue;
            };
            let filtered = filter_by_range(series, range, today);
            match project_port_chart(port, &filtered, &self.moving_average, theme) {
                Ok(mut chart) => {
                    if !self.toggle_enabled(TOGGLE_MOVING_AVERAGE) {
                        for series in &mut chart.series {
                            series.moving_average.clear();
                        }
                    }
                    view.charts.push(chart);
                }
                Err(err) => {
                    warn!(
                        component = "state",
                        event = "chart.project.failed",
                        port,
                        error = %err
                    );
                    view.issues.push(PortIssue {
                        port: port.to_string(),
                        message: err.to_string(),
                    });
                }
            }
        }

        let key_port = &self.insight_config.skew_port;
        view.overview = self
            .active_ports()
            .find(|port| *port == key_port.as_str())
            .into_iter()
            .chain(self.active_ports())
            .find_map(|port| market_overview(&self.dataset, port));
        if self.toggle_enabled(TOGGLE_INSIGHT) {
            view.insight = Some(self.insights(rng).selected);
        }
        view.bids = bid_schedule_view(&self.bids);
        view
    }
}
