//! Katsuo (skipjack) auction market dashboard core.
//!
//! Data flows one way: feeds are loaded once, range-filtered per view,
//! smoothed with a moving average, scanned for heuristic insights and
//! projected into typed view records. UI events mutate an explicit
//! [`AppState`]; everything else is a pure derivation.

mod bids;
mod chart;
mod config;
mod dashboard;
mod feeds;
mod import;
mod insights;
mod market;
mod moving_average;
mod news;
mod observability;
mod preferences;
mod range;
mod state;
mod summary;

pub use bids::{
    bid_schedule_view, map_link, parse_coordinate, partition_bids, BidItem, BidRecord,
    BidSchedule, BidScheduleView, BidView, MapLink, SeaArea, MAPS_SEARCH_URL,
};
pub use chart::{
    project_port_chart, size_color, PortChart, Rgb, SizeChartSeries, Theme, ThemePalette,
    BASE_COLORS,
};
pub use config::{
    dashboard_config_from_env, ConfigError, DashboardConfig, DEFAULT_DASHBOARD_ADDR,
    DEFAULT_DATA_BASE, DEFAULT_PREFS_PATH,
};
pub use dashboard::{
    dashboard_router, render_dashboard_html, ApiError, MemoResponse, SharedAppState, ViewQuery,
    RANGE_CHOICES,
};
pub use feeds::{
    cache_busted, fetch_with_fallback, fetcher_for_base, load_failure_message, load_feeds,
    FeedError, FeedPath, FeedPaths, FsFetcher, HttpFetcher, LoadOutcome, LoadedFeeds,
    ReqwestBlockingFetcher, DEFAULT_HTTP_TIMEOUT_MS,
};
pub use import::{
    import_market_csv, import_market_csv_file, merge_news_file, write_market_json, ImportError,
    ImportReport, NewsMergeReport, PRICE_CEILING, PRICE_FLOOR,
};
pub use insights::{
    generate_candidates, market_overview, select_insight, size_weight, stable_market_insight,
    InsightCandidate, InsightConfig, InsightKind, MarketOverview, Trend,
};
pub use market::{
    latest_pair, lookup_on_date, parse_feed_date, DatedLookup, DecodedMarket, MarketDataset,
    ObservationPoint, PortIssue, SizeSeries, DATE_FORMAT,
};
pub use moving_average::{
    moving_average, moving_average_values, AveragePoint, DatedValue, MovingAverageConfig,
    MovingAverageError, MovingAveragePolicy, DEFAULT_WINDOW,
};
pub use news::{merge_news, NewsItem, NewsPage, NewsPager, NEWS_PAGE_SIZE, NEWS_RETENTION};
pub use observability::{
    init_logging, log_app_bind, log_app_start, log_data_source, logging_config_from_env,
    LogFormat, LoggingConfig, LoggingInitError,
};
pub use preferences::{FontSize, PreferenceError, PreferenceStore, Toggles};
pub use range::{filter_by_range, filter_by_range_now, market_today, RangeSelector};
pub use state::{
    AppState, DashboardView, InsightReport, PortToggle, Tab, UiEvent, ViewOverrides, ViewStatus,
    TOGGLE_INSIGHT, TOGGLE_MOVING_AVERAGE,
};
pub use summary::{
    build_port_detail, build_summary, build_summary_card, Direction, PortDetail, PriceChange,
    SizeDetail, SummaryCard, SummaryRow,
};
