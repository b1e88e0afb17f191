//! Dashboard HTTP routes and HTML rendering of the view-model.

use std::sync::{Arc, RwLock};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::bids::BidView;
use crate::chart::Theme;
use crate::market::parse_feed_date;
use crate::preferences::PreferenceError;
use crate::range::{market_today, RangeSelector};
use crate::state::{
    AppState, DashboardView, InsightReport, Tab, UiEvent, ViewOverrides, ViewStatus,
};
use crate::summary::{Direction, PortDetail};

pub const RANGE_CHOICES: [(&str, &str); 5] = [
    ("all", "全期間"),
    ("7", "1週間"),
    ("30", "1ヶ月"),
    ("90", "3ヶ月"),
    ("365", "1年"),
];

pub type SharedAppState = Arc<RwLock<AppState>>;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ViewQuery {
    pub range: Option<String>,
    pub theme: Option<String>,
    pub tab: Option<String>,
}

impl ViewQuery {
    /// Unknown theme or tab names are ignored rather than rejected.
    pub fn overrides(&self) -> ViewOverrides {
        ViewOverrides {
            range: self.range.as_deref().map(RangeSelector::parse),
            theme: self.theme.as_deref().and_then(Theme::parse),
            tab: self.tab.as_deref().and_then(Tab::parse),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MemoQuery {
    pub date: String,
    pub port: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MemoUpdate {
    pub date: String,
    pub port: String,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemoResponse {
    pub date: String,
    pub port: String,
    pub text: Option<String>,
}

#[derive(Debug)]
pub enum ApiError {
    StatePoisoned,
    Preferences(PreferenceError),
    NotFound(String),
    BadRequest(String),
}

impl From<PreferenceError> for ApiError {
    fn from(err: PreferenceError) -> Self {
        Self::Preferences(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::StatePoisoned => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "dashboard state unavailable".to_string(),
            ),
            Self::Preferences(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
        };
        if status.is_server_error() {
            warn!(component = "dashboard", event = "http.request.error", error = %message);
        }
        (status, Json(json!({ "error": message }))).into_response()
    }
}

pub fn dashboard_router(state: SharedAppState) -> Router {
    Router::new()
        .route("/dashboard", get(get_dashboard_html))
        .route("/dashboard/view", get(get_dashboard_view))
        .route("/dashboard/insights", get(get_insights))
        .route("/dashboard/events", post(post_event))
        .route("/dashboard/memo", get(get_memo).put(put_memo))
        .route("/dashboard/detail/{port}", get(get_port_detail))
        .with_state(DashboardAppState { state })
}

#[derive(Clone)]
struct DashboardAppState {
    state: SharedAppState,
}

impl DashboardAppState {
    fn build_view(&self, overrides: &ViewOverrides) -> Result<DashboardView, ApiError> {
        let guard = self.state.read().map_err(|_| ApiError::StatePoisoned)?;
        Ok(guard.view(overrides, market_today(), &mut rand::rng()))
    }
}

fn parse_date_param(raw: &str) -> Result<NaiveDate, ApiError> {
    parse_feed_date(raw).ok_or_else(|| ApiError::BadRequest(format!("invalid date '{raw}'")))
}

async fn get_dashboard_html(
    State(app): State<DashboardAppState>,
    Query(query): Query<ViewQuery>,
) -> Result<Response, ApiError> {
    let view = app.build_view(&query.overrides())?;
    let status = match view.status {
        ViewStatus::Ready => StatusCode::OK,
        ViewStatus::Failed => StatusCode::SERVICE_UNAVAILABLE,
    };
    Ok((status, Html(render_dashboard_html(&view))).into_response())
}

async fn get_dashboard_view(
    State(app): State<DashboardAppState>,
    Query(query): Query<ViewQuery>,
) -> Result<Json<DashboardView>, ApiError> {
    let overrides = query.overrides();
    let view = app.build_view(&overrides)?;
    info!(
        component = "dashboard",
        event = "http.view.request",
        tab = view.tab.as_str(),
        theme = view.theme.as_str(),
        range = %view.range,
        charts = view.charts.len()
    );
    Ok(Json(view))
}

async fn get_insights(
    State(app): State<DashboardAppState>,
) -> Result<Json<InsightReport>, ApiError> {
    let guard = app.state.read().map_err(|_| ApiError::StatePoisoned)?;
    let report = guard.insights(&mut rand::rng());
    info!(
        component = "dashboard",
        event = "http.insights.request",
        candidates = report.candidates.len()
    );
    Ok(Json(report))
}

async fn post_event(
    State(app): State<DashboardAppState>,
    Json(event): Json<UiEvent>,
) -> Result<Json<DashboardView>, ApiError> {
    {
        let mut guard = app.state.write().map_err(|_| ApiError::StatePoisoned)?;
        guard.apply(event)?;
    }
    Ok(Json(app.build_view(&ViewOverrides::default())?))
}

async fn get_memo(
    State(app): State<DashboardAppState>,
    Query(query): Query<MemoQuery>,
) -> Result<Json<MemoResponse>, ApiError> {
    let date = parse_date_param(&query.date)?;
    let guard = app.state.read().map_err(|_| ApiError::StatePoisoned)?;
    let text = guard.memo(date, &query.port)?;
    Ok(Json(MemoResponse {
        date: query.date,
        port: query.port,
        text,
    }))
}

async fn put_memo(
    State(app): State<DashboardAppState>,
    Json(update): Json<MemoUpdate>,
) -> Result<Json<MemoResponse>, ApiError> {
    let date = parse_date_param(&update.date)?;
    let mut guard = app.state.write().map_err(|_| ApiError::StatePoisoned)?;
    guard.apply(UiEvent::SaveMemo {
        date,
        port: update.port.clone(),
        text: update.text,
    })?;
    let text = guard.memo(date, &update.port)?;
    Ok(Json(MemoResponse {
        date: update.date,
        port: update.port,
        text,
    }))
}

async fn get_port_detail(
    State(app): State<DashboardAppState>,
    Path(port): Path<String>,
    Query(query): Query<ViewQuery>,
) -> Result<Json<PortDetail>, ApiError> {
    let guard = app.state.read().map_err(|_| ApiError::StatePoisoned)?;
    let range = query.range.as_deref().map(RangeSelector::parse);
    guard
        .port_detail(&port, range, market_today())
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("unknown port '{port}'")))
}

const STYLE: &str = concat!(
    "*{box-sizing:border-box}",
    "body{margin:0;font-family:\"Hiragino Sans\",\"Noto Sans JP\",sans-serif;min-height:100vh}",
    "body.theme-dark{background:#0d1117;color:#c9d1d9}",
    "body.theme-light{background:#f6f8fa;color:#1f2328}",
    "body.theme-ocean{background:#001a33;color:#d6e6f5}",
    "body.font-small{font-size:13px}",
    "body.font-medium{font-size:15px}",
    "body.font-large{font-size:18px}",
    ".shell{max-width:1200px;margin:0 auto;padding:20px 16px}",
    ".hero h1{margin:0 0 8px;font-size:1.5rem}",
    ".bar{display:flex;gap:8px;flex-wrap:wrap;margin:10px 0}",
    ".bar a{padding:6px 12px;border-radius:8px;border:1px solid rgba(128,128,128,.4);",
    "color:inherit;text-decoration:none}",
    ".bar a.active{background:rgba(88,166,255,.25)}",
    ".cards{display:grid;grid-template-columns:repeat(auto-fit,minmax(260px,1fr));gap:12px}",
    ".card{border:1px solid rgba(128,128,128,.35);border-radius:12px;padding:12px 14px}",
    ".summary-row{display:flex;justify-content:space-between;padding:4px 0}",
    ".diff-up{color:#f85149}",
    ".diff-down{color:#58a6ff}",
    ".diff-equal{opacity:.7}",
    ".insight{margin:14px 0}",
    ".error{border:1px solid #f85149;border-radius:12px;padding:16px;margin-top:16px}",
    "table{width:100%;border-collapse:collapse}",
    "td,th{padding:6px 8px;border-bottom:1px solid rgba(128,128,128,.3);text-align:left}",
);

/// Full page for the view. A failed load renders only the error message.
pub fn render_dashboard_html(view: &DashboardView) -> String {
    let mut out = String::new();
    out.push_str("<!DOCTYPE html><html lang=\"ja\"><head><meta charset=\"utf-8\">\n");
    out.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    out.push_str("<title>カツオ相場ダッシュボード</title>\n");
    out.push_str("<style>");
    out.push_str(STYLE);
    out.push_str("</style>\n");
    out.push_str(&format!(
        "</head><body class=\"theme-{} font-{}\"><main class=\"shell\">\n",
        view.theme.as_str(),
        view.font_size.as_str()
    ));
    out.push_str("<section class=\"hero\"><h1>カツオ相場ダッシュボード</h1></section>\n");

    if let Some(message) = &view.error {
        out.push_str("<section class=\"error\" id=\"load-error\" role=\"alert\">");
        out.push_str(&escape_html(message));
        out.push_str("</section>\n</main></body></html>\n");
        return out;
    }

    render_controls(&mut out, view);
    render_insight(&mut out, view);

    match view.tab {
        Tab::Summary => render_summary(&mut out, view),
        Tab::Charts => render_charts(&mut out, view),
        Tab::Bids => render_bids(&mut out, view),
        Tab::News => render_news(&mut out, view),
    }

    if !view.issues.is_empty() {
        out.push_str("<section class=\"card\" id=\"port-issues\"><b>読み込めなかった港:</b><ul>");
        for issue in &view.issues {
            out.push_str(&format!(
                "<li>{}: {}</li>",
                escape_html(&issue.port),
                escape_html(&issue.message)
            ));
        }
        out.push_str("</ul></section>\n");
    }

    out.push_str("</main></body></html>\n");
    out
}

fn view_link(tab: Tab, range: &str, theme: Theme) -> String {
    format!(
        "/dashboard?tab={}&range={}&theme={}",
        tab.as_str(),
        escape_html(range),
        theme.as_str()
    )
}

/// Percent-encoded `/dashboard/detail/{port}` path.
fn detail_path(port: &str) -> String {
    let mut url = reqwest::Url::parse("http://localhost/dashboard/detail")
        .expect("detail base URL is valid");
    if let Ok(mut segments) = url.path_segments_mut() {
        segments.push(port);
    }
    url.path().to_string()
}

fn render_controls(out: &mut String, view: &DashboardView) {
    let range = view.range.to_string();
    let tabs = [
        (Tab::Summary, "最新相場"),
        (Tab::Charts, "チャート"),
        (Tab::Bids, "入札予定"),
        (Tab::News, "ニュース"),
    ];

    out.push_str("<nav class=\"bar\" id=\"tabs\">");
    for (tab, label) in tabs {
        let class = if tab == view.tab { "active" } else { "" };
        out.push_str(&format!(
            "<a class=\"{class}\" data-tab=\"{}\" href=\"{}\">{label}</a>",
            tab.as_str(),
            view_link(tab, &range, view.theme)
        ));
    }
    out.push_str("</nav>\n<div class=\"bar\" id=\"range-filters\">");
    for (value, label) in RANGE_CHOICES {
        let class = if value == range { "active" } else { "" };
        out.push_str(&format!(
            "<a class=\"btn-filter {class}\" data-range=\"{value}\" href=\"{}\">{label}</a>",
            view_link(view.tab, value, view.theme)
        ));
    }
    out.push_str("</div>\n<div class=\"bar\" id=\"themes\">");
    for theme in Theme::ALL {
        let class = if theme == view.theme { "active" } else { "" };
        out.push_str(&format!(
            "<a class=\"btn-theme {class}\" data-theme=\"{}\" href=\"{}\">{}</a>",
            theme.as_str(),
            view_link(view.tab, &range, theme),
            theme.as_str()
        ));
    }
    out.push_str("</div>\n");
}

fn render_insight(out: &mut String, view: &DashboardView) {
    out.push_str("<section class=\"card insight\" id=\"insight-content\">");
    if let Some(overview) = &view.overview {
        out.push_str(&format!(
            "<p><strong>現在の市場概況 ({} {}):</strong> {}</p>",
            escape_html(&overview.port),
            escape_html(&overview.size),
            escape_html(&overview.message)
        ));
    }
    if let Some(insight) = &view.insight {
        out.push_str(&format!(
            "<p><strong>{}</strong> <span class=\"memo\">{}</span></p><p>{}</p>",
            escape_html(&insight.title),
            escape_html(&insight.memo),
            escape_html(&insight.text)
        ));
    }
    out.push_str("</section>\n");
}

fn render_summary(out: &mut String, view: &DashboardView) {
    out.push_str("<section class=\"cards\" id=\"summary-container\">");
    for card in &view.summary {
        out.push_str("<div class=\"card summary-card\">");
        out.push_str(&format!(
            "<div class=\"summary-port\">{}</div><div class=\"summary-date\">最新取引日: {}</div>",
            escape_html(&card.port),
            card.latest_date
        ));
        for row in &card.rows {
            let price = row
                .price
                .map(|p| p.to_string())
                .unwrap_or_else(|| "-".to_string());
            out.push_str(&format!(
                "<div class=\"summary-row\"><span>{}</span><span>{}円/kg ",
                escape_html(&row.size),
                price
            ));
            if let Some(change) = &row.change {
                let class = match change.direction {
                    Direction::Up => "diff-up",
                    Direction::Down => "diff-down",
                    Direction::Equal => "diff-equal",
                };
                out.push_str(&format!(
                    "<span class=\"price-diff {class}\">{}</span>",
                    escape_html(&change.label)
                ));
            }
            out.push_str("</span></div>");
        }
        out.push_str(&format!(
            "<a href=\"{}\">詳細</a></div>",
            escape_html(&detail_path(&card.port))
        ));
    }
    out.push_str("</section>\n");
}

fn render_charts(out: &mut String, view: &DashboardView) {
    out.push_str("<section class=\"cards\" id=\"charts\">");
    for chart in &view.charts {
        out.push_str(&format!(
            "<div class=\"card\"><h3>{}</h3><canvas data-port=\"{}\"></canvas><ul>",
            escape_html(&chart.port),
            escape_html(&chart.port)
        ));
        for series in &chart.series {
            out.push_str(&format!(
                "<li><span style=\"color:{}\">■</span> {} ({}点)</li>",
                escape_html(&series.color),
                escape_html(&series.size),
                series.price_line.len()
            ));
        }
        out.push_str("</ul></div>");
    }
    out.push_str("</section>\n");

    let payload = serde_json::to_string(&view.charts).unwrap_or_else(|_| "[]".to_string());
    out.push_str("<script type=\"application/json\" id=\"chart-data\">");
    out.push_str(&payload.replace("</", "<\\/"));
    out.push_str("</script>\n");
}

fn render_bids(out: &mut String, view: &DashboardView) {
    out.push_str("<section id=\"bids\">");
    match &view.bids.current {
        Some(current) => {
            out.push_str("<div class=\"card\" id=\"bid-current\"><h3>次回入札</h3>");
            push_bid_row(out, current);
            out.push_str("</div>");
        }
        None => out.push_str("<div class=\"card\">入札予定はありません</div>"),
    }
    if !view.bids.archive.is_empty() {
        out.push_str("<div class=\"card\" id=\"bid-archive\"><h3>過去の入札</h3>");
        for bid in &view.bids.archive {
            push_bid_row(out, bid);
        }
        out.push_str("</div>");
    }
    out.push_str("</section>\n");
}

fn push_bid_row(out: &mut String, bid: &BidView) {
    let record = &bid.record;
    out.push_str(&format!(
        "<table><tr><th>{}</th><td>入札日 {}</td><td>水揚 {}</td><td>",
        escape_html(&record.vessel_name),
        record.bid_date,
        escape_html(&record.delivery_date)
    ));
    out.push_str(&format!(
        "<a target=\"_blank\" rel=\"noopener noreferrer\" href=\"{}\">{} {}</a></td></tr>",
        escape_html(&bid.map_link.url),
        escape_html(&record.sea_area.lat),
        escape_html(&record.sea_area.lon)
    ));
    for item in &record.items {
        out.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}t</td></tr>",
            escape_html(&item.category),
            escape_html(&item.size),
            escape_html(&item.kind),
            item.volume
        ));
    }
    out.push_str("</table>");
}

fn render_news(out: &mut String, view: &DashboardView) {
    out.push_str("<section id=\"news\">");
    for item in &view.news.items {
        out.push_str(&format!(
            concat!(
                "<article class=\"card\"><div>{} ・ {} ・ {}</div>",
                "<h3><a target=\"_blank\" rel=\"noopener noreferrer\" href=\"{}\">{}</a></h3>",
                "<p>{}</p></article>"
            ),
            escape_html(&item.date),
            escape_html(&item.category),
            escape_html(&item.source),
            escape_html(&item.url),
            escape_html(&item.title),
            escape_html(&item.summary)
        ));
    }
    if view.news.has_more {
        out.push_str("<button id=\"news-more\" data-event=\"load_more_news\">もっと見る</button>");
    }
    out.push_str("</section>\n");
}

fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
