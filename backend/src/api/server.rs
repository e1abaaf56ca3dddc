//! HTTP Server for the statedash API.
//!
//! Serves the derived data behind each dashboard chart. The catalog is
//! loaded once before the server starts and shared read-only.
//!
//! # API Endpoints
//!
//! | Method | Path               | Parameters                      | Description                       |
//! |--------|--------------------|---------------------------------|-----------------------------------|
//! | GET    | `/health`          |                                 | Health check                      |
//! | GET    | `/api/metrics`     |                                 | Loaded metrics and load reports   |
//! | GET    | `/api/series`      | `dataset`, `states`, `from`, `to` | Per-state line chart series     |
//! | GET    | `/api/aggregates`  |                                 | Yearly aggregate table (heatmap)  |
//! | GET    | `/api/change`      | `dataset`, `states`, `baseline` | Per-state change from baseline    |
//! | GET    | `/api/comparison`  | `baseline`                      | Per-metric change from baseline   |
//! | GET    | `/api/correlation` | `year`                          | Correlation matrix                |
//! | GET    | `/api/map`         | `dataset`, `year`, `states`, `from` | Choropleth snapshot + changes |
//! | GET    | `/api/bubble`      | `x`, `y`, `year`                | Bubble chart points               |
//! | GET    | `/api/logs`        |                                 | SSE stream for real-time logs     |

use axum::{
    extract::{Query, State},
    http::{header, Method, StatusCode},
    response::{sse::Event, Json, Sse},
    routing::get,
    Router,
};
use futures::stream::Stream;
use serde::Deserialize;
use serde_json::{json, Value};
use std::{convert::Infallible, net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use super::logs::{log_error, log_info, LOG_BROADCASTER};
use super::types::{error_response, ApiResponse, MetricSummary};
use crate::config::DashboardConfig;
use crate::error::{ServerError, ServerResult};
use crate::models::YearlyAggregate;
use crate::transform::baseline::BaselineResult;
use crate::transform::correlation::CorrelationMatrix;
use crate::transform::pipeline::{self, DatasetCatalog, MapView, Selection};
use crate::transform::series::{SeriesMap, YearRange};
use crate::transform::snapshot::BubblePoint;

/// Read-only state shared by every handler
pub struct AppState {
    pub catalog: DatasetCatalog,
    pub config: DashboardConfig,
}

pub type SharedState = Arc<AppState>;

type ApiError = (StatusCode, Json<Value>);
type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

/// Query parameters shared by the view endpoints
#[derive(Debug, Default, Deserialize)]
pub struct ViewQuery {
    pub dataset: Option<String>,
    /// Comma-separated state names
    pub states: Option<String>,
    pub year: Option<i32>,
    pub from: Option<i32>,
    pub to: Option<i32>,
    pub baseline: Option<i32>,
    pub x: Option<String>,
    pub y: Option<String>,
}

impl ViewQuery {
    fn states(&self) -> Vec<String> {
        self.states
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()
    }

    fn selection(&self) -> ServerResult<Selection> {
        let dataset = required(&self.dataset, "dataset")?;
        let mut selection = Selection::new(dataset).with_states(self.states());
        selection.year = self.year;
        Ok(selection)
    }

    fn year_range(&self) -> ServerResult<Option<YearRange>> {
        Ok(YearRange::from_bounds(self.from, self.to)?)
    }
}

fn required<'a>(value: &'a Option<String>, name: &str) -> ServerResult<&'a str> {
    value
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ServerError::BadRequest(format!("Missing '{}' parameter", name)))
}

fn api_error(err: ServerError) -> ApiError {
    let status = if err.is_client_error() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    if status.is_server_error() {
        log_error(err.to_string());
    }
    (status, Json(error_response(&err.to_string())))
}

fn respond<T>(result: ServerResult<T>) -> ApiResult<T> {
    result.map(|data| Json(ApiResponse::new(data))).map_err(api_error)
}

/// Build the router; `static_dir` is served for every other path.
pub fn router(state: SharedState, static_dir: Option<PathBuf>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE]);

    let app = Router::new()
        .route("/health", get(health))
        .route("/api/metrics", get(metrics))
        .route("/api/series", get(series))
        .route("/api/aggregates", get(aggregates))
        .route("/api/change", get(change))
        .route("/api/comparison", get(comparison))
        .route("/api/correlation", get(correlation))
        .route("/api/map", get(map))
        .route("/api/bubble", get(bubble))
        .route("/api/logs", get(sse_logs));

    let app = match static_dir {
        Some(dir) => app.fallback_service(ServeDir::new(dir)),
        None => app.route("/", get(health)),
    };

    app.layer(cors).with_state(state)
}

/// Start the HTTP server
pub async fn start_server(
    catalog: DatasetCatalog,
    config: DashboardConfig,
    port: u16,
    static_dir: Option<PathBuf>,
) -> ServerResult<()> {
    let state = Arc::new(AppState { catalog, config });
    let app = router(state, static_dir.clone());

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    eprintln!("🚀 Statedash server running on http://localhost:{}", port);
    eprintln!("   GET  /api/metrics     - Loaded metrics");
    eprintln!("   GET  /api/series      - Line chart series");
    eprintln!("   GET  /api/correlation - Correlation matrix");
    eprintln!("   GET  /api/logs        - SSE log stream");
    eprintln!("   GET  /health          - Health check");
    if let Some(dir) = &static_dir {
        eprintln!("📁 Serving dashboard from {}", dir.display());
    }
    eprintln!();

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ServerError::Internal(format!("bind {}: {}", addr, e)))?;
    log_info(format!("Listening on {}", addr));
    axum::serve(listener, app)
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))?;

    Ok(())
}

/// Health check endpoint
async fn health(State(state): State<SharedState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "statedash",
        "version": env!("CARGO_PKG_VERSION"),
        "metrics": state.catalog.metrics().len(),
        "baselineYear": state.catalog.baseline_year,
        "comparisonYear": state.catalog.comparison_year,
        "dataDir": state.config.data_dir.display().to_string(),
    }))
}

/// SSE endpoint for real-time log streaming
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(entry) => {
            let json = serde_json::to_string(&entry).ok()?;
            Some(Ok(Event::default().data(json)))
        }
        // lagged receivers skip what they missed
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

async fn metrics(State(state): State<SharedState>) -> ApiResult<Vec<MetricSummary>> {
    respond(Ok(state.catalog.metrics().iter().map(MetricSummary::from).collect()))
}

async fn series(State(state): State<SharedState>, Query(query): Query<ViewQuery>) -> ApiResult<SeriesMap> {
    respond(query.selection().and_then(|selection| {
        Ok(pipeline::line_view(&state.catalog, &selection, query.year_range()?)?)
    }))
}

async fn aggregates(State(state): State<SharedState>) -> ApiResult<Vec<YearlyAggregate>> {
    respond(Ok(pipeline::heatmap_table(&state.catalog)))
}

async fn change(State(state): State<SharedState>, Query(query): Query<ViewQuery>) -> ApiResult<BaselineResult> {
    respond(query.selection().and_then(|selection| {
        Ok(pipeline::state_changes(&state.catalog, &selection, query.baseline)?)
    }))
}

async fn comparison(State(state): State<SharedState>, Query(query): Query<ViewQuery>) -> ApiResult<BaselineResult> {
    respond(Ok(pipeline::comparison(&state.catalog, query.baseline)))
}

async fn correlation(State(state): State<SharedState>, Query(query): Query<ViewQuery>) -> ApiResult<CorrelationMatrix> {
    respond(pipeline::correlation(&state.catalog, query.year).map_err(ServerError::from))
}

async fn map(State(state): State<SharedState>, Query(query): Query<ViewQuery>) -> ApiResult<MapView> {
    respond(query.selection().and_then(|selection| {
        Ok(pipeline::map_view(&state.catalog, &selection, query.from)?)
    }))
}

async fn bubble(State(state): State<SharedState>, Query(query): Query<ViewQuery>) -> ApiResult<Vec<BubblePoint>> {
    respond(required(&query.x, "x").and_then(|x| {
        let y = required(&query.y, "y")?;
        Ok(pipeline::bubble_view(&state.catalog, x, y, query.year)?)
    }))
}
