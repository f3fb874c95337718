//! HTTP API over a running stream controller.
//!
//! Exposes the live snapshot, summary metrics and stream controls so remote
//! dashboards can follow an inspection run.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use axum::{
    Router,
    extract::{Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use syringe_sim_core::{
    CumulativeView, DEFAULT_EXPORT_PATH, ExportError, Sample, SessionState, StreamConfig,
    StreamController, StreamState, SummaryMetrics, TagId,
};

/// Shared server state.
struct AppState {
    controller: Arc<StreamController>,
    /// Directory every export lands in.
    export_dir: PathBuf,
}

#[derive(Deserialize)]
struct TagParams {
    /// Tag wire name, e.g. `tag-4`.
    tag: Option<String>,
}

#[derive(Deserialize, Default)]
struct StartRequest {
    /// Overrides the configured batch name for this start.
    batch_name: Option<String>,
}

#[derive(Deserialize, Default)]
struct ExportRequest {
    /// Bare file name inside the export directory.
    file: Option<String>,
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    state: StreamState,
    session: SessionState,
    samples: usize,
}

#[derive(Debug, Serialize)]
struct SamplesResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    tag: Option<TagId>,
    total: usize,
    samples: Vec<Sample>,
}

#[derive(Debug, Serialize)]
struct ExportResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rows: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, error: impl ToString) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
}

fn parse_tag(raw: Option<&str>) -> Result<Option<TagId>, ApiError> {
    raw.map(|t| t.parse::<TagId>())
        .transpose()
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e))
}

fn status_of(controller: &StreamController) -> StatusResponse {
    let session = controller.session();
    StatusResponse {
        state: session.state,
        samples: controller.snapshot().len(),
        session,
    }
}

async fn handle_index(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let session = state.controller.session();
    Json(serde_json::json!({
        "name": "Syringe Inspection Simulator",
        "version": syringe_sim_core::VERSION,
        "state": session.state,
        "endpoints": {
            "/": "This API index",
            "/health": "Health check",
            "/api/v1/status": "Stream state and session bookkeeping",
            "/api/v1/metrics": "Total inspected, total defects, defect rate, batch",
            "/api/v1/samples": "Sample log in order (?tag=tag-1 to filter)",
            "/api/v1/latest": "Most recent sample for ?tag=",
            "/api/v1/cumulative": "Running totals for tag-4 and tag-5",
            "/api/v1/config": "GET current configuration, PUT to replace it",
            "/api/v1/stream/start": "POST {\"batch_name\": optional}",
            "/api/v1/stream/stop": "POST",
            "/api/v1/stream/toggle": "POST",
            "/api/v1/export": format!("POST {{\"file\": optional file name, default {DEFAULT_EXPORT_PATH}}}"),
        },
    }))
}

async fn handle_health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "state": state.controller.state(),
    }))
}

async fn handle_status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    Json(status_of(&state.controller))
}

async fn handle_metrics(State(state): State<Arc<AppState>>) -> Json<SummaryMetrics> {
    Json(state.controller.metrics())
}

async fn handle_samples(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TagParams>,
) -> Result<Json<SamplesResponse>, ApiError> {
    let tag = parse_tag(params.tag.as_deref())?;
    let snapshot = state.controller.snapshot();
    let samples: Vec<Sample> = match tag {
        Some(tag) => snapshot.series(tag).cloned().collect(),
        None => snapshot.log.to_vec(),
    };
    Ok(Json(SamplesResponse {
        tag,
        total: samples.len(),
        samples,
    }))
}

async fn handle_latest(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TagParams>,
) -> Result<Json<Sample>, ApiError> {
    let tag = parse_tag(params.tag.as_deref())?
        .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "missing ?tag= parameter"))?;
    state
        .controller
        .snapshot()
        .latest(tag)
        .cloned()
        .map(Json)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("no samples for {tag}")))
}

async fn handle_cumulative(State(state): State<Arc<AppState>>) -> Json<CumulativeView> {
    let snapshot = state.controller.snapshot();
    Json(CumulativeView::clone(&snapshot.cumulative))
}

async fn handle_get_config(State(state): State<Arc<AppState>>) -> Json<StreamConfig> {
    Json(state.controller.config())
}

async fn handle_put_config(
    State(state): State<Arc<AppState>>,
    Json(config): Json<StreamConfig>,
) -> Result<Json<StreamConfig>, ApiError> {
    state
        .controller
        .update_config(config)
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e))?;
    Ok(Json(state.controller.config()))
}

async fn handle_start(
    State(state): State<Arc<AppState>>,
    body: Option<Json<StartRequest>>,
) -> Json<StatusResponse> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    match request.batch_name.filter(|n| !n.trim().is_empty()) {
        Some(name) => state.controller.start_batch(name),
        None => state.controller.start(),
    };
    Json(status_of(&state.controller))
}

async fn handle_stop(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    state.controller.stop();
    Json(status_of(&state.controller))
}

async fn handle_toggle(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    state.controller.toggle();
    Json(status_of(&state.controller))
}

async fn handle_export(
    State(state): State<Arc<AppState>>,
    body: Option<Json<ExportRequest>>,
) -> (StatusCode, Json<ExportResponse>) {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    let file = request.file.as_deref().unwrap_or(DEFAULT_EXPORT_PATH);
    let path = match export_target(&state.export_dir, file) {
        Ok(path) => path,
        Err(error) => {
            log::warn!("rejected export file name {file:?}: {error}");
            return (
                StatusCode::BAD_REQUEST,
                Json(ExportResponse {
                    success: false,
                    path: None,
                    rows: None,
                    error: Some(error.into()),
                }),
            );
        }
    };

    match state.controller.export(&path) {
        Ok(summary) => (
            StatusCode::OK,
            Json(ExportResponse {
                success: true,
                path: Some(summary.path.display().to_string()),
                rows: Some(summary.rows),
                error: None,
            }),
        ),
        Err(e) => {
            let status = match e {
                ExportError::EmptyLog => StatusCode::CONFLICT,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (
                status,
                Json(ExportResponse {
                    success: false,
                    path: Some(path.display().to_string()),
                    rows: None,
                    error: Some(e.to_string()),
                }),
            )
        }
    }
}

/// Resolve a client-supplied export name inside `dir`.
///
/// Only a single plain file name is accepted: no separators, no `..`, no
/// absolute or drive-prefixed paths.
fn export_target(dir: &Path, file: &str) -> Result<PathBuf, &'static str> {
    if file.is_empty() || file.contains(['/', '\\']) {
        return Err("expected a bare file name");
    }
    let mut components = Path::new(file).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(name)), None) => Ok(dir.join(name)),
        _ => Err("expected a bare file name"),
    }
}

/// Build the axum router. Exports are written into `export_dir`.
pub fn build_router(controller: Arc<StreamController>, export_dir: PathBuf) -> Router {
    let state = Arc::new(AppState {
        controller,
        export_dir,
    });

    Router::new()
        .route("/", get(handle_index))
        .route("/health", get(handle_health))
        .route("/api/v1/status", get(handle_status))
        .route("/api/v1/metrics", get(handle_metrics))
        .route("/api/v1/samples", get(handle_samples))
        .route("/api/v1/latest", get(handle_latest))
        .route("/api/v1/cumulative", get(handle_cumulative))
        .route(
            "/api/v1/config",
            get(handle_get_config).put(handle_put_config),
        )
        .route("/api/v1/stream/start", post(handle_start))
        .route("/api/v1/stream/stop", post(handle_stop))
        .route("/api/v1/stream/toggle", post(handle_toggle))
        .route("/api/v1/export", post(handle_export))
        .with_state(state)
}

/// Serve the API until the listener fails.
pub async fn run_server(
    controller: Arc<StreamController>,
    host: &str,
    port: u16,
    export_dir: PathBuf,
) -> std::io::Result<()> {
    log::info!("exports go to {}", export_dir.display());
    let app = build_router(controller, export_dir);
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    log::info!("listening on http://{addr}");
    axum::serve(listener, app).await
}
