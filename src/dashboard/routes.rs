//! Dashboard API route handlers.
//!
//! Read endpoints return JSON snapshots of the bench; control endpoints
//! go through the `RunDriver` / `TestBench` guards. State is shared via
//! `Arc<DashboardState>`.

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::error;

use crate::engine::{BenchSnapshot, RunDriver, SharedBench};
use crate::error::BenchError;
use crate::export::{self, SampleReport};
use crate::types::{CurvePoint, Geometry, MachineStatus, Notice, RunRecord, Sample};

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Shared state accessible by all route handlers.
pub struct DashboardState {
    pub driver: RunDriver,
    pub export_dir: PathBuf,
}

impl DashboardState {
    pub fn new(driver: RunDriver, export_dir: impl Into<PathBuf>) -> Self {
        Self {
            driver,
            export_dir: export_dir.into(),
        }
    }

    pub fn bench(&self) -> &SharedBench {
        self.driver.bench()
    }
}

pub type AppState = Arc<DashboardState>;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Error returned by handlers; maps onto an HTTP status.
#[derive(Debug)]
pub enum ApiError {
    Bench(BenchError),
    Internal(anyhow::Error),
}

impl From<BenchError> for ApiError {
    fn from(e: BenchError) -> Self {
        ApiError::Bench(e)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        ApiError::Internal(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Bench(e) => {
                let status = match e {
                    _ if e.is_not_found() => StatusCode::NOT_FOUND,
                    BenchError::InvalidSample(_) => StatusCode::UNPROCESSABLE_ENTITY,
                    _ => StatusCode::CONFLICT,
                };
                (status, e.to_string())
            }
            ApiError::Internal(e) => {
                error!(error = %e, "Dashboard request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, format!("{e:#}"))
            }
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct SampleView {
    pub id: u32,
    pub name: String,
    pub status: String,
    pub result: String,
    pub result_mpa: Option<f64>,
    pub geometry: Geometry,
    pub method: String,
    pub selected: bool,
}

impl SampleView {
    fn new(sample: &Sample, selected: bool) -> Self {
        Self {
            id: sample.id,
            name: sample.name.clone(),
            status: sample.status.to_string(),
            result: sample.result_text(),
            result_mpa: sample.result,
            geometry: sample.geometry,
            method: sample.method.to_string(),
            selected,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AddSampleRequest {
    pub name: Option<String>,
    pub width: Option<f64>,
    pub thickness: Option<f64>,
    pub gauge_length: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StartResponse {
    pub generation: u64,
    pub sample_id: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MachineRequest {
    pub status: MachineStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DoorRequest {
    pub closed: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JogRequest {
    pub delta_mm: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct JogResponse {
    pub position_mm: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportResponse {
    pub files: Vec<String>,
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

/// GET /api/status
pub async fn get_status(State(state): State<AppState>) -> Json<BenchSnapshot> {
    Json(state.bench().read().await.snapshot())
}

/// GET /api/samples
pub async fn get_samples(State(state): State<AppState>) -> Json<Vec<SampleView>> {
    let bench = state.bench().read().await;
    let selected = bench.selected_sample().map(|s| s.id);
    Json(
        bench
            .samples()
            .iter()
            .map(|s| SampleView::new(s, Some(s.id) == selected))
            .collect(),
    )
}

/// POST /api/samples
pub async fn add_sample(
    State(state): State<AppState>,
    Json(req): Json<AddSampleRequest>,
) -> ApiResult<(StatusCode, Json<SampleView>)> {
    let mut bench = state.bench().write().await;
    let geometry = if req.width.is_some() || req.thickness.is_some() || req.gauge_length.is_some()
    {
        let base = bench.default_geometry();
        Some(Geometry {
            width: req.width.unwrap_or(base.width),
            thickness: req.thickness.unwrap_or(base.thickness),
            gauge_length: req.gauge_length.unwrap_or(base.gauge_length),
        })
    } else {
        None
    };

    let id = bench.add_sample(req.name, geometry)?;
    let selected = bench.selected_sample().map(|s| s.id) == Some(id);
    let sample = bench.sample(id).ok_or(BenchError::SampleNotFound(id))?;
    Ok((StatusCode::CREATED, Json(SampleView::new(sample, selected))))
}

/// DELETE /api/samples/:id
pub async fn delete_sample(
    State(state): State<AppState>,
    Path(id): Path<u32>,
) -> ApiResult<Json<SampleView>> {
    let removed = state.bench().write().await.remove_sample(id)?;
    Ok(Json(SampleView::new(&removed, false)))
}

/// POST /api/samples/:id/select
pub async fn select_sample(
    State(state): State<AppState>,
    Path(id): Path<u32>,
) -> ApiResult<StatusCode> {
    state.bench().write().await.select_sample(id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/samples/:id/export — key/value document as a download.
pub async fn export_sample(
    State(state): State<AppState>,
    Path(id): Path<u32>,
) -> ApiResult<Response> {
    let bench = state.bench().read().await;
    let sample = bench.sample(id).ok_or(BenchError::SampleNotFound(id))?;
    let report = SampleReport::from_sample(sample, bench.operator(), chrono::Utc::now());
    Ok(attachment(
        "text/plain; charset=utf-8",
        &report.file_name(),
        report.render(),
    ))
}

/// GET /api/samples.csv
pub async fn export_queue_csv(State(state): State<AppState>) -> Response {
    let bench = state.bench().read().await;
    attachment(
        "text/csv; charset=utf-8",
        "samples.csv",
        export::queue_csv(bench.samples()),
    )
}

/// POST /api/export — write every sample document and the queue CSV to
/// the export directory.
pub async fn export_all(State(state): State<AppState>) -> ApiResult<Json<ExportResponse>> {
    let bench = state.bench().read().await;
    let now = chrono::Utc::now();
    let mut files = Vec::new();
    for sample in bench.samples() {
        let path = SampleReport::from_sample(sample, bench.operator(), now)
            .write_to(&state.export_dir)?;
        files.push(path.display().to_string());
    }
    let csv_path = state.export_dir.join("samples.csv");
    export::write_queue_csv(bench.samples(), &csv_path)?;
    files.push(csv_path.display().to_string());
    Ok(Json(ExportResponse { files }))
}

/// POST /api/run/start
pub async fn start_run(State(state): State<AppState>) -> ApiResult<Json<StartResponse>> {
    let ticket = state.driver.start().await?;
    Ok(Json(StartResponse {
        generation: ticket.generation,
        sample_id: ticket.sample_id,
    }))
}

/// POST /api/run/stop
pub async fn stop_run(State(state): State<AppState>) -> ApiResult<StatusCode> {
    state.driver.stop().await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/run/pause
pub async fn pause_run(State(state): State<AppState>) -> ApiResult<StatusCode> {
    state.driver.pause().await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/run/resume
pub async fn resume_run(State(state): State<AppState>) -> ApiResult<Json<StartResponse>> {
    let ticket = state.driver.resume().await?;
    Ok(Json(StartResponse {
        generation: ticket.generation,
        sample_id: ticket.sample_id,
    }))
}

/// GET /api/curve — points displayed so far in the current run.
pub async fn get_curve(State(state): State<AppState>) -> Json<Vec<CurvePoint>> {
    Json(state.bench().read().await.displayed_curve().to_vec())
}

/// POST /api/machine
pub async fn set_machine(
    State(state): State<AppState>,
    Json(req): Json<MachineRequest>,
) -> Json<BenchSnapshot> {
    let mut bench = state.bench().write().await;
    bench.set_machine_status(req.status);
    Json(bench.snapshot())
}

/// POST /api/door
pub async fn set_door(
    State(state): State<AppState>,
    Json(req): Json<DoorRequest>,
) -> Json<BenchSnapshot> {
    let mut bench = state.bench().write().await;
    bench.set_door_closed(req.closed);
    Json(bench.snapshot())
}

/// POST /api/crosshead/jog
pub async fn jog_crosshead(
    State(state): State<AppState>,
    Json(req): Json<JogRequest>,
) -> ApiResult<Json<JogResponse>> {
    let position_mm = state.bench().write().await.jog_crosshead(req.delta_mm)?;
    Ok(Json(JogResponse { position_mm }))
}

/// POST /api/sensors/zero
pub async fn zero_sensors(State(state): State<AppState>) -> ApiResult<StatusCode> {
    state.bench().write().await.zero_sensors()?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/notices
pub async fn get_notices(State(state): State<AppState>) -> Json<Vec<Notice>> {
    Json(state.bench().read().await.notices().cloned().collect())
}

/// GET /api/runs
pub async fn get_runs(State(state): State<AppState>) -> Json<Vec<RunRecord>> {
    let bench = state.bench().read().await;
    let history = bench.history();
    let start = history.len().saturating_sub(100);
    Json(history[start..].to_vec())
}

/// GET /health
pub async fn health() -> StatusCode {
    StatusCode::OK
}

fn attachment(content_type: &'static str, file_name: &str, body: String) -> Response {
    let disposition = format!("attachment; filename=\"{file_name}\"");
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
