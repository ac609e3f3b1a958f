use axum::extract::{Path, Query, State};
use axum::Json;
use loom_core::orchestrator::{BatchRequest, ResubmitRequest, StartOutcome, StopOutcome};
use loom_core::record::{GenerationRecord, Page};
use loom_core::LoomError;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

const DEFAULT_PAGE_SIZE: u64 = 10;

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub page: Option<u64>,
    #[serde(alias = "pageSize")]
    pub limit: Option<u64>,
}

impl ListParams {
    /// `(page, page_size)` with missing or zero values replaced by defaults.
    fn resolve(&self) -> (u64, u64) {
        let page = self.page.filter(|&p| p > 0).unwrap_or(1);
        let limit = self.limit.filter(|&l| l > 0).unwrap_or(DEFAULT_PAGE_SIZE);
        (page, limit)
    }
}

/// GET /api/prompts and /api/prompts/allData — paginated records, newest first.
pub async fn list_prompts(
    State(app): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Page>, AppError> {
    let (page, limit) = params.resolve();
    let db = app.db.clone();
    let result = tokio::task::spawn_blocking(move || db.list_page(page, limit))
        .await
        .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;
    Ok(Json(result))
}

/// GET /api/prompts/:id — a single record.
pub async fn get_prompt(
    State(app): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<GenerationRecord>, AppError> {
    let db = app.db.clone();
    let record = tokio::task::spawn_blocking(move || db.get_record(id))
        .await
        .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;
    record
        .map(Json)
        .ok_or_else(|| AppError(LoomError::RecordNotFound(id).into()))
}

/// POST /api/prompts/start — begin a batch in the background.
pub async fn start_batch(
    State(app): State<AppState>,
    Json(body): Json<BatchRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    info!(total = body.total, variants = body.variants, "start_batch: request received");
    let status = match app.orchestrator.start(body).await? {
        StartOutcome::Started => "started",
        StartOutcome::AlreadyRunning => "already_running",
    };
    Ok(Json(serde_json::json!({ "status": status })))
}

/// POST /api/prompts/stop — drain the current unit and end the batch.
pub async fn stop_batch(State(app): State<AppState>) -> Json<serde_json::Value> {
    match app.orchestrator.request_stop() {
        StopOutcome::Stopping => Json(serde_json::json!({
            "status": "stopping",
            "message": "Stop requested; the current image will finish first",
        })),
        StopOutcome::NotRunning => Json(serde_json::json!({
            "status": "not_running",
            "message": "No process is running",
        })),
    }
}

/// POST /api/prompts/resubmit — submit a known prompt again under a fresh label.
pub async fn resubmit(
    State(app): State<AppState>,
    Json(body): Json<ResubmitRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let record = app.orchestrator.resubmit(body).await?;
    Ok(Json(serde_json::json!({
        "status": "submitted",
        "id": record.id,
        "sequenceLabel": record.sequence_label,
    })))
}
