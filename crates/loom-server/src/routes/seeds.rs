use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use loom_core::record::SeedPrompt;
use serde::Deserialize;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AddSeedBody {
    pub prompt: String,
}

/// GET /api/seeds — the seed library, oldest first.
pub async fn list_seeds(State(app): State<AppState>) -> Result<Json<Vec<SeedPrompt>>, AppError> {
    let db = app.db.clone();
    let seeds = tokio::task::spawn_blocking(move || db.list_seeds())
        .await
        .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;
    Ok(Json(seeds))
}

/// POST /api/seeds — add one prompt to the library.
pub async fn add_seed(
    State(app): State<AppState>,
    Json(body): Json<AddSeedBody>,
) -> Result<(StatusCode, Json<SeedPrompt>), AppError> {
    let db = app.db.clone();
    let seed = tokio::task::spawn_blocking(move || db.add_seed(&body.prompt))
        .await
        .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;
    tracing::info!(seed_id = %seed.id, "seed added");
    Ok((StatusCode::CREATED, Json(seed)))
}
