use axum::extract::State;
use axum::Json;

use crate::error::AppError;
use crate::state::AppState;

/// GET /api/status — orchestrator state plus store counts.
pub async fn get_status(State(app): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    let state = app.orchestrator.state();
    let db = app.db.clone();
    let (records, seeds) = tokio::task::spawn_blocking(move || {
        Ok::<_, loom_core::LoomError>((db.count_records()?, db.count_seeds()?))
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(serde_json::json!({
        "state": state,
        "records": records,
        "seeds": seeds,
    })))
}
