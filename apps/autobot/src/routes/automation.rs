//! Axum route handlers for starting and observing automation runs.

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use crate::config::RunConfig;
use crate::errors::AppError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct StartResponse {
    pub status: &'static str,
    pub message: &'static str,
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
}

/// POST /api/start
///
/// Persists the submitted configuration and launches a run in the background.
/// Returns immediately; the run reports nothing back.
pub async fn handle_start(
    State(state): State<AppState>,
    Json(run): Json<RunConfig>,
) -> Result<Json<StartResponse>, AppError> {
    if state.launcher.is_running() {
        return Err(AppError::Conflict(
            "An automation run is already in progress".to_string(),
        ));
    }
    run.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    run.save(&state.config.config_path).await?;
    info!("Run configuration saved to {}", state.config.config_path.display());

    let run_id = state.launcher.launch(run)?;

    Ok(Json(StartResponse {
        status: "success",
        message: "Automation started in the background.",
        run_id,
        started_at: Utc::now(),
    }))
}

/// GET /api/status
pub async fn handle_status() -> Json<Value> {
    Json(json!({ "status": "running" }))
}
