//! Local HTTP stand-in for the serverless job runtime.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, instrument};

use super::error::GatewayError;
use super::state::WorkerState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSyncRequest {
    #[serde(default)]
    pub input: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSyncResponse {
    pub id: String,
    pub status: String,
    pub output: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerHealth {
    pub status: String,
    pub max_concurrency: usize,
}

#[instrument(skip(state))]
pub async fn health_handler(State(state): State<WorkerState>) -> Json<WorkerHealth> {
    Json(WorkerHealth {
        status: "healthy".to_string(),
        max_concurrency: state.handler.max_concurrency(),
    })
}

/// Runs one job to completion. Job failures are part of `output`, not the HTTP status.
#[instrument(skip(state, request))]
pub async fn runsync_handler(
    State(state): State<WorkerState>,
    Json(request): Json<RunSyncRequest>,
) -> Result<Json<RunSyncResponse>, GatewayError> {
    let input = request
        .input
        .ok_or_else(|| GatewayError::InvalidRequest("missing `input`".to_string()))?;

    let id = uuid::Uuid::new_v4().to_string();
    let output = state.handler.handle(input).await;

    info!(job_id = %id, failed = output.get("error").is_some(), "Job completed");

    Ok(Json(RunSyncResponse {
        id,
        status: "COMPLETED".to_string(),
        output,
    }))
}
