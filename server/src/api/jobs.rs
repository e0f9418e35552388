//! Admin control of the background job runner.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use whatif::runner::RunnerStatus;

use super::{ApiError, ApiResponse};
use crate::state::AppState;

pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobAction {
    Start,
    Stop,
    Status,
}

#[derive(Debug, Deserialize)]
pub struct JobRequest {
    pub action: JobAction,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResponse {
    /// Whether this request changed the runner state.
    pub changed: bool,
    pub status: RunnerStatus,
}

/// POST /api/jobs
pub async fn control(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<JobRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<JobResponse>>, ApiError> {
    authorize(&state, &headers)?;
    let Json(request) = payload?;

    let changed = match request.action {
        JobAction::Start => state.runner.start(),
        JobAction::Stop => {
            let was_running = state.runner.status().running;
            state.runner.stop();
            was_running
        }
        JobAction::Status => false,
    };
    tracing::info!(action = ?request.action, changed, "Job runner control");

    Ok(Json(ApiResponse::ok(JobResponse {
        changed,
        status: state.runner.status(),
    })))
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let Some(expected) = state.admin_token.as_ref() else {
        return Ok(());
    };
    let provided = headers
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if tokens_match(provided.as_bytes(), expected.expose_secret().as_bytes()) {
        Ok(())
    } else {
        Err(ApiError::new(StatusCode::UNAUTHORIZED, "Invalid admin token"))
    }
}

/// Compares without short-circuiting on the first differing byte.
fn tokens_match(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
