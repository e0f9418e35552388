//! Generation lifecycle handlers.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use whatif::model::{CommunityPost, Generation};
use whatif::service::{
    CreateGenerationRequest, CreatedGeneration, FeedbackRequest, PublishRequest, RefineRequest,
    RefinedGeneration,
};

use super::{ApiError, ApiResponse};
use crate::state::AppState;

/// POST /api/generations
pub async fn create(
    State(state): State<AppState>,
    payload: Result<Json<CreateGenerationRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<CreatedGeneration>>), ApiError> {
    let Json(request) = payload?;
    let created = state.service.create_generation(request).await?;
    Ok((StatusCode::ACCEPTED, Json(ApiResponse::ok(created))))
}

/// GET /api/generations/{id}
pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Generation>>, ApiError> {
    let generation = state.service.get_generation(&id)?;
    Ok(Json(ApiResponse::ok(generation)))
}

/// POST /api/generations/{id}/refine
pub async fn refine(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<RefineRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<RefinedGeneration>>), ApiError> {
    let Json(request) = payload?;
    let refined = state.service.refine_generation(&id, request).await?;
    Ok((StatusCode::ACCEPTED, Json(ApiResponse::ok(refined))))
}

/// POST /api/feedback
pub async fn feedback(
    State(state): State<AppState>,
    payload: Result<Json<FeedbackRequest>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Json(request) = payload?;
    state.service.submit_feedback(request)?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/publish
pub async fn publish(
    State(state): State<AppState>,
    payload: Result<Json<PublishRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<CommunityPost>>), ApiError> {
    let Json(request) = payload?;
    let post = state.service.publish(request)?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(post))))
}
