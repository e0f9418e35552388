use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use whatif::service::FeedPage;

use super::{ApiError, ApiResponse};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct FeedQuery {
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

/// GET /api/feed
pub async fn list(
    State(state): State<AppState>,
    query: Result<Query<FeedQuery>, QueryRejection>,
) -> Result<Json<ApiResponse<FeedPage>>, ApiError> {
    let Query(query) = query?;
    let page = state.service.feed(query.limit, query.offset)?;
    Ok(Json(ApiResponse::ok(page)))
}
