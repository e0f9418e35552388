use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use super::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SignatureQuery {
    pub expires: Option<i64>,
    pub signature: Option<String>,
}

/// GET /assets/{*key}
pub async fn serve(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(query): Query<SignatureQuery>,
) -> Result<Response, ApiError> {
    let (Some(expires), Some(signature)) = (query.expires, query.signature.as_deref()) else {
        return Err(ApiError::new(StatusCode::FORBIDDEN, "Missing asset signature"));
    };
    state.storage.verify(&key, expires, signature)?;

    let storage = state.storage.clone();
    let read_key = key.clone();
    let (bytes, content_type) = tokio::task::spawn_blocking(move || storage.read(&read_key))
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Asset read task failed");
            ApiError::internal()
        })??;

    tracing::debug!(key = %key, size = bytes.len(), "Serving asset");
    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CACHE_CONTROL, "private, max-age=300".to_string()),
        ],
        bytes,
    )
        .into_response())
}
