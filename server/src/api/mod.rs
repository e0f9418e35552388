//! HTTP API.
//!
//! Handlers are thin: extract, delegate to the service or runner, wrap the
//! result in [`ApiResponse`].

pub mod assets;
pub mod error;
pub mod feed;
pub mod generations;
pub mod jobs;

use axum::http::Method;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use error::ApiError;

use crate::state::AppState;

/// Response wrapper for successful calls.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
        .max_age(std::time::Duration::from_secs(3600));

    Router::new()
        .route("/health", get(health))
        .route("/api/generations", post(generations::create))
        .route("/api/generations/{id}", get(generations::get))
        .route("/api/generations/{id}/refine", post(generations::refine))
        .route("/api/feedback", post(generations::feedback))
        .route("/api/publish", post(generations::publish))
        .route("/api/feed", get(feed::list))
        .route("/api/jobs", post(jobs::control))
        .route("/assets/{*key}", get(assets::serve))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "timestamp": chrono::Utc::now() }))
}
