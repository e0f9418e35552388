use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};
use whatif::service::ServiceError;
use whatif::StorageError;

/// Error body: `{success: false, error, details?}`.
#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub details: Option<Value>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            details: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn internal() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
    }

    fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            success: false,
            error: self.message,
            details: self.details,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Validation(errors) => ApiError::bad_request("Validation failed")
                .with_details(json!({ "errors": errors })),
            ServiceError::PolicyViolation(check) => {
                let violations: Vec<Value> = check
                    .violations
                    .iter()
                    .map(|v| {
                        json!({
                            "category": v.category,
                            "reason": v.reason,
                            "severity": v.severity,
                            "suggestion": v.suggestion,
                        })
                    })
                    .collect();
                ApiError::bad_request("Content violates community policy").with_details(json!({
                    "violations": violations,
                    "recommendations": check.recommendations,
                }))
            }
            ServiceError::NotFound(what) => ApiError::not_found(format!("{} not found", what)),
            ServiceError::InvalidState(message) => ApiError::bad_request(message),
            ServiceError::Conflict(message) => ApiError::new(StatusCode::CONFLICT, message),
            ServiceError::DataIntegrity(message) => {
                tracing::error!(error = %message, "Data integrity error");
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Data integrity error")
            }
            ServiceError::Database(e) => {
                tracing::error!(error = %e, "Database error while handling request");
                ApiError::internal()
            }
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::InvalidSignature(reason) => {
                ApiError::new(StatusCode::FORBIDDEN, format!("Access denied: {}", reason))
            }
            StorageError::NotFound(_) | StorageError::InvalidKey(_) => {
                ApiError::not_found("Asset not found")
            }
            other => {
                tracing::error!(error = %other, "Failed to read asset");
                ApiError::internal()
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::new(rejection.status(), rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::bad_request(rejection.body_text())
    }
}
