use thiserror::Error;

use crate::db::DatabaseError;
use crate::policy::PolicyCheck;

/// Failures the API layer maps onto HTTP responses.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("Content violates community policy")]
    PolicyViolation(PolicyCheck),

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    InvalidState(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Data integrity error: {0}")]
    DataIntegrity(String),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

impl ServiceError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        ServiceError::Validation(vec![message.into()])
    }
}

impl From<crate::text::PromptValidationError> for ServiceError {
    fn from(err: crate::text::PromptValidationError) -> Self {
        ServiceError::Validation(err.errors)
    }
}
