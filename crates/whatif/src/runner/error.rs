use thiserror::Error;

use crate::db::DatabaseError;
use crate::error::StorageError;
use crate::provider::ProviderError;

/// Errors that abort a whole runner cycle.
#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("Failed to query queued generations: {0}")]
    Database(#[from] DatabaseError),
}

/// Why a single generation failed. The message is stored on the record.
#[derive(Error, Debug)]
pub enum JobError {
    #[error("Generation has no promptId")]
    MissingPrompt,

    #[error("Prompt {0} not found")]
    PromptNotFound(String),

    #[error("{0}")]
    Rejected(String),

    #[error("Video generation timed out after {attempts} polls")]
    Timeout { attempts: u32 },

    #[error("Provider returned no assets")]
    NoAssets,

    #[error("Provider request failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("Failed to store asset: {0}")]
    Storage(#[from] StorageError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}
