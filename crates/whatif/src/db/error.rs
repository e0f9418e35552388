//! Database error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from database operations.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// SQLite error from rusqlite.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error when creating directories or files.
    #[error("IO error for path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A migration failed to apply.
    #[error("Migration failed at version {version}: {reason}")]
    Migration { version: u32, reason: String },

    /// A JSON column could not be encoded.
    #[error("JSON encoding failed: {0}")]
    Json(#[source] serde_json::Error),

    /// A stored value could not be decoded.
    #[error("Corrupt value in column '{column}': {reason}")]
    Corrupt { column: String, reason: String },

    /// A status change that would move a generation backwards.
    #[error("Invalid status transition for generation {id}: {from} -> {to}")]
    InvalidTransition { id: String, from: String, to: String },

    /// The database lock was poisoned.
    #[error("Database lock poisoned")]
    LockPoisoned,
}
