//! Rows of the `generations` table.
//!
//! Status changes are compare-and-set: an update only applies while the row
//! is still in the expected prior status, so a generation can never be moved
//! backwards even if two writers race.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use super::{format_timestamp, from_json, parse_timestamp, to_json, Database, DatabaseError};
use crate::model::{AlignmentFeedback, Generation, GenerationStatus, GenerationType, Metadata};

/// A raw generation row from the database.
struct GenerationRow {
    id: String,
    prompt_id: String,
    generation_type: String,
    status: String,
    model: String,
    refinement_of: Option<String>,
    alignment_feedback: Option<String>,
    asset_urls: Option<String>,
    metadata: Option<String>,
    error: Option<String>,
    created_at: String,
    updated_at: String,
}

impl GenerationRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            prompt_id: row.get("prompt_id")?,
            generation_type: row.get("type")?,
            status: row.get("status")?,
            model: row.get("model")?,
            refinement_of: row.get("refinement_of")?,
            alignment_feedback: row.get("alignment_feedback")?,
            asset_urls: row.get("asset_urls")?,
            metadata: row.get("metadata")?,
            error: row.get("error")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    fn into_model(self) -> Result<Generation, DatabaseError> {
        let generation_type =
            GenerationType::parse(&self.generation_type).ok_or_else(|| DatabaseError::Corrupt {
                column: "type".to_string(),
                reason: format!("unknown generation type '{}'", self.generation_type),
            })?;
        let status = GenerationStatus::parse(&self.status).ok_or_else(|| DatabaseError::Corrupt {
            column: "status".to_string(),
            reason: format!("unknown status '{}'", self.status),
        })?;

        Ok(Generation {
            generation_type,
            status,
            alignment_feedback: self
                .alignment_feedback
                .as_deref()
                .map(|s| from_json(s, "alignment_feedback"))
                .transpose()?,
            asset_urls: self
                .asset_urls
                .as_deref()
                .map(|s| from_json(s, "asset_urls"))
                .transpose()?,
            metadata: self
                .metadata
                .as_deref()
                .map(|s| from_json(s, "metadata"))
                .transpose()?,
            created_at: parse_timestamp(&self.created_at, "created_at")?,
            updated_at: parse_timestamp(&self.updated_at, "updated_at")?,
            id: self.id,
            prompt_id: self.prompt_id,
            model: self.model,
            refinement_of: self.refinement_of,
            error: self.error,
        })
    }
}

/// Inserts a new generation row.
pub fn insert(db: &Database, generation: &Generation) -> Result<(), DatabaseError> {
    let alignment_feedback = generation
        .alignment_feedback
        .as_ref()
        .map(to_json)
        .transpose()?;
    let asset_urls = generation.asset_urls.as_ref().map(to_json).transpose()?;
    let metadata = generation.metadata.as_ref().map(to_json).transpose()?;

    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO generations (id, prompt_id, type, status, model, refinement_of,
             alignment_feedback, asset_urls, metadata, error, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                generation.id,
                generation.prompt_id,
                generation.generation_type.as_str(),
                generation.status.as_str(),
                generation.model,
                generation.refinement_of,
                alignment_feedback,
                asset_urls,
                metadata,
                generation.error,
                format_timestamp(generation.created_at),
                format_timestamp(generation.updated_at),
            ],
        )?;
        Ok(())
    })
}

/// Finds a generation by its ID.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<Generation>, DatabaseError> {
    let row = db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT * FROM generations WHERE id = ?1",
                params![id],
                GenerationRow::from_row,
            )
            .optional()?;
        Ok(row)
    })?;
    row.map(GenerationRow::into_model).transpose()
}

/// Lists generations in the given status, oldest first.
pub fn find_by_status(
    db: &Database,
    status: GenerationStatus,
    limit: Option<u64>,
) -> Result<Vec<Generation>, DatabaseError> {
    let rows = db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM generations WHERE status = ?1 ORDER BY created_at ASC LIMIT ?2",
        )?;
        // SQLite treats a negative LIMIT as "no limit".
        let limit = limit.map(|l| l as i64).unwrap_or(-1);
        let rows = stmt
            .query_map(params![status.as_str(), limit], GenerationRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })?;
    rows.into_iter().map(GenerationRow::into_model).collect()
}

/// Counts generations with the given status.
pub fn count_by_status(db: &Database, status: GenerationStatus) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM generations WHERE status = ?1",
            params![status.as_str()],
            |r| r.get(0),
        )?;
        Ok(count)
    })
}

/// Moves a generation from `from` to `to` if it is still in `from`.
///
/// Returns `Ok(false)` when the row was not in `from` (missing, or another
/// writer got there first). Backward transitions are rejected outright.
pub fn transition_status(
    db: &Database,
    id: &str,
    from: GenerationStatus,
    to: GenerationStatus,
    updated_at: DateTime<Utc>,
) -> Result<bool, DatabaseError> {
    ensure_forward(id, from, to)?;
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE generations SET status = ?3, updated_at = ?4 WHERE id = ?1 AND status = ?2",
            params![id, from.as_str(), to.as_str(), format_timestamp(updated_at)],
        )?;
        Ok(changed > 0)
    })
}

/// Records a successful result and moves `running -> complete`.
pub fn mark_complete(
    db: &Database,
    id: &str,
    asset_urls: &[String],
    metadata: &Metadata,
    updated_at: DateTime<Utc>,
) -> Result<bool, DatabaseError> {
    let asset_urls = to_json(&asset_urls)?;
    let metadata = to_json(metadata)?;
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE generations SET status = ?2, asset_urls = ?3, metadata = ?4, error = NULL,
             updated_at = ?5 WHERE id = ?1 AND status = ?6",
            params![
                id,
                GenerationStatus::Complete.as_str(),
                asset_urls,
                metadata,
                format_timestamp(updated_at),
                GenerationStatus::Running.as_str(),
            ],
        )?;
        Ok(changed > 0)
    })
}

/// Records an error and moves `running -> failed`.
pub fn mark_failed(
    db: &Database,
    id: &str,
    error: &str,
    updated_at: DateTime<Utc>,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE generations SET status = ?2, error = ?3, updated_at = ?4
             WHERE id = ?1 AND status = ?5",
            params![
                id,
                GenerationStatus::Failed.as_str(),
                error,
                format_timestamp(updated_at),
                GenerationStatus::Running.as_str(),
            ],
        )?;
        Ok(changed > 0)
    })
}

/// Stores user feedback. Returns `false` if the generation does not exist.
pub fn set_alignment_feedback(
    db: &Database,
    id: &str,
    feedback: &AlignmentFeedback,
    updated_at: DateTime<Utc>,
) -> Result<bool, DatabaseError> {
    let feedback = to_json(feedback)?;
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE generations SET alignment_feedback = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, feedback, format_timestamp(updated_at)],
        )?;
        Ok(changed > 0)
    })
}

fn ensure_forward(
    id: &str,
    from: GenerationStatus,
    to: GenerationStatus,
) -> Result<(), DatabaseError> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(DatabaseError::InvalidTransition {
            id: id.to_string(),
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}
