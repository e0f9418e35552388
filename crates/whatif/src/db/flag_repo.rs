//! Policy flag repository. Flags are append-only.

use rusqlite::{params, Row};

use super::{format_timestamp, parse_timestamp, Database, DatabaseError};
use crate::model::{PolicyFlag, Resolution, Severity, TargetType};

struct FlagRow {
    id: String,
    target_type: String,
    target_id: String,
    reason: String,
    severity: String,
    resolution: String,
    created_at: String,
}

impl FlagRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            target_type: row.get("target_type")?,
            target_id: row.get("target_id")?,
            reason: row.get("reason")?,
            severity: row.get("severity")?,
            resolution: row.get("resolution")?,
            created_at: row.get("created_at")?,
        })
    }

    fn into_model(self) -> Result<PolicyFlag, DatabaseError> {
        let corrupt = |column: &str, value: &str| DatabaseError::Corrupt {
            column: column.to_string(),
            reason: format!("unknown value '{}'", value),
        };
        Ok(PolicyFlag {
            target_type: TargetType::parse(&self.target_type)
                .ok_or_else(|| corrupt("target_type", &self.target_type))?,
            severity: Severity::parse(&self.severity)
                .ok_or_else(|| corrupt("severity", &self.severity))?,
            resolution: Resolution::parse(&self.resolution)
                .ok_or_else(|| corrupt("resolution", &self.resolution))?,
            created_at: parse_timestamp(&self.created_at, "created_at")?,
            id: self.id,
            target_id: self.target_id,
            reason: self.reason,
        })
    }
}

/// Inserts a batch of flags in a single transaction.
pub fn insert_all(db: &Database, flags: &[PolicyFlag]) -> Result<(), DatabaseError> {
    if flags.is_empty() {
        return Ok(());
    }
    db.with_conn(|conn| {
        let tx = conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO policy_flags (id, target_type, target_id, reason, severity, resolution, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for flag in flags {
                stmt.execute(params![
                    flag.id,
                    flag.target_type.as_str(),
                    flag.target_id,
                    flag.reason,
                    flag.severity.as_str(),
                    flag.resolution.as_str(),
                    format_timestamp(flag.created_at),
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    })
}

/// Lists all flags recorded against a target, oldest first.
pub fn list_for_target(
    db: &Database,
    target_type: TargetType,
    target_id: &str,
) -> Result<Vec<PolicyFlag>, DatabaseError> {
    let rows = db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM policy_flags WHERE target_type = ?1 AND target_id = ?2
             ORDER BY created_at ASC, rowid ASC",
        )?;
        let rows = stmt
            .query_map(params![target_type.as_str(), target_id], FlagRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })?;
    rows.into_iter().map(FlagRow::into_model).collect()
}
