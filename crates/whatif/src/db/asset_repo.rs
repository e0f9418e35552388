//! Media asset repository.

use rusqlite::{params, Row};

use super::{format_timestamp, parse_timestamp, Database, DatabaseError};
use crate::model::MediaAsset;

struct AssetRow {
    id: String,
    generation_id: String,
    url: String,
    storage_key: Option<String>,
    content_type: String,
    size_bytes: Option<i64>,
    created_at: String,
}

impl AssetRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            generation_id: row.get("generation_id")?,
            url: row.get("url")?,
            storage_key: row.get("storage_key")?,
            content_type: row.get("content_type")?,
            size_bytes: row.get("size_bytes")?,
            created_at: row.get("created_at")?,
        })
    }

    fn into_model(self) -> Result<MediaAsset, DatabaseError> {
        Ok(MediaAsset {
            size_bytes: self.size_bytes.map(|n| n.max(0) as u64),
            created_at: parse_timestamp(&self.created_at, "created_at")?,
            id: self.id,
            generation_id: self.generation_id,
            url: self.url,
            storage_key: self.storage_key,
            content_type: self.content_type,
        })
    }
}

/// Inserts a media asset row.
pub fn insert(db: &Database, asset: &MediaAsset) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO media_assets (id, generation_id, url, storage_key, content_type, size_bytes, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                asset.id,
                asset.generation_id,
                asset.url,
                asset.storage_key,
                asset.content_type,
                asset.size_bytes.map(|n| n as i64),
                format_timestamp(asset.created_at),
            ],
        )?;
        Ok(())
    })
}

/// Lists the assets of a generation in the order they were stored.
pub fn list_for_generation(
    db: &Database,
    generation_id: &str,
) -> Result<Vec<MediaAsset>, DatabaseError> {
    let rows = db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM media_assets WHERE generation_id = ?1 ORDER BY created_at ASC, rowid ASC",
        )?;
        let rows = stmt
            .query_map(params![generation_id], AssetRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })?;
    rows.into_iter().map(AssetRow::into_model).collect()
}
