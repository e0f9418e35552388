//! Community post repository.

use rusqlite::{params, OptionalExtension, Row};

use super::{format_timestamp, parse_timestamp, Database, DatabaseError};
use crate::model::CommunityPost;

struct PostRow {
    id: String,
    generation_id: String,
    author_id: String,
    caption: Option<String>,
    prompt_summary: String,
    cover_url: Option<String>,
    created_at: String,
}

impl PostRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            generation_id: row.get("generation_id")?,
            author_id: row.get("author_id")?,
            caption: row.get("caption")?,
            prompt_summary: row.get("prompt_summary")?,
            cover_url: row.get("cover_url")?,
            created_at: row.get("created_at")?,
        })
    }

    fn into_model(self) -> Result<CommunityPost, DatabaseError> {
        Ok(CommunityPost {
            created_at: parse_timestamp(&self.created_at, "created_at")?,
            id: self.id,
            generation_id: self.generation_id,
            author_id: self.author_id,
            caption: self.caption,
            prompt_summary: self.prompt_summary,
            cover_url: self.cover_url,
        })
    }
}

/// Inserts a post. Fails with a constraint error if the generation was
/// already published.
pub fn insert(db: &Database, post: &CommunityPost) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO community_posts (id, generation_id, author_id, caption, prompt_summary, cover_url, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                post.id,
                post.generation_id,
                post.author_id,
                post.caption,
                post.prompt_summary,
                post.cover_url,
                format_timestamp(post.created_at),
            ],
        )?;
        Ok(())
    })
}

pub fn find_by_id(db: &Database, id: &str) -> Result<Option<CommunityPost>, DatabaseError> {
    let row = db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT * FROM community_posts WHERE id = ?1",
                params![id],
                PostRow::from_row,
            )
            .optional()?;
        Ok(row)
    })?;
    row.map(PostRow::into_model).transpose()
}

pub fn find_by_generation(
    db: &Database,
    generation_id: &str,
) -> Result<Option<CommunityPost>, DatabaseError> {
    let row = db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT * FROM community_posts WHERE generation_id = ?1",
                params![generation_id],
                PostRow::from_row,
            )
            .optional()?;
        Ok(row)
    })?;
    row.map(PostRow::into_model).transpose()
}

/// Returns one page of posts, newest first, along with the total count.
pub fn list(
    db: &Database,
    limit: u64,
    offset: u64,
) -> Result<(Vec<CommunityPost>, u64), DatabaseError> {
    let (rows, total) = db.with_conn(|conn| {
        let total: u64 =
            conn.query_row("SELECT COUNT(*) FROM community_posts", [], |r| r.get(0))?;
        let mut stmt = conn.prepare(
            "SELECT * FROM community_posts ORDER BY created_at DESC, rowid DESC LIMIT ?1 OFFSET ?2",
        )?;
        let rows = stmt
            .query_map(params![limit as i64, offset as i64], PostRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok((rows, total))
    })?;
    let posts = rows
        .into_iter()
        .map(PostRow::into_model)
        .collect::<Result<Vec<_>, _>>()?;
    Ok((posts, total))
}

/// Whether the error is the unique-index violation raised by a second
/// publish of the same generation.
pub fn is_duplicate(err: &DatabaseError) -> bool {
    matches!(
        err,
        DatabaseError::Sqlite(rusqlite::Error::SqliteFailure(e, _))
            if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}
