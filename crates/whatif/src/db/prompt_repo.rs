//! Rows of the `prompts` table. Prompt text is immutable; only tags change.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use super::{format_timestamp, from_json, parse_timestamp, to_json, Database, DatabaseError};
use crate::model::{IdeaPrompt, Language};

/// A raw prompt row from the database.
struct PromptRow {
    id: String,
    author_id: String,
    text: String,
    language: String,
    tags: String,
    created_at: String,
    updated_at: String,
}

impl PromptRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            author_id: row.get("author_id")?,
            text: row.get("text")?,
            language: row.get("language")?,
            tags: row.get("tags")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    fn into_model(self) -> Result<IdeaPrompt, DatabaseError> {
        Ok(IdeaPrompt {
            language: Language::parse(&self.language),
            tags: from_json(&self.tags, "tags")?,
            created_at: parse_timestamp(&self.created_at, "created_at")?,
            updated_at: parse_timestamp(&self.updated_at, "updated_at")?,
            id: self.id,
            author_id: self.author_id,
            text: self.text,
        })
    }
}

/// Inserts a new prompt.
pub fn insert(db: &Database, prompt: &IdeaPrompt) -> Result<(), DatabaseError> {
    let tags = to_json(&prompt.tags)?;
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO prompts (id, author_id, text, language, tags, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                prompt.id,
                prompt.author_id,
                prompt.text,
                prompt.language.as_str(),
                tags,
                format_timestamp(prompt.created_at),
                format_timestamp(prompt.updated_at),
            ],
        )?;
        Ok(())
    })
}

/// Finds a prompt by its ID.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<IdeaPrompt>, DatabaseError> {
    let row = db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT * FROM prompts WHERE id = ?1",
                params![id],
                PromptRow::from_row,
            )
            .optional()?;
        Ok(row)
    })?;
    row.map(PromptRow::into_model).transpose()
}

/// Replaces the tags of a prompt. Tags are the only mutable prompt field.
///
/// Returns `false` when no prompt has the given ID.
pub fn update_tags(
    db: &Database,
    id: &str,
    tags: &[String],
    updated_at: DateTime<Utc>,
) -> Result<bool, DatabaseError> {
    let tags = to_json(&tags)?;
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE prompts SET tags = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, tags, format_timestamp(updated_at)],
        )?;
        Ok(changed > 0)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Database {
        Database::open_in_memory().expect("Failed to create test database")
    }

    #[test]
    fn test_insert_and_find() {
        let db = test_db();
        let prompt = IdeaPrompt::new("author-1", "what if trees sang", vec!["music".into()]);
        insert(&db, &prompt).unwrap();

        let found = find_by_id(&db, &prompt.id).unwrap().unwrap();
        assert_eq!(found, prompt);
    }

    #[test]
    fn test_find_nonexistent() {
        let db = test_db();
        assert!(find_by_id(&db, "missing").unwrap().is_none());
    }

    #[test]
    fn test_update_tags() {
        let db = test_db();
        let prompt = IdeaPrompt::new("author-1", "what if trees sang", vec![]);
        insert(&db, &prompt).unwrap();

        let later = prompt.updated_at + chrono::Duration::seconds(5);
        assert!(update_tags(&db, &prompt.id, &["forest".to_string()], later).unwrap());

        let found = find_by_id(&db, &prompt.id).unwrap().unwrap();
        assert_eq!(found.tags, vec!["forest".to_string()]);
        assert_eq!(found.text, prompt.text);
        assert_eq!(found.updated_at, later);

        assert!(!update_tags(&db, "missing", &[], later).unwrap());
    }
}
