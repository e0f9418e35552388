//! Schema migrations, recorded in `_migrations` by version.

use rusqlite::Connection;

use super::error::DatabaseError;

struct Migration {
    version: u32,
    description: &'static str,
    sql: &'static str,
}

/// Ordered by version; `sql/NNN_*.sql` files are embedded at build time.
const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "create_prompts_table",
        sql: include_str!("sql/001_create_prompts.sql"),
    },
    Migration {
        version: 2,
        description: "create_generations_table",
        sql: include_str!("sql/002_create_generations.sql"),
    },
    Migration {
        version: 3,
        description: "create_policy_flags_table",
        sql: include_str!("sql/003_create_policy_flags.sql"),
    },
    Migration {
        version: 4,
        description: "create_media_assets_table",
        sql: include_str!("sql/004_create_media_assets.sql"),
    },
    Migration {
        version: 5,
        description: "create_community_posts_table",
        sql: include_str!("sql/005_create_community_posts.sql"),
    },
];

/// Applies every migration newer than the recorded schema version.
///
/// Each migration and its bookkeeping row commit together, so a failed
/// migration leaves the schema at the previous version.
pub fn run_all(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    let applied = schema_version(conn)?;
    let pending = MIGRATIONS.iter().filter(|m| m.version > applied);

    for migration in pending {
        log::info!(
            "Applying schema v{} ({})",
            migration.version,
            migration.description
        );
        let failed = |e: rusqlite::Error| DatabaseError::Migration {
            version: migration.version,
            reason: e.to_string(),
        };

        let tx = conn.unchecked_transaction().map_err(failed)?;
        tx.execute_batch(migration.sql).map_err(failed)?;
        tx.execute(
            "INSERT INTO _migrations (version, description) VALUES (?1, ?2)",
            rusqlite::params![migration.version, migration.description],
        )
        .map_err(failed)?;
        tx.commit().map_err(failed)?;
    }

    Ok(())
}

/// Highest applied migration version, `0` for a fresh database.
pub fn schema_version(conn: &Connection) -> Result<u32, DatabaseError> {
    Ok(conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM _migrations",
        [],
        |r| r.get(0),
    )?)
}
