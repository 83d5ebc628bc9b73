pub mod models;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use std::path::Path;

use crate::state::DbPool;

pub const MIGRATIONS: &[(&str, &str)] = &[
    (
        "001_initial",
        include_str!("../../migrations/001_initial.sql"),
    ),
    (
        "002_community",
        include_str!("../../migrations/002_community.sql"),
    ),
];

/// Schema for the community submissions database, kept in its own file.
pub const UGC_MIGRATIONS: &[(&str, &str)] = &[(
    "ugc_001_posts",
    include_str!("../../migrations/ugc/001_posts.sql"),
)];

pub fn create_pool(db_path: &Path) -> anyhow::Result<DbPool> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Pragmas are per-connection, so apply them whenever r2d2 opens one
    let manager = SqliteConnectionManager::file(db_path).with_init(|conn| {
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA busy_timeout = 5000;
            ",
        )
    });
    let pool = Pool::builder().max_size(8).build(manager)?;

    Ok(pool)
}

pub fn run_migrations(pool: &DbPool) -> anyhow::Result<()> {
    apply(pool, MIGRATIONS)?;
    tracing::info!("Database migrations complete");
    Ok(())
}

pub fn run_ugc_migrations(pool: &DbPool) -> anyhow::Result<()> {
    apply(pool, UGC_MIGRATIONS)?;
    tracing::info!("UGC database migrations complete");
    Ok(())
}

fn apply(pool: &DbPool, migrations: &[(&str, &str)]) -> anyhow::Result<()> {
    let conn = pool.get()?;

    // Create migrations tracking table
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            name TEXT PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    for (name, sql) in migrations {
        let applied: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM schema_version WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )?;
        if applied {
            continue;
        }

        // A failed migration leaves neither its tables nor its version row
        tracing::info!("Applying migration: {}", name);
        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(sql)?;
        tx.execute("INSERT INTO schema_version (name) VALUES (?1)", params![name])?;
        tx.commit()?;
    }

    Ok(())
}
