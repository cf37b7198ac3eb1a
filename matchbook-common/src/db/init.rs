//! Database initialization
//!
//! Creates the SQLite database and schema on first run; safe to call again
//! on every startup.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Pragmas are per-connection in SQLite, so they go on the connect
    // options rather than a one-off query against the pool.
    // WAL allows concurrent readers with one writer, which matters when
    // several workers commit upserts while the export path reads.
    // Foreign keys make photo rows cascade with their person.
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(5000));

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // Schema creation is idempotent
    create_person_table(&pool).await?;
    create_photo_table(&pool).await?;

    Ok(pool)
}

/// Create the person table
///
/// One row per observed profile, keyed by the source-assigned id.
pub async fn create_person_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS person (
            id TEXT PRIMARY KEY,
            label TEXT NOT NULL CHECK (label IN ('recommendation', 'like', 'dislike', 'match')),
            name TEXT,
            birth_date TEXT,
            bio TEXT,
            gender INTEGER,
            distance_mi INTEGER,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_person_label ON person(label)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Create the photo table
///
/// Keyed by the source-assigned photo id, foreign-keyed to its person.
/// Deleting a person removes its photos.
pub async fn create_photo_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS photo (
            id TEXT PRIMARY KEY,
            person_id TEXT NOT NULL REFERENCES person(id) ON DELETE CASCADE,
            url TEXT NOT NULL,
            file_name TEXT NOT NULL,
            crop_info TEXT,
            media_type TEXT,
            rank INTEGER,
            score REAL,
            win_count INTEGER,
            status TEXT NOT NULL DEFAULT 'not-downloaded'
                CHECK (status IN ('not-downloaded', 'downloading', 'downloaded', 'error')),
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_photo_person ON photo(person_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_photo_status ON photo(status)")
        .execute(pool)
        .await?;

    Ok(())
}
