//! Database initialization
//!
//! Creates the database on first run, applies the schema idempotently and
//! seeds runtime settings that have no row yet.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Runtime settings seeded on first start, as (key, default value)
pub const DEFAULT_SETTINGS: [(&str, &str); 5] = [
    ("duplicate_similarity_threshold", "0.92"),
    ("duplicate_radius_meters", "50"),
    ("duplicate_search_k", "5"),
    ("similar_default_threshold", "0.85"),
    ("database_busy_timeout_ms", "5000"),
];

const DEFAULT_BUSY_TIMEOUT_MS: i64 = 5000;

/// Initialize database connection and create tables if needed
///
/// Connection pragmas (WAL, foreign keys, busy timeout) are part of the
/// connect options so every pooled connection carries them.
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true);

    // Schema and settings first, on a single bootstrap connection
    let bootstrap = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options.clone())
        .await?;
    init_schema(&bootstrap).await?;
    let timeout_ms: i64 = sqlx::query_scalar(
        "SELECT CAST(value AS INTEGER) FROM settings WHERE key = 'database_busy_timeout_ms'",
    )
    .fetch_optional(&bootstrap)
    .await?
    .filter(|ms: &i64| *ms >= 0)
    .unwrap_or(DEFAULT_BUSY_TIMEOUT_MS);
    bootstrap.close().await;

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .connect_with(options.busy_timeout(Duration::from_millis(timeout_ms as u64)))
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }
    info!("Database busy timeout set to {} ms", timeout_ms);

    Ok(pool)
}

/// Open a private in-memory database with the full schema.
///
/// Limited to one connection: every `sqlite::memory:` connection is a
/// separate database.
pub async fn init_in_memory_database() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    init_schema(&pool).await?;
    Ok(pool)
}

/// Create all tables and seed default settings (idempotent)
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query("PRAGMA foreign_keys = ON").execute(pool).await?;

    create_settings_table(pool).await?;
    create_issues_table(pool).await?;
    create_votes_table(pool).await?;
    create_comments_table(pool).await?;
    create_notifications_table(pool).await?;

    init_default_settings(pool).await?;
    Ok(())
}

async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_issues_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS issues (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT,
            description TEXT,
            image_url TEXT NOT NULL,
            caption TEXT,
            tags TEXT NOT NULL DEFAULT '[]',
            latitude REAL NOT NULL CHECK (latitude BETWEEN -90.0 AND 90.0),
            longitude REAL NOT NULL CHECK (longitude BETWEEN -180.0 AND 180.0),
            status TEXT NOT NULL DEFAULT 'Open',
            department TEXT NOT NULL DEFAULT 'other',
            upvote_count INTEGER NOT NULL DEFAULT 0,
            priority_score INTEGER NOT NULL DEFAULT 0,
            citizen_token TEXT NOT NULL,
            duplicate_of INTEGER REFERENCES issues(id),
            duplicate_confidence TEXT NOT NULL DEFAULT 'none',
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_issues_location ON issues(latitude, longitude)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_issues_department ON issues(department)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_votes_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS votes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            issue_id INTEGER NOT NULL REFERENCES issues(id) ON DELETE CASCADE,
            citizen_token TEXT NOT NULL,
            vote_type TEXT NOT NULL CHECK (vote_type IN ('upvote', 'downvote')),
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE(issue_id, citizen_token)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_comments_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS comments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            issue_id INTEGER NOT NULL REFERENCES issues(id) ON DELETE CASCADE,
            citizen_token TEXT NOT NULL,
            text TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_comments_issue ON comments(issue_id)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_notifications_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS notifications (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            issue_id INTEGER NOT NULL REFERENCES issues(id) ON DELETE CASCADE,
            type TEXT NOT NULL,
            message TEXT NOT NULL,
            is_read INTEGER NOT NULL DEFAULT 0,
            citizen_token TEXT,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_notifications_token ON notifications(citizen_token)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn init_default_settings(pool: &SqlitePool) -> Result<()> {
    for (key, default_value) in DEFAULT_SETTINGS {
        ensure_setting(pool, key, default_value).await?;
    }
    Ok(())
}

/// Insert a setting with its default value unless a non-NULL row exists
async fn ensure_setting(pool: &SqlitePool, key: &str, default_value: &str) -> Result<()> {
    let existing: Option<Option<String>> =
        sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(pool)
            .await?;

    match existing {
        Some(Some(_)) => {
            debug!("Setting '{}' already present", key);
        }
        Some(None) => {
            sqlx::query(
                "UPDATE settings SET value = ?, updated_at = CURRENT_TIMESTAMP WHERE key = ?",
            )
            .bind(default_value)
            .bind(key)
            .execute(pool)
            .await?;
            info!("Setting '{}' was NULL, reset to default: {}", key, default_value);
        }
        None => {
            // INSERT OR IGNORE tolerates concurrent initialization
            sqlx::query("INSERT OR IGNORE INTO settings (key, value) VALUES (?, ?)")
                .bind(key)
                .bind(default_value)
                .execute(pool)
                .await?;
            info!("Initialized setting '{}' with default value: {}", key, default_value);
        }
    }

    Ok(())
}
