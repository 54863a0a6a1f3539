//! Database initialization
//!
//! Startup sequence, run before any triage or selection operation:
//! 1. Open (or create) the SQLite file and apply connection pragmas
//! 2. CREATE TABLE IF NOT EXISTS for every table
//! 3. Automatic additive schema sync (missing columns)
//! 4. Versioned migrations (indexes, data normalization)
//! 5. Default runtime settings

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::{info, warn};

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Article-level work runs in parallel, so keep enough connections for
    // concurrent vote inserts and result upserts
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .min_connections(1)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // WAL allows concurrent readers with one writer
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;

    prepare_schema(&pool).await?;
    Ok(pool)
}

/// Initialize a private in-memory database (tests, dry runs)
///
/// A single connection is used because every `sqlite::memory:` connection
/// opens its own empty database.
pub async fn init_memory_database() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;

    prepare_schema(&pool).await?;
    Ok(pool)
}

async fn prepare_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(pool)
        .await?;

    // Initial busy timeout; replaced by the configured value below
    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(pool)
        .await?;

    create_schema_version_table(pool).await?;
    create_settings_table(pool).await?;
    create_triage_run_table(pool).await?;
    create_model_vote_table(pool).await?;
    create_triage_result_table(pool).await?;
    create_issue_selection_table(pool).await?;

    // Phase 2: additive schema sync (adds columns, never drops them)
    crate::db::table_schemas::sync_all_table_schemas(pool).await?;

    // Phase 3: versioned migrations
    crate::db::migrations::run_migrations(pool).await?;

    // Phase 4: default settings
    init_default_settings(pool).await?;

    let timeout_ms: i64 = sqlx::query_scalar(
        "SELECT CAST(value AS INTEGER) FROM settings WHERE key = 'database_lock_retry_ms'",
    )
    .fetch_optional(pool)
    .await?
    .unwrap_or(250);

    let pragma_sql = format!("PRAGMA busy_timeout = {}", timeout_ms);
    sqlx::query(&pragma_sql).execute(pool).await?;

    info!("Database busy timeout set to {} ms", timeout_ms);
    Ok(())
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the settings table
///
/// Stores runtime key-value settings (lock wait budgets).
pub async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
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

/// Create the triage_run table (one row per batch invocation)
pub async fn create_triage_run_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS triage_run (
            run_id TEXT PRIMARY KEY,
            week_of TEXT NOT NULL,
            model_builder TEXT NOT NULL,
            model_skeptic TEXT NOT NULL,
            config_json TEXT,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the model_vote table
///
/// Append-only audit log of every inference call. Triggers reject UPDATE
/// and DELETE so the log cannot be rewritten after the fact.
pub async fn create_model_vote_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS model_vote (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            run_id TEXT NOT NULL,
            article_url TEXT NOT NULL,
            role TEXT NOT NULL,
            model_name TEXT NOT NULL,
            prompt_hash TEXT NOT NULL,
            cache_hit INTEGER NOT NULL DEFAULT 0,
            outcome TEXT NOT NULL,
            raw_output TEXT,
            json_output TEXT,
            error_msg TEXT,
            score_e_before INTEGER,
            score_h_before INTEGER,
            score_e_after INTEGER,
            score_h_after INTEGER,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            FOREIGN KEY (run_id) REFERENCES triage_run(run_id),
            CHECK (outcome IN ('ok', 'unparsable', 'call_failed'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_model_vote_article ON model_vote(run_id, article_url)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TRIGGER IF NOT EXISTS model_vote_no_update
        BEFORE UPDATE ON model_vote
        BEGIN
            SELECT RAISE(ABORT, 'model_vote is append-only');
        END
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TRIGGER IF NOT EXISTS model_vote_no_delete
        BEFORE DELETE ON model_vote
        BEGIN
            SELECT RAISE(ABORT, 'model_vote is append-only');
        END
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the triage_result table
///
/// One row per (run, article). The frontier CHECK keeps the flag consistent
/// with the routing rules at write time.
pub async fn create_triage_result_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS triage_result (
            run_id TEXT NOT NULL,
            article_url TEXT NOT NULL,
            discipline TEXT,
            headline TEXT,

            score_s INTEGER,
            score_e INTEGER,
            score_t INTEGER,
            score_m INTEGER,
            score_h INTEGER,

            route TEXT,
            frontier_flag INTEGER NOT NULL DEFAULT 0,

            tldr TEXT,
            pivot_figure_prompt TEXT,
            course_hooks_json TEXT,
            skeptic_adjustments_json TEXT,
            confidence REAL,

            fulltext_path TEXT,
            fulltext_ok INTEGER NOT NULL DEFAULT 0,
            fulltext_source TEXT,
            fulltext_fetched_at TEXT,
            access_state TEXT NOT NULL DEFAULT 'unknown',

            status TEXT NOT NULL DEFAULT 'ok',
            error_msg TEXT,

            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            PRIMARY KEY (run_id, article_url),
            FOREIGN KEY (run_id) REFERENCES triage_run(run_id),
            CHECK (score_s IS NULL OR score_s BETWEEN 0 AND 5),
            CHECK (score_e IS NULL OR score_e BETWEEN 0 AND 5),
            CHECK (score_t IS NULL OR score_t BETWEEN 0 AND 5),
            CHECK (score_m IS NULL OR score_m BETWEEN 0 AND 5),
            CHECK (score_h IS NULL OR score_h BETWEEN 0 AND 5),
            CHECK (route IS NULL OR route IN ('reject', 'blurb', 'digest', 'indepth')),
            CHECK (frontier_flag = 0 OR (route = 'blurb' AND score_e <= 2)),
            CHECK (status IN ('ok', 'error'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_triage_result_article ON triage_result(article_url)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the issue_selection table
///
/// Slot assignments per (period, discipline). Rows are never updated; the
/// indepth quota of one row per pair is enforced by trigger.
pub async fn create_issue_selection_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS issue_selection (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            week_of TEXT NOT NULL,
            discipline TEXT NOT NULL,
            article_url TEXT NOT NULL,
            slot TEXT NOT NULL,
            rank_score REAL NOT NULL,
            access_state TEXT NOT NULL,
            selected_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (week_of, discipline, article_url),
            CHECK (slot IN ('indepth', 'digest', 'blurb')),
            CHECK (slot = 'blurb' OR access_state = 'oa_pdf_found')
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_issue_selection_week ON issue_selection(week_of, discipline)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TRIGGER IF NOT EXISTS issue_selection_single_indepth
        BEFORE INSERT ON issue_selection
        WHEN NEW.slot = 'indepth' AND (
            SELECT COUNT(*) FROM issue_selection
            WHERE week_of = NEW.week_of
              AND discipline = NEW.discipline
              AND slot = 'indepth'
        ) >= 1
        BEGIN
            SELECT RAISE(ABORT, 'indepth quota exceeded');
        END
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TRIGGER IF NOT EXISTS issue_selection_no_update
        BEFORE UPDATE ON issue_selection
        BEGIN
            SELECT RAISE(ABORT, 'issue_selection rows are immutable');
        END
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Initialize or update default settings
async fn init_default_settings(pool: &SqlitePool) -> Result<()> {
    ensure_setting(pool, "database_max_lock_wait_ms", "5000").await?;
    ensure_setting(pool, "database_lock_retry_ms", "250").await?;

    info!("Default settings initialized");
    Ok(())
}

/// Ensure a setting exists with the specified default value
///
/// Missing settings are created; NULL values are reset to the default.
async fn ensure_setting(pool: &SqlitePool, key: &str, default_value: &str) -> Result<()> {
    // INSERT OR IGNORE handles concurrent initialization
    let inserted = sqlx::query("INSERT OR IGNORE INTO settings (key, value) VALUES (?, ?)")
        .bind(key)
        .bind(default_value)
        .execute(pool)
        .await?
        .rows_affected();

    if inserted > 0 {
        info!("Initialized setting '{}' with default value: {}", key, default_value);
        return Ok(());
    }

    let reset = sqlx::query("UPDATE settings SET value = ? WHERE key = ? AND value IS NULL")
        .bind(default_value)
        .bind(key)
        .execute(pool)
        .await?
        .rows_affected();

    if reset > 0 {
        warn!("Setting '{}' was NULL, reset to default: {}", key, default_value);
    }

    Ok(())
}

/// Read an integer setting, falling back to `default` when absent or malformed
pub async fn get_setting_i64(pool: &SqlitePool, key: &str, default: i64) -> Result<i64> {
    let value: Option<Option<String>> = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await?;

    Ok(value
        .flatten()
        .and_then(|v| v.trim().parse::<i64>().ok())
        .unwrap_or(default))
}
