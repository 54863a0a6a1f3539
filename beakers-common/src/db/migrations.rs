//! Versioned database migrations
//!
//! Column additions are handled by schema sync; this module holds the
//! changes sync cannot express (indexes, data normalization). Migrations are
//! tracked in `schema_version` and each one is idempotent.
//!
//! Never modify an existing migration. Append a new `migrate_vN` and bump
//! `CURRENT_SCHEMA_VERSION`. No migration drops or rewrites columns.

use crate::Result;
use sqlx::SqlitePool;
use tracing::{info, warn};

/// Current schema version
const CURRENT_SCHEMA_VERSION: i32 = 2;

/// Get current schema version (0 if never migrated)
pub async fn get_schema_version(pool: &SqlitePool) -> Result<i32> {
    let table_exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM sqlite_master
            WHERE type='table' AND name='schema_version'
        )
        "#,
    )
    .fetch_one(pool)
    .await?;

    if !table_exists {
        return Ok(0);
    }

    let version: Option<i32> =
        sqlx::query_scalar("SELECT version FROM schema_version ORDER BY version DESC LIMIT 1")
            .fetch_optional(pool)
            .await?;

    Ok(version.unwrap_or(0))
}

async fn set_schema_version(pool: &SqlitePool, version: i32) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
        .bind(version)
        .execute(pool)
        .await?;

    Ok(())
}

/// Run all pending migrations
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    let current_version = get_schema_version(pool).await?;

    if current_version == CURRENT_SCHEMA_VERSION {
        info!("Database schema is up to date (v{})", current_version);
        return Ok(());
    }

    if current_version > CURRENT_SCHEMA_VERSION {
        warn!(
            "Database schema version ({}) is newer than code version ({}); skipping migrations",
            current_version, CURRENT_SCHEMA_VERSION
        );
        return Ok(());
    }

    info!(
        "Running database migrations: v{} -> v{}",
        current_version, CURRENT_SCHEMA_VERSION
    );

    if current_version < 1 {
        migrate_v1(pool).await?;
        set_schema_version(pool, 1).await?;
        info!("Migration v1 completed");
    }

    if current_version < 2 {
        migrate_v2(pool).await?;
        set_schema_version(pool, 2).await?;
        info!("Migration v2 completed");
    }

    Ok(())
}

/// Migration v1: selection query indexes on triage_result
async fn migrate_v1(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_triage_result_selection
        ON triage_result(discipline, route, access_state, status)
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_triage_run_week ON triage_run(week_of)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Migration v2: normalize legacy access states
///
/// Older acquisition runs wrote `oa_pdf_found_but_failed` when an open-access
/// location existed but the download failed. Only the abstract is usable in
/// that case. NULL access states become `unknown`.
async fn migrate_v2(pool: &SqlitePool) -> Result<()> {
    let failed = sqlx::query(
        "UPDATE triage_result SET access_state = 'abstract_only' WHERE access_state = 'oa_pdf_found_but_failed'",
    )
    .execute(pool)
    .await?
    .rows_affected();

    let nulls = sqlx::query(
        "UPDATE triage_result SET access_state = 'unknown' WHERE access_state IS NULL",
    )
    .execute(pool)
    .await?
    .rows_affected();

    if failed + nulls > 0 {
        info!(
            "Migration v2: normalized {} failed-download and {} NULL access states",
            failed, nulls
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup_test_db() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();

        sqlx::query(
            "CREATE TABLE schema_version (version INTEGER PRIMARY KEY, applied_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP)",
        )
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query("CREATE TABLE triage_run (run_id TEXT PRIMARY KEY, week_of TEXT NOT NULL)")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query(
            r#"
            CREATE TABLE triage_result (
                run_id TEXT NOT NULL,
                article_url TEXT NOT NULL,
                discipline TEXT,
                route TEXT,
                status TEXT,
                access_state TEXT,
                PRIMARY KEY (run_id, article_url)
            )
            "#,
        )
        .execute(&pool)
        .await
        .unwrap();

        pool
    }

    #[tokio::test]
    async fn test_migrations_normalize_access_states() {
        let pool = setup_test_db().await;
        for (url, state) in [
            ("https://a", Some("oa_pdf_found_but_failed")),
            ("https://b", None),
            ("https://c", Some("oa_pdf_found")),
        ] {
            sqlx::query("INSERT INTO triage_result (run_id, article_url, access_state) VALUES ('r', ?, ?)")
                .bind(url)
                .bind(state)
                .execute(&pool)
                .await
                .unwrap();
        }

        run_migrations(&pool).await.unwrap();

        let states: Vec<(String, String)> = sqlx::query_as(
            "SELECT article_url, access_state FROM triage_result ORDER BY article_url",
        )
        .fetch_all(&pool)
        .await
        .unwrap();

        assert_eq!(
            states,
            vec![
                ("https://a".to_string(), "abstract_only".to_string()),
                ("https://b".to_string(), "unknown".to_string()),
                ("https://c".to_string(), "oa_pdf_found".to_string()),
            ]
        );
        assert_eq!(get_schema_version(&pool).await.unwrap(), CURRENT_SCHEMA_VERSION);
    }

    #[tokio::test]
    async fn test_migrations_run_once() {
        let pool = setup_test_db().await;
        run_migrations(&pool).await.unwrap();
        run_migrations(&pool).await.unwrap();

        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM schema_version")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(rows, 2);
    }
}
