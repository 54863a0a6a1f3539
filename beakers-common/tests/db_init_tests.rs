//! Tests for database initialization
//!
//! Covers automatic creation, idempotent re-initialization, the append-only
//! vote log, and the write-time selection guards.

use beakers_common::db::init::{init_database, init_memory_database};
use sqlx::SqlitePool;

async fn insert_run(pool: &SqlitePool, run_id: &str) {
    sqlx::query(
        "INSERT INTO triage_run (run_id, week_of, model_builder, model_skeptic) VALUES (?, '2026-01-16', 'b', 's')",
    )
    .bind(run_id)
    .execute(pool)
    .await
    .unwrap();
}

#[tokio::test]
async fn test_database_creation_when_missing() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("data").join("articles.db");

    let result = init_database(&db_path).await;

    assert!(result.is_ok(), "Database initialization failed: {:?}", result.err());
    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn test_idempotent_initialization() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("articles.db");

    let pool1 = init_database(&db_path).await.unwrap();
    insert_run(&pool1, "triage_2026-01-16_aaaa0001").await;
    pool1.close().await;

    let pool2 = init_database(&db_path).await.unwrap();
    let runs: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM triage_run")
        .fetch_one(&pool2)
        .await
        .unwrap();
    let settings: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM settings")
        .fetch_one(&pool2)
        .await
        .unwrap();

    assert_eq!(runs, 1, "Existing data must survive re-initialization");
    assert_eq!(settings, 2);
}

#[tokio::test]
async fn test_default_settings_initialized() {
    let pool = init_memory_database().await.unwrap();

    let wait: Option<String> =
        sqlx::query_scalar("SELECT value FROM settings WHERE key = 'database_max_lock_wait_ms'")
            .fetch_optional(&pool)
            .await
            .unwrap();
    assert_eq!(wait.as_deref(), Some("5000"));

    let value = beakers_common::db::get_setting_i64(&pool, "database_lock_retry_ms", 0)
        .await
        .unwrap();
    assert_eq!(value, 250);
}

#[tokio::test]
async fn test_model_vote_is_append_only() {
    let pool = init_memory_database().await.unwrap();
    insert_run(&pool, "run-1").await;

    sqlx::query(
        r#"
        INSERT INTO model_vote (run_id, article_url, role, model_name, prompt_hash, outcome)
        VALUES ('run-1', 'https://example.org/a', 'builder', 'qwen3:latest', 'abc', 'ok')
        "#,
    )
    .execute(&pool)
    .await
    .unwrap();

    let update = sqlx::query("UPDATE model_vote SET outcome = 'unparsable'")
        .execute(&pool)
        .await;
    assert!(update.is_err(), "UPDATE on model_vote must be rejected");

    let delete = sqlx::query("DELETE FROM model_vote").execute(&pool).await;
    assert!(delete.is_err(), "DELETE on model_vote must be rejected");

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM model_vote")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn test_frontier_flag_check_constraint() {
    let pool = init_memory_database().await.unwrap();
    insert_run(&pool, "run-1").await;

    // frontier on a digest route is inconsistent with routing
    let bad = sqlx::query(
        r#"
        INSERT INTO triage_result (run_id, article_url, score_s, score_e, score_t, score_m, score_h, route, frontier_flag)
        VALUES ('run-1', 'https://example.org/a', 3, 3, 3, 3, 1, 'digest', 1)
        "#,
    )
    .execute(&pool)
    .await;
    assert!(bad.is_err());

    let good = sqlx::query(
        r#"
        INSERT INTO triage_result (run_id, article_url, score_s, score_e, score_t, score_m, score_h, route, frontier_flag)
        VALUES ('run-1', 'https://example.org/a', 3, 1, 3, 0, 1, 'blurb', 1)
        "#,
    )
    .execute(&pool)
    .await;
    assert!(good.is_ok());
}

#[tokio::test]
async fn test_selection_write_guards() {
    let pool = init_memory_database().await.unwrap();

    let insert = |url: &'static str, slot: &'static str, access: &'static str| {
        let pool = pool.clone();
        async move {
            sqlx::query(
                r#"
                INSERT INTO issue_selection (week_of, discipline, article_url, slot, rank_score, access_state)
                VALUES ('2026-01-16', 'chemistry', ?, ?, 1.0, ?)
                "#,
            )
            .bind(url)
            .bind(slot)
            .bind(access)
            .execute(&pool)
            .await
        }
    };

    assert!(insert("https://a", "indepth", "oa_pdf_found").await.is_ok());
    // second indepth for the same pair
    assert!(insert("https://b", "indepth", "oa_pdf_found").await.is_err());
    // digest without full text
    assert!(insert("https://c", "digest", "abstract_only").await.is_err());
    // blurb from abstract alone is allowed
    assert!(insert("https://d", "blurb", "abstract_only").await.is_ok());
    // duplicate article for the pair
    assert!(insert("https://d", "blurb", "abstract_only").await.is_err());

    let update = sqlx::query("UPDATE issue_selection SET rank_score = 9.0")
        .execute(&pool)
        .await;
    assert!(update.is_err());
}
