//! Triage run persistence

use beakers_common::Result;
use sqlx::{Row, SqlitePool};

use crate::models::TriageRun;
use crate::utils::{max_lock_wait_ms, retry_on_lock};

/// Insert a new run
pub async fn create_run(pool: &SqlitePool, run: &TriageRun) -> Result<()> {
    let max_wait_ms = max_lock_wait_ms(pool).await?;

    retry_on_lock("create_run", max_wait_ms, || async {
        sqlx::query(
            r#"
            INSERT INTO triage_run (run_id, week_of, model_builder, model_skeptic, config_json, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&run.run_id)
        .bind(&run.week_of)
        .bind(&run.model_builder)
        .bind(&run.model_skeptic)
        .bind(&run.config_json)
        .bind(&run.created_at)
        .execute(pool)
        .await?;

        Ok(())
    })
    .await
}

/// Load a run by id
pub async fn load_run(pool: &SqlitePool, run_id: &str) -> Result<Option<TriageRun>> {
    let row = sqlx::query(
        r#"
        SELECT run_id, week_of, model_builder, model_skeptic, config_json, created_at
        FROM triage_run
        WHERE run_id = ?
        "#,
    )
    .bind(run_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|row| TriageRun {
        run_id: row.get("run_id"),
        week_of: row.get("week_of"),
        model_builder: row.get("model_builder"),
        model_skeptic: row.get("model_skeptic"),
        config_json: row.get("config_json"),
        created_at: row.get("created_at"),
    }))
}
