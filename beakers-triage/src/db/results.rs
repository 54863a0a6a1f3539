//! Triage result persistence
//!
//! Results are upserted per (run, article): the latest write within a run
//! wins. Full-text columns belong to the acquisition step and are only set
//! on first insert or through [`record_fulltext`]. The evidence upgrade is
//! the only caller allowed to change scores in place
//! ([`update_evidence_scores`]).

use beakers_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::db::{bool_to_int, parse_column};
use crate::models::{now_timestamp, FullTextStatus, Score, ScoreVector, TriageResult};
use crate::routing::RouteDecision;
use crate::utils::{max_lock_wait_ms, retry_on_lock};

const RESULT_COLUMNS: &str = r#"
    tr.run_id, tr.article_url, tr.discipline, tr.headline,
    tr.score_s, tr.score_e, tr.score_t, tr.score_m, tr.score_h,
    tr.route, tr.frontier_flag, tr.tldr, tr.pivot_figure_prompt,
    tr.course_hooks_json, tr.skeptic_adjustments_json, tr.confidence,
    tr.fulltext_path, tr.fulltext_ok, tr.fulltext_source, tr.fulltext_fetched_at,
    tr.access_state, tr.status, tr.error_msg, tr.created_at, tr.updated_at
"#;

/// Insert or replace the scoring outcome for (run, article)
pub async fn upsert_result(pool: &SqlitePool, result: &TriageResult) -> Result<()> {
    let course_hooks = serde_json::to_string(&result.course_hooks)
        .map_err(|e| Error::Internal(format!("Failed to serialize course hooks: {}", e)))?;
    let adjustments = result
        .skeptic_adjustments
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| Error::Internal(format!("Failed to serialize adjustments: {}", e)))?;
    let scores = result.scores.map(|v| v.as_array().map(i64::from));
    let score = |i: usize| scores.map(|s| s[i]);
    let max_wait_ms = max_lock_wait_ms(pool).await?;

    retry_on_lock("upsert_result", max_wait_ms, || async {
        sqlx::query(
            r#"
            INSERT INTO triage_result (
                run_id, article_url, discipline, headline,
                score_s, score_e, score_t, score_m, score_h,
                route, frontier_flag, tldr, pivot_figure_prompt,
                course_hooks_json, skeptic_adjustments_json, confidence,
                fulltext_path, fulltext_ok, fulltext_source, fulltext_fetched_at, access_state,
                status, error_msg, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(run_id, article_url) DO UPDATE SET
                discipline = excluded.discipline,
                headline = excluded.headline,
                score_s = excluded.score_s,
                score_e = excluded.score_e,
                score_t = excluded.score_t,
                score_m = excluded.score_m,
                score_h = excluded.score_h,
                route = excluded.route,
                frontier_flag = excluded.frontier_flag,
                tldr = excluded.tldr,
                pivot_figure_prompt = excluded.pivot_figure_prompt,
                course_hooks_json = excluded.course_hooks_json,
                skeptic_adjustments_json = excluded.skeptic_adjustments_json,
                confidence = excluded.confidence,
                status = excluded.status,
                error_msg = excluded.error_msg,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&result.run_id)
        .bind(&result.article_url)
        .bind(&result.discipline)
        .bind(&result.headline)
        .bind(score(0))
        .bind(score(1))
        .bind(score(2))
        .bind(score(3))
        .bind(score(4))
        .bind(result.route.map(|r| r.as_str()))
        .bind(bool_to_int(result.frontier))
        .bind(&result.tldr)
        .bind(&result.pivot_figure_prompt)
        .bind(&course_hooks)
        .bind(&adjustments)
        .bind(result.confidence)
        .bind(&result.fulltext.path)
        .bind(bool_to_int(result.fulltext.ok))
        .bind(&result.fulltext.source)
        .bind(&result.fulltext.fetched_at)
        .bind(result.fulltext.access_state.as_str())
        .bind(result.status.as_str())
        .bind(&result.error_msg)
        .bind(&result.created_at)
        .bind(&result.updated_at)
        .execute(pool)
        .await?;

        Ok(())
    })
    .await
}

fn stored_scores(row: &SqliteRow) -> Result<Option<ScoreVector>> {
    let columns = ["score_s", "score_e", "score_t", "score_m", "score_h"];
    let mut values = [0i64; 5];
    for (slot, column) in values.iter_mut().zip(columns) {
        match row.get::<Option<i64>, _>(column) {
            Some(v) => *slot = v,
            None => return Ok(None),
        }
    }
    let [s, e, t, m, h] = values;
    ScoreVector::from_raw(s, e, t, m, h)
        .map(Some)
        .map_err(|e| Error::StoredData(format!("Invalid stored score: {}", e)))
}

fn row_to_result(row: &SqliteRow) -> Result<TriageResult> {
    let route: Option<String> = row.get("route");
    let route = route.as_deref().map(|r| parse_column("route", r)).transpose()?;
    let status: String = row.get("status");
    let access_state: String = row.get("access_state");

    let course_hooks: Option<String> = row.get("course_hooks_json");
    let course_hooks: Vec<String> = match course_hooks {
        Some(json) => serde_json::from_str(&json)
            .map_err(|e| Error::StoredData(format!("Failed to parse course hooks: {}", e)))?,
        None => Vec::new(),
    };
    let adjustments: Option<String> = row.get("skeptic_adjustments_json");
    let skeptic_adjustments = adjustments
        .map(|json| serde_json::from_str(&json))
        .transpose()
        .map_err(|e| Error::StoredData(format!("Failed to parse adjustments: {}", e)))?;

    Ok(TriageResult {
        run_id: row.get("run_id"),
        article_url: row.get("article_url"),
        discipline: row.get::<Option<String>, _>("discipline").unwrap_or_default(),
        headline: row.get::<Option<String>, _>("headline").unwrap_or_default(),
        scores: stored_scores(row)?,
        route,
        frontier: row.get::<i64, _>("frontier_flag") != 0,
        tldr: row.get("tldr"),
        pivot_figure_prompt: row.get("pivot_figure_prompt"),
        course_hooks,
        skeptic_adjustments,
        confidence: row.get("confidence"),
        fulltext: FullTextStatus {
            path: row.get("fulltext_path"),
            ok: row.get::<i64, _>("fulltext_ok") != 0,
            source: row.get("fulltext_source"),
            fetched_at: row.get("fulltext_fetched_at"),
            access_state: parse_column("access_state", &access_state)?,
        },
        status: parse_column("status", &status)?,
        error_msg: row.get("error_msg"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

/// Load the result for (run, article)
pub async fn load_result(
    pool: &SqlitePool,
    run_id: &str,
    article_url: &str,
) -> Result<Option<TriageResult>> {
    let sql = format!(
        "SELECT {} FROM triage_result tr WHERE tr.run_id = ? AND tr.article_url = ?",
        RESULT_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(run_id)
        .bind(article_url)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(row_to_result).transpose()
}

/// Most recently recorded full-text status for an article, from any run
///
/// New runs carry this forward so a re-triaged article keeps its
/// acquisition state.
pub async fn latest_fulltext(pool: &SqlitePool, article_url: &str) -> Result<Option<FullTextStatus>> {
    let row = sqlx::query(
        r#"
        SELECT fulltext_path, fulltext_ok, fulltext_source, fulltext_fetched_at, access_state
        FROM triage_result
        WHERE article_url = ? AND access_state != 'unknown'
        ORDER BY COALESCE(fulltext_fetched_at, updated_at) DESC, run_id DESC
        LIMIT 1
        "#,
    )
    .bind(article_url)
    .fetch_optional(pool)
    .await?;

    row.map(|row| {
        let access_state: String = row.get("access_state");
        Ok(FullTextStatus {
            path: row.get("fulltext_path"),
            ok: row.get::<i64, _>("fulltext_ok") != 0,
            source: row.get("fulltext_source"),
            fetched_at: row.get("fulltext_fetched_at"),
            access_state: parse_column("access_state", &access_state)?,
        })
    })
    .transpose()
}

/// Latest ok result per article among runs for `week_of` in `discipline`
///
/// "Latest" is by result creation time, then run id. Error rows are
/// excluded before picking, so a failed re-run does not hide an earlier
/// successful one.
pub async fn latest_results_for_period(
    pool: &SqlitePool,
    week_of: &str,
    discipline: &str,
) -> Result<Vec<TriageResult>> {
    let sql = format!(
        r#"
        SELECT {columns} FROM (
            SELECT tr.*, ROW_NUMBER() OVER (
                PARTITION BY tr.article_url
                ORDER BY tr.created_at DESC, tr.run_id DESC
            ) AS recency
            FROM triage_result tr
            JOIN triage_run r ON r.run_id = tr.run_id
            WHERE r.week_of = ?
              AND tr.discipline = ?
              AND tr.status = 'ok'
              AND tr.route IS NOT NULL
        ) tr
        WHERE tr.recency = 1
        ORDER BY tr.article_url
        "#,
        columns = RESULT_COLUMNS
    );

    let rows = sqlx::query(&sql)
        .bind(week_of)
        .bind(discipline)
        .fetch_all(pool)
        .await?;

    rows.iter().map(row_to_result).collect()
}

/// Latest ok result per article, kept when that row is upgrade-eligible
///
/// An article whose newest result already has E of 3 or more is skipped
/// even if an older run scored it lower. Newest first.
pub async fn upgrade_candidates(pool: &SqlitePool, limit: usize) -> Result<Vec<TriageResult>> {
    let sql = format!(
        r#"
        SELECT {columns} FROM (
            SELECT tr.*, ROW_NUMBER() OVER (
                PARTITION BY tr.article_url
                ORDER BY tr.created_at DESC, tr.run_id DESC
            ) AS recency
            FROM triage_result tr
            WHERE tr.status = 'ok'
        ) tr
        WHERE tr.recency = 1
          AND tr.access_state = 'oa_pdf_found'
          AND tr.score_e <= 2
        ORDER BY tr.created_at DESC, tr.article_url
        LIMIT ?
        "#,
        columns = RESULT_COLUMNS
    );

    let rows = sqlx::query(&sql)
        .bind(limit as i64)
        .fetch_all(pool)
        .await?;

    rows.iter().map(row_to_result).collect()
}

/// Replace E/H and the derived route fields of one result
///
/// Guarded on the eligibility columns so a row whose state changed since it
/// was read is left alone. Returns whether a row was updated.
pub async fn update_evidence_scores(
    pool: &SqlitePool,
    run_id: &str,
    article_url: &str,
    e: Score,
    h: Score,
    decision: RouteDecision,
) -> Result<bool> {
    let updated_at = now_timestamp();
    let max_wait_ms = max_lock_wait_ms(pool).await?;

    retry_on_lock("update_evidence_scores", max_wait_ms, || async {
        let affected = sqlx::query(
            r#"
            UPDATE triage_result
            SET score_e = ?, score_h = ?, route = ?, frontier_flag = ?, updated_at = ?
            WHERE run_id = ? AND article_url = ?
              AND status = 'ok'
              AND access_state = 'oa_pdf_found'
            "#,
        )
        .bind(e.value() as i64)
        .bind(h.value() as i64)
        .bind(decision.route.as_str())
        .bind(bool_to_int(decision.frontier))
        .bind(&updated_at)
        .bind(run_id)
        .bind(article_url)
        .execute(pool)
        .await?
        .rows_affected();

        Ok(affected > 0)
    })
    .await
}

/// Record full-text acquisition for every result of an article
///
/// Returns the number of rows updated.
pub async fn record_fulltext(
    pool: &SqlitePool,
    article_url: &str,
    status: &FullTextStatus,
) -> Result<u64> {
    let fetched_at = status.fetched_at.clone().unwrap_or_else(now_timestamp);
    let max_wait_ms = max_lock_wait_ms(pool).await?;

    retry_on_lock("record_fulltext", max_wait_ms, || async {
        let affected = sqlx::query(
            r#"
            UPDATE triage_result
            SET fulltext_path = ?, fulltext_ok = ?, fulltext_source = ?,
                fulltext_fetched_at = ?, access_state = ?, updated_at = ?
            WHERE article_url = ?
            "#,
        )
        .bind(&status.path)
        .bind(bool_to_int(status.ok))
        .bind(&status.source)
        .bind(&fetched_at)
        .bind(status.access_state.as_str())
        .bind(&fetched_at)
        .bind(article_url)
        .execute(pool)
        .await?
        .rows_affected();

        Ok(affected)
    })
    .await
}
