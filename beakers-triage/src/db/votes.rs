//! Append-only model vote log
//!
//! Votes are only ever inserted. The table's triggers reject UPDATE and
//! DELETE, so there is deliberately no write path other than
//! [`append_vote`].

use beakers_common::{Error, Result};
use sqlx::{Row, SqlitePool};

use crate::db::{bool_to_int, parse_column};
use crate::models::{EvidenceChange, ModelVote, Score};
use crate::utils::{max_lock_wait_ms, retry_on_lock};

/// Append one vote, returning its row id
pub async fn append_vote(pool: &SqlitePool, vote: &ModelVote) -> Result<i64> {
    let json_output = vote
        .json_output
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| Error::Internal(format!("Failed to serialize vote JSON: {}", e)))?;
    let change = vote.evidence_change;
    let max_wait_ms = max_lock_wait_ms(pool).await?;

    retry_on_lock("append_vote", max_wait_ms, || async {
        let id = sqlx::query(
            r#"
            INSERT INTO model_vote (
                run_id, article_url, role, model_name, prompt_hash, cache_hit, outcome,
                raw_output, json_output, error_msg,
                score_e_before, score_h_before, score_e_after, score_h_after, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&vote.run_id)
        .bind(&vote.article_url)
        .bind(vote.role.as_str())
        .bind(&vote.model_name)
        .bind(&vote.prompt_hash)
        .bind(bool_to_int(vote.cache_hit))
        .bind(vote.outcome.as_str())
        .bind(&vote.raw_output)
        .bind(&json_output)
        .bind(&vote.error_msg)
        .bind(change.map(|c| c.e_before.value() as i64))
        .bind(change.map(|c| c.h_before.value() as i64))
        .bind(change.map(|c| c.e_after.value() as i64))
        .bind(change.map(|c| c.h_after.value() as i64))
        .bind(&vote.created_at)
        .execute(pool)
        .await?
        .last_insert_rowid();

        Ok(id)
    })
    .await
}

fn stored_score(column: &'static str, value: i64) -> Result<Score> {
    Score::new(column, value).map_err(|e| Error::StoredData(format!("Invalid stored score: {}", e)))
}

/// All votes for one article in a run, oldest first
pub async fn votes_for_article(
    pool: &SqlitePool,
    run_id: &str,
    article_url: &str,
) -> Result<Vec<ModelVote>> {
    let rows = sqlx::query(
        r#"
        SELECT run_id, article_url, role, model_name, prompt_hash, cache_hit, outcome,
               raw_output, json_output, error_msg,
               score_e_before, score_h_before, score_e_after, score_h_after, created_at
        FROM model_vote
        WHERE run_id = ? AND article_url = ?
        ORDER BY id
        "#,
    )
    .bind(run_id)
    .bind(article_url)
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|row| {
            let role: String = row.get("role");
            let outcome: String = row.get("outcome");
            let json_output: Option<String> = row.get("json_output");
            let json_output = json_output
                .map(|s| serde_json::from_str(&s))
                .transpose()
                .map_err(|e| Error::StoredData(format!("Failed to parse vote JSON: {}", e)))?;

            let before_e: Option<i64> = row.get("score_e_before");
            let before_h: Option<i64> = row.get("score_h_before");
            let after_e: Option<i64> = row.get("score_e_after");
            let after_h: Option<i64> = row.get("score_h_after");
            let evidence_change = match (before_e, before_h, after_e, after_h) {
                (Some(eb), Some(hb), Some(ea), Some(ha)) => Some(EvidenceChange {
                    e_before: stored_score("score_e_before", eb)?,
                    h_before: stored_score("score_h_before", hb)?,
                    e_after: stored_score("score_e_after", ea)?,
                    h_after: stored_score("score_h_after", ha)?,
                }),
                _ => None,
            };

            Ok(ModelVote {
                run_id: row.get("run_id"),
                article_url: row.get("article_url"),
                role: parse_column("role", &role)?,
                model_name: row.get("model_name"),
                prompt_hash: row.get("prompt_hash"),
                cache_hit: row.get::<i64, _>("cache_hit") != 0,
                outcome: parse_column("outcome", &outcome)?,
                raw_output: row.get("raw_output"),
                json_output,
                error_msg: row.get("error_msg"),
                evidence_change,
                created_at: row.get("created_at"),
            })
        })
        .collect()
}
