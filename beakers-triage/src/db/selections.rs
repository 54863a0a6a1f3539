//! Issue selection persistence
//!
//! A (period, discipline) pair is selected at most once. The existence check
//! and the inserts run in one transaction; a concurrent writer that commits
//! first makes ours fail with a lock error, and the retry then sees its rows.

use beakers_common::{Error, Result};
use sqlx::{Row, SqlitePool};

use crate::config::SelectionQuotas;
use crate::db::parse_column;
use crate::models::{IssueSelection, Slot, SlotCounts};
use crate::utils::{max_lock_wait_ms, retry_on_lock};

/// Outcome of [`write_selection`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionWrite {
    /// Rows inserted
    Written(usize),
    /// Rows already existed for the pair; nothing inserted
    AlreadyPresent(usize),
}

/// Number of selection rows for (period, discipline)
pub async fn selection_exists(pool: &SqlitePool, week_of: &str, discipline: &str) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM issue_selection WHERE week_of = ? AND discipline = ?",
    )
    .bind(week_of)
    .bind(discipline)
    .fetch_one(pool)
    .await?;

    Ok(count)
}

/// Write a complete selection for one pair, atomically
///
/// Rows exceeding any slot maximum in `quotas` are rejected before anything
/// is written.
pub async fn write_selection(
    pool: &SqlitePool,
    week_of: &str,
    discipline: &str,
    rows: &[IssueSelection],
    quotas: &SelectionQuotas,
) -> Result<SelectionWrite> {
    if let Some(row) = rows
        .iter()
        .find(|r| r.week_of != week_of || r.discipline != discipline)
    {
        return Err(Error::InvalidInput(format!(
            "selection row {} does not belong to ({}, {})",
            row.article_url, week_of, discipline
        )));
    }

    let counts = SlotCounts::from_selections(rows);
    for (slot, count, max) in [
        (Slot::Indepth, counts.indepth, SelectionQuotas::INDEPTH_MAX),
        (Slot::Digest, counts.digest, quotas.digest_max),
        (Slot::Blurb, counts.blurb, quotas.blurb_max),
    ] {
        if count > max {
            return Err(Error::InvalidInput(format!(
                "{} {} rows for ({}, {}) exceed the maximum of {}",
                count,
                slot.as_str(),
                week_of,
                discipline,
                max
            )));
        }
    }

    let max_wait_ms = max_lock_wait_ms(pool).await?;

    retry_on_lock("write_selection", max_wait_ms, || async {
        let mut tx = pool.begin().await?;

        let existing: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM issue_selection WHERE week_of = ? AND discipline = ?",
        )
        .bind(week_of)
        .bind(discipline)
        .fetch_one(&mut *tx)
        .await?;

        if existing > 0 {
            tx.rollback().await?;
            return Ok(SelectionWrite::AlreadyPresent(existing as usize));
        }

        let mut written = 0usize;
        for row in rows {
            written += sqlx::query(
                r#"
                INSERT OR IGNORE INTO issue_selection
                    (week_of, discipline, article_url, slot, rank_score, access_state, selected_at)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&row.week_of)
            .bind(&row.discipline)
            .bind(&row.article_url)
            .bind(row.slot.as_str())
            .bind(row.rank_score)
            .bind(row.access_state.as_str())
            .bind(&row.selected_at)
            .execute(&mut *tx)
            .await?
            .rows_affected() as usize;
        }

        tx.commit().await?;
        Ok(SelectionWrite::Written(written))
    })
    .await
}

/// Selected rows for a period, optionally narrowed by discipline and slot
///
/// Ordered by discipline, slot (indepth, digest, blurb), rank descending.
pub async fn load_selection(
    pool: &SqlitePool,
    week_of: &str,
    discipline: Option<&str>,
    slot: Option<Slot>,
) -> Result<Vec<IssueSelection>> {
    let rows = sqlx::query(
        r#"
        SELECT week_of, discipline, article_url, slot, rank_score, access_state, selected_at
        FROM issue_selection
        WHERE week_of = ?
          AND (? IS NULL OR discipline = ?)
          AND (? IS NULL OR slot = ?)
        ORDER BY discipline,
                 CASE slot WHEN 'indepth' THEN 0 WHEN 'digest' THEN 1 ELSE 2 END,
                 rank_score DESC,
                 article_url
        "#,
    )
    .bind(week_of)
    .bind(discipline)
    .bind(discipline)
    .bind(slot.map(|s| s.as_str()))
    .bind(slot.map(|s| s.as_str()))
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            let slot: String = row.get("slot");
            let access_state: String = row.get("access_state");
            Ok(IssueSelection {
                week_of: row.get("week_of"),
                discipline: row.get("discipline"),
                article_url: row.get("article_url"),
                slot: parse_column("slot", &slot)?,
                rank_score: row.get("rank_score"),
                access_state: parse_column("access_state", &access_state)?,
                selected_at: row.get("selected_at"),
            })
        })
        .collect()
}
