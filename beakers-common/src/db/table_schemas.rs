//! Table schema definitions
//!
//! Declared columns for every triage table. Adding a column here is enough
//! for existing databases to pick it up on the next start. Columns added to a
//! live table can only carry constant defaults (SQLite restriction), which is
//! why timestamp columns are declared without `CURRENT_TIMESTAMP` here even
//! though CREATE TABLE uses it.

use crate::db::schema_sync::{ColumnDefinition, SchemaSync, SyncReport, TableSchema};
use crate::Result;
use sqlx::SqlitePool;
use tracing::info;

pub struct TriageRunTableSchema;

impl TableSchema for TriageRunTableSchema {
    fn table_name() -> &'static str {
        "triage_run"
    }

    fn expected_columns() -> Vec<ColumnDefinition> {
        vec![
            ColumnDefinition::new("run_id", "TEXT").primary_key(),
            ColumnDefinition::new("week_of", "TEXT").not_null(),
            ColumnDefinition::new("model_builder", "TEXT"),
            ColumnDefinition::new("model_skeptic", "TEXT"),
            ColumnDefinition::new("config_json", "TEXT"),
            ColumnDefinition::new("created_at", "TEXT"),
        ]
    }
}

pub struct ModelVoteTableSchema;

impl TableSchema for ModelVoteTableSchema {
    fn table_name() -> &'static str {
        "model_vote"
    }

    fn expected_columns() -> Vec<ColumnDefinition> {
        vec![
            ColumnDefinition::new("id", "INTEGER").primary_key(),
            ColumnDefinition::new("run_id", "TEXT").not_null(),
            ColumnDefinition::new("article_url", "TEXT").not_null(),
            ColumnDefinition::new("role", "TEXT").not_null(),
            ColumnDefinition::new("model_name", "TEXT").not_null(),
            ColumnDefinition::new("prompt_hash", "TEXT"),
            ColumnDefinition::new("cache_hit", "INTEGER").not_null().default("0"),
            ColumnDefinition::new("outcome", "TEXT").not_null().default("'ok'"),
            ColumnDefinition::new("raw_output", "TEXT"),
            ColumnDefinition::new("json_output", "TEXT"),
            ColumnDefinition::new("error_msg", "TEXT"),
            // Evidence upgrade votes record both sides of the change
            ColumnDefinition::new("score_e_before", "INTEGER"),
            ColumnDefinition::new("score_h_before", "INTEGER"),
            ColumnDefinition::new("score_e_after", "INTEGER"),
            ColumnDefinition::new("score_h_after", "INTEGER"),
            ColumnDefinition::new("created_at", "TEXT"),
        ]
    }
}

pub struct TriageResultTableSchema;

impl TableSchema for TriageResultTableSchema {
    fn table_name() -> &'static str {
        "triage_result"
    }

    fn expected_columns() -> Vec<ColumnDefinition> {
        vec![
            ColumnDefinition::new("run_id", "TEXT").not_null(),
            ColumnDefinition::new("article_url", "TEXT").not_null(),
            ColumnDefinition::new("discipline", "TEXT"),
            ColumnDefinition::new("headline", "TEXT"),
            ColumnDefinition::new("score_s", "INTEGER"),
            ColumnDefinition::new("score_e", "INTEGER"),
            ColumnDefinition::new("score_t", "INTEGER"),
            ColumnDefinition::new("score_m", "INTEGER"),
            ColumnDefinition::new("score_h", "INTEGER"),
            ColumnDefinition::new("route", "TEXT"),
            ColumnDefinition::new("frontier_flag", "INTEGER").default("0"),
            ColumnDefinition::new("tldr", "TEXT"),
            ColumnDefinition::new("pivot_figure_prompt", "TEXT"),
            ColumnDefinition::new("course_hooks_json", "TEXT"),
            ColumnDefinition::new("skeptic_adjustments_json", "TEXT"),
            ColumnDefinition::new("confidence", "REAL"),
            // Full-text tracking (written by the acquisition step)
            ColumnDefinition::new("fulltext_path", "TEXT"),
            ColumnDefinition::new("fulltext_ok", "INTEGER").default("0"),
            ColumnDefinition::new("fulltext_source", "TEXT"),
            ColumnDefinition::new("fulltext_fetched_at", "TEXT"),
            ColumnDefinition::new("access_state", "TEXT").default("'unknown'"),
            ColumnDefinition::new("status", "TEXT").default("'ok'"),
            ColumnDefinition::new("error_msg", "TEXT"),
            ColumnDefinition::new("created_at", "TEXT"),
            ColumnDefinition::new("updated_at", "TEXT"),
        ]
    }
}

pub struct IssueSelectionTableSchema;

impl TableSchema for IssueSelectionTableSchema {
    fn table_name() -> &'static str {
        "issue_selection"
    }

    fn expected_columns() -> Vec<ColumnDefinition> {
        vec![
            ColumnDefinition::new("id", "INTEGER").primary_key(),
            ColumnDefinition::new("week_of", "TEXT").not_null(),
            ColumnDefinition::new("discipline", "TEXT").not_null(),
            ColumnDefinition::new("article_url", "TEXT").not_null(),
            ColumnDefinition::new("slot", "TEXT").not_null(),
            ColumnDefinition::new("rank_score", "REAL"),
            ColumnDefinition::new("access_state", "TEXT"),
            ColumnDefinition::new("selected_at", "TEXT"),
        ]
    }
}

/// Synchronize all table schemas
///
/// Runs after CREATE TABLE IF NOT EXISTS and before versioned migrations.
pub async fn sync_all_table_schemas(pool: &SqlitePool) -> Result<Vec<SyncReport>> {
    let reports = vec![
        SchemaSync::sync_table::<TriageRunTableSchema>(pool).await?,
        SchemaSync::sync_table::<ModelVoteTableSchema>(pool).await?,
        SchemaSync::sync_table::<TriageResultTableSchema>(pool).await?,
        SchemaSync::sync_table::<IssueSelectionTableSchema>(pool).await?,
    ];

    let added: usize = reports.iter().map(|r| r.added_columns.len()).sum();
    info!("Schema synchronization complete ({} columns added)", added);
    Ok(reports)
}
