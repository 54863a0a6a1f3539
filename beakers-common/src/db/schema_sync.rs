//! Additive schema synchronization
//!
//! Schema definitions in code are the single source of truth. On startup each
//! table is introspected with `PRAGMA table_info` and compared against its
//! declared columns:
//!
//! - missing columns are added with `ALTER TABLE ... ADD COLUMN`
//! - type or constraint differences are reported and left alone
//! - columns present in the database but not in code are reported and kept
//!
//! Nothing here ever drops, renames or rewrites a column. Destructive changes
//! belong in a hand-written migration (see `migrations.rs`).
//!
//! ```rust,ignore
//! pub struct TriageRunTableSchema;
//!
//! impl TableSchema for TriageRunTableSchema {
//!     fn table_name() -> &'static str { "triage_run" }
//!     fn expected_columns() -> Vec<ColumnDefinition> {
//!         vec![
//!             ColumnDefinition::new("run_id", "TEXT").primary_key(),
//!             ColumnDefinition::new("config_json", "TEXT"), // added later
//!         ]
//!     }
//! }
//!
//! let report = SchemaSync::sync_table::<TriageRunTableSchema>(&pool).await?;
//! ```

use crate::Result;
use sqlx::{Row, SqlitePool};
use tracing::{debug, info, warn};

/// Column definition with SQL constraints
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDefinition {
    pub name: String,
    /// SQL type (e.g., "TEXT", "INTEGER", "REAL")
    pub sql_type: String,
    pub not_null: bool,
    pub primary_key: bool,
    pub unique: bool,
    /// DEFAULT expression; must be a constant for columns added later
    pub default_value: Option<String>,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql_type: sql_type.into(),
            not_null: false,
            primary_key: false,
            unique: false,
            default_value: None,
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn default(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }
}

/// Column as reported by `PRAGMA table_info`
#[derive(Debug, Clone)]
pub struct ActualColumn {
    pub cid: i32,
    pub name: String,
    pub type_name: String,
    pub not_null: bool,
    pub default_value: Option<String>,
    pub pk: bool,
}

/// Difference between declared and actual schema
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaDrift {
    /// Column missing from database (auto-fixed)
    MissingColumn {
        table: String,
        column: ColumnDefinition,
    },
    /// Column type differs (reported only)
    TypeMismatch {
        table: String,
        column: String,
        expected: String,
        actual: String,
    },
    /// Constraint missing on an existing column (reported only)
    ConstraintMismatch {
        table: String,
        column: String,
        constraint: String,
    },
    /// Column exists in database but is no longer declared (kept as-is)
    UndeclaredColumn { table: String, column: String },
}

impl SchemaDrift {
    /// Whether sync can repair this drift without losing data
    pub fn is_additive(&self) -> bool {
        matches!(self, SchemaDrift::MissingColumn { .. })
    }
}

/// Outcome of syncing one table
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncReport {
    pub table: String,
    /// Columns added during this sync
    pub added_columns: Vec<String>,
    /// Drift that needs a manual migration (or none at all)
    pub unresolved: Vec<SchemaDrift>,
}

impl SyncReport {
    pub fn is_clean(&self) -> bool {
        self.added_columns.is_empty() && self.unresolved.is_empty()
    }
}

/// Declared schema for one table
pub trait TableSchema {
    fn table_name() -> &'static str;

    /// Expected column definitions
    fn expected_columns() -> Vec<ColumnDefinition>;
}

/// Reads the actual database schema
pub struct SchemaIntrospector;

impl SchemaIntrospector {
    /// Read columns of `table_name`, ordered by cid
    pub async fn introspect_table(pool: &SqlitePool, table_name: &str) -> Result<Vec<ActualColumn>> {
        let query = format!("PRAGMA table_info({})", table_name);
        let rows = sqlx::query(&query).fetch_all(pool).await?;

        let mut columns: Vec<ActualColumn> = rows
            .iter()
            .map(|row| ActualColumn {
                cid: row.get("cid"),
                name: row.get("name"),
                type_name: row.get("type"),
                not_null: row.get::<i32, _>("notnull") != 0,
                default_value: row.get("dflt_value"),
                pk: row.get::<i32, _>("pk") != 0,
            })
            .collect();

        columns.sort_by_key(|c| c.cid);
        Ok(columns)
    }

    pub async fn table_exists(pool: &SqlitePool, table_name: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM sqlite_master
                WHERE type='table' AND name = ?
            )
            "#,
        )
        .bind(table_name)
        .fetch_one(pool)
        .await?;

        Ok(exists)
    }
}

/// Compares declared and actual columns
pub struct SchemaDiff;

impl SchemaDiff {
    pub fn compare(
        table_name: &str,
        expected: &[ColumnDefinition],
        actual: &[ActualColumn],
    ) -> Vec<SchemaDrift> {
        let mut drift = Vec::new();

        for expected_col in expected {
            let Some(actual_col) = actual.iter().find(|c| c.name == expected_col.name) else {
                drift.push(SchemaDrift::MissingColumn {
                    table: table_name.to_string(),
                    column: expected_col.clone(),
                });
                continue;
            };

            if !Self::types_compatible(&expected_col.sql_type, &actual_col.type_name) {
                drift.push(SchemaDrift::TypeMismatch {
                    table: table_name.to_string(),
                    column: expected_col.name.clone(),
                    expected: expected_col.sql_type.clone(),
                    actual: actual_col.type_name.clone(),
                });
            }

            if expected_col.not_null && !actual_col.not_null {
                drift.push(SchemaDrift::ConstraintMismatch {
                    table: table_name.to_string(),
                    column: expected_col.name.clone(),
                    constraint: "NOT NULL".to_string(),
                });
            }

            if expected_col.primary_key && !actual_col.pk {
                drift.push(SchemaDrift::ConstraintMismatch {
                    table: table_name.to_string(),
                    column: expected_col.name.clone(),
                    constraint: "PRIMARY KEY".to_string(),
                });
            }
        }

        for actual_col in actual {
            if !expected.iter().any(|c| c.name == actual_col.name) {
                drift.push(SchemaDrift::UndeclaredColumn {
                    table: table_name.to_string(),
                    column: actual_col.name.clone(),
                });
            }
        }

        drift
    }

    /// SQLite type affinity comparison
    fn types_compatible(expected: &str, actual: &str) -> bool {
        let exp = expected.to_uppercase();
        let act = actual.to_uppercase();

        if exp == act {
            return true;
        }

        let integer = |t: &str| t.contains("INT");
        let text = |t: &str| t.contains("TEXT") || t.contains("CHAR") || t.contains("CLOB");
        let real = |t: &str| t.contains("REAL") || t.contains("FLOA") || t.contains("DOUB");

        (integer(&exp) && integer(&act)) || (text(&exp) && text(&act)) || (real(&exp) && real(&act))
    }
}

/// Applies additive fixes
pub struct SchemaSync;

impl SchemaSync {
    /// Synchronize one table: add missing columns, report everything else.
    ///
    /// Tables that do not exist yet are skipped; CREATE TABLE IF NOT EXISTS
    /// runs before sync.
    pub async fn sync_table<T: TableSchema>(pool: &SqlitePool) -> Result<SyncReport> {
        let table_name = T::table_name();
        let expected = T::expected_columns();
        let mut report = SyncReport {
            table: table_name.to_string(),
            ..Default::default()
        };

        if !SchemaIntrospector::table_exists(pool, table_name).await? {
            warn!(
                "Table '{}' does not exist - should be created by CREATE TABLE IF NOT EXISTS first",
                table_name
            );
            return Ok(report);
        }

        let actual = SchemaIntrospector::introspect_table(pool, table_name).await?;
        let drift = SchemaDiff::compare(table_name, &expected, &actual);

        if drift.is_empty() {
            debug!("Schema up to date for '{}'", table_name);
            return Ok(report);
        }

        for change in drift {
            match change {
                SchemaDrift::MissingColumn { ref table, ref column } => {
                    Self::add_column(pool, table, column).await?;
                    report.added_columns.push(column.name.clone());
                }
                SchemaDrift::TypeMismatch { ref table, ref column, ref expected, ref actual } => {
                    warn!(
                        "Type mismatch in {}.{}: expected '{}', found '{}'. Manual migration required.",
                        table, column, expected, actual
                    );
                    report.unresolved.push(change);
                }
                SchemaDrift::ConstraintMismatch { ref table, ref column, ref constraint } => {
                    warn!(
                        "Constraint mismatch in {}.{}: missing '{}'. Manual migration required.",
                        table, column, constraint
                    );
                    report.unresolved.push(change);
                }
                SchemaDrift::UndeclaredColumn { ref table, ref column } => {
                    info!("Keeping undeclared column {}.{}", table, column);
                    report.unresolved.push(change);
                }
            }
        }

        Ok(report)
    }

    /// ALTER TABLE ADD COLUMN
    ///
    /// SQLite cannot add PRIMARY KEY or UNIQUE columns, and NOT NULL only
    /// with a DEFAULT; those constraints are dropped with a warning.
    async fn add_column(pool: &SqlitePool, table: &str, column: &ColumnDefinition) -> Result<()> {
        let mut sql = format!(
            "ALTER TABLE {} ADD COLUMN {} {}",
            table, column.name, column.sql_type
        );

        if column.primary_key || column.unique {
            warn!(
                "Cannot add PRIMARY KEY/UNIQUE column {}.{} via ALTER TABLE; adding without constraint",
                table, column.name
            );
        }

        match (&column.default_value, column.not_null) {
            (Some(default), true) => sql.push_str(&format!(" NOT NULL DEFAULT {}", default)),
            (Some(default), false) => sql.push_str(&format!(" DEFAULT {}", default)),
            (None, true) => warn!(
                "Cannot add NOT NULL column {}.{} without DEFAULT; column will be nullable",
                table, column.name
            ),
            (None, false) => {}
        }

        info!("Adding column: {}.{} ({})", table, column.name, column.sql_type);

        match sqlx::query(&sql).execute(pool).await {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.message().contains("duplicate column") => {
                // Another process added it between introspection and ALTER
                info!("Column {}.{} already added (concurrent initialization)", table, column.name);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup_test_db() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap()
    }

    struct VotesV2;

    impl TableSchema for VotesV2 {
        fn table_name() -> &'static str {
            "votes"
        }

        fn expected_columns() -> Vec<ColumnDefinition> {
            vec![
                ColumnDefinition::new("id", "INTEGER").primary_key(),
                ColumnDefinition::new("role", "TEXT").not_null(),
                ColumnDefinition::new("outcome", "TEXT").not_null().default("'ok'"),
                ColumnDefinition::new("cache_hit", "INTEGER").default("0"),
            ]
        }
    }

    #[test]
    fn test_column_definition_builder() {
        let col = ColumnDefinition::new("outcome", "TEXT")
            .not_null()
            .default("'ok'");

        assert_eq!(col.name, "outcome");
        assert!(col.not_null);
        assert!(!col.unique);
        assert_eq!(col.default_value, Some("'ok'".to_string()));
    }

    #[test]
    fn test_types_compatible() {
        assert!(SchemaDiff::types_compatible("TEXT", "text"));
        assert!(SchemaDiff::types_compatible("INTEGER", "INT"));
        assert!(SchemaDiff::types_compatible("TEXT", "VARCHAR(255)"));
        assert!(SchemaDiff::types_compatible("REAL", "DOUBLE"));
        assert!(!SchemaDiff::types_compatible("TEXT", "INTEGER"));
        assert!(!SchemaDiff::types_compatible("REAL", "TEXT"));
    }

    #[tokio::test]
    async fn test_sync_adds_missing_columns_only() {
        let pool = setup_test_db().await;
        sqlx::query("CREATE TABLE votes (id INTEGER PRIMARY KEY, role TEXT NOT NULL, legacy TEXT)")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO votes (role, legacy) VALUES ('builder', 'x')")
            .execute(&pool)
            .await
            .unwrap();

        let report = SchemaSync::sync_table::<VotesV2>(&pool).await.unwrap();

        assert_eq!(report.added_columns, vec!["outcome", "cache_hit"]);
        assert_eq!(
            report.unresolved,
            vec![SchemaDrift::UndeclaredColumn {
                table: "votes".to_string(),
                column: "legacy".to_string(),
            }]
        );

        // Existing row survives and picks up the defaults
        let (outcome, legacy): (String, String) =
            sqlx::query_as("SELECT outcome, legacy FROM votes")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(outcome, "ok");
        assert_eq!(legacy, "x");
    }

    #[tokio::test]
    async fn test_sync_is_idempotent() {
        let pool = setup_test_db().await;
        sqlx::query("CREATE TABLE votes (id INTEGER PRIMARY KEY, role TEXT NOT NULL)")
            .execute(&pool)
            .await
            .unwrap();

        let first = SchemaSync::sync_table::<VotesV2>(&pool).await.unwrap();
        let second = SchemaSync::sync_table::<VotesV2>(&pool).await.unwrap();

        assert_eq!(first.added_columns.len(), 2);
        assert!(second.is_clean());
    }

    #[tokio::test]
    async fn test_type_mismatch_is_reported_not_fixed() {
        let pool = setup_test_db().await;
        sqlx::query(
            "CREATE TABLE votes (id INTEGER PRIMARY KEY, role TEXT NOT NULL, outcome INTEGER, cache_hit INTEGER)",
        )
        .execute(&pool)
        .await
        .unwrap();

        let report = SchemaSync::sync_table::<VotesV2>(&pool).await.unwrap();

        assert!(report.added_columns.is_empty());
        assert!(report.unresolved.iter().all(|d| !d.is_additive()));
        assert!(report.unresolved.iter().any(|d| matches!(
            d,
            SchemaDrift::TypeMismatch { column, .. } if column == "outcome"
        )));

        let columns = SchemaIntrospector::introspect_table(&pool, "votes").await.unwrap();
        let outcome = columns.iter().find(|c| c.name == "outcome").unwrap();
        assert_eq!(outcome.type_name, "INTEGER");
    }

    #[tokio::test]
    async fn test_missing_table_is_skipped() {
        let pool = setup_test_db().await;
        let report = SchemaSync::sync_table::<VotesV2>(&pool).await.unwrap();
        assert!(report.is_clean());
        assert!(!SchemaIntrospector::table_exists(&pool, "votes").await.unwrap());
    }
}
