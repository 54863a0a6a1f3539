//! Database access layer for beakers-triage
//!
//! Table creation and migration live in `beakers_common::db`; this module
//! owns the row-level operations.

pub mod results;
pub mod runs;
pub mod selections;
pub mod votes;

use beakers_common::Result;
use sqlx::SqlitePool;
use std::path::Path;

/// Open (creating and migrating as needed) the triage database
pub async fn open_database(path: &Path) -> Result<SqlitePool> {
    beakers_common::db::init_database(path).await
}

/// Private in-memory database with the full schema
pub async fn open_memory_database() -> Result<SqlitePool> {
    beakers_common::db::init_memory_database().await
}

pub(crate) fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

pub(crate) fn parse_column<T: std::str::FromStr<Err = String>>(
    column: &str,
    value: &str,
) -> Result<T> {
    value
        .parse::<T>()
        .map_err(|e| beakers_common::Error::StoredData(format!("Invalid {} in database: {}", column, e)))
}
