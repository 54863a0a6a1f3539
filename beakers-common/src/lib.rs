//! # Beakers Common Library
//!
//! Shared code for the Beakers triage tooling:
//! - Error types
//! - Bootstrap configuration (TOML + environment)
//! - Database initialization, schema sync and migrations

pub mod config;
pub mod db;
pub mod error;

pub use error::{Error, Result};
