//! beakers-triage library interface
//!
//! Scores candidate articles with a builder/skeptic model committee, routes
//! them into editorial tiers, upgrades evidence scores from full text, and
//! selects each week's issue per discipline.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod routing;
pub mod services;
pub mod utils;

pub use crate::error::{Result, TriageError};
