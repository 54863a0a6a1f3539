//! Utility modules for beakers-triage

pub mod db_retry;
pub mod section_extractor;
pub mod text;

pub use db_retry::{max_lock_wait_ms, retry_on_lock};
pub use section_extractor::{extract_sections, ExtractedSections};
pub use text::truncate_to_char_boundary;
