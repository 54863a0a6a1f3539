//! Data models for beakers-triage

pub mod article;
pub mod scores;
pub mod selection;
pub mod triage;

pub use article::{AccessState, ArticleCandidate};
pub use scores::{Route, Score, ScoreError, ScoreVector};
pub use selection::{IssueSelection, SelectionOutcome, Slot, SlotCounts};
pub use triage::{
    now_timestamp, EvidenceChange, FullTextStatus, ModelVote, ResultStatus, Role, TriageResult,
    TriageRun, VoteOutcome,
};
