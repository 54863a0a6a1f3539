//! Service modules for article triage
//!
//! Inference plumbing (endpoint, cache, caller, prompts, parsing) feeds the
//! scoring committee; the runner, upgrader and selector are the batch
//! entry points used by the CLI.

pub mod evidence_upgrader;
pub mod fulltext;
pub mod inference;
pub mod model_caller;
pub mod ollama_client;
pub mod prompts;
pub mod response_cache;
pub mod response_parser;
pub mod scoring_committee;
pub mod triage_runner;
pub mod weekly_selector;

pub use evidence_upgrader::{EvidenceUpgrader, Ineligibility, UpgradeOutcome, UpgradeSummary};
pub use fulltext::{FileFullTextSource, FullTextSource};
pub use inference::{GenerationRequest, InferenceEndpoint, InferenceError};
pub use model_caller::{CachePolicy, CallAttempt, ModelCaller};
pub use ollama_client::OllamaClient;
pub use response_cache::{prompt_hash, CacheKey, CachedResponse, ResponseCache};
pub use response_parser::{BuilderVote, EvidenceVote, ParseError, SkepticVote};
pub use scoring_committee::{CommitteeOutcome, CommitteeVerdict, ScoringCommittee};
pub use triage_runner::{BatchSummary, TriageRunner};
pub use weekly_selector::{plan_selection, rank_score, select_weekly_issue, SelectionPlan};
