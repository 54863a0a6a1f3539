//! Triage runs, audit votes and merged results

use crate::models::article::AccessState;
use crate::models::scores::{Route, Score, ScoreVector};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Current time as stored in TEXT timestamp columns
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// One batch execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriageRun {
    /// `triage_{week}_{8 hex}`
    pub run_id: String,
    /// Period key, `YYYY-MM-DD`
    pub week_of: String,
    pub model_builder: String,
    pub model_skeptic: String,
    pub config_json: Option<String>,
    pub created_at: String,
}

impl TriageRun {
    pub fn new(week_of: &str, model_builder: &str, model_skeptic: &str) -> Self {
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        Self {
            run_id: format!("triage_{}_{}", week_of, &suffix[..8]),
            week_of: week_of.to_string(),
            model_builder: model_builder.to_string(),
            model_skeptic: model_skeptic.to_string(),
            config_json: None,
            created_at: now_timestamp(),
        }
    }

    pub fn with_config_json(mut self, config_json: String) -> Self {
        self.config_json = Some(config_json);
        self
    }
}

/// Which judgment pass produced a vote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Builder,
    Skeptic,
    EvidenceUpgrade,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Builder => "builder",
            Role::Skeptic => "skeptic",
            Role::EvidenceUpgrade => "evidence_upgrade",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "builder" => Ok(Role::Builder),
            "skeptic" => Ok(Role::Skeptic),
            "evidence_upgrade" => Ok(Role::EvidenceUpgrade),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

/// How a single inference call ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteOutcome {
    /// Response received and parsed
    Ok,
    /// Response received but did not satisfy the output contract
    Unparsable,
    /// No response (network, timeout, endpoint error)
    CallFailed,
}

impl VoteOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoteOutcome::Ok => "ok",
            VoteOutcome::Unparsable => "unparsable",
            VoteOutcome::CallFailed => "call_failed",
        }
    }
}

impl FromStr for VoteOutcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ok" => Ok(VoteOutcome::Ok),
            "unparsable" => Ok(VoteOutcome::Unparsable),
            "call_failed" => Ok(VoteOutcome::CallFailed),
            other => Err(format!("unknown vote outcome '{}'", other)),
        }
    }
}

/// E/H before and after an evidence upgrade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceChange {
    pub e_before: Score,
    pub h_before: Score,
    pub e_after: Score,
    pub h_after: Score,
}

/// Immutable audit record of one inference call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelVote {
    pub run_id: String,
    pub article_url: String,
    pub role: Role,
    pub model_name: String,
    pub prompt_hash: String,
    pub cache_hit: bool,
    pub outcome: VoteOutcome,
    pub raw_output: Option<String>,
    pub json_output: Option<serde_json::Value>,
    pub error_msg: Option<String>,
    pub evidence_change: Option<EvidenceChange>,
    pub created_at: String,
}

impl ModelVote {
    pub fn new(
        run_id: &str,
        article_url: &str,
        role: Role,
        model_name: &str,
        prompt_hash: &str,
        outcome: VoteOutcome,
    ) -> Self {
        Self {
            run_id: run_id.to_string(),
            article_url: article_url.to_string(),
            role,
            model_name: model_name.to_string(),
            prompt_hash: prompt_hash.to_string(),
            cache_hit: false,
            outcome,
            raw_output: None,
            json_output: None,
            error_msg: None,
            evidence_change: None,
            created_at: now_timestamp(),
        }
    }
}

/// Processing status of a triage result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    Ok,
    Error,
}

impl ResultStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultStatus::Ok => "ok",
            ResultStatus::Error => "error",
        }
    }
}

impl FromStr for ResultStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ok" => Ok(ResultStatus::Ok),
            "error" => Ok(ResultStatus::Error),
            other => Err(format!("unknown result status '{}'", other)),
        }
    }
}

/// Full-text acquisition state carried on a result
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FullTextStatus {
    pub path: Option<String>,
    pub ok: bool,
    pub source: Option<String>,
    pub fetched_at: Option<String>,
    pub access_state: AccessState,
}

impl FullTextStatus {
    pub fn from_access_state(access_state: AccessState) -> Self {
        Self {
            access_state,
            ..Default::default()
        }
    }
}

/// Merged outcome for one (run, article)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriageResult {
    pub run_id: String,
    pub article_url: String,
    pub discipline: String,
    pub headline: String,
    /// Absent when scoring failed
    pub scores: Option<ScoreVector>,
    pub route: Option<Route>,
    pub frontier: bool,
    pub tldr: Option<String>,
    pub pivot_figure_prompt: Option<String>,
    pub course_hooks: Vec<String>,
    pub skeptic_adjustments: Option<serde_json::Value>,
    pub confidence: Option<f64>,
    pub fulltext: FullTextStatus,
    pub status: ResultStatus,
    pub error_msg: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl TriageResult {
    /// Failed result: no scores, no route
    pub fn failed(
        run_id: &str,
        article_url: &str,
        discipline: &str,
        headline: &str,
        reason: impl Into<String>,
    ) -> Self {
        let now = now_timestamp();
        Self {
            run_id: run_id.to_string(),
            article_url: article_url.to_string(),
            discipline: discipline.to_string(),
            headline: headline.to_string(),
            scores: None,
            route: None,
            frontier: false,
            tldr: None,
            pivot_figure_prompt: None,
            course_hooks: Vec::new(),
            skeptic_adjustments: None,
            confidence: None,
            fulltext: FullTextStatus::default(),
            status: ResultStatus::Error,
            error_msg: Some(reason.into()),
            created_at: now.clone(),
            updated_at: now,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == ResultStatus::Ok
    }
}
