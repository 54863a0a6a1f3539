//! Two-pass scoring committee
//!
//! The builder proposes a full score vector plus narrative fields; the
//! skeptic re-scores adversarially. S, T, M and the narrative come from the
//! builder, E and H from the skeptic. Every call, cached or not, is
//! appended to the vote log.
//!
//! Builder failures fail the article after one retry. Skeptic failures
//! degrade to the builder's own E and H.

use crate::error::Result;
use crate::models::{ArticleCandidate, ModelVote, Role, ScoreVector, VoteOutcome};
use crate::routing::{self, RouteDecision};
use crate::services::model_caller::{CachePolicy, CallAttempt, ModelCaller};
use crate::services::prompts;
use crate::services::response_parser::{
    parse_builder, parse_skeptic, BuilderVote, ParseError, SkepticVote, DEFAULT_CONFIDENCE,
};
use crate::db::votes::append_vote;
use serde_json::Value;
use sqlx::SqlitePool;
use tracing::{debug, warn};

pub const MISSING_HEADLINE: &str = "missing headline";
pub const UNPARSABLE_BUILDER_OUTPUT: &str = "unparsable builder output";

/// Merged committee output for one article
#[derive(Debug, Clone, PartialEq)]
pub struct CommitteeVerdict {
    pub scores: ScoreVector,
    pub decision: RouteDecision,
    pub tldr: String,
    pub pivot_figure: String,
    pub course_hooks: Vec<String>,
    pub skeptic_adjustments: Option<Value>,
    pub confidence: f64,
    /// Skeptic failed; E and H are the builder's
    pub degraded: bool,
}

/// What the committee decided for one article
#[derive(Debug, Clone, PartialEq)]
pub enum CommitteeOutcome {
    Scored(CommitteeVerdict),
    Failed { reason: String },
}

/// Merge builder and skeptic votes
///
/// S, T, M, TLDR, pivot figure and course hooks come from the builder.
/// E, H, adjustments and confidence come from the skeptic when present.
pub fn merge_votes(builder: &BuilderVote, skeptic: Option<&SkepticVote>) -> CommitteeVerdict {
    let scores = match skeptic {
        Some(s) => builder.scores.with_evidence(s.scores.e, s.scores.h),
        None => builder.scores,
    };

    CommitteeVerdict {
        scores,
        decision: routing::route(&scores),
        tldr: builder.tldr.clone(),
        pivot_figure: builder.pivot_figure.clone(),
        course_hooks: builder.course_hooks.clone(),
        skeptic_adjustments: skeptic
            .filter(|s| !s.adjustments.is_empty())
            .map(|s| Value::Object(s.adjustments.clone())),
        confidence: skeptic.map(|s| s.confidence).unwrap_or(DEFAULT_CONFIDENCE),
        degraded: skeptic.is_none(),
    }
}

enum Attempt<T> {
    Parsed(T),
    Unparsable(ParseError),
    CallFailed(String),
}

/// Builder + skeptic over one inference endpoint
#[derive(Clone)]
pub struct ScoringCommittee {
    caller: ModelCaller,
    pool: SqlitePool,
    builder_model: String,
    skeptic_model: String,
}

impl ScoringCommittee {
    pub fn new(caller: ModelCaller, pool: SqlitePool) -> Self {
        let builder_model = caller.config().builder_model.clone();
        let skeptic_model = caller.config().skeptic_model.clone();
        Self {
            caller,
            pool,
            builder_model,
            skeptic_model,
        }
    }

    pub fn builder_model(&self) -> &str {
        &self.builder_model
    }

    pub fn skeptic_model(&self) -> &str {
        &self.skeptic_model
    }

    /// Score one article within `run_id`
    ///
    /// Returns `Err` only for storage failures; model failures are reported
    /// as [`CommitteeOutcome::Failed`].
    pub async fn score(&self, run_id: &str, article: &ArticleCandidate) -> Result<CommitteeOutcome> {
        if !article.has_headline() {
            return Ok(CommitteeOutcome::Failed {
                reason: MISSING_HEADLINE.to_string(),
            });
        }

        let builder = match self.run_builder(run_id, article).await? {
            Ok(vote) => vote,
            Err(reason) => return Ok(CommitteeOutcome::Failed { reason }),
        };

        let skeptic = self.run_skeptic(run_id, article, &builder.scores).await?;
        if skeptic.is_none() {
            warn!(
                run_id,
                url = %article.url,
                "Skeptic unavailable, using builder E/H (degraded)"
            );
        }

        let verdict = merge_votes(&builder, skeptic.as_ref());
        debug!(
            run_id,
            url = %article.url,
            scores = %verdict.scores,
            route = %verdict.decision.route,
            "Committee verdict"
        );
        Ok(CommitteeOutcome::Scored(verdict))
    }

    /// Builder with one retry that bypasses the cache
    async fn run_builder(
        &self,
        run_id: &str,
        article: &ArticleCandidate,
    ) -> Result<std::result::Result<BuilderVote, String>> {
        let prompt = prompts::builder_prompt(article);
        let mut last_failure = String::new();

        for policy in [CachePolicy::UseCache, CachePolicy::Refresh] {
            let attempt = self
                .caller
                .call(&self.builder_model, Role::Builder, &prompt, policy)
                .await;

            match self
                .record(run_id, &article.url, Role::Builder, &self.builder_model, attempt, parse_builder)
                .await?
            {
                Attempt::Parsed(vote) => return Ok(Ok(vote)),
                Attempt::Unparsable(err) => {
                    warn!(run_id, url = %article.url, error = %err, "Unparsable builder output");
                    last_failure = UNPARSABLE_BUILDER_OUTPUT.to_string();
                }
                Attempt::CallFailed(err) => {
                    warn!(run_id, url = %article.url, error = %err, "Builder call failed");
                    last_failure = format!("builder call failed: {}", err);
                }
            }
        }

        Ok(Err(last_failure))
    }

    /// Single skeptic attempt; `None` means fall back to the builder
    async fn run_skeptic(
        &self,
        run_id: &str,
        article: &ArticleCandidate,
        builder_scores: &ScoreVector,
    ) -> Result<Option<SkepticVote>> {
        let prompt = prompts::skeptic_prompt(article, builder_scores);
        let attempt = self
            .caller
            .call(&self.skeptic_model, Role::Skeptic, &prompt, CachePolicy::UseCache)
            .await;

        let parsed = self
            .record(run_id, &article.url, Role::Skeptic, &self.skeptic_model, attempt, |raw| {
                parse_skeptic(raw, builder_scores)
            })
            .await?;

        Ok(match parsed {
            Attempt::Parsed(vote) => Some(vote),
            Attempt::Unparsable(err) => {
                warn!(run_id, url = %article.url, error = %err, "Unparsable skeptic output");
                None
            }
            Attempt::CallFailed(err) => {
                warn!(run_id, url = %article.url, error = %err, "Skeptic call failed");
                None
            }
        })
    }

    /// Parse a call attempt and append its vote
    async fn record<T, F>(
        &self,
        run_id: &str,
        article_url: &str,
        role: Role,
        model: &str,
        attempt: CallAttempt,
        parse: F,
    ) -> Result<Attempt<T>>
    where
        F: FnOnce(&str) -> std::result::Result<T, ParseError>,
        T: HasJson,
    {
        let CallAttempt {
            prompt_hash,
            cache_hit,
            response,
        } = attempt;

        let mut vote = ModelVote::new(run_id, article_url, role, model, &prompt_hash, VoteOutcome::Ok);
        vote.cache_hit = cache_hit;

        let outcome = match response {
            Ok(raw) => {
                let parsed = parse(&raw);
                vote.raw_output = Some(raw);
                match parsed {
                    Ok(value) => {
                        vote.json_output = Some(value.json().clone());
                        Attempt::Parsed(value)
                    }
                    Err(err) => {
                        vote.outcome = VoteOutcome::Unparsable;
                        vote.error_msg = Some(err.to_string());
                        Attempt::Unparsable(err)
                    }
                }
            }
            Err(err) => {
                vote.outcome = VoteOutcome::CallFailed;
                vote.error_msg = Some(err.to_string());
                Attempt::CallFailed(err.to_string())
            }
        };

        append_vote(&self.pool, &vote).await?;
        Ok(outcome)
    }
}

/// Parsed votes expose the JSON object they were read from
pub trait HasJson {
    fn json(&self) -> &Value;
}

impl HasJson for BuilderVote {
    fn json(&self) -> &Value {
        &self.json
    }
}

impl HasJson for SkepticVote {
    fn json(&self) -> &Value {
        &self.json
    }
}
