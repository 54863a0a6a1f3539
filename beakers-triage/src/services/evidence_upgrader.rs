//! Evidence upgrade pass
//!
//! Once full text is available for a low-evidence article, the skeptic
//! model re-scores E and H from the methods section and figure captions.
//! S, T and M are kept; the route is recomputed. The existing result is
//! updated in place and the change is recorded on the audit vote.

use crate::db::results::{update_evidence_scores, upgrade_candidates};
use crate::db::votes::append_vote;
use crate::error::Result;
use crate::models::{
    AccessState, EvidenceChange, ModelVote, ResultStatus, Role, Score, TriageResult, VoteOutcome,
};
use crate::routing::{self, RouteDecision};
use crate::services::fulltext::FullTextSource;
use crate::services::model_caller::{CachePolicy, ModelCaller};
use crate::services::prompts;
use crate::services::response_parser::parse_evidence;
use crate::utils::extract_sections;
use serde::Serialize;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{info, warn};

/// Evidence re-scoring reads long sections; use at least this context
pub const UPGRADE_CONTEXT_TOKENS: u32 = 16384;

/// Evidence at or below this is eligible for upgrade
pub const LOW_EVIDENCE_MAX: u8 = 2;

/// Why a result was not upgraded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ineligibility {
    /// Result is an error row
    NotOk,
    /// No scores stored
    Unscored,
    /// Full text was not located
    NoFullTextAccess(AccessState),
    /// E is already above the low-evidence threshold
    EvidenceAlreadyStrong(Score),
    /// Full text could not be read
    MissingEvidenceSource,
}

/// Outcome for one result
#[derive(Debug, Clone, PartialEq)]
pub enum UpgradeOutcome {
    Upgraded {
        change: EvidenceChange,
        previous: RouteDecision,
        decision: RouteDecision,
    },
    NotEligible(Ineligibility),
    Failed {
        reason: String,
    },
}

/// Counts for one upgrade batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpgradeSummary {
    pub examined: usize,
    pub upgraded: usize,
    pub route_changed: usize,
    pub not_eligible: usize,
    pub failed: usize,
    /// Dry run only: eligible rows that would be re-scored
    pub would_upgrade: usize,
}

/// Check the preconditions that need no I/O
pub fn check_eligibility(result: &TriageResult) -> std::result::Result<(), Ineligibility> {
    if result.status != ResultStatus::Ok {
        return Err(Ineligibility::NotOk);
    }
    let Some(scores) = result.scores else {
        return Err(Ineligibility::Unscored);
    };
    if result.fulltext.access_state != AccessState::OaPdfFound {
        return Err(Ineligibility::NoFullTextAccess(result.fulltext.access_state));
    }
    if scores.e.value() > LOW_EVIDENCE_MAX {
        return Err(Ineligibility::EvidenceAlreadyStrong(scores.e));
    }
    Ok(())
}

/// Re-scores E/H from full text
pub struct EvidenceUpgrader {
    caller: ModelCaller,
    pool: SqlitePool,
    source: Arc<dyn FullTextSource>,
    model: String,
}

impl EvidenceUpgrader {
    pub fn new(caller: ModelCaller, pool: SqlitePool, source: Arc<dyn FullTextSource>) -> Self {
        let model = caller.config().skeptic_model.clone();
        Self {
            caller,
            pool,
            source,
            model,
        }
    }

    /// Upgrade one result
    ///
    /// Returns `Err` only for storage failures.
    pub async fn upgrade(&self, result: &TriageResult) -> Result<UpgradeOutcome> {
        if let Err(reason) = check_eligibility(result) {
            return Ok(UpgradeOutcome::NotEligible(reason));
        }
        let Some(scores) = result.scores else {
            return Ok(UpgradeOutcome::NotEligible(Ineligibility::Unscored));
        };

        let Some(text) = self.source.load(result).await? else {
            return Ok(UpgradeOutcome::NotEligible(Ineligibility::MissingEvidenceSource));
        };

        let sections = extract_sections(&text);
        let prompt = prompts::evidence_prompt(&sections);
        let context_tokens = self.caller.config().context_tokens.max(UPGRADE_CONTEXT_TOKENS);
        let attempt = self
            .caller
            .call_with_context(
                &self.model,
                Role::EvidenceUpgrade,
                &prompt,
                context_tokens,
                CachePolicy::UseCache,
            )
            .await;

        let mut vote = ModelVote::new(
            &result.run_id,
            &result.article_url,
            Role::EvidenceUpgrade,
            &self.model,
            &attempt.prompt_hash,
            VoteOutcome::Ok,
        );
        vote.cache_hit = attempt.cache_hit;

        let raw = match attempt.response {
            Ok(raw) => raw,
            Err(err) => {
                vote.outcome = VoteOutcome::CallFailed;
                vote.error_msg = Some(err.to_string());
                append_vote(&self.pool, &vote).await?;
                warn!(url = %result.article_url, error = %err, "Evidence upgrade call failed");
                return Ok(UpgradeOutcome::Failed {
                    reason: format!("evidence upgrade call failed: {}", err),
                });
            }
        };

        let parsed = parse_evidence(&raw);
        vote.raw_output = Some(raw);
        let evidence = match parsed {
            Ok(evidence) => evidence,
            Err(err) => {
                vote.outcome = VoteOutcome::Unparsable;
                vote.error_msg = Some(err.to_string());
                append_vote(&self.pool, &vote).await?;
                warn!(url = %result.article_url, error = %err, "Unparsable evidence upgrade output");
                return Ok(UpgradeOutcome::Failed {
                    reason: "unparsable evidence upgrade output".to_string(),
                });
            }
        };
        vote.json_output = Some(evidence.json.clone());

        let previous = routing::route(&scores);
        let decision = routing::route(&scores.with_evidence(evidence.e, evidence.h));
        let change = EvidenceChange {
            e_before: scores.e,
            h_before: scores.h,
            e_after: evidence.e,
            h_after: evidence.h,
        };

        let updated = update_evidence_scores(
            &self.pool,
            &result.run_id,
            &result.article_url,
            evidence.e,
            evidence.h,
            decision,
        )
        .await?;

        if !updated {
            vote.error_msg = Some("result changed before the upgrade was applied".to_string());
            append_vote(&self.pool, &vote).await?;
            return Ok(UpgradeOutcome::Failed {
                reason: "result changed before the upgrade was applied".to_string(),
            });
        }

        vote.evidence_change = Some(change);
        append_vote(&self.pool, &vote).await?;

        info!(
            url = %result.article_url,
            e_before = change.e_before.value(),
            e_after = change.e_after.value(),
            h_before = change.h_before.value(),
            h_after = change.h_after.value(),
            route = %decision.route,
            frontier = decision.frontier,
            "Evidence upgraded"
        );

        Ok(UpgradeOutcome::Upgraded {
            change,
            previous,
            decision,
        })
    }

    /// Upgrade up to `limit` candidates
    ///
    /// With `dry_run`, eligibility and full-text availability are checked
    /// but no inference calls or writes are made.
    pub async fn upgrade_batch(&self, limit: usize, dry_run: bool) -> Result<UpgradeSummary> {
        let candidates = upgrade_candidates(&self.pool, limit).await?;
        info!(count = candidates.len(), dry_run, "Evidence upgrade candidates");

        let mut summary = UpgradeSummary::default();
        for result in &candidates {
            summary.examined += 1;

            if dry_run {
                let available = check_eligibility(result).is_ok()
                    && self.source.load(result).await?.is_some();
                if available {
                    info!(url = %result.article_url, "[dry-run] would upgrade");
                    summary.would_upgrade += 1;
                } else {
                    summary.not_eligible += 1;
                }
                continue;
            }

            match self.upgrade(result).await? {
                UpgradeOutcome::Upgraded {
                    previous, decision, ..
                } => {
                    summary.upgraded += 1;
                    if previous != decision {
                        summary.route_changed += 1;
                    }
                }
                UpgradeOutcome::NotEligible(reason) => {
                    info!(url = %result.article_url, ?reason, "Not eligible for evidence upgrade");
                    summary.not_eligible += 1;
                }
                UpgradeOutcome::Failed { .. } => summary.failed += 1,
            }
        }

        info!(
            upgraded = summary.upgraded,
            route_changed = summary.route_changed,
            not_eligible = summary.not_eligible,
            failed = summary.failed,
            "Evidence upgrade complete"
        );
        Ok(summary)
    }
}
