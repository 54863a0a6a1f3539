//! Batch triage runner
//!
//! Creates a run, scores candidates through the committee with bounded
//! concurrency, and upserts one result per article. A failure on one
//! article (model or storage) never stops the batch; results already
//! committed stay valid if the process is interrupted.

use crate::db::results::{latest_fulltext, upsert_result};
use crate::db::runs::create_run;
use crate::error::Result;
use crate::models::{
    now_timestamp, ArticleCandidate, FullTextStatus, ResultStatus, Route, TriageResult, TriageRun,
};
use crate::services::scoring_committee::{CommitteeOutcome, ScoringCommittee};
use crate::utils::text::preview;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::HashSet;
use tracing::{error, info};

/// Per-route counts for one batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    /// `None` for dry runs
    pub run_id: Option<String>,
    pub total: usize,
    pub indepth: usize,
    pub digest: usize,
    pub blurb: usize,
    pub reject: usize,
    pub frontier: usize,
    /// Scored with builder E/H because the skeptic failed
    pub degraded: usize,
    /// status=error results plus articles whose result could not be stored
    pub errors: usize,
    pub duplicates_skipped: usize,
}

impl BatchSummary {
    fn count_route(&mut self, route: Route) {
        match route {
            Route::Indepth => self.indepth += 1,
            Route::Digest => self.digest += 1,
            Route::Blurb => self.blurb += 1,
            Route::Reject => self.reject += 1,
        }
    }
}

#[derive(Debug)]
struct ArticleOutcome {
    route: Option<Route>,
    frontier: bool,
    degraded: bool,
}

/// Runs the committee over a batch of candidates
pub struct TriageRunner {
    committee: ScoringCommittee,
    pool: SqlitePool,
    concurrency: usize,
    run_config_json: Option<String>,
}

impl TriageRunner {
    pub fn new(committee: ScoringCommittee, pool: SqlitePool, concurrency: usize) -> Self {
        Self {
            committee,
            pool,
            concurrency: concurrency.max(1),
            run_config_json: None,
        }
    }

    /// Serialized configuration stored on each run
    pub fn with_run_config(mut self, config_json: String) -> Self {
        self.run_config_json = Some(config_json);
        self
    }

    /// Triage `candidates` for period `week_of`
    ///
    /// Duplicate URLs are scored once. With `dry_run`, no run is created and
    /// no inference calls are made.
    pub async fn run(
        &self,
        week_of: &str,
        candidates: Vec<ArticleCandidate>,
        dry_run: bool,
    ) -> Result<BatchSummary> {
        let mut summary = BatchSummary::default();
        let mut seen = HashSet::new();
        let candidates: Vec<ArticleCandidate> = candidates
            .into_iter()
            .filter(|c| {
                let fresh = seen.insert(c.url.clone());
                if !fresh {
                    summary.duplicates_skipped += 1;
                }
                fresh
            })
            .collect();
        summary.total = candidates.len();

        if dry_run {
            for candidate in &candidates {
                info!(
                    url = %candidate.url,
                    headline = %preview(&candidate.headline, 60),
                    "[dry-run] would triage"
                );
            }
            return Ok(summary);
        }

        let mut run = TriageRun::new(
            week_of,
            self.committee.builder_model(),
            self.committee.skeptic_model(),
        );
        if let Some(json) = &self.run_config_json {
            run = run.with_config_json(json.clone());
        }
        create_run(&self.pool, &run).await?;

        info!(
            run_id = %run.run_id,
            week_of,
            articles = summary.total,
            concurrency = self.concurrency,
            "Triage run started"
        );

        let run_id = run.run_id.as_str();
        let mut outcomes = stream::iter(candidates)
            .map(|candidate| async move {
                let url = candidate.url.clone();
                (url, self.process(run_id, candidate).await)
            })
            .buffer_unordered(self.concurrency);

        while let Some((url, outcome)) = outcomes.next().await {
            match outcome {
                Ok(article) => {
                    match article.route {
                        Some(route) => summary.count_route(route),
                        None => summary.errors += 1,
                    }
                    if article.frontier {
                        summary.frontier += 1;
                    }
                    if article.degraded {
                        summary.degraded += 1;
                    }
                }
                Err(e) => {
                    error!(run_id, url = %url, error = %e, "Failed to store triage result");
                    summary.errors += 1;
                }
            }
        }

        summary.run_id = Some(run.run_id.clone());
        info!(
            run_id = %run.run_id,
            indepth = summary.indepth,
            digest = summary.digest,
            blurb = summary.blurb,
            reject = summary.reject,
            frontier = summary.frontier,
            degraded = summary.degraded,
            errors = summary.errors,
            "Triage run complete"
        );
        Ok(summary)
    }

    async fn process(&self, run_id: &str, candidate: ArticleCandidate) -> Result<ArticleOutcome> {
        let fulltext = match latest_fulltext(&self.pool, &candidate.url).await? {
            Some(status) => status,
            None => FullTextStatus::from_access_state(candidate.access_state),
        };

        let outcome = self.committee.score(run_id, &candidate).await?;

        let now = now_timestamp();
        let (result, article) = match outcome {
            CommitteeOutcome::Scored(verdict) => {
                let article = ArticleOutcome {
                    route: Some(verdict.decision.route),
                    frontier: verdict.decision.frontier,
                    degraded: verdict.degraded,
                };
                let result = TriageResult {
                    run_id: run_id.to_string(),
                    article_url: candidate.url.clone(),
                    discipline: candidate.discipline.clone(),
                    headline: candidate.headline.clone(),
                    scores: Some(verdict.scores),
                    route: Some(verdict.decision.route),
                    frontier: verdict.decision.frontier,
                    tldr: Some(verdict.tldr),
                    pivot_figure_prompt: Some(verdict.pivot_figure),
                    course_hooks: verdict.course_hooks,
                    skeptic_adjustments: verdict.skeptic_adjustments,
                    confidence: Some(verdict.confidence),
                    fulltext,
                    status: ResultStatus::Ok,
                    error_msg: None,
                    created_at: now.clone(),
                    updated_at: now,
                };
                (result, article)
            }
            CommitteeOutcome::Failed { reason } => {
                error!(run_id, url = %candidate.url, %reason, "Article triage failed");
                let mut result = TriageResult::failed(
                    run_id,
                    &candidate.url,
                    &candidate.discipline,
                    &candidate.headline,
                    reason,
                );
                result.fulltext = fulltext;
                let article = ArticleOutcome {
                    route: None,
                    frontier: false,
                    degraded: false,
                };
                (result, article)
            }
        };

        upsert_result(&self.pool, &result).await?;
        Ok(article)
    }
}
