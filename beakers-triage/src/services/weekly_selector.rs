//! Weekly issue selection
//!
//! Per (period, discipline):
//! - 1 indepth: route indepth with full text, by E then T
//! - up to `digest_max` digests: route digest with full text, by E then T
//! - up to `blurb_max` blurbs: route blurb with full text or abstract,
//!   full text first, then by S then T. Abstract-only blurbs are "Frontier".
//!
//! Remaining ties are broken by rank score, then URL, so a selection over
//! the same results is always the same. Planning is pure; writing happens
//! once per pair.

use crate::config::SelectionQuotas;
use crate::db::results::latest_results_for_period;
use crate::db::selections::{write_selection, SelectionWrite};
use crate::error::Result;
use crate::models::{
    now_timestamp, AccessState, IssueSelection, Route, ScoreVector, SelectionOutcome, Slot,
    SlotCounts, TriageResult,
};
use crate::routing;
use sqlx::SqlitePool;
use std::cmp::Ordering;
use tracing::{info, warn};

/// 0.55·E + 0.45·T − 0.60·H + 0.25·S + 0.15·M
pub fn rank_score(scores: &ScoreVector) -> f64 {
    let [s, e, t, m, h] = scores.as_array().map(f64::from);
    0.55 * e + 0.45 * t - 0.60 * h + 0.25 * s + 0.15 * m
}

/// Planned rows plus quota shortfall notes
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionPlan {
    pub rows: Vec<IssueSelection>,
    pub shortfalls: Vec<String>,
}

struct Candidate<'a> {
    result: &'a TriageResult,
    scores: ScoreVector,
    route: Route,
    rank: f64,
}

fn tie_break(a: &Candidate, b: &Candidate) -> Ordering {
    b.rank
        .partial_cmp(&a.rank)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.result.article_url.cmp(&b.result.article_url))
}

fn by_evidence_then_teachability(a: &Candidate, b: &Candidate) -> Ordering {
    b.scores
        .e
        .cmp(&a.scores.e)
        .then_with(|| b.scores.t.cmp(&a.scores.t))
        .then_with(|| tie_break(a, b))
}

fn blurb_order(a: &Candidate, b: &Candidate) -> Ordering {
    let fulltext_first = |c: &Candidate| if c.result.fulltext.access_state.has_fulltext() { 0 } else { 1 };
    fulltext_first(a)
        .cmp(&fulltext_first(b))
        .then_with(|| b.scores.s.cmp(&a.scores.s))
        .then_with(|| b.scores.t.cmp(&a.scores.t))
        .then_with(|| tie_break(a, b))
}

/// Plan a selection from already-filtered results
///
/// `results` should be the latest ok result per article for the pair.
/// Routes are recomputed from scores; a stored route that disagrees is
/// logged and ignored.
pub fn plan_selection(
    week_of: &str,
    discipline: &str,
    results: &[TriageResult],
    quotas: &SelectionQuotas,
) -> SelectionPlan {
    let mut candidates: Vec<Candidate> = results
        .iter()
        .filter(|r| r.is_ok())
        .filter_map(|r| {
            let scores = r.scores?;
            let route = routing::route(&scores).route;
            if r.route != Some(route) {
                warn!(
                    url = %r.article_url,
                    stored = ?r.route,
                    derived = %route,
                    "Stored route disagrees with scores; using derived route"
                );
            }
            Some(Candidate {
                result: r,
                scores,
                route,
                rank: rank_score(&scores),
            })
        })
        .collect();

    // one candidate per article
    candidates.sort_by(|a, b| a.result.article_url.cmp(&b.result.article_url));
    candidates.dedup_by(|a, b| a.result.article_url == b.result.article_url);

    let selected_at = now_timestamp();
    let mut rows = Vec::new();
    let mut take = |slot: Slot, mut pool: Vec<&Candidate>, order: fn(&Candidate, &Candidate) -> Ordering, limit: usize| {
        pool.sort_by(|a, b| order(a, b));
        for c in pool.into_iter().take(limit) {
            rows.push(IssueSelection {
                week_of: week_of.to_string(),
                discipline: discipline.to_string(),
                article_url: c.result.article_url.clone(),
                slot,
                rank_score: c.rank,
                access_state: c.result.fulltext.access_state,
                selected_at: selected_at.clone(),
            });
        }
    };

    let with_fulltext = |c: &&Candidate| c.result.fulltext.access_state == AccessState::OaPdfFound;

    take(
        Slot::Indepth,
        candidates
            .iter()
            .filter(|c| c.route == Route::Indepth)
            .filter(with_fulltext)
            .collect(),
        by_evidence_then_teachability,
        SelectionQuotas::INDEPTH_MAX,
    );
    take(
        Slot::Digest,
        candidates
            .iter()
            .filter(|c| c.route == Route::Digest)
            .filter(with_fulltext)
            .collect(),
        by_evidence_then_teachability,
        quotas.digest_max,
    );
    take(
        Slot::Blurb,
        candidates
            .iter()
            .filter(|c| c.route == Route::Blurb)
            .filter(|c| {
                matches!(
                    c.result.fulltext.access_state,
                    AccessState::OaPdfFound | AccessState::AbstractOnly
                )
            })
            .collect(),
        blurb_order,
        quotas.blurb_max,
    );

    let counts = SlotCounts::from_selections(&rows);
    let mut shortfalls = Vec::new();
    if counts.digest < quotas.digest_min {
        shortfalls.push(format!(
            "digest: {} selected, minimum {}",
            counts.digest, quotas.digest_min
        ));
    }
    if counts.blurb < quotas.blurb_min {
        shortfalls.push(format!(
            "blurb: {} selected, minimum {}",
            counts.blurb, quotas.blurb_min
        ));
    }

    SelectionPlan { rows, shortfalls }
}

/// Select and persist the issue for one (period, discipline)
///
/// Re-running for a pair that already has rows writes nothing and returns
/// [`SelectionOutcome::AlreadySelected`].
pub async fn select_weekly_issue(
    pool: &SqlitePool,
    week_of: &str,
    discipline: &str,
    quotas: &SelectionQuotas,
    dry_run: bool,
) -> Result<SelectionOutcome> {
    let existing = crate::db::selections::selection_exists(pool, week_of, discipline).await?;
    if existing > 0 {
        info!(week_of, discipline, existing, "Selection already exists; skipping");
        return Ok(SelectionOutcome::AlreadySelected {
            existing: existing as usize,
        });
    }

    let results = latest_results_for_period(pool, week_of, discipline).await?;
    let plan = plan_selection(week_of, discipline, &results, quotas);

    for shortfall in &plan.shortfalls {
        warn!(week_of, discipline, "Quota shortfall: {}", shortfall);
    }

    let counts = SlotCounts::from_selections(&plan.rows);
    if dry_run {
        info!(
            week_of,
            discipline,
            candidates = results.len(),
            indepth = counts.indepth,
            digest = counts.digest,
            blurb = counts.blurb,
            "[dry-run] Selection planned"
        );
        return Ok(SelectionOutcome::Planned {
            rows: plan.rows,
            shortfalls: plan.shortfalls,
        });
    }

    match write_selection(pool, week_of, discipline, &plan.rows, quotas).await? {
        SelectionWrite::AlreadyPresent(existing) => {
            info!(week_of, discipline, existing, "Selection written concurrently; skipping");
            Ok(SelectionOutcome::AlreadySelected { existing })
        }
        SelectionWrite::Written(written) => {
            info!(
                week_of,
                discipline,
                written,
                indepth = counts.indepth,
                digest = counts.digest,
                blurb = counts.blurb,
                "Selection written"
            );
            Ok(SelectionOutcome::Selected {
                rows: plan.rows,
                shortfalls: plan.shortfalls,
            })
        }
    }
}
