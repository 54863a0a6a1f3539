//! Weekly selection against a seeded database
//!
//! Write-once idempotence per (period, discipline), quota caps, and
//! full-text gating of the indepth and digest slots.

mod helpers;

use beakers_triage::config::SelectionQuotas;
use beakers_triage::db::results::upsert_result;
use beakers_triage::db::selections::{load_selection, selection_exists};
use beakers_triage::models::{AccessState, SelectionOutcome, Slot, SlotCounts};
use beakers_triage::services::select_weekly_issue;
use helpers::*;
use sqlx::SqlitePool;

const WEEK: &str = "2026-01-16";

async fn seed_many(pool: &SqlitePool, run_id: &str, prefix: &str, count: usize, scores: [i64; 5], access_state: AccessState) {
    for i in 0..count {
        let url = format!("https://example.org/{}/{:02}", prefix, i);
        let result = scored_result(run_id, &url, "chemistry", scores, access_state);
        upsert_result(pool, &result).await.unwrap();
    }
}

#[tokio::test]
async fn test_selection_is_written_once() {
    let pool = memory_pool().await;
    let run_id = seed_run(&pool, WEEK).await;
    seed_many(&pool, &run_id, "indepth", 1, [5, 5, 5, 5, 0], AccessState::OaPdfFound).await;
    seed_many(&pool, &run_id, "digest", 3, [3, 3, 3, 3, 1], AccessState::OaPdfFound).await;
    seed_many(&pool, &run_id, "blurb", 4, [3, 1, 3, 1, 1], AccessState::AbstractOnly).await;

    let quotas = SelectionQuotas::default();
    let first = select_weekly_issue(&pool, WEEK, "chemistry", &quotas, false).await.unwrap();
    let SelectionOutcome::Selected { rows, shortfalls } = &first else {
        panic!("expected a fresh selection, got {:?}", first);
    };
    assert_eq!(rows.len(), 8);
    assert_eq!(shortfalls.len(), 1, "blurbs fall short of the minimum");

    let stored_before = load_selection(&pool, WEEK, Some("chemistry"), None).await.unwrap();

    // more results arriving later must not change an existing selection
    seed_many(&pool, &run_id, "late", 2, [5, 5, 5, 5, 0], AccessState::OaPdfFound).await;
    let second = select_weekly_issue(&pool, WEEK, "chemistry", &quotas, false).await.unwrap();
    assert_eq!(second, SelectionOutcome::AlreadySelected { existing: 8 });

    let stored_after = load_selection(&pool, WEEK, Some("chemistry"), None).await.unwrap();
    assert_eq!(stored_before, stored_after);

    let counts = SlotCounts::from_selections(&stored_after);
    assert_eq!((counts.indepth, counts.digest, counts.blurb), (1, 3, 4));
    assert_eq!(stored_after[0].slot, Slot::Indepth);
    assert!(stored_after
        .iter()
        .filter(|r| r.slot == Slot::Blurb)
        .all(|r| r.is_frontier()));
}

#[tokio::test]
async fn test_quota_caps() {
    let pool = memory_pool().await;
    let run_id = seed_run(&pool, WEEK).await;
    seed_many(&pool, &run_id, "indepth", 3, [5, 5, 5, 5, 0], AccessState::OaPdfFound).await;
    seed_many(&pool, &run_id, "digest", 10, [3, 3, 3, 3, 1], AccessState::OaPdfFound).await;
    seed_many(&pool, &run_id, "blurb", 35, [3, 1, 3, 1, 1], AccessState::AbstractOnly).await;

    let quotas = SelectionQuotas::default();
    let outcome = select_weekly_issue(&pool, WEEK, "chemistry", &quotas, false).await.unwrap();
    let SelectionOutcome::Selected { rows, shortfalls } = outcome else {
        panic!("expected a fresh selection");
    };

    let counts = SlotCounts::from_selections(&rows);
    assert_eq!(counts.indepth, 1);
    assert_eq!(counts.digest, quotas.digest_max);
    assert_eq!(counts.blurb, quotas.blurb_max);
    assert!(shortfalls.is_empty());
}

#[tokio::test]
async fn test_indepth_and_digest_need_fulltext() {
    let pool = memory_pool().await;
    let run_id = seed_run(&pool, WEEK).await;
    seed_many(&pool, &run_id, "indepth-abstract", 2, [5, 5, 5, 5, 0], AccessState::AbstractOnly).await;
    seed_many(&pool, &run_id, "digest-paywalled", 2, [3, 3, 3, 3, 1], AccessState::Paywalled).await;
    seed_many(&pool, &run_id, "blurb-paywalled", 2, [3, 1, 3, 1, 1], AccessState::Paywalled).await;
    seed_many(&pool, &run_id, "blurb-full", 1, [3, 1, 3, 1, 1], AccessState::OaPdfFound).await;

    let quotas = SelectionQuotas::default();
    let outcome = select_weekly_issue(&pool, WEEK, "chemistry", &quotas, false).await.unwrap();
    let rows = outcome.rows();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].slot, Slot::Blurb);
    assert_eq!(rows[0].access_state, AccessState::OaPdfFound);
    assert!(!rows[0].is_frontier());
}

#[tokio::test]
async fn test_dry_run_writes_nothing() {
    let pool = memory_pool().await;
    let run_id = seed_run(&pool, WEEK).await;
    seed_many(&pool, &run_id, "digest", 3, [3, 3, 3, 3, 1], AccessState::OaPdfFound).await;

    let quotas = SelectionQuotas::default();
    let planned = select_weekly_issue(&pool, WEEK, "chemistry", &quotas, true).await.unwrap();
    assert!(matches!(planned, SelectionOutcome::Planned { .. }));
    assert_eq!(planned.rows().len(), 3);
    assert_eq!(selection_exists(&pool, WEEK, "chemistry").await.unwrap(), 0);

    let selected = select_weekly_issue(&pool, WEEK, "chemistry", &quotas, false).await.unwrap();
    let urls = |o: &SelectionOutcome| o.rows().iter().map(|r| r.article_url.clone()).collect::<Vec<_>>();
    assert_eq!(urls(&planned), urls(&selected));
}

#[tokio::test]
async fn test_disciplines_are_independent() {
    let pool = memory_pool().await;
    let run_id = seed_run(&pool, WEEK).await;
    seed_many(&pool, &run_id, "chem", 2, [3, 3, 3, 3, 1], AccessState::OaPdfFound).await;
    let physics = scored_result(&run_id, "https://example.org/phys", "physics", [3, 3, 3, 3, 1], AccessState::OaPdfFound);
    upsert_result(&pool, &physics).await.unwrap();

    let quotas = SelectionQuotas::default();
    select_weekly_issue(&pool, WEEK, "chemistry", &quotas, false).await.unwrap();
    let physics_outcome = select_weekly_issue(&pool, WEEK, "physics", &quotas, false).await.unwrap();

    assert!(matches!(physics_outcome, SelectionOutcome::Selected { .. }));
    assert_eq!(physics_outcome.rows().len(), 1);
    assert_eq!(load_selection(&pool, WEEK, None, None).await.unwrap().len(), 3);
    assert_eq!(
        load_selection(&pool, WEEK, None, Some(Slot::Digest)).await.unwrap().len(),
        3
    );
}
