//! Triage result persistence
//!
//! Upsert semantics, full-text bookkeeping, and the "latest ok result per
//! article" views used by selection and the evidence upgrade.

mod helpers;

use beakers_triage::db::results::{
    latest_fulltext, latest_results_for_period, load_result, record_fulltext, upgrade_candidates,
    upsert_result,
};
use beakers_triage::models::{AccessState, FullTextStatus, ResultStatus, TriageResult};
use beakers_common::Error;
use helpers::*;

#[tokio::test]
async fn test_upsert_replaces_scores_but_keeps_fulltext() {
    let pool = memory_pool().await;
    let run_id = seed_run(&pool, "2026-01-16").await;

    let mut first = scored_result(&run_id, "https://a", "chemistry", [3, 3, 3, 3, 1], AccessState::OaPdfFound);
    first.fulltext.path = Some("fulltext/a.txt".to_string());
    first.fulltext.ok = true;
    upsert_result(&pool, &first).await.unwrap();

    let second = scored_result(&run_id, "https://a", "chemistry", [4, 4, 4, 4, 1], AccessState::Unknown);
    upsert_result(&pool, &second).await.unwrap();

    let stored = load_result(&pool, &run_id, "https://a").await.unwrap().unwrap();
    assert_eq!(stored.scores.unwrap().as_array(), [4, 4, 4, 4, 1]);
    assert_eq!(stored.fulltext.access_state, AccessState::OaPdfFound);
    assert_eq!(stored.fulltext.path.as_deref(), Some("fulltext/a.txt"));
    assert!(stored.fulltext.ok);
}

#[tokio::test]
async fn test_error_result_round_trip() {
    let pool = memory_pool().await;
    let run_id = seed_run(&pool, "2026-01-16").await;

    let failed = TriageResult::failed(&run_id, "https://a", "physics", "Headline", "unparsable builder output");
    upsert_result(&pool, &failed).await.unwrap();

    let stored = load_result(&pool, &run_id, "https://a").await.unwrap().unwrap();
    assert_eq!(stored.status, ResultStatus::Error);
    assert_eq!(stored.error_msg.as_deref(), Some("unparsable builder output"));
    assert!(stored.scores.is_none());
    assert!(stored.route.is_none());
}

#[tokio::test]
async fn test_record_fulltext_updates_every_run() {
    let pool = memory_pool().await;
    let first_run = seed_run(&pool, "2026-01-09").await;
    let second_run = seed_run(&pool, "2026-01-16").await;
    for run_id in [&first_run, &second_run] {
        let result = scored_result(run_id, "https://a", "biology", [3, 1, 3, 3, 1], AccessState::Unknown);
        upsert_result(&pool, &result).await.unwrap();
    }

    let status = FullTextStatus {
        path: Some("fulltext/a.txt".to_string()),
        ok: true,
        source: Some("unpaywall".to_string()),
        fetched_at: None,
        access_state: AccessState::OaPdfFound,
    };
    assert_eq!(record_fulltext(&pool, "https://a", &status).await.unwrap(), 2);
    assert_eq!(record_fulltext(&pool, "https://missing", &status).await.unwrap(), 0);

    for run_id in [&first_run, &second_run] {
        let stored = load_result(&pool, run_id, "https://a").await.unwrap().unwrap();
        assert_eq!(stored.fulltext.access_state, AccessState::OaPdfFound);
        assert_eq!(stored.fulltext.source.as_deref(), Some("unpaywall"));
        assert!(stored.fulltext.fetched_at.is_some());
    }

    let latest = latest_fulltext(&pool, "https://a").await.unwrap().unwrap();
    assert_eq!(latest.path.as_deref(), Some("fulltext/a.txt"));
    assert!(latest_fulltext(&pool, "https://missing").await.unwrap().is_none());
}

#[tokio::test]
async fn test_latest_ok_result_per_article_in_period() {
    let pool = memory_pool().await;
    let early = seed_run(&pool, "2026-01-16").await;
    let late = seed_run(&pool, "2026-01-16").await;
    let failed_rerun = seed_run(&pool, "2026-01-16").await;
    let other_week = seed_run(&pool, "2026-01-09").await;

    let mut a_early = scored_result(&early, "https://a", "chemistry", [3, 3, 3, 3, 1], AccessState::OaPdfFound);
    a_early.created_at = "2026-01-16T08:00:00.000000Z".to_string();
    let mut a_late = scored_result(&late, "https://a", "chemistry", [4, 4, 4, 4, 1], AccessState::OaPdfFound);
    a_late.created_at = "2026-01-16T09:00:00.000000Z".to_string();
    let mut a_failed = TriageResult::failed(&failed_rerun, "https://a", "chemistry", "Headline", "builder call failed");
    a_failed.created_at = "2026-01-16T10:00:00.000000Z".to_string();
    let b_other_week = scored_result(&other_week, "https://b", "chemistry", [3, 3, 3, 3, 1], AccessState::OaPdfFound);
    let c_other_discipline = scored_result(&late, "https://c", "physics", [3, 3, 3, 3, 1], AccessState::OaPdfFound);

    for result in [&a_early, &a_late, &a_failed, &b_other_week, &c_other_discipline] {
        upsert_result(&pool, result).await.unwrap();
    }

    let results = latest_results_for_period(&pool, "2026-01-16", "chemistry").await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].run_id, late);
    assert_eq!(results[0].scores.unwrap().as_array(), [4, 4, 4, 4, 1]);
}

#[tokio::test]
async fn test_upgrade_candidates_filter() {
    let pool = memory_pool().await;
    let run_id = seed_run(&pool, "2026-01-16").await;

    let rows = [
        scored_result(&run_id, "https://eligible", "biology", [4, 1, 4, 3, 1], AccessState::OaPdfFound),
        scored_result(&run_id, "https://strong", "biology", [4, 3, 4, 3, 1], AccessState::OaPdfFound),
        scored_result(&run_id, "https://abstract", "biology", [4, 1, 4, 3, 1], AccessState::AbstractOnly),
    ];
    for result in &rows {
        upsert_result(&pool, result).await.unwrap();
    }
    let failed = TriageResult::failed(&run_id, "https://failed", "biology", "Headline", "x");
    upsert_result(&pool, &failed).await.unwrap();

    let candidates = upgrade_candidates(&pool, 10).await.unwrap();
    let urls: Vec<&str> = candidates.iter().map(|r| r.article_url.as_str()).collect();
    assert_eq!(urls, vec!["https://eligible"]);

    assert!(upgrade_candidates(&pool, 0).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_upgrade_candidates_use_latest_row_only() {
    let pool = memory_pool().await;
    let early = seed_run(&pool, "2026-01-09").await;
    let late = seed_run(&pool, "2026-01-16").await;

    let mut stale = scored_result(&early, "https://rescored", "biology", [4, 1, 4, 3, 1], AccessState::OaPdfFound);
    stale.created_at = "2026-01-09T08:00:00.000000Z".to_string();
    let mut fresh = scored_result(&late, "https://rescored", "biology", [4, 3, 4, 3, 1], AccessState::OaPdfFound);
    fresh.created_at = "2026-01-16T08:00:00.000000Z".to_string();

    let mut low_then_failed = scored_result(&early, "https://flaky", "biology", [4, 1, 4, 3, 1], AccessState::OaPdfFound);
    low_then_failed.created_at = "2026-01-09T09:00:00.000000Z".to_string();
    let mut failed = TriageResult::failed(&late, "https://flaky", "biology", "Headline", "builder call failed");
    failed.created_at = "2026-01-16T09:00:00.000000Z".to_string();

    for result in [&stale, &fresh, &low_then_failed, &failed] {
        upsert_result(&pool, result).await.unwrap();
    }

    let candidates = upgrade_candidates(&pool, 10).await.unwrap();
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].article_url, "https://flaky");
    assert_eq!(candidates[0].run_id, early);
}

#[tokio::test]
async fn test_corrupt_stored_row_is_stored_data_error() {
    let pool = memory_pool().await;
    let run_id = seed_run(&pool, "2026-01-16").await;
    let result = scored_result(&run_id, "https://a", "chemistry", [3, 3, 3, 3, 1], AccessState::OaPdfFound);
    upsert_result(&pool, &result).await.unwrap();

    sqlx::query("UPDATE triage_result SET course_hooks_json = 'not json' WHERE article_url = ?")
        .bind("https://a")
        .execute(&pool)
        .await
        .unwrap();

    let loaded = load_result(&pool, &run_id, "https://a").await;
    assert!(matches!(loaded, Err(Error::StoredData(msg)) if msg.contains("course hooks")));
}
