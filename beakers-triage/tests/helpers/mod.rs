//! Test Helper Utilities
//!
//! Shared fixtures for beakers-triage integration tests: a scripted
//! inference endpoint, in-memory databases, and seeded runs and results.

#![allow(dead_code)]

use async_trait::async_trait;
use beakers_triage::config::InferenceConfig;
use beakers_triage::db;
use beakers_triage::models::{
    AccessState, ArticleCandidate, FullTextStatus, ResultStatus, ScoreVector, TriageResult,
    TriageRun,
};
use beakers_triage::routing;
use beakers_triage::services::{
    GenerationRequest, InferenceEndpoint, InferenceError, ModelCaller, ResponseCache,
};
use sqlx::SqlitePool;
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const BUILDER_MODEL: &str = "builder-test";
pub const SKEPTIC_MODEL: &str = "skeptic-test";

type Reply = Result<String, InferenceError>;

/// Inference endpoint that replays scripted replies per model
///
/// Scripted replies are consumed in order; once exhausted the model's
/// fallback reply (if any) is returned for every further call.
#[derive(Default)]
pub struct FakeEndpoint {
    scripts: Mutex<HashMap<String, VecDeque<Reply>>>,
    fallbacks: Mutex<HashMap<String, Reply>>,
    requests: Mutex<Vec<GenerationRequest>>,
    delays: Mutex<HashMap<String, Duration>>,
    calls: AtomicUsize,
}

impl FakeEndpoint {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(self, model: &str, replies: Vec<Reply>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(model.to_string(), replies.into());
        self
    }

    pub fn always(self, model: &str, reply: Reply) -> Self {
        self.fallbacks
            .lock()
            .unwrap()
            .insert(model.to_string(), reply);
        self
    }

    /// Sleep for `delay` before answering any call to `model`
    pub fn slow(self, model: &str, delay: Duration) -> Self {
        self.delays
            .lock()
            .unwrap()
            .insert(model.to_string(), delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn calls_for(&self, model: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.model == model)
            .count()
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl InferenceEndpoint for FakeEndpoint {
    fn name(&self) -> &str {
        "fake"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String, InferenceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());

        let delay = self.delays.lock().unwrap().get(&request.model).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(reply) = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&request.model)
            .and_then(VecDeque::pop_front)
        {
            return reply;
        }

        self.fallbacks
            .lock()
            .unwrap()
            .get(&request.model)
            .cloned()
            .unwrap_or_else(|| Err(InferenceError::Network(format!("no reply scripted for {}", request.model))))
    }
}

pub fn inference_config() -> InferenceConfig {
    InferenceConfig {
        builder_model: BUILDER_MODEL.to_string(),
        skeptic_model: SKEPTIC_MODEL.to_string(),
        timeout: Duration::from_secs(5),
        ..InferenceConfig::default()
    }
}

pub fn model_caller(endpoint: &Arc<FakeEndpoint>, cache_dir: &Path) -> ModelCaller {
    model_caller_with_timeout(endpoint, cache_dir, inference_config().timeout)
}

pub fn model_caller_with_timeout(endpoint: &Arc<FakeEndpoint>, cache_dir: &Path, timeout: Duration) -> ModelCaller {
    let cache = ResponseCache::open(cache_dir).unwrap();
    let config = InferenceConfig {
        timeout,
        ..inference_config()
    };
    ModelCaller::new(endpoint.clone(), cache, config)
}

pub async fn memory_pool() -> SqlitePool {
    db::open_memory_database().await.unwrap()
}

pub async fn seed_run(pool: &SqlitePool, week_of: &str) -> String {
    let run = TriageRun::new(week_of, BUILDER_MODEL, SKEPTIC_MODEL);
    db::runs::create_run(pool, &run).await.unwrap();
    run.run_id
}

pub fn candidate(url: &str, discipline: &str, headline: &str) -> ArticleCandidate {
    ArticleCandidate {
        url: url.to_string(),
        headline: headline.to_string(),
        teaser: format!("Teaser for {}", headline),
        source: "Test Journal".to_string(),
        discipline: discipline.to_string(),
        doi: None,
        access_state: AccessState::Unknown,
    }
}

/// Builder reply for the given S, E, T, M, H
pub fn builder_reply(scores: [i64; 5]) -> String {
    let [s, e, t, m, h] = scores;
    serde_json::json!({
        "S": s, "E": e, "T": t, "M": m, "H": h,
        "tldr": "Researchers report a result.",
        "pivot_figure": "Comparison of treated and control samples",
        "course_hooks": ["General Chemistry"],
    })
    .to_string()
}

/// Skeptic reply that justifies every E/H it sets
pub fn skeptic_reply(scores: [i64; 5], confidence: f64) -> String {
    let [s, e, t, m, h] = scores;
    serde_json::json!({
        "S": s, "E": e, "T": t, "M": m, "H": h,
        "adjustments": {"E": "sample size is small", "H": "claims match the data"},
        "confidence": confidence,
    })
    .to_string()
}

pub fn evidence_reply(e: i64, h: i64) -> String {
    serde_json::json!({
        "E": e,
        "H": h,
        "evidence_notes": "Controlled study with replicates.",
        "concerns": [],
        "confidence": 0.8,
    })
    .to_string()
}

/// Ok result with route fields derived from `scores`
pub fn scored_result(
    run_id: &str,
    url: &str,
    discipline: &str,
    scores: [i64; 5],
    access_state: AccessState,
) -> TriageResult {
    let [s, e, t, m, h] = scores;
    let scores = ScoreVector::from_raw(s, e, t, m, h).unwrap();
    let decision = routing::route(&scores);

    let mut result = TriageResult::failed(run_id, url, discipline, "A headline", "");
    result.status = ResultStatus::Ok;
    result.error_msg = None;
    result.scores = Some(scores);
    result.route = Some(decision.route);
    result.frontier = decision.frontier;
    result.tldr = Some("summary".to_string());
    result.pivot_figure_prompt = Some("figure".to_string());
    result.confidence = Some(0.7);
    result.fulltext = FullTextStatus::from_access_state(access_state);
    result
}
