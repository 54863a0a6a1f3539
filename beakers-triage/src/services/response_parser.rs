//! Strict parsing of model output
//!
//! Models wrap JSON in prose or code fences, so extraction tries, in order:
//! the whole text, a fenced block, then the outermost brace span. Once an
//! object is found, fields are validated strictly. Scores must be JSON
//! integers within 0-5; floats, strings and out-of-range values are errors,
//! never clamped or defaulted.

use crate::models::{Score, ScoreError, ScoreVector};
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;
use thiserror::Error;

/// Confidence used when the skeptic omits it
pub const DEFAULT_CONFIDENCE: f64 = 0.5;

/// Model output parse errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("no JSON object found in model output")]
    NoJson,

    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    #[error("missing field '{0}'")]
    MissingField(&'static str),

    #[error("invalid score: {0}")]
    InvalidScore(String),

    #[error("invalid value for '{field}': {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

impl From<ScoreError> for ParseError {
    fn from(err: ScoreError) -> Self {
        ParseError::InvalidScore(err.to_string())
    }
}

/// Parsed builder output
#[derive(Debug, Clone, PartialEq)]
pub struct BuilderVote {
    pub scores: ScoreVector,
    pub tldr: String,
    pub pivot_figure: String,
    pub course_hooks: Vec<String>,
    /// Extracted object as returned
    pub json: Value,
}

/// Parsed skeptic output
#[derive(Debug, Clone, PartialEq)]
pub struct SkepticVote {
    pub scores: ScoreVector,
    /// Justifications keyed by dimension letter
    pub adjustments: Map<String, Value>,
    pub confidence: f64,
    pub json: Value,
}

/// Parsed evidence upgrade output
#[derive(Debug, Clone, PartialEq)]
pub struct EvidenceVote {
    pub e: Score,
    pub h: Score,
    pub evidence_notes: String,
    pub concerns: Vec<String>,
    pub confidence: f64,
    pub json: Value,
}

fn fenced_block() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| {
        Regex::new(r"```(?:json|JSON)?\s*([\s\S]*?)\s*```").expect("fence pattern is valid")
    })
}

/// Extract the first JSON object from free text
pub fn extract_json(text: &str) -> Result<Value, ParseError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ParseError::NoJson);
    }

    if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(trimmed) {
        return Ok(value);
    }

    for captures in fenced_block().captures_iter(trimmed) {
        if let Some(body) = captures.get(1) {
            if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(body.as_str()) {
                return Ok(value);
            }
        }
    }

    let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) else {
        return Err(ParseError::NoJson);
    };
    if end <= start {
        return Err(ParseError::NoJson);
    }

    match serde_json::from_str::<Value>(&trimmed[start..=end]) {
        Ok(value @ Value::Object(_)) => Ok(value),
        Ok(_) => Err(ParseError::NoJson),
        Err(e) => Err(ParseError::InvalidJson(e.to_string())),
    }
}

fn as_object(value: &Value) -> Result<&Map<String, Value>, ParseError> {
    value.as_object().ok_or(ParseError::NoJson)
}

fn score_field(obj: &Map<String, Value>, field: &'static str) -> Result<Score, ParseError> {
    let value = obj.get(field).ok_or(ParseError::MissingField(field))?;
    match value {
        Value::Number(n) if n.is_i64() || n.is_u64() => {
            let raw = n
                .as_i64()
                .ok_or_else(|| ParseError::InvalidScore(format!("{} = {} is out of range", field, n)))?;
            Ok(Score::new(field, raw)?)
        }
        other => Err(ParseError::InvalidScore(format!(
            "{} must be an integer, got {}",
            field, other
        ))),
    }
}

fn score_vector(obj: &Map<String, Value>) -> Result<ScoreVector, ParseError> {
    Ok(ScoreVector {
        s: score_field(obj, "S")?,
        e: score_field(obj, "E")?,
        t: score_field(obj, "T")?,
        m: score_field(obj, "M")?,
        h: score_field(obj, "H")?,
    })
}

fn required_string(obj: &Map<String, Value>, field: &'static str) -> Result<String, ParseError> {
    match obj.get(field) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        Some(Value::String(_)) | None | Some(Value::Null) => Err(ParseError::MissingField(field)),
        Some(other) => Err(ParseError::InvalidValue {
            field,
            reason: format!("expected string, got {}", other),
        }),
    }
}

fn optional_string(obj: &Map<String, Value>, field: &'static str) -> Result<String, ParseError> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(s)) => Ok(s.trim().to_string()),
        Some(other) => Err(ParseError::InvalidValue {
            field,
            reason: format!("expected string, got {}", other),
        }),
    }
}

fn string_list(obj: &Map<String, Value>, field: &'static str) -> Result<Vec<String>, ParseError> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => Ok(s.trim().to_string()),
                other => Err(ParseError::InvalidValue {
                    field,
                    reason: format!("expected list of strings, found {}", other),
                }),
            })
            .collect(),
        Some(other) => Err(ParseError::InvalidValue {
            field,
            reason: format!("expected list, got {}", other),
        }),
    }
}

fn confidence_field(obj: &Map<String, Value>) -> Result<f64, ParseError> {
    match obj.get("confidence") {
        None | Some(Value::Null) => Ok(DEFAULT_CONFIDENCE),
        Some(Value::Number(n)) => {
            let value = n.as_f64().unwrap_or(f64::NAN);
            if (0.0..=1.0).contains(&value) {
                Ok(value)
            } else {
                Err(ParseError::InvalidValue {
                    field: "confidence",
                    reason: format!("{} is outside 0-1", n),
                })
            }
        }
        Some(other) => Err(ParseError::InvalidValue {
            field: "confidence",
            reason: format!("expected number, got {}", other),
        }),
    }
}

/// Parse builder output
pub fn parse_builder(raw: &str) -> Result<BuilderVote, ParseError> {
    let json = extract_json(raw)?;
    let obj = as_object(&json)?;

    Ok(BuilderVote {
        scores: score_vector(obj)?,
        tldr: required_string(obj, "tldr")?,
        pivot_figure: required_string(obj, "pivot_figure")?,
        course_hooks: string_list(obj, "course_hooks")?,
        json: json.clone(),
    })
}

/// Parse skeptic output against the builder vector it reviewed
///
/// A changed E or H without a justification string is a parse failure.
pub fn parse_skeptic(raw: &str, builder_scores: &ScoreVector) -> Result<SkepticVote, ParseError> {
    let json = extract_json(raw)?;
    let obj = as_object(&json)?;
    let scores = score_vector(obj)?;

    let adjustments = match obj.get("adjustments") {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(map)) => map.clone(),
        Some(other) => {
            return Err(ParseError::InvalidValue {
                field: "adjustments",
                reason: format!("expected object, got {}", other),
            })
        }
    };

    let justified = |dim: &str| {
        adjustments
            .get(dim)
            .and_then(Value::as_str)
            .map(|s| !s.trim().is_empty())
            .unwrap_or(false)
    };

    if scores.e != builder_scores.e && !justified("E") {
        return Err(ParseError::MissingField("adjustments.E"));
    }
    if scores.h != builder_scores.h && !justified("H") {
        return Err(ParseError::MissingField("adjustments.H"));
    }

    Ok(SkepticVote {
        scores,
        adjustments,
        confidence: confidence_field(obj)?,
        json: json.clone(),
    })
}

/// Parse evidence upgrade output
pub fn parse_evidence(raw: &str) -> Result<EvidenceVote, ParseError> {
    let json = extract_json(raw)?;
    let obj = as_object(&json)?;

    Ok(EvidenceVote {
        e: score_field(obj, "E")?,
        h: score_field(obj, "H")?,
        evidence_notes: optional_string(obj, "evidence_notes")?,
        concerns: string_list(obj, "concerns")?,
        confidence: confidence_field(obj)?,
        json: json.clone(),
    })
}
