//! Candidate article records

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Full-text availability of an article
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessState {
    /// Acquisition has not run yet
    #[default]
    Unknown,
    /// Only title and abstract are available
    AbstractOnly,
    /// Open-access full text was located and stored
    OaPdfFound,
    /// Full text exists behind a paywall
    Paywalled,
}

impl AccessState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessState::Unknown => "unknown",
            AccessState::AbstractOnly => "abstract_only",
            AccessState::OaPdfFound => "oa_pdf_found",
            AccessState::Paywalled => "paywalled",
        }
    }

    pub fn has_fulltext(&self) -> bool {
        matches!(self, AccessState::OaPdfFound)
    }
}

impl fmt::Display for AccessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccessState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unknown" => Ok(AccessState::Unknown),
            "abstract_only" => Ok(AccessState::AbstractOnly),
            "oa_pdf_found" => Ok(AccessState::OaPdfFound),
            "paywalled" => Ok(AccessState::Paywalled),
            other => Err(format!("unknown access state '{}'", other)),
        }
    }
}

/// Candidate article as delivered by discovery
///
/// Read-only to triage. `url` is the stable key across runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleCandidate {
    pub url: String,
    #[serde(default)]
    pub headline: String,
    #[serde(default)]
    pub teaser: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub discipline: String,
    #[serde(default)]
    pub doi: Option<String>,
    #[serde(default)]
    pub access_state: AccessState,
}

impl ArticleCandidate {
    /// True when the headline has visible content
    pub fn has_headline(&self) -> bool {
        !self.headline.trim().is_empty()
    }
}
