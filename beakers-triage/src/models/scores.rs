//! Score vector and route types
//!
//! Scores only exist as validated 0-5 integers. Everything that reaches the
//! routing function has already passed through [`Score::new`], so routing
//! never needs to clamp.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Rejected score value
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("score {value} for {dimension} is outside 0-5")]
pub struct ScoreError {
    pub dimension: &'static str,
    pub value: i64,
}

/// One rubric score, always in 0..=5
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Score(u8);

impl Score {
    pub const MAX: u8 = 5;

    pub fn new(dimension: &'static str, value: i64) -> Result<Self, ScoreError> {
        if (0..=Self::MAX as i64).contains(&value) {
            Ok(Score(value as u8))
        } else {
            Err(ScoreError { dimension, value })
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// Every valid score, ascending
    pub fn all() -> impl Iterator<Item = Score> {
        (0..=Self::MAX).map(Score)
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<'de> Deserialize<'de> for Score {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = i64::deserialize(deserializer)?;
        Score::new("score", value).map_err(serde::de::Error::custom)
    }
}

/// Significance, Evidence, Teachability, Media affordance, Hype risk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScoreVector {
    #[serde(rename = "S")]
    pub s: Score,
    #[serde(rename = "E")]
    pub e: Score,
    #[serde(rename = "T")]
    pub t: Score,
    #[serde(rename = "M")]
    pub m: Score,
    #[serde(rename = "H")]
    pub h: Score,
}

impl ScoreVector {
    /// Build from raw integers, rejecting any value outside 0-5
    pub fn from_raw(s: i64, e: i64, t: i64, m: i64, h: i64) -> Result<Self, ScoreError> {
        Ok(Self {
            s: Score::new("S", s)?,
            e: Score::new("E", e)?,
            t: Score::new("T", t)?,
            m: Score::new("M", m)?,
            h: Score::new("H", h)?,
        })
    }

    /// Same S/T/M with replaced E/H
    pub fn with_evidence(self, e: Score, h: Score) -> Self {
        Self { e, h, ..self }
    }

    /// Values in S, E, T, M, H order
    pub fn as_array(&self) -> [u8; 5] {
        [self.s.0, self.e.0, self.t.0, self.m.0, self.h.0]
    }
}

impl fmt::Display for ScoreVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "S={} E={} T={} M={} H={}",
            self.s, self.e, self.t, self.m, self.h
        )
    }
}

/// Lifecycle bucket assigned to an article
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Route {
    Reject,
    Blurb,
    Digest,
    Indepth,
}

impl Route {
    pub const ALL: [Route; 4] = [Route::Reject, Route::Blurb, Route::Digest, Route::Indepth];

    pub fn as_str(&self) -> &'static str {
        match self {
            Route::Reject => "reject",
            Route::Blurb => "blurb",
            Route::Digest => "digest",
            Route::Indepth => "indepth",
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Route {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reject" => Ok(Route::Reject),
            "blurb" => Ok(Route::Blurb),
            "digest" => Ok(Route::Digest),
            "indepth" => Ok(Route::Indepth),
            other => Err(format!("unknown route '{}'", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_bounds() {
        assert!(Score::new("E", 0).is_ok());
        assert!(Score::new("E", 5).is_ok());
        assert_eq!(
            Score::new("E", 6),
            Err(ScoreError { dimension: "E", value: 6 })
        );
        assert!(Score::new("E", -1).is_err());
        assert_eq!(Score::all().count(), 6);
    }

    #[test]
    fn test_score_vector_json_shape() {
        let v = ScoreVector::from_raw(3, 1, 3, 0, 1).unwrap();
        let json = serde_json::to_value(v).unwrap();
        assert_eq!(json, serde_json::json!({"S": 3, "E": 1, "T": 3, "M": 0, "H": 1}));

        let back: ScoreVector = serde_json::from_value(json).unwrap();
        assert_eq!(back, v);
    }

    #[test]
    fn test_score_rejects_non_integers() {
        assert!(serde_json::from_str::<Score>("3.5").is_err());
        assert!(serde_json::from_str::<Score>("\"3\"").is_err());
        assert!(serde_json::from_str::<Score>("9").is_err());
    }

    #[test]
    fn test_with_evidence_keeps_other_dimensions() {
        let v = ScoreVector::from_raw(4, 1, 4, 2, 3).unwrap();
        let updated = v.with_evidence(Score::new("E", 4).unwrap(), Score::new("H", 1).unwrap());
        assert_eq!(updated.as_array(), [4, 4, 4, 2, 1]);
    }

    #[test]
    fn test_route_round_trip_names() {
        for route in Route::ALL {
            assert_eq!(route.as_str().parse::<Route>().unwrap(), route);
        }
        assert!("frontier".parse::<Route>().is_err());
    }
}
