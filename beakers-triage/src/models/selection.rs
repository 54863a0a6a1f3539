//! Weekly issue slot assignments

use crate::models::article::AccessState;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Production slot in a weekly issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Slot {
    Indepth,
    Digest,
    Blurb,
}

impl Slot {
    pub fn as_str(&self) -> &'static str {
        match self {
            Slot::Indepth => "indepth",
            Slot::Digest => "digest",
            Slot::Blurb => "blurb",
        }
    }

    /// Indepth and digest slots need full text
    pub fn requires_fulltext(&self) -> bool {
        !matches!(self, Slot::Blurb)
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Slot {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "indepth" => Ok(Slot::Indepth),
            "digest" => Ok(Slot::Digest),
            "blurb" => Ok(Slot::Blurb),
            other => Err(format!("unknown slot '{}'", other)),
        }
    }
}

/// One selected article for a (period, discipline)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueSelection {
    pub week_of: String,
    pub discipline: String,
    pub article_url: String,
    pub slot: Slot,
    pub rank_score: f64,
    pub access_state: AccessState,
    pub selected_at: String,
}

impl IssueSelection {
    /// Abstract-only blurbs are published under the "Frontier" label
    pub fn is_frontier(&self) -> bool {
        self.slot == Slot::Blurb && self.access_state == AccessState::AbstractOnly
    }
}

/// Per-slot counts of one selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotCounts {
    pub indepth: usize,
    pub digest: usize,
    pub blurb: usize,
}

impl SlotCounts {
    pub fn from_selections(rows: &[IssueSelection]) -> Self {
        let mut counts = SlotCounts::default();
        for row in rows {
            match row.slot {
                Slot::Indepth => counts.indepth += 1,
                Slot::Digest => counts.digest += 1,
                Slot::Blurb => counts.blurb += 1,
            }
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.indepth + self.digest + self.blurb
    }
}

/// Result of a selection request
#[derive(Debug, Clone, PartialEq)]
pub enum SelectionOutcome {
    /// Rows were written
    Selected {
        rows: Vec<IssueSelection>,
        shortfalls: Vec<String>,
    },
    /// A selection already exists for the pair; nothing was written
    AlreadySelected { existing: usize },
    /// Dry run: rows that would be written
    Planned {
        rows: Vec<IssueSelection>,
        shortfalls: Vec<String>,
    },
}

impl SelectionOutcome {
    pub fn rows(&self) -> &[IssueSelection] {
        match self {
            SelectionOutcome::Selected { rows, .. } | SelectionOutcome::Planned { rows, .. } => rows,
            SelectionOutcome::AlreadySelected { .. } => &[],
        }
    }
}
