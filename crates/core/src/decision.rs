//! Final decision types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Outcome bucket for a completed interview
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// Total score >= 0.7
    Advance,
    /// Total score in [0.4, 0.7)
    Hold,
    /// Total score < 0.4
    Reject,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Advance => "advance",
            Decision::Hold => "hold",
            Decision::Reject => "reject",
        }
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-signal contribution to the total score
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalBreakdown {
    /// Signal name, e.g. "communication"
    pub signal: String,
    /// Mean raw score across occurrences
    pub average: f32,
    /// Rubric weight, fixed at first observation
    pub weight: f32,
    /// Number of scored occurrences
    pub count: u32,
}

/// The persisted outcome of an interview
///
/// Written once at completion; never recomputed for the same session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalDecision {
    pub session_id: Uuid,
    /// Weighted total in [0, 1]
    pub total_score: f32,
    pub decision: Decision,
    /// Per-signal breakdown for administrative consumers
    pub signals: Vec<SignalBreakdown>,
    /// Strong signals called out for the report
    #[serde(default)]
    pub strengths: Vec<String>,
    /// Weak signals called out for the report
    #[serde(default)]
    pub concerns: Vec<String>,
    /// True when finalization failed and a neutral default was recorded
    #[serde(default)]
    pub neutral_fallback: bool,
    pub decided_at: DateTime<Utc>,
}
