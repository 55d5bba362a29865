//! Turn and evaluation types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session::FitStatus;

/// Who produced a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnSpeaker {
    /// The interviewing agent
    Agent,
    /// The human candidate
    Candidate,
}

impl TurnSpeaker {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnSpeaker::Agent => "agent",
            TurnSpeaker::Candidate => "candidate",
        }
    }
}

impl std::fmt::Display for TurnSpeaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Evaluation of a single answer
///
/// Scoring bands: 0.0-0.3 poor, 0.4-0.6 average, 0.7-0.8 good,
/// 0.9-1.0 excellent. Specific, role-relevant answers score high.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerEvaluation {
    /// Score in [0, 1]
    pub score: f32,
    /// Short reasoning for the score
    pub reasoning: String,
    /// Whether the evaluator wants a follow-up
    pub needs_followup: bool,
    /// What the follow-up should probe, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub followup_reason: Option<String>,
}

impl AnswerEvaluation {
    /// Neutral evaluation substituted when the evaluator output is unusable
    pub fn neutral(reason: impl Into<String>) -> Self {
        Self {
            score: 0.5,
            reasoning: format!("[unscored] {}", reason.into()),
            needs_followup: false,
            followup_reason: None,
        }
    }

    /// Clamp the score into [0, 1]
    pub fn clamped(mut self) -> Self {
        self.score = self.score.clamp(0.0, 1.0);
        self
    }
}

/// Human-readable band name for a score
pub fn score_band(score: f32) -> &'static str {
    if score < 0.4 {
        "poor"
    } else if score < 0.7 {
        "average"
    } else if score < 0.9 {
        "good"
    } else {
        "excellent"
    }
}

/// A single turn in the interview
///
/// Append-only: never edited after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    /// Who spoke
    pub speaker: TurnSpeaker,
    /// What was said
    pub text: String,
    /// When the turn occurred
    pub timestamp: DateTime<Utc>,
    /// Evaluation, present on candidate answers once scored
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evaluation: Option<AnswerEvaluation>,
}

impl Turn {
    pub fn new(speaker: TurnSpeaker, text: impl Into<String>) -> Self {
        Self {
            speaker,
            text: text.into(),
            timestamp: Utc::now(),
            evaluation: None,
        }
    }

    /// Create an agent turn
    pub fn agent(text: impl Into<String>) -> Self {
        Self::new(TurnSpeaker::Agent, text)
    }

    /// Create a candidate turn
    pub fn candidate(text: impl Into<String>) -> Self {
        Self::new(TurnSpeaker::Candidate, text)
    }

    /// Attach an evaluation
    pub fn with_evaluation(mut self, evaluation: AnswerEvaluation) -> Self {
        self.evaluation = Some(evaluation);
        self
    }

    /// Get word count
    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }
}

/// Periodic overall-fit classification for dynamic interviews
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitAssessment {
    /// Classified status
    pub status: FitStatus,
    /// Confidence in the classification, [0, 1]
    pub confidence: f32,
    /// Short justification
    #[serde(default)]
    pub reasoning: String,
}

impl FitAssessment {
    /// Whether this assessment alone justifies winding the interview down
    ///
    /// A single weak answer must never end the interview: exit requires both
    /// a NotFit status and confidence at or above the threshold.
    pub fn warrants_early_exit(&self, confidence_threshold: f32) -> bool {
        self.status == FitStatus::NotFit && self.confidence >= confidence_threshold
    }
}
