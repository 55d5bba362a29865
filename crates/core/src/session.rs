//! Interview session state and phase machine types

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::turn::Turn;

/// What the agent is currently saying, when the phase is `Speaking`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeakingKind {
    /// The main prompt for the current question
    Question,
    /// A follow-up on the current question
    Followup,
    /// A softer wind-down question before ending
    Exit,
}

/// Phases of an interview session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InterviewPhase {
    /// Session created, nothing started yet
    #[default]
    NotStarted,
    /// Transport/session setup in progress
    Connecting,
    /// Waiting for candidate media to arrive
    WaitingForMedia,
    /// Agent audio is playing; detection is off
    Speaking,
    /// Capturing candidate audio
    Listening,
    /// Candidate went quiet; pause accumulation running
    DetectingPause,
    /// Transcribing and evaluating the captured answer
    Processing,
    /// Terminal. No transitions out.
    Completed,
}

/// Static transition map for O(1) lookup of allowed phase changes.
static PHASE_TRANSITIONS: Lazy<HashMap<InterviewPhase, &'static [InterviewPhase]>> =
    Lazy::new(|| {
        use InterviewPhase::*;
        let mut map = HashMap::new();
        map.insert(NotStarted, &[Connecting] as &[_]);
        map.insert(Connecting, &[WaitingForMedia, Completed] as &[_]);
        map.insert(WaitingForMedia, &[Speaking, Completed] as &[_]);
        map.insert(Speaking, &[Listening, Completed] as &[_]);
        map.insert(Listening, &[DetectingPause, Speaking, Completed] as &[_]);
        map.insert(DetectingPause, &[Listening, Processing, Completed] as &[_]);
        map.insert(Processing, &[Listening, Speaking, Completed] as &[_]);
        map.insert(Completed, &[] as &[_]);
        map
    });

impl InterviewPhase {
    /// Get allowed transitions from the current phase
    pub fn allowed_transitions(&self) -> &'static [InterviewPhase] {
        PHASE_TRANSITIONS.get(self).copied().unwrap_or(&[])
    }

    /// Check if a transition to the target phase is allowed
    pub fn can_transition_to(&self, target: InterviewPhase) -> bool {
        self.allowed_transitions().contains(&target)
    }

    /// Terminal phases accept no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, InterviewPhase::Completed)
    }
}

impl std::fmt::Display for InterviewPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            InterviewPhase::NotStarted => "not_started",
            InterviewPhase::Connecting => "connecting",
            InterviewPhase::WaitingForMedia => "waiting_for_media",
            InterviewPhase::Speaking => "speaking",
            InterviewPhase::Listening => "listening",
            InterviewPhase::DetectingPause => "detecting_pause",
            InterviewPhase::Processing => "processing",
            InterviewPhase::Completed => "completed",
        };
        write!(f, "{}", name)
    }
}

/// How questions are sourced over the course of the interview
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InterviewMode {
    /// Fixed question list, configured follow-ups only
    #[default]
    Scripted,
    /// Fixed question list, evaluator may request follow-ups
    ScriptedWithFollowups,
    /// Screening questions, then generated questions with fit assessment
    Dynamic,
}

/// Rolling overall-fit classification for dynamic interviews
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FitStatus {
    Fit,
    #[default]
    Uncertain,
    NotFit,
}

/// Mutable state of a single interview
///
/// Owned and mutated exclusively by the orchestrator; read-only snapshots are
/// handed out for reporting. Immutable once `phase` reaches `Completed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterviewSession {
    /// Session identity
    pub id: Uuid,
    /// Current phase
    pub phase: InterviewPhase,
    /// What is being spoken, if phase is `Speaking`
    pub speaking: Option<SpeakingKind>,
    /// Question sourcing mode
    pub mode: InterviewMode,
    /// Index into the scripted/screening question list
    pub question_index: usize,
    /// Follow-ups already used for the current question
    pub followups_used: u32,
    /// Ordered question/answer exchanges
    pub history: Vec<Turn>,
    /// Rolling fit classification (dynamic mode)
    pub fit_status: FitStatus,
    /// Wind-down exit questions already asked
    pub exit_questions_asked: usize,
    /// True once the session is winding down toward completion
    pub winding_down: bool,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl InterviewSession {
    /// Create a fresh session bound to a template mode
    pub fn new(mode: InterviewMode) -> Self {
        Self {
            id: Uuid::new_v4(),
            phase: InterviewPhase::NotStarted,
            speaking: None,
            mode,
            question_index: 0,
            followups_used: 0,
            history: Vec::new(),
            fit_status: FitStatus::default(),
            exit_questions_asked: 0,
            winding_down: false,
            created_at: Utc::now(),
        }
    }

    /// Number of answered turns so far
    pub fn answered_turns(&self) -> usize {
        self.history
            .iter()
            .filter(|t| t.speaker == crate::turn::TurnSpeaker::Candidate)
            .count()
    }

    /// Apply a phase transition, rejecting illegal ones
    pub fn transition_to(&mut self, target: InterviewPhase) -> Result<(), crate::Error> {
        if self.phase == target {
            return Ok(());
        }
        if !self.phase.can_transition_to(target) {
            return Err(crate::Error::Session(format!(
                "illegal phase transition {} -> {}",
                self.phase, target
            )));
        }
        tracing::debug!(session_id = %self.id, from = %self.phase, to = %target, "Phase transition");
        self.phase = target;
        if target != InterviewPhase::Speaking {
            self.speaking = None;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_transitions() {
        let phase = InterviewPhase::Listening;
        assert!(phase.can_transition_to(InterviewPhase::DetectingPause));
        assert!(phase.can_transition_to(InterviewPhase::Completed));
        assert!(!phase.can_transition_to(InterviewPhase::Processing));
    }

    #[test]
    fn test_completed_is_terminal() {
        let phase = InterviewPhase::Completed;
        assert!(phase.is_terminal());
        assert!(phase.allowed_transitions().is_empty());
    }

    #[test]
    fn test_session_rejects_illegal_transition() {
        let mut session = InterviewSession::new(InterviewMode::Scripted);
        assert!(session.transition_to(InterviewPhase::Processing).is_err());
        assert!(session.transition_to(InterviewPhase::Connecting).is_ok());
        assert_eq!(session.phase, InterviewPhase::Connecting);
    }

    #[test]
    fn test_same_phase_transition_is_noop() {
        let mut session = InterviewSession::new(InterviewMode::Scripted);
        assert!(session.transition_to(InterviewPhase::NotStarted).is_ok());
        assert_eq!(session.phase, InterviewPhase::NotStarted);
    }
}
