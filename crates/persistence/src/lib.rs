//! Persistence layer for the interview agent
//!
//! Persistence is a key-value read/write contract: session snapshots,
//! final decisions, and flags keyed by session id. The [`SessionStore`]
//! trait is the seam; [`MemoryStore`] is the in-process implementation.
//!
//! Decision writes are first-wins: once a decision exists for a session the
//! stored value is returned to every later caller, which makes session
//! completion idempotent at the storage contract level.

use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;
use uuid::Uuid;

use interview_core::{FinalDecision, Flag, InterviewSession};

/// Persistence errors
#[derive(Error, Debug, Clone)]
pub enum PersistenceError {
    #[error("Session not found: {0}")]
    NotFound(Uuid),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Store error: {0}")]
    Store(String),
}

/// Key-value store contract for session state, decisions, and flags
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Write the latest session snapshot
    async fn save_session(&self, session: &InterviewSession) -> Result<(), PersistenceError>;

    /// Read a session snapshot
    async fn load_session(&self, id: Uuid) -> Result<InterviewSession, PersistenceError>;

    /// Record a final decision. First write wins: the stored decision is
    /// returned, whether it was just written or already present.
    async fn record_decision(
        &self,
        decision: FinalDecision,
    ) -> Result<FinalDecision, PersistenceError>;

    /// Read the decision for a session, if one has been recorded
    async fn load_decision(&self, id: Uuid) -> Result<Option<FinalDecision>, PersistenceError>;

    /// Append a flag for a session
    async fn save_flag(&self, id: Uuid, flag: Flag) -> Result<(), PersistenceError>;

    /// All flags recorded for a session
    async fn load_flags(&self, id: Uuid) -> Result<Vec<Flag>, PersistenceError>;
}

/// In-memory store
#[derive(Default)]
pub struct MemoryStore {
    sessions: DashMap<Uuid, InterviewSession>,
    decisions: DashMap<Uuid, FinalDecision>,
    flags: DashMap<Uuid, Vec<Flag>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn save_session(&self, session: &InterviewSession) -> Result<(), PersistenceError> {
        self.sessions.insert(session.id, session.clone());
        Ok(())
    }

    async fn load_session(&self, id: Uuid) -> Result<InterviewSession, PersistenceError> {
        self.sessions
            .get(&id)
            .map(|s| s.clone())
            .ok_or(PersistenceError::NotFound(id))
    }

    async fn record_decision(
        &self,
        decision: FinalDecision,
    ) -> Result<FinalDecision, PersistenceError> {
        let entry = self
            .decisions
            .entry(decision.session_id)
            .or_insert_with(|| {
                tracing::info!(
                    session_id = %decision.session_id,
                    decision = %decision.decision,
                    score = decision.total_score,
                    "Decision recorded"
                );
                decision
            });
        Ok(entry.clone())
    }

    async fn load_decision(&self, id: Uuid) -> Result<Option<FinalDecision>, PersistenceError> {
        Ok(self.decisions.get(&id).map(|d| d.clone()))
    }

    async fn save_flag(&self, id: Uuid, flag: Flag) -> Result<(), PersistenceError> {
        self.flags.entry(id).or_default().push(flag);
        Ok(())
    }

    async fn load_flags(&self, id: Uuid) -> Result<Vec<Flag>, PersistenceError> {
        Ok(self.flags.get(&id).map(|f| f.clone()).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use interview_core::{Decision, FlagKind, InterviewMode};

    fn decision_for(id: Uuid, decision: Decision, score: f32) -> FinalDecision {
        FinalDecision {
            session_id: id,
            total_score: score,
            decision,
            signals: Vec::new(),
            strengths: Vec::new(),
            concerns: Vec::new(),
            neutral_fallback: false,
            decided_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_session_round_trip() {
        let store = MemoryStore::new();
        let session = InterviewSession::new(InterviewMode::Scripted);
        let id = session.id;

        store.save_session(&session).await.unwrap();
        let loaded = store.load_session(id).await.unwrap();
        assert_eq!(loaded.id, id);

        let missing = store.load_session(Uuid::new_v4()).await;
        assert!(matches!(missing, Err(PersistenceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_first_decision_wins() {
        let store = MemoryStore::new();
        let id = Uuid::new_v4();

        let first = store
            .record_decision(decision_for(id, Decision::Hold, 0.55))
            .await
            .unwrap();
        assert_eq!(first.decision, Decision::Hold);

        // A second write returns the original, not the new value
        let second = store
            .record_decision(decision_for(id, Decision::Advance, 0.9))
            .await
            .unwrap();
        assert_eq!(second.decision, Decision::Hold);
        assert!((second.total_score - 0.55).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_flags_append() {
        let store = MemoryStore::new();
        let id = Uuid::new_v4();

        assert!(store.load_flags(id).await.unwrap().is_empty());

        store
            .save_flag(id, Flag::new(0, FlagKind::Green, "depth", "strong detail"))
            .await
            .unwrap();
        store
            .save_flag(id, Flag::new(2, FlagKind::Red, "evasiveness", "dodged twice"))
            .await
            .unwrap();

        let flags = store.load_flags(id).await.unwrap();
        assert_eq!(flags.len(), 2);
        assert_eq!(flags[0].turn_index, 0);
    }
}
