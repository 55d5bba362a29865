//! Out-of-band flag detection
//!
//! Runs beside the turn-taking path, never on it: each completed turn is
//! inspected in a spawned task with its own error boundary. Nothing here can
//! block, fail, or alter the orchestrator's state; tasks may still be
//! running after the session completes.

use std::sync::Arc;

use uuid::Uuid;

use interview_core::EvaluationBackend;
use interview_persistence::SessionStore;

use crate::evaluator::parse_flag;

/// Async flag detector
#[derive(Clone)]
pub struct FlagDetector {
    backend: Arc<dyn EvaluationBackend>,
    store: Arc<dyn SessionStore>,
    /// Answers shorter than this many words are never inspected
    min_words: usize,
}

impl FlagDetector {
    pub fn new(backend: Arc<dyn EvaluationBackend>, store: Arc<dyn SessionStore>) -> Self {
        Self {
            backend,
            store,
            min_words: interview_config::constants::decision::MIN_FLAG_WORDS,
        }
    }

    pub fn with_min_words(mut self, min_words: usize) -> Self {
        self.min_words = min_words;
        self
    }

    /// Inspect a completed turn, fire-and-forget
    pub fn inspect(
        &self,
        session_id: Uuid,
        turn_index: usize,
        question: String,
        answer: String,
    ) {
        if answer.split_whitespace().count() < self.min_words {
            return;
        }

        let backend = self.backend.clone();
        let store = self.store.clone();

        tokio::spawn(async move {
            let raw = match backend.classify_turn(&question, &answer).await {
                Ok(raw) => raw,
                Err(e) => {
                    tracing::warn!(session_id = %session_id, turn_index, error = %e, "Flag classification failed");
                    return;
                }
            };

            let Some(flag) = parse_flag(&raw, turn_index) else {
                return;
            };

            tracing::info!(
                session_id = %session_id,
                turn_index,
                kind = ?flag.kind,
                category = %flag.category,
                "Turn flagged"
            );

            if let Err(e) = store.save_flag(session_id, flag).await {
                tracing::warn!(session_id = %session_id, turn_index, error = %e, "Failed to persist flag");
            }
        });
    }
}
