//! Interview turn orchestration
//!
//! This crate owns the decision logic that turns captured answers into
//! scored interview turns:
//! - The phase state machine sequencing speaking/listening/processing
//! - The answer evaluator boundary and follow-up policy
//! - Score accumulation and the final hire/hold/reject decision
//! - The out-of-band flag detector

pub mod evaluator;
pub mod flags;
pub mod orchestrator;
pub mod scoring;

pub use evaluator::{
    follow_up_prompt, parse_evaluation, parse_fit, parse_flag, should_follow_up, EvaluatorConfig,
    HttpEvaluator,
};
pub use flags::FlagDetector;
pub use orchestrator::{
    InterviewEvent, InterviewOrchestrator, OrchestratorConfig, TurnAction,
};
pub use scoring::{auto_decide, ScoreAggregator};

use thiserror::Error;

/// Agent errors
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Evaluation error: {0}")]
    Evaluation(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("Empty answer")]
    EmptyAnswer,

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] interview_pipeline::PipelineError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] interview_persistence::PersistenceError),

    #[error("Timeout after {0}ms")]
    Timeout(u64),
}

impl AgentError {
    /// Transient failures recovered by returning the session to listening;
    /// the candidate retries by speaking again.
    pub fn is_retryable(&self) -> bool {
        match self {
            AgentError::Evaluation(_) | AgentError::Timeout(_) => true,
            AgentError::Pipeline(e) => e.is_retryable(),
            _ => false,
        }
    }
}

impl From<interview_core::Error> for AgentError {
    fn from(err: interview_core::Error) -> Self {
        match err {
            interview_core::Error::Timeout(ms) => AgentError::Timeout(ms),
            interview_core::Error::Evaluation(msg) => AgentError::Evaluation(msg),
            other => AgentError::Session(other.to_string()),
        }
    }
}
