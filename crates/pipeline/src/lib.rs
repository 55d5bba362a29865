//! Audio pipeline for the interview agent
//!
//! This crate provides the client-side audio processing path:
//! - Energy-based pause detection with speech confirmation
//! - Per-turn sample buffering with WAV encoding
//! - HTTP speech I/O adapter with bounded timeouts and cancellation

pub mod buffer;
pub mod speech;
pub mod vad;

pub use buffer::TurnBuffer;
pub use speech::{SpeechClient, SpeechIoConfig};
pub use vad::{DetectorConfig, DetectorEvent, DetectorState, PauseDetector};

use thiserror::Error;

/// Pipeline errors
#[derive(Error, Debug, Clone)]
pub enum PipelineError {
    #[error("VAD error: {0}")]
    Vad(String),

    #[error("Audio error: {0}")]
    Audio(String),

    #[error("STT error: {0}")]
    Stt(String),

    #[error("TTS error: {0}")]
    Tts(String),

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("Request cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(String),
}

impl PipelineError {
    /// Transient failures the candidate can simply retry by speaking again
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PipelineError::Stt(_)
                | PipelineError::Tts(_)
                | PipelineError::Timeout(_)
                | PipelineError::Io(_)
        )
    }
}

impl From<PipelineError> for interview_core::Error {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Timeout(ms) => interview_core::Error::Timeout(ms),
            PipelineError::Audio(msg) | PipelineError::Vad(msg) => {
                interview_core::Error::Audio(msg)
            }
            other => interview_core::Error::Speech(other.to_string()),
        }
    }
}
