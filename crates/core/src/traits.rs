//! Trait seams for pluggable backends
//!
//! The speech and evaluation providers are request/response boundaries; these
//! traits keep the turn-taking engine independent of any concrete vendor.

use async_trait::async_trait;

use crate::error::Error;
use crate::template::VoiceSettings;
use crate::turn::Turn;

/// A synthesized audio clip ready for playback
#[derive(Debug, Clone)]
pub struct SynthesizedClip {
    /// Encoded audio bytes (WAV container)
    pub audio: Vec<u8>,
    /// Approximate duration in milliseconds, if the provider reports it
    pub duration_ms: Option<u64>,
}

/// Speech-to-text boundary
///
/// An empty or whitespace-only transcript is a valid, non-error response
/// meaning "no speech detected".
#[async_trait]
pub trait SpeechToText: Send + Sync {
    /// Transcribe an encoded audio clip to plain text
    async fn transcribe(&self, wav: Vec<u8>) -> Result<String, Error>;
}

/// Speech-synthesis boundary
#[async_trait]
pub trait SpeechSynthesis: Send + Sync {
    /// Synthesize text into an audio clip
    async fn synthesize(&self, text: &str, voice: &VoiceSettings)
        -> Result<SynthesizedClip, Error>;
}

/// Playback endpoint for synthesized audio
///
/// `play` resolves only when playback has finished; the orchestrator relies
/// on that signal to re-enable pause detection.
#[async_trait]
pub trait AudioSink: Send + Sync {
    async fn play(&self, clip: SynthesizedClip) -> Result<(), Error>;
}

/// Evaluation boundary
///
/// Returns raw provider output; the policy layer owns parsing and all
/// fallbacks for malformed responses.
#[async_trait]
pub trait EvaluationBackend: Send + Sync {
    /// Score a single answer against a question
    async fn evaluate_answer(
        &self,
        system_prompt: &str,
        question: &str,
        answer: &str,
        history: &[Turn],
    ) -> Result<String, Error>;

    /// Classify overall candidate fit from the conversation so far
    async fn assess_fit(&self, fit_criteria: &str, history: &[Turn]) -> Result<String, Error>;

    /// Generate the next question for a dynamic interview
    async fn next_question(&self, system_prompt: &str, history: &[Turn])
        -> Result<String, Error>;

    /// Classify whether a completed turn is a notable red/green moment
    async fn classify_turn(&self, question: &str, answer: &str) -> Result<String, Error>;
}
