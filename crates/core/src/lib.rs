//! Core traits and types for the interview agent
//!
//! This crate provides foundational types used across all other crates:
//! - Audio frame types and energy computation
//! - Interview session, phase, and turn types
//! - Question template types with load-time validation
//! - Trait seams for pluggable backends (STT, TTS, playback, evaluation)
//! - Error types

pub mod audio;
pub mod decision;
pub mod error;
pub mod flag;
pub mod session;
pub mod template;
pub mod traits;
pub mod turn;

pub use audio::{AudioFrame, Channels, SampleRate};
pub use decision::{Decision, FinalDecision, SignalBreakdown};
pub use error::{Error, Result};
pub use flag::{Flag, FlagKind};
pub use session::{FitStatus, InterviewMode, InterviewPhase, InterviewSession, SpeakingKind};
pub use template::{
    FollowUp, InterviewTemplate, Question, QuestionSource, Rubric, TemplateError,
    TemplatePolicies, VoiceSettings,
};
pub use traits::{
    AudioSink, EvaluationBackend, SpeechSynthesis, SpeechToText, SynthesizedClip,
};
pub use turn::{score_band, AnswerEvaluation, FitAssessment, Turn, TurnSpeaker};
