//! Centralized constants
//!
//! Tuning values shared across crates live here so the pipeline and agent
//! defaults cannot drift apart.

/// Audio capture constants
pub mod audio {
    /// Target sample rate for capture and transcription
    pub const SAMPLE_RATE: u32 = 16_000;

    /// Frame size in milliseconds
    pub const FRAME_MS: u32 = 20;

    /// Maximum buffered turn length in seconds
    pub const MAX_TURN_SECONDS: u64 = 120;
}

/// Pause detection constants
pub mod detector {
    /// Energy above this (dBFS) counts as speech
    pub const SPEECH_THRESHOLD_DB: f32 = -42.0;

    /// Continuous speech needed before a turn is considered started
    pub const MIN_SPEECH_MS: u64 = 250;

    /// Grace period of silence before pause progress starts counting
    pub const SILENCE_DELAY_MS: u64 = 400;

    /// Unbroken silence that completes a pause
    pub const TOTAL_PAUSE_MS: u64 = 2_000;
}

/// Speech I/O boundary constants
pub mod speech {
    /// Transcription request timeout in seconds
    pub const STT_TIMEOUT_SECS: u64 = 30;

    /// Synthesis request timeout in seconds
    pub const TTS_TIMEOUT_SECS: u64 = 30;
}

/// Evaluation and decision constants
pub mod decision {
    /// Evaluation request timeout in seconds
    pub const EVAL_TIMEOUT_SECS: u64 = 45;

    /// Total score at or above this advances the candidate
    pub const ADVANCE_THRESHOLD: f32 = 0.7;

    /// Total score at or above this (but below advance) holds for review
    pub const HOLD_THRESHOLD: f32 = 0.4;

    /// Fit assessments run once at least this many turns have been answered
    pub const MIN_TURNS_FOR_FIT: usize = 2;

    /// Answers shorter than this many words are never flag candidates
    pub const MIN_FLAG_WORDS: usize = 12;
}
