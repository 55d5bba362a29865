//! Energy-based pause detection
//!
//! Classifies frames as speech/silence by RMS energy and times the pause
//! that ends a turn. Two policies run simultaneously:
//!
//! - Speech confirmation: speech counts as real only after `min_speech_ms`
//!   of continuous above-threshold energy, so clicks and hiss never open a
//!   turn.
//! - Pause detection: once speech is confirmed, sub-threshold energy starts
//!   a silence clock. The first `silence_delay_ms` are a grace period;
//!   progress is then reported linearly until `total_pause_ms` of unbroken
//!   silence completes the pause, exactly once per turn. Any speech
//!   resumption before completion cancels the pending pause and resets
//!   progress to zero, no matter how close to completion it was.
//!
//! Durations accumulate from frame lengths rather than wall-clock reads, so
//! the per-frame path takes one lock and no syscalls.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use interview_config::DetectorSettings;
use interview_core::AudioFrame;

use crate::PipelineError;

/// Detector configuration
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// Energy at or above this (dBFS) counts as speech
    pub speech_threshold_db: f32,
    /// Continuous speech needed to confirm a turn has started
    pub min_speech_ms: u64,
    /// Silence grace period before pause progress starts counting
    pub silence_delay_ms: u64,
    /// Unbroken silence that completes a pause
    pub total_pause_ms: u64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        use interview_config::constants::detector::{
            MIN_SPEECH_MS, SILENCE_DELAY_MS, SPEECH_THRESHOLD_DB, TOTAL_PAUSE_MS,
        };

        Self {
            speech_threshold_db: SPEECH_THRESHOLD_DB,
            min_speech_ms: MIN_SPEECH_MS,
            silence_delay_ms: SILENCE_DELAY_MS,
            total_pause_ms: TOTAL_PAUSE_MS,
        }
    }
}

impl From<&DetectorSettings> for DetectorConfig {
    fn from(settings: &DetectorSettings) -> Self {
        Self {
            speech_threshold_db: settings.speech_threshold_db,
            min_speech_ms: settings.min_speech_ms,
            silence_delay_ms: settings.silence_delay_ms,
            total_pause_ms: settings.total_pause_ms,
        }
    }
}

/// Detector state machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DetectorState {
    /// No speech this turn yet
    #[default]
    Silence,
    /// Above-threshold energy, not yet confirmed as speech
    SpeechPending,
    /// Confirmed speech in progress
    Speech,
    /// Speech went quiet; pause accumulation running
    Pausing,
}

/// Events emitted while processing frames
#[derive(Debug, Clone, PartialEq)]
pub enum DetectorEvent {
    /// Enough continuous speech to open the turn
    SpeechConfirmed,
    /// Confirmed speech dropped below threshold
    SilenceStarted,
    /// Speech returned before the pause completed; progress reset to zero
    SpeechResumed,
    /// Linear progress toward pause completion, 0.0..=1.0
    PauseProgress(f32),
    /// The turn-ending pause. Fires at most once per turn.
    PauseComplete,
}

/// Mutable state, consolidated behind a single lock
struct DetectorMutableState {
    state: DetectorState,
    /// Continuous above-threshold milliseconds while pending
    speech_ms: u64,
    /// Continuous sub-threshold milliseconds while pausing
    silence_ms: u64,
    /// Pause already completed this turn
    pause_fired: bool,
}

/// Energy-based pause detector
pub struct PauseDetector {
    config: DetectorConfig,
    /// Detection gate; the orchestrator closes it while agent audio plays
    enabled: AtomicBool,
    mutable: Mutex<DetectorMutableState>,
}

impl PauseDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self {
            config,
            enabled: AtomicBool::new(true),
            mutable: Mutex::new(DetectorMutableState {
                state: DetectorState::Silence,
                speech_ms: 0,
                silence_ms: 0,
                pause_fired: false,
            }),
        }
    }

    /// Process one audio frame
    ///
    /// Returns the state after the frame plus any events it produced. While
    /// detection is disabled, frames produce no events and no state change;
    /// callers keep buffering audio independently of this gate.
    pub fn process_frame(
        &self,
        frame: &AudioFrame,
    ) -> Result<(DetectorState, Vec<DetectorEvent>), PipelineError> {
        if !self.is_enabled() {
            return Ok((self.state(), Vec::new()));
        }

        let frame_ms = frame.duration_ms();
        if frame_ms == 0 {
            return Err(PipelineError::Vad("zero-length frame".to_string()));
        }

        let is_speech = frame.energy_db >= self.config.speech_threshold_db;

        let mut inner = self.mutable.lock();
        let mut events = Vec::new();

        match (inner.state, is_speech) {
            (DetectorState::Silence, true) => {
                inner.state = DetectorState::SpeechPending;
                inner.speech_ms = frame_ms;
                self.confirm_if_ready(&mut inner, &mut events);
            }

            (DetectorState::Silence, false) => {}

            (DetectorState::SpeechPending, true) => {
                inner.speech_ms += frame_ms;
                self.confirm_if_ready(&mut inner, &mut events);
            }

            // Unconfirmed speech that stops was a click or noise burst
            (DetectorState::SpeechPending, false) => {
                inner.state = DetectorState::Silence;
                inner.speech_ms = 0;
            }

            (DetectorState::Speech, true) => {}

            (DetectorState::Speech, false) => {
                inner.state = DetectorState::Pausing;
                inner.silence_ms = frame_ms;
                events.push(DetectorEvent::SilenceStarted);
                self.accumulate_pause(&mut inner, &mut events);
            }

            // Tie-break: any resumption cancels a not-yet-complete pause
            (DetectorState::Pausing, true) => {
                inner.state = DetectorState::Speech;
                inner.silence_ms = 0;
                if !inner.pause_fired {
                    events.push(DetectorEvent::SpeechResumed);
                }
            }

            (DetectorState::Pausing, false) => {
                inner.silence_ms += frame_ms;
                self.accumulate_pause(&mut inner, &mut events);
            }
        }

        Ok((inner.state, events))
    }

    fn confirm_if_ready(&self, inner: &mut DetectorMutableState, events: &mut Vec<DetectorEvent>) {
        if inner.speech_ms >= self.config.min_speech_ms {
            inner.state = DetectorState::Speech;
            events.push(DetectorEvent::SpeechConfirmed);
        }
    }

    fn accumulate_pause(&self, inner: &mut DetectorMutableState, events: &mut Vec<DetectorEvent>) {
        if inner.pause_fired {
            return;
        }

        if inner.silence_ms > self.config.silence_delay_ms {
            let window = self
                .config
                .total_pause_ms
                .saturating_sub(self.config.silence_delay_ms)
                .max(1);
            let counted = inner.silence_ms - self.config.silence_delay_ms;
            let progress = (counted as f32 / window as f32).min(1.0);
            events.push(DetectorEvent::PauseProgress(progress));
        }

        if inner.silence_ms >= self.config.total_pause_ms {
            inner.pause_fired = true;
            events.push(DetectorEvent::PauseComplete);
        }
    }

    /// Reset for the next turn
    pub fn reset_turn(&self) {
        let mut inner = self.mutable.lock();
        inner.state = DetectorState::Silence;
        inner.speech_ms = 0;
        inner.silence_ms = 0;
        inner.pause_fired = false;
    }

    /// Gate detection on or off. Off while agent audio is playing, so the
    /// system never answers itself.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Current state
    pub fn state(&self) -> DetectorState {
        self.mutable.lock().state
    }
}
