//! Interview turn orchestrator
//!
//! One orchestrator exists per interview session and owns the single mutable
//! session state. It consumes pause-detector events and speech I/O results,
//! sequences ask -> listen -> evaluate -> decide, and finalizes the scored
//! decision exactly once.
//!
//! Lock discipline: session state sits behind a `parking_lot::Mutex` that is
//! never held across an await point; the at-most-one-evaluation invariant is
//! an atomic guard checked before the pause-complete handler runs.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::broadcast;

use interview_config::constants::decision::MIN_TURNS_FOR_FIT;
use interview_config::Settings;
use interview_core::{
    AudioFrame, AudioSink, EvaluationBackend, FinalDecision, FitStatus, InterviewPhase,
    InterviewSession, InterviewTemplate, Question, SampleRate, SpeakingKind, SpeechSynthesis,
    SpeechToText, Turn,
};
use interview_persistence::SessionStore;
use interview_pipeline::{DetectorConfig, DetectorEvent, PauseDetector, TurnBuffer};

use crate::evaluator::{follow_up_prompt, parse_evaluation, parse_fit, should_follow_up};
use crate::flags::FlagDetector;
use crate::scoring::ScoreAggregator;
use crate::AgentError;

/// Orchestrator configuration
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Pause detector tuning
    pub detector: DetectorConfig,
    /// Capture sample rate
    pub sample_rate: SampleRate,
    /// Maximum buffered turn length
    pub max_turn_duration: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        use interview_config::constants::audio::MAX_TURN_SECONDS;

        Self {
            detector: DetectorConfig::default(),
            sample_rate: SampleRate::Hz16000,
            max_turn_duration: Duration::from_secs(MAX_TURN_SECONDS),
        }
    }
}

impl OrchestratorConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            detector: DetectorConfig::from(&settings.detector),
            ..Default::default()
        }
    }
}

/// Events emitted over the session's broadcast channel
#[derive(Debug, Clone)]
pub enum InterviewEvent {
    PhaseChanged {
        from: InterviewPhase,
        to: InterviewPhase,
    },
    /// Agent speech started
    QuestionAsked { kind: SpeakingKind, text: String },
    /// Pause accumulation progress, 0.0..=1.0
    PauseProgress { progress: f32 },
    /// Candidate resumed speaking before the pause completed
    SpeechResumed,
    /// Transcript captured for the current turn
    AnswerCaptured { text: String },
    /// The captured answer was scored
    AnswerEvaluated { score: f32, needs_followup: bool },
    /// Periodic fit classification (dynamic mode)
    FitAssessed { status: FitStatus, confidence: f32 },
    /// The session began its graceful wind-down
    WindingDown,
    /// Final decision reached
    Completed { decision: FinalDecision },
    /// Non-fatal error surfaced to the transport
    Error { message: String, retryable: bool },
}

/// What the session does next after an answer is processed
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TurnAction {
    /// Ask a follow-up on the current question
    Followup { prompt: String },
    /// Move on to the next question
    NextQuestion {
        prompt: String,
        #[serde(skip)]
        kind: SpeakingKind,
    },
    /// The interview is over
    Complete { decision: FinalDecision },
}

/// Resets the processing guard when the handler exits, on every path
struct ProcessingGuard<'a>(&'a AtomicBool);

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Turn orchestrator for a single interview session
pub struct InterviewOrchestrator {
    config: OrchestratorConfig,
    template: Arc<InterviewTemplate>,
    session: Mutex<InterviewSession>,
    /// The question currently on the floor
    current: Mutex<Question>,
    detector: PauseDetector,
    buffer: Mutex<TurnBuffer>,
    stt: Arc<dyn SpeechToText>,
    tts: Arc<dyn SpeechSynthesis>,
    sink: Arc<dyn AudioSink>,
    evaluator: Arc<dyn EvaluationBackend>,
    store: Arc<dyn SessionStore>,
    scores: Mutex<ScoreAggregator>,
    flags: FlagDetector,
    event_tx: broadcast::Sender<InterviewEvent>,
    /// At-most-one evaluation in flight
    processing: AtomicBool,
}

impl InterviewOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        template: InterviewTemplate,
        config: OrchestratorConfig,
        stt: Arc<dyn SpeechToText>,
        tts: Arc<dyn SpeechSynthesis>,
        sink: Arc<dyn AudioSink>,
        evaluator: Arc<dyn EvaluationBackend>,
        store: Arc<dyn SessionStore>,
    ) -> Arc<Self> {
        let session = InterviewSession::new(template.mode());
        // Template validation guarantees at least one question
        let current = template
            .question_at(0)
            .cloned()
            .expect("validated template has a first question");

        let (event_tx, _) = broadcast::channel(256);
        let flags = FlagDetector::new(evaluator.clone(), store.clone());
        let buffer = TurnBuffer::new(config.sample_rate, config.max_turn_duration);

        Arc::new(Self {
            detector: PauseDetector::new(config.detector.clone()),
            config,
            template: Arc::new(template),
            session: Mutex::new(session),
            current: Mutex::new(current),
            buffer: Mutex::new(buffer),
            stt,
            tts,
            sink,
            evaluator,
            store,
            scores: Mutex::new(ScoreAggregator::new()),
            flags,
            event_tx,
            processing: AtomicBool::new(false),
        })
    }

    /// Session id
    pub fn id(&self) -> uuid::Uuid {
        self.session.lock().id
    }

    /// Orchestrator configuration
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Current phase
    pub fn phase(&self) -> InterviewPhase {
        self.session.lock().phase
    }

    /// Read-only session snapshot
    pub fn snapshot(&self) -> InterviewSession {
        self.session.lock().clone()
    }

    /// Subscribe to session events
    pub fn subscribe(&self) -> broadcast::Receiver<InterviewEvent> {
        self.event_tx.subscribe()
    }

    /// The persisted decision, if the session has completed
    pub async fn decision(&self) -> Option<FinalDecision> {
        let id = self.id();
        self.store.load_decision(id).await.ok().flatten()
    }

    fn emit(&self, event: InterviewEvent) {
        let _ = self.event_tx.send(event);
    }

    /// Apply a phase transition and announce it
    fn set_phase(&self, target: InterviewPhase) -> Result<(), AgentError> {
        let (from, to) = {
            let mut session = self.session.lock();
            let from = session.phase;
            session.transition_to(target)?;
            (from, session.phase)
        };
        if from != to {
            self.emit(InterviewEvent::PhaseChanged { from, to });
        }
        Ok(())
    }

    /// Begin the session: transport setup, then wait for candidate media
    pub async fn start(&self) -> Result<(), AgentError> {
        self.set_phase(InterviewPhase::Connecting)?;
        self.set_phase(InterviewPhase::WaitingForMedia)?;
        let snapshot = self.snapshot();
        if let Err(e) = self.store.save_session(&snapshot).await {
            tracing::warn!(session_id = %snapshot.id, error = %e, "Failed to persist session snapshot");
        }
        Ok(())
    }

    /// Candidate media arrived: ask the first question and open the floor
    pub async fn media_ready(&self) -> Result<(), AgentError> {
        let prompt = self.current.lock().prompt.clone();
        self.session.lock().history.push(Turn::agent(&prompt));
        self.speak(SpeakingKind::Question, &prompt).await;
        Ok(())
    }

    /// Feed one captured audio frame through the detector
    ///
    /// The per-frame path never blocks: reactions to detector events are
    /// either cheap state flips or spawned tasks.
    pub fn process_audio(self: &Arc<Self>, frame: &AudioFrame) -> Result<(), AgentError> {
        let phase = self.phase();
        if phase.is_terminal() || phase == InterviewPhase::NotStarted {
            return Ok(());
        }

        // Frames are buffered even while detection is gated off, so the
        // capture stream stays contiguous across agent playback.
        if let Err(e) = self.buffer.lock().push(frame) {
            tracing::warn!(error = %e, "Dropping frame the buffer rejected");
            return Ok(());
        }

        let (_, events) = self.detector.process_frame(frame)?;

        for event in events {
            match event {
                DetectorEvent::SpeechConfirmed => {}
                DetectorEvent::SilenceStarted => {
                    if self.phase() == InterviewPhase::Listening {
                        let _ = self.set_phase(InterviewPhase::DetectingPause);
                    }
                }
                DetectorEvent::SpeechResumed => {
                    if self.phase() == InterviewPhase::DetectingPause {
                        let _ = self.set_phase(InterviewPhase::Listening);
                    }
                    self.emit(InterviewEvent::SpeechResumed);
                }
                DetectorEvent::PauseProgress(progress) => {
                    self.emit(InterviewEvent::PauseProgress { progress });
                }
                DetectorEvent::PauseComplete => {
                    let this = Arc::clone(self);
                    tokio::spawn(async move {
                        this.handle_turn().await;
                    });
                }
            }
        }

        Ok(())
    }

    /// Handle a completed pause: transcribe, evaluate, decide, speak
    ///
    /// Guarded so that a doubled pause-complete trigger produces exactly one
    /// evaluation and one turn record.
    async fn handle_turn(self: Arc<Self>) {
        if self
            .processing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!(session_id = %self.id(), "Ignoring pause-complete while already processing");
            return;
        }
        let _guard = ProcessingGuard(&self.processing);

        if self.set_phase(InterviewPhase::Processing).is_err() {
            return;
        }

        let wav = {
            let mut buffer = self.buffer.lock();
            if buffer.is_empty() {
                None
            } else {
                Some(buffer.take_wav())
            }
        };

        let wav = match wav {
            Some(Ok(wav)) => wav,
            Some(Err(e)) => {
                tracing::warn!(session_id = %self.id(), error = %e, "Turn encoding failed");
                self.report_error(&e.to_string(), true);
                self.open_listening();
                return;
            }
            None => {
                tracing::debug!(session_id = %self.id(), "Nothing buffered, reopening listening");
                self.open_listening();
                return;
            }
        };

        let transcript = match self.stt.transcribe(wav).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(session_id = %self.id(), error = %e, "Transcription failed");
                self.report_error("transcription failed, listening again", true);
                self.open_listening();
                return;
            }
        };

        // A silent clip is a valid response: reopen the floor without
        // recording a turn or consuming a follow-up slot.
        if transcript.trim().is_empty() {
            tracing::debug!(session_id = %self.id(), "Empty transcript, reopening listening");
            self.open_listening();
            return;
        }

        self.emit(InterviewEvent::AnswerCaptured {
            text: transcript.trim().to_string(),
        });

        match self.process_answer(transcript).await {
            Ok(action) => self.enact(action).await,
            Err(e) => {
                tracing::warn!(session_id = %self.id(), error = %e, "Turn processing failed");
                self.report_error("evaluation failed, listening again", e.is_retryable());
                self.open_listening();
            }
        }
    }

    /// Evaluate one non-empty answer and decide what happens next
    ///
    /// Shared by the audio path and the text turn-submission API. Appends
    /// the candidate turn, accumulates the score, kicks off flag detection,
    /// runs the fit check, and resolves the follow-up/advance policy.
    pub async fn process_answer(&self, answer: String) -> Result<TurnAction, AgentError> {
        let answer = answer.trim().to_string();
        if answer.is_empty() {
            return Err(AgentError::EmptyAnswer);
        }

        let (session_id, history) = {
            let session = self.session.lock();
            if session.phase.is_terminal() {
                return Err(AgentError::Session("session already completed".to_string()));
            }
            (session.id, session.history.clone())
        };
        let question = self.current.lock().clone();

        let started = Instant::now();
        let raw = self
            .evaluator
            .evaluate_answer(&self.template.system_prompt, &question.prompt, &answer, &history)
            .await
            .map_err(AgentError::from)?;
        metrics::histogram!("interview_evaluation_seconds").record(started.elapsed().as_secs_f64());

        let eval = parse_evaluation(&raw);
        self.emit(InterviewEvent::AnswerEvaluated {
            score: eval.score,
            needs_followup: eval.needs_followup,
        });
        tracing::info!(
            session_id = %session_id,
            question_id = %question.id,
            score = eval.score,
            band = interview_core::score_band(eval.score),
            needs_followup = eval.needs_followup,
            "Answer evaluated"
        );

        let (turn_index, followups_used) = {
            let mut session = self.session.lock();
            session
                .history
                .push(Turn::candidate(&answer).with_evaluation(eval.clone()));
            (session.history.len() - 1, session.followups_used)
        };

        // Rubric weight is fixed at the signal's first observation; questions
        // without a rubric score under a default overall signal.
        let (signal, weight) = question
            .rubric
            .as_ref()
            .map(|r| (r.signal.clone(), r.weight))
            .unwrap_or_else(|| ("overall".to_string(), 1.0));
        self.scores.lock().add_score(&signal, eval.score, weight);
        metrics::counter!("interview_turns_total").increment(1);

        // Side channel, never on the turn-taking path
        self.flags
            .inspect(session_id, turn_index, question.prompt.clone(), answer.clone());

        self.maybe_assess_fit().await;

        let snapshot = self.snapshot();
        if let Err(e) = self.store.save_session(&snapshot).await {
            tracing::warn!(session_id = %session_id, error = %e, "Failed to persist session snapshot");
        }

        let max_followups = self.template.policies.max_followups_per_question;
        if should_follow_up(&eval, followups_used, max_followups) {
            if let Some(prompt) = follow_up_prompt(&question, eval.followup_reason.as_deref()) {
                let prompt = prompt.to_string();
                let mut session = self.session.lock();
                session.followups_used += 1;
                session.history.push(Turn::agent(&prompt));
                return Ok(TurnAction::Followup { prompt });
            }
            // No follow-up configured for this question: fall through to advance
        }

        self.advance().await
    }

    /// Move to the next question, generate one, or complete
    async fn advance(&self) -> Result<TurnAction, AgentError> {
        if self.session.lock().winding_down {
            return self.next_exit_or_complete().await;
        }

        let next = self.session.lock().question_index + 1;

        if let Some(question) = self.template.question_at(next) {
            let prompt = question.prompt.clone();
            *self.current.lock() = question.clone();
            let mut session = self.session.lock();
            session.question_index = next;
            session.followups_used = 0;
            session.history.push(Turn::agent(&prompt));
            return Ok(TurnAction::NextQuestion {
                prompt,
                kind: SpeakingKind::Question,
            });
        }

        let is_dynamic = self.session.lock().mode == interview_core::InterviewMode::Dynamic;
        if is_dynamic {
            if next >= self.template.policies.max_questions {
                self.begin_winding_down("question budget reached");
                return self.next_exit_or_complete().await;
            }

            let history = self.session.lock().history.clone();
            match self
                .evaluator
                .next_question(&self.template.system_prompt, &history)
                .await
            {
                Ok(text) => {
                    let text = text.trim().to_string();
                    if !text.is_empty() {
                        let question = Question {
                            id: format!("dyn-{}", next),
                            prompt: text.clone(),
                            followups: Vec::new(),
                            rubric: None,
                        };
                        *self.current.lock() = question;
                        let mut session = self.session.lock();
                        session.question_index = next;
                        session.followups_used = 0;
                        session.history.push(Turn::agent(&text));
                        return Ok(TurnAction::NextQuestion {
                            prompt: text,
                            kind: SpeakingKind::Question,
                        });
                    }
                    self.begin_winding_down("question generation returned nothing");
                    self.next_exit_or_complete().await
                }
                Err(e) => {
                    tracing::warn!(session_id = %self.id(), error = %e, "Question generation failed, winding down");
                    self.begin_winding_down("question generation failed");
                    self.next_exit_or_complete().await
                }
            }
        } else {
            let decision = self.complete().await;
            Ok(TurnAction::Complete { decision })
        }
    }

    fn begin_winding_down(&self, reason: &str) {
        let mut session = self.session.lock();
        if !session.winding_down {
            session.winding_down = true;
            drop(session);
            tracing::info!(session_id = %self.id(), reason, "Winding down");
            self.emit(InterviewEvent::WindingDown);
        }
    }

    /// Ask the next wind-down exit question, or complete if the budget is spent
    async fn next_exit_or_complete(&self) -> Result<TurnAction, AgentError> {
        let budget = self.template.policies.winding_down_questions;
        let index = self.session.lock().exit_questions_asked;

        if index < budget {
            if let Some(question) = self.template.exit_question_at(index) {
                let prompt = question.prompt.clone();
                *self.current.lock() = question.clone();
                let mut session = self.session.lock();
                session.exit_questions_asked = index + 1;
                session.followups_used = 0;
                session.history.push(Turn::agent(&prompt));
                return Ok(TurnAction::NextQuestion {
                    prompt,
                    kind: SpeakingKind::Exit,
                });
            }
        }

        let decision = self.complete().await;
        Ok(TurnAction::Complete { decision })
    }

    /// Run the periodic fit check for dynamic sessions
    ///
    /// Failures are logged and skipped; a fit check must never take down a
    /// turn that already evaluated cleanly.
    async fn maybe_assess_fit(&self) {
        let (due, history) = {
            let session = self.session.lock();
            let due = session.mode == interview_core::InterviewMode::Dynamic
                && !session.winding_down
                && session.answered_turns() >= MIN_TURNS_FOR_FIT;
            (due, session.history.clone())
        };
        if !due {
            return;
        }
        let Some(criteria) = self.template.fit_criteria().map(str::to_string) else {
            return;
        };

        let raw = match self.evaluator.assess_fit(&criteria, &history).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(session_id = %self.id(), error = %e, "Fit assessment failed, skipping");
                return;
            }
        };

        let fit = parse_fit(&raw);
        self.emit(InterviewEvent::FitAssessed {
            status: fit.status,
            confidence: fit.confidence,
        });

        let threshold = self.template.policies.early_exit_confidence;
        self.session.lock().fit_status = fit.status;
        if fit.warrants_early_exit(threshold) {
            self.begin_winding_down("confident not-fit assessment");
        }
    }

    /// Finalize the session. Idempotent: the first persisted decision wins
    /// and later invocations return it unchanged.
    pub async fn complete(&self) -> FinalDecision {
        let session_id = self.id();

        if let Ok(Some(existing)) = self.store.load_decision(session_id).await {
            let _ = self.set_phase(InterviewPhase::Completed);
            return existing;
        }

        let decision = self.scores.lock().build_decision(session_id);

        let decision = match self.store.record_decision(decision.clone()).await {
            Ok(stored) => stored,
            Err(e) => {
                // The candidate-facing flow is never blocked on finalization:
                // complete anyway and mark the decision as the fallback copy.
                tracing::error!(session_id = %session_id, error = %e, "Failed to persist decision");
                let mut fallback = decision;
                fallback.neutral_fallback = true;
                fallback
            }
        };

        let _ = self.set_phase(InterviewPhase::Completed);
        metrics::counter!("interview_decisions_total", "decision" => decision.decision.as_str())
            .increment(1);

        let snapshot = self.snapshot();
        if let Err(e) = self.store.save_session(&snapshot).await {
            tracing::warn!(session_id = %session_id, error = %e, "Failed to persist final snapshot");
        }

        tracing::info!(
            session_id = %session_id,
            decision = %decision.decision,
            score = decision.total_score,
            "Interview completed"
        );
        self.emit(InterviewEvent::Completed {
            decision: decision.clone(),
        });

        decision
    }

    /// Text-transport entry point implementing the turn submission contract
    ///
    /// The caller did its own capture and transcription; the same guard,
    /// policy, and scoring path runs as for the audio flow.
    pub async fn submit_answer(&self, answer: String) -> Result<TurnAction, AgentError> {
        if self
            .processing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(AgentError::Session(
                "an evaluation is already in flight".to_string(),
            ));
        }
        let _guard = ProcessingGuard(&self.processing);

        self.process_answer(answer).await
    }

    /// Speak the prompts an action calls for (audio transport only)
    async fn enact(&self, action: TurnAction) {
        match action {
            TurnAction::Followup { prompt } => {
                self.speak(SpeakingKind::Followup, &prompt).await;
            }
            TurnAction::NextQuestion { prompt, kind } => {
                self.speak(kind, &prompt).await;
            }
            TurnAction::Complete { .. } => {}
        }
    }

    /// Synthesize and play agent speech, then reopen the floor
    ///
    /// Detection stays disabled for the whole speaking phase and is
    /// re-enabled only once playback has finished, so the system never
    /// interrupts or answers itself.
    async fn speak(&self, kind: SpeakingKind, text: &str) {
        self.detector.set_enabled(false);
        if self.set_phase(InterviewPhase::Speaking).is_err() {
            return;
        }
        self.session.lock().speaking = Some(kind);
        self.emit(InterviewEvent::QuestionAsked {
            kind,
            text: text.to_string(),
        });

        match self.tts.synthesize(text, &self.template.voice).await {
            Ok(clip) => {
                if let Err(e) = self.sink.play(clip).await {
                    tracing::warn!(session_id = %self.id(), error = %e, "Playback failed");
                    self.report_error("audio playback failed", true);
                }
            }
            Err(e) => {
                tracing::warn!(session_id = %self.id(), error = %e, "Synthesis failed");
                self.report_error("speech synthesis failed", true);
            }
        }

        self.open_listening();
    }

    /// Reset per-turn state and return to listening with detection enabled
    fn open_listening(&self) {
        self.buffer.lock().clear();
        self.detector.reset_turn();
        self.detector.set_enabled(true);
        let _ = self.set_phase(InterviewPhase::Listening);
    }

    /// Surface a candidate-safe error; raw internals stay in the logs
    fn report_error(&self, message: &str, retryable: bool) {
        self.emit(InterviewEvent::Error {
            message: message.to_string(),
            retryable,
        });
    }
}
