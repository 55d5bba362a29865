//! Integration tests for the interview turn flow
//!
//! These drive the orchestrator end-to-end over mock speech and evaluation
//! backends, covering the follow-up policy, the empty-transcript path, the
//! reentrancy guard, graceful exit, and idempotent completion.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::timeout;

use interview_agent::{InterviewEvent, InterviewOrchestrator, OrchestratorConfig, TurnAction};
use interview_core::{
    AudioFrame, AudioSink, Channels, Decision, Error, EvaluationBackend, FitStatus,
    InterviewPhase, InterviewTemplate, SampleRate, SpeechSynthesis, SpeechToText,
    SynthesizedClip, Turn, TurnSpeaker, VoiceSettings,
};
use interview_persistence::{MemoryStore, SessionStore};
use interview_pipeline::DetectorConfig;

// ---------------------------------------------------------------------------
// Mock backends
// ---------------------------------------------------------------------------

struct MockStt {
    responses: Mutex<VecDeque<String>>,
}

impl MockStt {
    fn with_responses(responses: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.iter().map(|s| s.to_string()).collect()),
        })
    }
}

#[async_trait]
impl SpeechToText for MockStt {
    async fn transcribe(&self, _wav: Vec<u8>) -> Result<String, Error> {
        Ok(self
            .responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| "I shipped the project end to end".to_string()))
    }
}

struct MockTts;

#[async_trait]
impl SpeechSynthesis for MockTts {
    async fn synthesize(
        &self,
        _text: &str,
        _voice: &VoiceSettings,
    ) -> Result<SynthesizedClip, Error> {
        Ok(SynthesizedClip {
            audio: vec![0u8; 44],
            duration_ms: Some(10),
        })
    }
}

struct MockSink;

#[async_trait]
impl AudioSink for MockSink {
    async fn play(&self, _clip: SynthesizedClip) -> Result<(), Error> {
        Ok(())
    }
}

#[derive(Default)]
struct MockEvaluator {
    eval_calls: AtomicUsize,
    eval_responses: Mutex<VecDeque<String>>,
    fit_responses: Mutex<VecDeque<String>>,
    eval_delay: Option<Duration>,
}

impl MockEvaluator {
    fn scoring(responses: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            eval_responses: Mutex::new(responses.iter().map(|s| s.to_string()).collect()),
            ..Default::default()
        })
    }

    fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            eval_delay: Some(delay),
            ..Default::default()
        })
    }

    fn with_fits(self: Arc<Self>, fits: &[&str]) -> Arc<Self> {
        *self.fit_responses.lock() = fits.iter().map(|s| s.to_string()).collect();
        self
    }
}

const GOOD_ANSWER: &str = r#"{"score": 0.8, "reasoning": "specific", "needs_followup": false}"#;

#[async_trait]
impl EvaluationBackend for MockEvaluator {
    async fn evaluate_answer(
        &self,
        _system_prompt: &str,
        _question: &str,
        _answer: &str,
        _history: &[Turn],
    ) -> Result<String, Error> {
        self.eval_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.eval_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self
            .eval_responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| GOOD_ANSWER.to_string()))
    }

    async fn assess_fit(&self, _criteria: &str, _history: &[Turn]) -> Result<String, Error> {
        Ok(self
            .fit_responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| r#"{"status": "uncertain", "confidence": 0.3}"#.to_string()))
    }

    async fn next_question(
        &self,
        _system_prompt: &str,
        _history: &[Turn],
    ) -> Result<String, Error> {
        Ok("What would you do differently next time?".to_string())
    }

    async fn classify_turn(&self, _question: &str, _answer: &str) -> Result<String, Error> {
        Ok(r#"{"flag": "neutral"}"#.to_string())
    }
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

fn scripted_template(max_followups: u32) -> InterviewTemplate {
    InterviewTemplate::from_json(&format!(
        r#"{{
            "system_prompt": "Interviewing for a backend role.",
            "questions": [
                {{
                    "id": "q1",
                    "prompt": "Tell me about a system you designed.",
                    "followups": [
                        {{"condition": "lacks detail", "prompt": "What were the numbers?"}}
                    ],
                    "rubric": {{"signal": "system_design", "weight": 1.0}}
                }},
                {{
                    "id": "q2",
                    "prompt": "How do you handle incidents?",
                    "rubric": {{"signal": "operations", "weight": 0.5}}
                }}
            ],
            "policies": {{"max_followups_per_question": {max_followups}}}
        }}"#
    ))
    .unwrap()
}

fn dynamic_template() -> InterviewTemplate {
    InterviewTemplate::from_json(
        r#"{
            "system_prompt": "Screening for a platform team.",
            "dynamic_mode": true,
            "screening_questions": [
                {"id": "s1", "prompt": "Walk me through your background."},
                {"id": "s2", "prompt": "What stack have you run in production?"}
            ],
            "exit_questions": [
                {"id": "e1", "prompt": "What are you looking for next?"},
                {"id": "e2", "prompt": "Any questions for us?"}
            ],
            "fit_criteria": "5+ years of distributed systems work",
            "policies": {"winding_down_questions": 1}
        }"#,
    )
    .unwrap()
}

fn fast_detector() -> DetectorConfig {
    DetectorConfig {
        speech_threshold_db: -42.0,
        min_speech_ms: 40,
        silence_delay_ms: 40,
        total_pause_ms: 200,
    }
}

fn orchestrator_with(
    template: InterviewTemplate,
    stt: Arc<dyn SpeechToText>,
    evaluator: Arc<dyn EvaluationBackend>,
    store: Arc<MemoryStore>,
) -> Arc<InterviewOrchestrator> {
    let config = OrchestratorConfig {
        detector: fast_detector(),
        sample_rate: SampleRate::Hz16000,
        max_turn_duration: Duration::from_secs(30),
    };
    InterviewOrchestrator::new(
        template,
        config,
        stt,
        Arc::new(MockTts),
        Arc::new(MockSink),
        evaluator,
        store,
    )
}

fn speech_frame(seq: u64) -> AudioFrame {
    AudioFrame::new(vec![0.3; 320], SampleRate::Hz16000, Channels::Mono, seq)
}

fn silence_frame(seq: u64) -> AudioFrame {
    AudioFrame::new(vec![0.0; 320], SampleRate::Hz16000, Channels::Mono, seq)
}

async fn wait_for_phase(
    rx: &mut tokio::sync::broadcast::Receiver<InterviewEvent>,
    phase: InterviewPhase,
) {
    timeout(Duration::from_secs(2), async {
        loop {
            if let Ok(InterviewEvent::PhaseChanged { to, .. }) = rx.recv().await {
                if to == phase {
                    return;
                }
            }
        }
    })
    .await
    .expect("timed out waiting for phase");
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_scripted_flow_advances_then_completes() {
    let store = Arc::new(MemoryStore::new());
    let orchestrator = orchestrator_with(
        scripted_template(1),
        MockStt::with_responses(&[]),
        MockEvaluator::scoring(&[]),
        store.clone(),
    );

    orchestrator.start().await.unwrap();
    orchestrator.media_ready().await.unwrap();
    assert_eq!(orchestrator.phase(), InterviewPhase::Listening);

    let action = orchestrator
        .submit_answer("I designed our ingestion pipeline".to_string())
        .await
        .unwrap();
    match action {
        TurnAction::NextQuestion { ref prompt, .. } => {
            assert_eq!(prompt, "How do you handle incidents?")
        }
        other => panic!("expected next question, got {:?}", other),
    }

    let action = orchestrator
        .submit_answer("Runbooks first, then a blameless review".to_string())
        .await
        .unwrap();
    let decision = match action {
        TurnAction::Complete { decision } => decision,
        other => panic!("expected completion, got {:?}", other),
    };

    // Both answers scored 0.8: (0.8*1.0 + 0.8*0.5) / 1.5 = 0.8
    assert!((decision.total_score - 0.8).abs() < 1e-4);
    assert_eq!(decision.decision, Decision::Advance);
    assert_eq!(orchestrator.phase(), InterviewPhase::Completed);

    // Decision was persisted under the session id
    let stored = store.load_decision(orchestrator.id()).await.unwrap().unwrap();
    assert_eq!(stored.decision, Decision::Advance);
}

#[tokio::test]
async fn test_followup_cap_allows_exactly_one() {
    let needs_followup =
        r#"{"score": 0.3, "reasoning": "vague", "needs_followup": true, "followup_reason": "lacks detail"}"#;
    let orchestrator = orchestrator_with(
        scripted_template(1),
        MockStt::with_responses(&[]),
        MockEvaluator::scoring(&[needs_followup, needs_followup]),
        Arc::new(MemoryStore::new()),
    );

    orchestrator.start().await.unwrap();
    orchestrator.media_ready().await.unwrap();

    // First request is honored
    let action = orchestrator
        .submit_answer("We improved things".to_string())
        .await
        .unwrap();
    match action {
        TurnAction::Followup { ref prompt } => assert_eq!(prompt, "What were the numbers?"),
        other => panic!("expected follow-up, got {:?}", other),
    }

    // Second request exceeds the cap: the session advances regardless
    let action = orchestrator
        .submit_answer("Still pretty vague".to_string())
        .await
        .unwrap();
    assert!(matches!(action, TurnAction::NextQuestion { .. }));

    let session = orchestrator.snapshot();
    assert_eq!(session.question_index, 1);
    assert_eq!(session.followups_used, 0); // reset on advance
}

#[tokio::test]
async fn test_followup_request_without_config_advances() {
    // q2 has no follow-ups configured; a follow-up request must fall through
    let needs_followup =
        r#"{"score": 0.3, "reasoning": "vague", "needs_followup": true, "followup_reason": "x"}"#;
    let orchestrator = orchestrator_with(
        scripted_template(3),
        MockStt::with_responses(&[]),
        MockEvaluator::scoring(&[GOOD_ANSWER, needs_followup]),
        Arc::new(MemoryStore::new()),
    );

    orchestrator.start().await.unwrap();
    orchestrator.media_ready().await.unwrap();

    let action = orchestrator.submit_answer("First answer".to_string()).await.unwrap();
    assert!(matches!(action, TurnAction::NextQuestion { .. }));

    let action = orchestrator.submit_answer("Second answer".to_string()).await.unwrap();
    assert!(matches!(action, TurnAction::Complete { .. }));
}

#[tokio::test]
async fn test_at_most_one_evaluation_in_flight() {
    let evaluator = MockEvaluator::slow(Duration::from_millis(200));
    let orchestrator = orchestrator_with(
        scripted_template(1),
        MockStt::with_responses(&[]),
        evaluator.clone(),
        Arc::new(MemoryStore::new()),
    );

    orchestrator.start().await.unwrap();
    orchestrator.media_ready().await.unwrap();

    let first = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move { orchestrator.submit_answer("double trigger".to_string()).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Second submission while the first evaluation is still in flight
    let second = orchestrator.submit_answer("double trigger".to_string()).await;
    assert!(second.is_err());

    first.await.unwrap().unwrap();

    // Exactly one evaluation ran and exactly one candidate turn was recorded
    assert_eq!(evaluator.eval_calls.load(Ordering::SeqCst), 1);
    let candidate_turns = orchestrator
        .snapshot()
        .history
        .iter()
        .filter(|t| t.speaker == TurnSpeaker::Candidate)
        .count();
    assert_eq!(candidate_turns, 1);
}

#[tokio::test]
async fn test_empty_transcript_reopens_listening() {
    let store = Arc::new(MemoryStore::new());
    let evaluator = MockEvaluator::scoring(&[]);
    let orchestrator = orchestrator_with(
        scripted_template(1),
        MockStt::with_responses(&["   "]),
        evaluator.clone(),
        store,
    );

    orchestrator.start().await.unwrap();
    orchestrator.media_ready().await.unwrap();
    let mut rx = orchestrator.subscribe();

    // Speak for 100ms, then stay silent until the pause completes
    let mut seq = 0;
    for _ in 0..5 {
        seq += 1;
        orchestrator.process_audio(&speech_frame(seq)).unwrap();
    }
    for _ in 0..12 {
        seq += 1;
        orchestrator.process_audio(&silence_frame(seq)).unwrap();
    }

    wait_for_phase(&mut rx, InterviewPhase::Processing).await;
    wait_for_phase(&mut rx, InterviewPhase::Listening).await;

    // No evaluation, no candidate turn, no follow-up slot consumed
    assert_eq!(evaluator.eval_calls.load(Ordering::SeqCst), 0);
    let session = orchestrator.snapshot();
    assert_eq!(
        session
            .history
            .iter()
            .filter(|t| t.speaker == TurnSpeaker::Candidate)
            .count(),
        0
    );
    assert_eq!(session.followups_used, 0);
}

#[tokio::test]
async fn test_audio_turn_advances_to_next_question() {
    let orchestrator = orchestrator_with(
        scripted_template(1),
        MockStt::with_responses(&["I designed a sharded queue"]),
        MockEvaluator::scoring(&[]),
        Arc::new(MemoryStore::new()),
    );

    orchestrator.start().await.unwrap();
    orchestrator.media_ready().await.unwrap();
    let mut rx = orchestrator.subscribe();

    let mut seq = 0;
    for _ in 0..5 {
        seq += 1;
        orchestrator.process_audio(&speech_frame(seq)).unwrap();
    }
    for _ in 0..12 {
        seq += 1;
        orchestrator.process_audio(&silence_frame(seq)).unwrap();
    }

    // Processing, then the next question is spoken, then the floor reopens
    wait_for_phase(&mut rx, InterviewPhase::Processing).await;
    wait_for_phase(&mut rx, InterviewPhase::Speaking).await;
    wait_for_phase(&mut rx, InterviewPhase::Listening).await;

    let session = orchestrator.snapshot();
    assert_eq!(session.question_index, 1);
    assert_eq!(session.answered_turns(), 1);
}

#[tokio::test]
async fn test_graceful_exit_requires_confident_not_fit() {
    let evaluator = MockEvaluator::scoring(&[]).with_fits(&[
        // Third answer triggers the first assessment: weak NotFit, no exit
        r#"{"status": "not_fit", "confidence": 0.5}"#,
        // Confident NotFit on the next turn: wind down
        r#"{"status": "not_fit", "confidence": 0.85}"#,
    ]);
    let orchestrator = orchestrator_with(
        dynamic_template(),
        MockStt::with_responses(&[]),
        evaluator,
        Arc::new(MemoryStore::new()),
    );

    orchestrator.start().await.unwrap();
    orchestrator.media_ready().await.unwrap();

    // Two screening answers; the second triggers the weak NotFit assessment
    let action = orchestrator.submit_answer("Background answer".to_string()).await.unwrap();
    assert!(matches!(action, TurnAction::NextQuestion { .. }));
    let action = orchestrator.submit_answer("Stack answer".to_string()).await.unwrap();

    // A single weak NotFit must not end the interview
    assert!(!orchestrator.snapshot().winding_down);
    assert!(matches!(action, TurnAction::NextQuestion { .. }));

    // Confident NotFit: winding down, one exit question per policy
    let action = orchestrator.submit_answer("Generated answer".to_string()).await.unwrap();
    assert!(orchestrator.snapshot().winding_down);
    assert_eq!(orchestrator.snapshot().fit_status, FitStatus::NotFit);
    match action {
        TurnAction::NextQuestion { ref prompt, .. } => {
            assert_eq!(prompt, "What are you looking for next?")
        }
        other => panic!("expected exit question, got {:?}", other),
    }

    // The exit answer completes the session (winding_down_questions = 1)
    let action = orchestrator.submit_answer("A calmer team".to_string()).await.unwrap();
    assert!(matches!(action, TurnAction::Complete { .. }));
    assert_eq!(orchestrator.phase(), InterviewPhase::Completed);
}

#[tokio::test]
async fn test_completion_is_idempotent() {
    let store = Arc::new(MemoryStore::new());
    let orchestrator = orchestrator_with(
        scripted_template(1),
        MockStt::with_responses(&[]),
        MockEvaluator::scoring(&[]),
        store,
    );

    orchestrator.start().await.unwrap();
    orchestrator.media_ready().await.unwrap();

    orchestrator.submit_answer("First".to_string()).await.unwrap();
    let action = orchestrator.submit_answer("Second".to_string()).await.unwrap();
    let first = match action {
        TurnAction::Complete { decision } => decision,
        other => panic!("expected completion, got {:?}", other),
    };

    // Finalizing again returns the stored decision unchanged
    let second = orchestrator.complete().await;
    assert_eq!(first.decision, second.decision);
    assert!((first.total_score - second.total_score).abs() < 1e-6);
    assert_eq!(first.decided_at, second.decided_at);
    assert_eq!(first.signals.len(), second.signals.len());
}

#[tokio::test]
async fn test_completed_session_rejects_answers() {
    let orchestrator = orchestrator_with(
        scripted_template(1),
        MockStt::with_responses(&[]),
        MockEvaluator::scoring(&[]),
        Arc::new(MemoryStore::new()),
    );

    orchestrator.start().await.unwrap();
    orchestrator.media_ready().await.unwrap();
    orchestrator.submit_answer("First".to_string()).await.unwrap();
    orchestrator.submit_answer("Second".to_string()).await.unwrap();
    assert_eq!(orchestrator.phase(), InterviewPhase::Completed);

    let result = orchestrator.submit_answer("Too late".to_string()).await;
    assert!(result.is_err());
}
