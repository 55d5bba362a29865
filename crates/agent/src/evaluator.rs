//! Answer evaluation boundary and follow-up policy
//!
//! The backend returns raw model output; everything here that parses it is
//! total — malformed output degrades to a neutral evaluation or a no-op
//! rather than an error, so a bad model response never stalls a session.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use interview_config::EvaluationConfig;
use interview_core::{
    AnswerEvaluation, Error, EvaluationBackend, FitAssessment, FitStatus, Flag, FlagKind,
    Question, Turn,
};

/// Evaluator backend configuration
#[derive(Debug, Clone)]
pub struct EvaluatorConfig {
    /// Chat-completions style endpoint
    pub endpoint: String,
    /// Model name/ID
    pub model: String,
    /// API key (optional)
    pub api_key: Option<String>,
    /// Request timeout
    pub timeout: Duration,
    /// Sampling temperature
    pub temperature: f32,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self::from(&EvaluationConfig::default())
    }
}

impl From<&EvaluationConfig> for EvaluatorConfig {
    fn from(settings: &EvaluationConfig) -> Self {
        Self {
            endpoint: settings.endpoint.clone(),
            model: settings.model.clone(),
            api_key: settings.api_key.clone(),
            timeout: Duration::from_secs(settings.timeout_secs),
            temperature: settings.temperature,
        }
    }
}

const EVALUATE_INSTRUCTIONS: &str = "\
You are scoring one interview answer. Respond with a single JSON object: \
{\"score\": <0.0-1.0>, \"reasoning\": \"...\", \"needs_followup\": <bool>, \
\"followup_reason\": \"...\" (optional)}. \
Score bands: 0.0-0.3 poor, 0.4-0.6 average, 0.7-0.8 good, 0.9-1.0 excellent. \
Specific, role-relevant answers score higher.";

const FIT_INSTRUCTIONS: &str = "\
You are assessing overall candidate fit from the conversation so far. \
Respond with a single JSON object: \
{\"status\": \"fit\" | \"uncertain\" | \"not_fit\", \"confidence\": <0.0-1.0>, \
\"reasoning\": \"...\"}.";

const NEXT_QUESTION_INSTRUCTIONS: &str = "\
You are conducting the interview. Given the conversation so far, ask the \
single most useful next question. Respond with only the question text.";

const FLAG_INSTRUCTIONS: &str = "\
You review one interview answer for a notable moment. Most answers are \
neutral; flag only the clearly exceptional top or bottom ~20%. Respond with \
a single JSON object: {\"flag\": \"red\" | \"green\" | \"neutral\", \
\"category\": \"...\", \"description\": \"...\", \"quote\": \"...\" (optional)}.";

/// Chat-completions evaluation backend
#[derive(Clone)]
pub struct HttpEvaluator {
    client: Client,
    config: EvaluatorConfig,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: String,
}

impl HttpEvaluator {
    pub fn new(config: EvaluatorConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    /// Issue one bounded chat request and return the raw assistant content
    async fn chat(&self, system: &str, user: String) -> Result<String, Error> {
        let mut request = self.client.post(&self.config.endpoint).json(&serde_json::json!({
            "model": self.config.model,
            "temperature": self.config.temperature,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
        }));
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let timeout_ms = self.config.timeout.as_millis() as u64;
        let response = tokio::time::timeout(self.config.timeout, request.send())
            .await
            .map_err(|_| Error::Timeout(timeout_ms))?
            .map_err(|e| Error::Evaluation(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::Evaluation(format!(
                "evaluator returned {}",
                response.status()
            )));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::Evaluation(e.to_string()))?;

        body.choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| Error::Evaluation("no choices in evaluator response".to_string()))
    }
}

fn render_history(history: &[Turn]) -> String {
    let mut out = String::new();
    for turn in history {
        out.push_str(turn.speaker.as_str());
        out.push_str(": ");
        out.push_str(&turn.text);
        out.push('\n');
    }
    out
}

#[async_trait]
impl EvaluationBackend for HttpEvaluator {
    async fn evaluate_answer(
        &self,
        system_prompt: &str,
        question: &str,
        answer: &str,
        history: &[Turn],
    ) -> Result<String, Error> {
        let user = format!(
            "Role context:\n{}\n\nConversation so far:\n{}\nQuestion: {}\nAnswer: {}",
            system_prompt,
            render_history(history),
            question,
            answer
        );
        self.chat(EVALUATE_INSTRUCTIONS, user).await
    }

    async fn assess_fit(&self, fit_criteria: &str, history: &[Turn]) -> Result<String, Error> {
        let user = format!(
            "Fit criteria:\n{}\n\nConversation so far:\n{}",
            fit_criteria,
            render_history(history)
        );
        self.chat(FIT_INSTRUCTIONS, user).await
    }

    async fn next_question(
        &self,
        system_prompt: &str,
        history: &[Turn],
    ) -> Result<String, Error> {
        let user = format!(
            "Role context:\n{}\n\nConversation so far:\n{}",
            system_prompt,
            render_history(history)
        );
        self.chat(NEXT_QUESTION_INSTRUCTIONS, user).await
    }

    async fn classify_turn(&self, question: &str, answer: &str) -> Result<String, Error> {
        let user = format!("Question: {}\nAnswer: {}", question, answer);
        self.chat(FLAG_INSTRUCTIONS, user).await
    }
}

// ---------------------------------------------------------------------------
// Response parsing
// ---------------------------------------------------------------------------

/// Slice out the first JSON object in possibly chatty model output
fn extract_json(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(&raw[start..=end])
}

#[derive(Debug, Deserialize)]
struct EvaluationJson {
    score: f32,
    #[serde(default)]
    reasoning: String,
    #[serde(default)]
    needs_followup: bool,
    #[serde(default)]
    followup_reason: Option<String>,
}

/// Parse raw evaluator output into an evaluation
///
/// Unparsable output yields the neutral evaluation with a flagged reasoning
/// string; the session proceeds either way.
pub fn parse_evaluation(raw: &str) -> AnswerEvaluation {
    let parsed = extract_json(raw).and_then(|json| serde_json::from_str::<EvaluationJson>(json).ok());

    match parsed {
        Some(json) => AnswerEvaluation {
            score: json.score,
            reasoning: json.reasoning,
            needs_followup: json.needs_followup,
            followup_reason: json.followup_reason,
        }
        .clamped(),
        None => {
            tracing::warn!(raw_len = raw.len(), "Unparsable evaluator output, substituting neutral score");
            AnswerEvaluation::neutral("evaluator output could not be parsed")
        }
    }
}

#[derive(Debug, Deserialize)]
struct FitJson {
    status: String,
    #[serde(default)]
    confidence: f32,
    #[serde(default)]
    reasoning: String,
}

/// Parse raw fit-assessment output
///
/// Unparsable output degrades to Uncertain at zero confidence, which can
/// never trigger an early exit.
pub fn parse_fit(raw: &str) -> FitAssessment {
    let parsed = extract_json(raw).and_then(|json| serde_json::from_str::<FitJson>(json).ok());

    match parsed {
        Some(json) => {
            let status = match json.status.as_str() {
                "fit" => FitStatus::Fit,
                "not_fit" => FitStatus::NotFit,
                _ => FitStatus::Uncertain,
            };
            FitAssessment {
                status,
                confidence: json.confidence.clamp(0.0, 1.0),
                reasoning: json.reasoning,
            }
        }
        None => {
            tracing::warn!("Unparsable fit assessment, treating as uncertain");
            FitAssessment {
                status: FitStatus::Uncertain,
                confidence: 0.0,
                reasoning: String::new(),
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct FlagJson {
    flag: String,
    #[serde(default)]
    category: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    quote: Option<String>,
}

/// Parse raw flag-classification output; `None` means no flag
pub fn parse_flag(raw: &str, turn_index: usize) -> Option<Flag> {
    let json = extract_json(raw)?;
    let parsed: FlagJson = serde_json::from_str(json).ok()?;

    let kind = match parsed.flag.as_str() {
        "red" => FlagKind::Red,
        "green" => FlagKind::Green,
        _ => return None,
    };

    let mut flag = Flag::new(turn_index, kind, parsed.category, parsed.description);
    if let Some(quote) = parsed.quote {
        flag = flag.with_quote(quote);
    }
    Some(flag)
}

// ---------------------------------------------------------------------------
// Follow-up policy
// ---------------------------------------------------------------------------

/// Whether a follow-up should be asked for the current question
pub fn should_follow_up(eval: &AnswerEvaluation, followups_used: u32, max_followups: u32) -> bool {
    eval.needs_followup && followups_used < max_followups
}

/// Select the follow-up prompt for a question
///
/// Best-effort substring match of the evaluator's reason against the
/// configured conditions; falls back to the first configured follow-up.
/// `None` when the question has no follow-ups configured, in which case the
/// caller must advance instead.
pub fn follow_up_prompt<'a>(question: &'a Question, reason: Option<&str>) -> Option<&'a str> {
    if question.followups.is_empty() {
        return None;
    }

    if let Some(reason) = reason {
        let reason = reason.to_lowercase();
        for followup in &question.followups {
            let condition = followup.condition.to_lowercase();
            if reason.contains(&condition) || condition.contains(&reason) {
                return Some(&followup.prompt);
            }
        }
    }

    Some(&question.followups[0].prompt)
}
