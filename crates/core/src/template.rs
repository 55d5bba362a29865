//! Question template types and load-time validation
//!
//! Templates arrive as loosely-shaped JSON from the authoring side. They are
//! parsed into strict types here and validated once, before any session can
//! bind to them; nothing downstream re-checks template fields mid-flow.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::session::InterviewMode;

/// Template validation errors, terminal for the load request
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TemplateError {
    #[error("Failed to parse template: {0}")]
    Parse(String),

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue {
        field: &'static str,
        message: String,
    },

    #[error("Template must define exactly one of `questions` or `screening_questions`")]
    AmbiguousQuestionSource,
}

/// Voice parameters passed to the synthesis boundary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceSettings {
    pub voice_id: String,
    #[serde(default = "default_speed")]
    pub speed: f32,
}

fn default_speed() -> f32 {
    1.0
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            voice_id: "default".to_string(),
            speed: default_speed(),
        }
    }
}

/// Scoring rubric attached to a question
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rubric {
    /// Evaluation dimension this question measures
    pub signal: String,
    /// Weight in [0, 1]
    pub weight: f32,
}

/// A conditional follow-up prompt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowUp {
    /// When this follow-up applies (matched against the evaluator's reason)
    pub condition: String,
    /// The prompt to speak
    pub prompt: String,
}

/// A single interview question
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub prompt: String,
    #[serde(default)]
    pub followups: Vec<FollowUp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rubric: Option<Rubric>,
}

/// Policy knobs carried by every template
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplatePolicies {
    /// Maximum evaluator-requested follow-ups per question
    #[serde(default = "default_max_followups")]
    pub max_followups_per_question: u32,
    /// Answers shorter than this are treated as too short to flag
    #[serde(default = "default_min_answer_seconds")]
    pub min_answer_seconds: u32,
    /// Exit questions asked during a graceful wind-down
    #[serde(default = "default_winding_down_questions")]
    pub winding_down_questions: usize,
    /// Confidence a NotFit assessment needs before winding down early
    #[serde(default = "default_early_exit_confidence")]
    pub early_exit_confidence: f32,
    /// Upper bound on main questions in a dynamic interview
    #[serde(default = "default_max_questions")]
    pub max_questions: usize,
}

fn default_max_questions() -> usize {
    10
}

fn default_max_followups() -> u32 {
    1
}

fn default_min_answer_seconds() -> u32 {
    3
}

fn default_winding_down_questions() -> usize {
    2
}

fn default_early_exit_confidence() -> f32 {
    0.7
}

impl Default for TemplatePolicies {
    fn default() -> Self {
        Self {
            max_followups_per_question: default_max_followups(),
            min_answer_seconds: default_min_answer_seconds(),
            winding_down_questions: default_winding_down_questions(),
            early_exit_confidence: default_early_exit_confidence(),
            max_questions: default_max_questions(),
        }
    }
}

/// Where questions come from: exactly one shape per template
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum QuestionSource {
    /// Ordered fixed list (scripted modes)
    Scripted(Vec<Question>),
    /// Seed screening questions plus wind-down material (dynamic mode)
    Dynamic {
        screening: Vec<Question>,
        exit: Vec<Question>,
        fit_criteria: String,
    },
}

/// A validated, immutable interview template
///
/// Sessions bind to one template instance for their whole lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterviewTemplate {
    pub system_prompt: String,
    pub voice: VoiceSettings,
    pub policies: TemplatePolicies,
    pub source: QuestionSource,
    /// Whether the evaluator may request follow-ups in scripted mode
    pub ai_followups: bool,
}

/// Wire shape of a template as authored, before validation
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawTemplate {
    #[serde(default)]
    pub system_prompt: String,
    #[serde(default)]
    pub voice: Option<VoiceSettings>,
    #[serde(default)]
    pub policies: Option<TemplatePolicies>,
    #[serde(default)]
    pub questions: Vec<Question>,
    #[serde(default)]
    pub ai_followups: Option<bool>,
    #[serde(default)]
    pub dynamic_mode: bool,
    #[serde(default)]
    pub screening_questions: Vec<Question>,
    #[serde(default)]
    pub exit_questions: Vec<Question>,
    #[serde(default)]
    pub fit_criteria: Option<String>,
}

impl InterviewTemplate {
    /// Parse and validate a template from JSON
    pub fn from_json(json: &str) -> Result<Self, TemplateError> {
        let raw: RawTemplate =
            serde_json::from_str(json).map_err(|e| TemplateError::Parse(e.to_string()))?;
        Self::from_raw(raw)
    }

    /// Validate a raw template into the strict form
    pub fn from_raw(raw: RawTemplate) -> Result<Self, TemplateError> {
        let has_scripted = !raw.questions.is_empty();
        let has_dynamic = raw.dynamic_mode || !raw.screening_questions.is_empty();

        if has_scripted == has_dynamic {
            return Err(TemplateError::AmbiguousQuestionSource);
        }

        if raw.system_prompt.trim().is_empty() {
            return Err(TemplateError::MissingField("system_prompt"));
        }

        let policies = raw.policies.unwrap_or_default();
        if !(0.0..=1.0).contains(&policies.early_exit_confidence) {
            return Err(TemplateError::InvalidValue {
                field: "policies.early_exit_confidence",
                message: format!("{} not in [0, 1]", policies.early_exit_confidence),
            });
        }

        let source = if has_scripted {
            validate_questions(&raw.questions, "questions")?;
            QuestionSource::Scripted(raw.questions)
        } else {
            if raw.screening_questions.is_empty() {
                return Err(TemplateError::MissingField("screening_questions"));
            }
            validate_questions(&raw.screening_questions, "screening_questions")?;
            validate_questions(&raw.exit_questions, "exit_questions")?;
            QuestionSource::Dynamic {
                screening: raw.screening_questions,
                exit: raw.exit_questions,
                fit_criteria: raw
                    .fit_criteria
                    .ok_or(TemplateError::MissingField("fit_criteria"))?,
            }
        };

        Ok(Self {
            system_prompt: raw.system_prompt,
            voice: raw.voice.unwrap_or_default(),
            policies,
            source,
            ai_followups: raw.ai_followups.unwrap_or(false),
        })
    }

    /// The interview mode this template drives
    pub fn mode(&self) -> InterviewMode {
        match &self.source {
            QuestionSource::Scripted(_) if self.ai_followups => {
                InterviewMode::ScriptedWithFollowups
            }
            QuestionSource::Scripted(_) => InterviewMode::Scripted,
            QuestionSource::Dynamic { .. } => InterviewMode::Dynamic,
        }
    }

    /// Question at `index` in the scripted/screening list, if any
    pub fn question_at(&self, index: usize) -> Option<&Question> {
        match &self.source {
            QuestionSource::Scripted(questions) => questions.get(index),
            QuestionSource::Dynamic { screening, .. } => screening.get(index),
        }
    }

    /// Exit question at `index`, dynamic mode only
    pub fn exit_question_at(&self, index: usize) -> Option<&Question> {
        match &self.source {
            QuestionSource::Scripted(_) => None,
            QuestionSource::Dynamic { exit, .. } => exit.get(index),
        }
    }

    /// Number of scripted/screening questions
    pub fn scripted_len(&self) -> usize {
        match &self.source {
            QuestionSource::Scripted(questions) => questions.len(),
            QuestionSource::Dynamic { screening, .. } => screening.len(),
        }
    }

    /// Fit criteria text for dynamic assessment, if any
    pub fn fit_criteria(&self) -> Option<&str> {
        match &self.source {
            QuestionSource::Scripted(_) => None,
            QuestionSource::Dynamic { fit_criteria, .. } => Some(fit_criteria),
        }
    }
}

fn validate_questions(questions: &[Question], field: &'static str) -> Result<(), TemplateError> {
    let mut seen = std::collections::HashSet::new();
    for q in questions {
        if q.prompt.trim().is_empty() {
            return Err(TemplateError::InvalidValue {
                field,
                message: format!("question {} has an empty prompt", q.id),
            });
        }
        if !seen.insert(q.id.as_str()) {
            return Err(TemplateError::InvalidValue {
                field,
                message: format!("duplicate question id {}", q.id),
            });
        }
        if let Some(rubric) = &q.rubric {
            if !(0.0..=1.0).contains(&rubric.weight) {
                return Err(TemplateError::InvalidValue {
                    field,
                    message: format!(
                        "question {} rubric weight {} not in [0, 1]",
                        q.id, rubric.weight
                    ),
                });
            }
            if rubric.signal.trim().is_empty() {
                return Err(TemplateError::InvalidValue {
                    field,
                    message: format!("question {} rubric has an empty signal", q.id),
                });
            }
        }
    }
    Ok(())
}
