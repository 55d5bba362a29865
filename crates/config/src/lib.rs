//! Configuration management for the interview agent
//!
//! Supports loading configuration from:
//! - TOML/JSON files
//! - Environment variables (INTERVIEW_ prefix)
//!
//! Question templates are loaded separately via [`template`] and validated
//! strictly before any session can bind to them.

pub mod constants;
pub mod settings;
pub mod template;

pub use settings::{
    load_settings, DetectorSettings, EvaluationConfig, ObservabilityConfig, RuntimeEnvironment,
    ServerConfig, Settings, SpeechConfig, WebhookConfig,
};
pub use template::load_template;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Template error: {0}")]
    Template(#[from] interview_core::TemplateError),

    #[error("IO error: {0}")]
    Io(String),
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}
