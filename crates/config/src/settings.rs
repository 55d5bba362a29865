//! Main settings module

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::constants::{decision, detector, speech};
use crate::ConfigError;

/// Runtime environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeEnvironment {
    /// Development mode - relaxed validation, warnings only
    #[default]
    Development,
    /// Staging mode - stricter validation
    Staging,
    /// Production mode - all validations enforced
    Production,
}

impl RuntimeEnvironment {
    /// Check if this is a production environment
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Runtime environment (development, staging, production)
    #[serde(default)]
    pub environment: RuntimeEnvironment,

    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Speech I/O boundary configuration
    #[serde(default)]
    pub speech: SpeechConfig,

    /// Evaluation boundary configuration
    #[serde(default)]
    pub evaluation: EvaluationConfig,

    /// Pause detector tuning
    #[serde(default)]
    pub detector: DetectorSettings,

    /// Outbound webhook configuration
    #[serde(default)]
    pub webhook: WebhookConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Allowed CORS origins; empty means localhost only
    #[serde(default)]
    pub cors_origins: Vec<String>,
    #[serde(default = "default_true")]
    pub cors_enabled: bool,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: Vec::new(),
            cors_enabled: true,
        }
    }
}

/// Speech-to-text / synthesis boundary configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechConfig {
    /// Transcription endpoint
    #[serde(default = "default_stt_endpoint")]
    pub stt_endpoint: String,
    /// Synthesis endpoint
    #[serde(default = "default_tts_endpoint")]
    pub tts_endpoint: String,
    /// API key, if the provider needs one
    #[serde(default)]
    pub api_key: Option<String>,
    /// Transcription request timeout in seconds
    #[serde(default = "default_stt_timeout")]
    pub stt_timeout_secs: u64,
    /// Synthesis request timeout in seconds
    #[serde(default = "default_tts_timeout")]
    pub tts_timeout_secs: u64,
}

fn default_stt_endpoint() -> String {
    std::env::var("INTERVIEW_STT_ENDPOINT")
        .unwrap_or_else(|_| "http://localhost:9000/v1/transcribe".to_string())
}

fn default_tts_endpoint() -> String {
    std::env::var("INTERVIEW_TTS_ENDPOINT")
        .unwrap_or_else(|_| "http://localhost:9001/v1/synthesize".to_string())
}

fn default_stt_timeout() -> u64 {
    speech::STT_TIMEOUT_SECS
}

fn default_tts_timeout() -> u64 {
    speech::TTS_TIMEOUT_SECS
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            stt_endpoint: default_stt_endpoint(),
            tts_endpoint: default_tts_endpoint(),
            api_key: None,
            stt_timeout_secs: default_stt_timeout(),
            tts_timeout_secs: default_tts_timeout(),
        }
    }
}

/// Evaluation boundary configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationConfig {
    /// Chat-completions style endpoint
    #[serde(default = "default_eval_endpoint")]
    pub endpoint: String,
    /// Model identifier
    #[serde(default = "default_eval_model")]
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
    /// Request timeout in seconds
    #[serde(default = "default_eval_timeout")]
    pub timeout_secs: u64,
    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_eval_endpoint() -> String {
    std::env::var("INTERVIEW_EVAL_ENDPOINT")
        .unwrap_or_else(|_| "http://localhost:11434/v1/chat/completions".to_string())
}

fn default_eval_model() -> String {
    "qwen3:4b-instruct".to_string()
}

fn default_eval_timeout() -> u64 {
    decision::EVAL_TIMEOUT_SECS
}

fn default_temperature() -> f32 {
    0.3
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            endpoint: default_eval_endpoint(),
            model: default_eval_model(),
            api_key: None,
            timeout_secs: default_eval_timeout(),
            temperature: default_temperature(),
        }
    }
}

/// Pause detector tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorSettings {
    /// Energy above this (dBFS) counts as speech
    #[serde(default = "default_threshold_db")]
    pub speech_threshold_db: f32,
    /// Continuous speech needed to confirm a turn has started (ms)
    #[serde(default = "default_min_speech_ms")]
    pub min_speech_ms: u64,
    /// Silence grace period before pause progress counts (ms)
    #[serde(default = "default_silence_delay_ms")]
    pub silence_delay_ms: u64,
    /// Unbroken silence that completes a pause (ms)
    #[serde(default = "default_total_pause_ms")]
    pub total_pause_ms: u64,
}

fn default_threshold_db() -> f32 {
    detector::SPEECH_THRESHOLD_DB
}

fn default_min_speech_ms() -> u64 {
    detector::MIN_SPEECH_MS
}

fn default_silence_delay_ms() -> u64 {
    detector::SILENCE_DELAY_MS
}

fn default_total_pause_ms() -> u64 {
    detector::TOTAL_PAUSE_MS
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            speech_threshold_db: default_threshold_db(),
            min_speech_ms: default_min_speech_ms(),
            silence_delay_ms: default_silence_delay_ms(),
            total_pause_ms: default_total_pause_ms(),
        }
    }
}

/// Outbound completion webhook
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Enable webhook delivery on completion
    #[serde(default)]
    pub enabled: bool,
    /// Destination URL
    #[serde(default)]
    pub url: Option<String>,
    /// Request timeout in seconds
    #[serde(default = "default_webhook_timeout")]
    pub timeout_secs: u64,
}

fn default_webhook_timeout() -> u64 {
    10
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: None,
            timeout_secs: default_webhook_timeout(),
        }
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log filter, e.g. "info,interview_agent=debug"
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
    /// Emit logs as JSON lines
    #[serde(default)]
    pub json_logs: bool,
    /// Expose Prometheus metrics on /metrics
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter(),
            json_logs: false,
            metrics_enabled: true,
        }
    }
}

/// Load settings from an optional file plus INTERVIEW_ environment variables
///
/// Environment variables override file values; nested fields use `__` as the
/// separator (e.g. INTERVIEW_SERVER__PORT=9090).
pub fn load_settings(path: Option<&Path>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    if let Some(path) = path {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }
        builder = builder.add_source(File::from(path));
    }

    let config = builder
        .add_source(Environment::with_prefix("INTERVIEW").separator("__"))
        .build()?;

    let settings: Settings = config.try_deserialize()?;

    if settings.webhook.enabled && settings.webhook.url.is_none() {
        return Err(ConfigError::InvalidValue {
            field: "webhook.url".to_string(),
            message: "webhook enabled but no url configured".to_string(),
        });
    }

    tracing::info!(
        environment = ?settings.environment,
        metrics = settings.observability.metrics_enabled,
        "Settings loaded"
    );

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.detector.total_pause_ms, 2_000);
        assert!(!settings.webhook.enabled);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
environment = "staging"

[server]
port = 9191

[detector]
total_pause_ms = 1500
"#
        )
        .unwrap();

        let settings = load_settings(Some(file.path())).unwrap();
        assert_eq!(settings.environment, RuntimeEnvironment::Staging);
        assert_eq!(settings.server.port, 9191);
        assert_eq!(settings.detector.total_pause_ms, 1500);
        // Untouched sections keep defaults
        assert_eq!(settings.detector.min_speech_ms, 250);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = load_settings(Some(Path::new("/nonexistent/interview.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn test_webhook_requires_url() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[webhook]\nenabled = true").unwrap();
        let err = load_settings(Some(file.path())).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }
}
