//! HTTP adapter for the speech-to-text and synthesis boundary
//!
//! Every request is bounded by a configured timeout and abortable through a
//! shared cancellation channel. A timeout or network failure is reported as
//! a retryable error; recovery is the orchestrator's transition back to
//! listening, never a hidden retry here that could double-submit a turn.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::broadcast;

use interview_config::SpeechConfig;
use interview_core::{Error, SpeechSynthesis, SpeechToText, SynthesizedClip, VoiceSettings};

use crate::PipelineError;

/// Speech boundary configuration
#[derive(Debug, Clone)]
pub struct SpeechIoConfig {
    /// Transcription endpoint
    pub stt_endpoint: String,
    /// Synthesis endpoint
    pub tts_endpoint: String,
    /// Bearer token, if the provider needs one
    pub api_key: Option<String>,
    /// Transcription request timeout
    pub stt_timeout: Duration,
    /// Synthesis request timeout
    pub tts_timeout: Duration,
}

impl Default for SpeechIoConfig {
    fn default() -> Self {
        Self::from(&SpeechConfig::default())
    }
}

impl From<&SpeechConfig> for SpeechIoConfig {
    fn from(settings: &SpeechConfig) -> Self {
        Self {
            stt_endpoint: settings.stt_endpoint.clone(),
            tts_endpoint: settings.tts_endpoint.clone(),
            api_key: settings.api_key.clone(),
            stt_timeout: Duration::from_secs(settings.stt_timeout_secs),
            tts_timeout: Duration::from_secs(settings.tts_timeout_secs),
        }
    }
}

/// Transcription response body
#[derive(Debug, Deserialize)]
struct TranscribeResponse {
    #[serde(default)]
    text: String,
}

/// HTTP client for the speech boundary
///
/// Cheap to clone; the underlying connection pool and cancellation channel
/// are shared.
#[derive(Clone)]
pub struct SpeechClient {
    client: Client,
    config: SpeechIoConfig,
    cancel_tx: broadcast::Sender<()>,
}

impl SpeechClient {
    pub fn new(config: SpeechIoConfig) -> Self {
        let (cancel_tx, _) = broadcast::channel(4);

        Self {
            client: Client::new(),
            config,
            cancel_tx,
        }
    }

    /// Abort all in-flight speech requests (e.g. on session teardown)
    pub fn cancel_all(&self) {
        let _ = self.cancel_tx.send(());
    }

    /// Transcribe a WAV clip to plain text
    ///
    /// Empty or whitespace-only text is a valid response meaning "no speech
    /// detected", not an error.
    pub async fn transcribe_wav(&self, wav: Vec<u8>) -> Result<String, PipelineError> {
        let mut request = self
            .client
            .post(&self.config.stt_endpoint)
            .header("content-type", "audio/wav")
            .body(wav);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let mut cancel_rx = self.cancel_tx.subscribe();
        let timeout = self.config.stt_timeout;

        let response = tokio::select! {
            _ = cancel_rx.recv() => return Err(PipelineError::Cancelled),
            result = tokio::time::timeout(timeout, request.send()) => {
                result
                    .map_err(|_| PipelineError::Timeout(timeout.as_millis() as u64))?
                    .map_err(|e| PipelineError::Stt(e.to_string()))?
            }
        };

        if !response.status().is_success() {
            return Err(PipelineError::Stt(format!(
                "transcription returned {}",
                response.status()
            )));
        }

        let body: TranscribeResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::Stt(e.to_string()))?;

        tracing::debug!(chars = body.text.len(), "Transcription received");
        Ok(body.text)
    }

    /// Synthesize text into an audio clip
    pub async fn synthesize_text(
        &self,
        text: &str,
        voice: &VoiceSettings,
    ) -> Result<SynthesizedClip, PipelineError> {
        let mut request = self.client.post(&self.config.tts_endpoint).json(&serde_json::json!({
            "text": text,
            "voice_id": voice.voice_id,
            "speed": voice.speed,
        }));
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let mut cancel_rx = self.cancel_tx.subscribe();
        let timeout = self.config.tts_timeout;

        let response = tokio::select! {
            _ = cancel_rx.recv() => return Err(PipelineError::Cancelled),
            result = tokio::time::timeout(timeout, request.send()) => {
                result
                    .map_err(|_| PipelineError::Timeout(timeout.as_millis() as u64))?
                    .map_err(|e| PipelineError::Tts(e.to_string()))?
            }
        };

        if !response.status().is_success() {
            return Err(PipelineError::Tts(format!(
                "synthesis returned {}",
                response.status()
            )));
        }

        let duration_ms = response
            .headers()
            .get("x-audio-duration-ms")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());

        let audio = response
            .bytes()
            .await
            .map_err(|e| PipelineError::Tts(e.to_string()))?
            .to_vec();

        tracing::debug!(bytes = audio.len(), ?duration_ms, "Synthesis received");

        Ok(SynthesizedClip { audio, duration_ms })
    }
}

#[async_trait]
impl SpeechToText for SpeechClient {
    async fn transcribe(&self, wav: Vec<u8>) -> Result<String, Error> {
        self.transcribe_wav(wav).await.map_err(Into::into)
    }
}

#[async_trait]
impl SpeechSynthesis for SpeechClient {
    async fn synthesize(
        &self,
        text: &str,
        voice: &VoiceSettings,
    ) -> Result<SynthesizedClip, Error> {
        self.synthesize_text(text, voice).await.map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_settings() {
        let settings = SpeechConfig::default();
        let config = SpeechIoConfig::from(&settings);
        assert_eq!(config.stt_timeout, Duration::from_secs(30));
        assert!(config.stt_endpoint.contains("/transcribe"));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_stt_error() {
        let config = SpeechIoConfig {
            stt_endpoint: "http://127.0.0.1:1/v1/transcribe".to_string(),
            tts_endpoint: "http://127.0.0.1:1/v1/synthesize".to_string(),
            api_key: None,
            stt_timeout: Duration::from_secs(2),
            tts_timeout: Duration::from_secs(2),
        };
        let client = SpeechClient::new(config);

        let err = client.transcribe_wav(vec![0u8; 44]).await.unwrap_err();
        assert!(matches!(err, PipelineError::Stt(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_cancel_aborts_inflight_request() {
        // A listener that accepts connections and never responds, so the
        // request stays in flight until cancelled
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((socket, _)) = listener.accept().await else {
                    return;
                };
                tokio::spawn(async move {
                    let _socket = socket;
                    tokio::time::sleep(Duration::from_secs(120)).await;
                });
            }
        });

        let config = SpeechIoConfig {
            stt_endpoint: format!("http://{}/v1/transcribe", addr),
            tts_endpoint: format!("http://{}/v1/synthesize", addr),
            api_key: None,
            stt_timeout: Duration::from_secs(60),
            tts_timeout: Duration::from_secs(60),
        };
        let client = SpeechClient::new(config);

        let inflight = {
            let client = client.clone();
            tokio::spawn(async move { client.transcribe_wav(vec![0u8; 44]).await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        client.cancel_all();

        let result = inflight.await.unwrap();
        assert!(matches!(result, Err(PipelineError::Cancelled)));
    }
}
