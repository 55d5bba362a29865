//! Outbound completion webhook

use std::time::Duration;

use reqwest::Client;
use serde::Serialize;

use interview_config::WebhookConfig;
use interview_core::FinalDecision;

/// Webhook payload sent after a session completes
#[derive(Debug, Serialize)]
pub struct WebhookPayload {
    pub session_id: String,
    pub status: &'static str,
    /// Total score scaled to 0-100
    pub score: u32,
    pub decision: String,
    pub strengths: Vec<String>,
    pub concerns: Vec<String>,
}

impl WebhookPayload {
    pub fn from_decision(decision: &FinalDecision) -> Self {
        Self {
            session_id: decision.session_id.to_string(),
            status: "completed",
            score: (decision.total_score * 100.0).round() as u32,
            decision: decision.decision.to_string(),
            strengths: decision.strengths.clone(),
            concerns: decision.concerns.clone(),
        }
    }
}

/// Posts completion payloads to the configured consumer
///
/// Delivery is fire-and-forget: a failed webhook is logged and dropped, it
/// never affects the session outcome.
pub struct WebhookNotifier {
    client: Client,
    config: WebhookConfig,
}

impl WebhookNotifier {
    pub fn new(config: WebhookConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    /// Dispatch the completion payload in a background task
    pub fn notify_completion(&self, decision: &FinalDecision) {
        if !self.config.enabled {
            return;
        }
        let Some(url) = self.config.url.clone() else {
            return;
        };

        let payload = WebhookPayload::from_decision(decision);
        let client = self.client.clone();
        let timeout = Duration::from_secs(self.config.timeout_secs);

        tokio::spawn(async move {
            let result = client
                .post(&url)
                .timeout(timeout)
                .json(&payload)
                .send()
                .await;

            match result {
                Ok(response) if response.status().is_success() => {
                    tracing::info!(session_id = %payload.session_id, "Webhook delivered");
                }
                Ok(response) => {
                    tracing::warn!(
                        session_id = %payload.session_id,
                        status = %response.status(),
                        "Webhook rejected"
                    );
                }
                Err(e) => {
                    tracing::warn!(session_id = %payload.session_id, error = %e, "Webhook delivery failed");
                }
            }
        });
    }
}
