//! Shared application state

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use interview_agent::{EvaluatorConfig, HttpEvaluator, InterviewOrchestrator, OrchestratorConfig};
use interview_config::Settings;
use interview_core::{AudioSink, Error, InterviewTemplate, SynthesizedClip};
use interview_persistence::{MemoryStore, SessionStore};
use interview_pipeline::{SpeechClient, SpeechIoConfig};

use crate::webhook::WebhookNotifier;

/// Playback endpoint for transports that render prompts as text
///
/// The HTTP surface hands prompt text back in responses; there is no
/// server-side audio device, so playback completes immediately.
pub struct DiscardSink;

#[async_trait]
impl AudioSink for DiscardSink {
    async fn play(&self, _clip: SynthesizedClip) -> Result<(), Error> {
        Ok(())
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    /// Live orchestrators by session id
    pub sessions: Arc<DashMap<Uuid, Arc<InterviewOrchestrator>>>,
    pub store: Arc<dyn SessionStore>,
    pub webhook: Arc<WebhookNotifier>,
    /// Prometheus render handle, when metrics are enabled
    pub metrics: Option<metrics_exporter_prometheus::PrometheusHandle>,
}

impl AppState {
    pub fn new(
        settings: Settings,
        metrics: Option<metrics_exporter_prometheus::PrometheusHandle>,
    ) -> Self {
        let webhook = Arc::new(WebhookNotifier::new(settings.webhook.clone()));

        Self {
            settings: Arc::new(settings),
            sessions: Arc::new(DashMap::new()),
            store: Arc::new(MemoryStore::new()),
            webhook,
            metrics,
        }
    }

    /// Build an orchestrator for a validated template and register it
    pub fn create_session(&self, template: InterviewTemplate) -> Arc<InterviewOrchestrator> {
        let speech = Arc::new(SpeechClient::new(SpeechIoConfig::from(
            &self.settings.speech,
        )));
        let evaluator = Arc::new(HttpEvaluator::new(EvaluatorConfig::from(
            &self.settings.evaluation,
        )));

        let orchestrator = InterviewOrchestrator::new(
            template,
            OrchestratorConfig::from_settings(&self.settings),
            speech.clone(),
            speech,
            Arc::new(DiscardSink),
            evaluator,
            self.store.clone(),
        );

        self.sessions.insert(orchestrator.id(), orchestrator.clone());
        orchestrator
    }
}
