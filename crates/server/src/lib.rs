//! HTTP surface for the interview agent
//!
//! Exposes session creation, the turn submission API, decision retrieval,
//! health, and Prometheus metrics. Audio playback is transport-side; this
//! surface returns prompts as text and accepts transcribed answers.

pub mod http;
pub mod state;
pub mod webhook;

pub use http::create_router;
pub use state::AppState;
pub use webhook::WebhookNotifier;
