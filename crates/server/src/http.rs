//! HTTP Endpoints
//!
//! REST API for the interview agent.

use axum::{
    extract::{Json, Path, State},
    http::{HeaderValue, Method, StatusCode},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use interview_agent::{AgentError, TurnAction};
use interview_core::template::RawTemplate;
use interview_core::InterviewTemplate;

use crate::state::AppState;

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    let cors_layer = build_cors_layer(
        &state.settings.server.cors_origins,
        state.settings.server.cors_enabled,
    );

    Router::new()
        // Session endpoints
        .route("/api/interviews", post(create_interview))
        .route("/api/interviews/:id", get(get_interview))
        // Turn submission API
        .route("/api/interviews/:id/answer", post(submit_turn))
        // Decision for administrative consumers
        .route("/api/interviews/:id/decision", get(get_decision))
        // Health check
        .route("/health", get(health_check))
        // Prometheus metrics
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(state)
}

/// Build CORS layer from configured origins
///
/// - If cors_enabled is false, returns a permissive layer (for dev)
/// - If cors_origins is empty, defaults to localhost:3000 for safety
/// - Otherwise, uses the configured origins
fn build_cors_layer(origins: &[String], enabled: bool) -> CorsLayer {
    if !enabled {
        tracing::warn!("CORS is disabled - allowing all origins (NOT FOR PRODUCTION)");
        return CorsLayer::permissive();
    }

    let parsed_origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| {
            origin.parse::<HeaderValue>().ok().or_else(|| {
                tracing::warn!("Invalid CORS origin: {}", origin);
                None
            })
        })
        .collect();

    if parsed_origins.is_empty() {
        tracing::info!("No CORS origins configured, defaulting to localhost:3000");
        return CorsLayer::new()
            .allow_origin("http://localhost:3000".parse::<HeaderValue>().unwrap())
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers(Any);
    }

    CorsLayer::new()
        .allow_origin(parsed_origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
}

/// Create a session from a template and start it
async fn create_interview(
    State(state): State<AppState>,
    Json(raw): Json<RawTemplate>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<serde_json::Value>)> {
    let template = InterviewTemplate::from_raw(raw).map_err(|e| {
        (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(serde_json::json!({"error": e.to_string()})),
        )
    })?;

    let orchestrator = state.create_session(template);
    let session_id = orchestrator.id();

    if let Err(e) = orchestrator.start().await {
        tracing::error!(session_id = %session_id, error = %e, "Session start failed");
        state.sessions.remove(&session_id);
        return Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({"error": "failed to start session"})),
        ));
    }
    if let Err(e) = orchestrator.media_ready().await {
        tracing::error!(session_id = %session_id, error = %e, "First question failed");
    }

    let session = orchestrator.snapshot();
    let question = session
        .history
        .iter()
        .rev()
        .find(|t| t.speaker == interview_core::TurnSpeaker::Agent)
        .map(|t| t.text.clone());

    Ok(Json(serde_json::json!({
        "session_id": session_id,
        "phase": session.phase,
        "mode": session.mode,
        "question": question,
    })))
}

/// Get session info
async fn get_interview(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let orchestrator = state.sessions.get(&id).ok_or(StatusCode::NOT_FOUND)?;
    let session = orchestrator.snapshot();

    Ok(Json(serde_json::json!({
        "session_id": session.id,
        "phase": session.phase,
        "mode": session.mode,
        "question_index": session.question_index,
        "answered_turns": session.answered_turns(),
        "fit_status": session.fit_status,
        "winding_down": session.winding_down,
    })))
}

#[derive(Debug, Deserialize)]
struct SubmitTurnRequest {
    answer_text: String,
}

/// Submit a transcribed answer for the current turn
async fn submit_turn(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<SubmitTurnRequest>,
) -> Result<Json<TurnAction>, (StatusCode, Json<serde_json::Value>)> {
    let orchestrator = state
        .sessions
        .get(&id)
        .map(|entry| entry.value().clone())
        .ok_or((
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": "unknown session"})),
        ))?;

    match orchestrator.submit_answer(request.answer_text).await {
        Ok(action) => {
            if let TurnAction::Complete { decision } = &action {
                state.webhook.notify_completion(decision);
            }
            Ok(Json(action))
        }
        Err(e) => Err(map_agent_error(e)),
    }
}

/// Candidate-safe error mapping: raw internals stay in the logs
fn map_agent_error(err: AgentError) -> (StatusCode, Json<serde_json::Value>) {
    tracing::warn!(error = %err, "Turn submission failed");
    let (status, message) = match &err {
        AgentError::EmptyAnswer => (StatusCode::UNPROCESSABLE_ENTITY, "answer text is empty"),
        AgentError::Session(_) => (StatusCode::CONFLICT, "session cannot accept an answer"),
        _ if err.is_retryable() => (
            StatusCode::SERVICE_UNAVAILABLE,
            "temporary failure, please retry",
        ),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal error"),
    };
    (
        status,
        Json(serde_json::json!({"error": message, "retryable": err.is_retryable()})),
    )
}

/// Decision plus signal breakdown and flags, once computed
async fn get_decision(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let decision = state
        .store
        .load_decision(id)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::NOT_FOUND)?;

    let flags = state.store.load_flags(id).await.unwrap_or_default();

    Ok(Json(serde_json::json!({
        "session_id": decision.session_id,
        "decision": decision.decision,
        "score": (decision.total_score * 100.0).round() as u32,
        "signals": decision.signals,
        "strengths": decision.strengths,
        "concerns": decision.concerns,
        "flags": flags,
        "decided_at": decision.decided_at,
    })))
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

async fn metrics_handler(State(state): State<AppState>) -> Result<String, StatusCode> {
    match &state.metrics {
        Some(handle) => Ok(handle.render()),
        None => Err(StatusCode::NOT_FOUND),
    }
}
