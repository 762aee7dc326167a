//! Request handlers for the chat API

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::{debug, error};

use crate::HolosError;
use crate::server::AppState;
use crate::server::models::{ChatRequest, ChatResponse, ServiceInfo};

/// Service information and index availability
#[inline]
pub async fn root(State(state): State<AppState>) -> Json<ServiceInfo> {
    Json(ServiceInfo {
        name: "Holos Agri Assistant",
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        rag_available: !state.pipeline.store().is_empty(),
    })
}

/// Main chat endpoint: merges session context, runs the pipeline, and
/// stores the updated context for the session
#[inline]
pub async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    debug!(
        "Chat request for session {} ({} chars)",
        request.session_id,
        request.message.len()
    );

    // Previous session context first, request context on top (request wins)
    let mut context = state
        .sessions
        .get(&request.session_id)
        .map(|entry| entry.value().clone())
        .unwrap_or_default();
    if let Some(request_context) = &request.context {
        for (key, value) in request_context {
            context.insert(key.clone(), value.clone());
        }
    }

    let history = request.history.unwrap_or_default();

    let outcome = state
        .pipeline
        .answer(&request.message, context, &history)
        .await?;

    state
        .sessions
        .insert(request.session_id.clone(), outcome.context);

    Ok(Json(ChatResponse {
        session_id: request.session_id,
        reply: outcome.reply,
        followup: outcome.followup,
        sections: Some(outcome.sections),
    }))
}

/// Maps pipeline failures onto HTTP statuses: provider outages are a bad
/// gateway, everything else an internal error
#[derive(Debug)]
pub struct ApiError(HolosError);

impl From<HolosError> for ApiError {
    #[inline]
    fn from(error: HolosError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    #[inline]
    fn into_response(self) -> Response {
        let status = match &self.0 {
            HolosError::Provider(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        error!("Chat request failed: {}", self.0);

        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}
