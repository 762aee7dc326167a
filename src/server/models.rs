//! Request and response bodies for the chat API

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::pipeline::{AssistantSections, HistoryTurn};

/// Body of `POST /chat`
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    /// Unique session key for tracking the conversation
    pub session_id: String,
    /// The user's input message
    pub message: String,
    /// Optional background info (e.g. crop, region, season), merged over
    /// whatever the session already holds
    #[serde(default)]
    pub context: Option<Map<String, Value>>,
    /// Optional prior exchanges for conversational context
    #[serde(default)]
    pub history: Option<Vec<HistoryTurn>>,
}

/// Body of the `POST /chat` response
#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    /// Matches the request session id
    pub session_id: String,
    /// Main assistant reply text
    pub reply: String,
    /// Optional next question for missing info
    pub followup: Option<String>,
    /// Detailed structured answer parts
    pub sections: Option<AssistantSections>,
}

/// Body of the `GET /` service info endpoint
#[derive(Debug, Clone, Serialize)]
pub struct ServiceInfo {
    pub name: &'static str,
    pub status: &'static str,
    pub version: &'static str,
    pub rag_available: bool,
}
