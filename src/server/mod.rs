// HTTP server module
// Exposes the chat pipeline over a small axum surface with per-session
// context tracking


pub mod models;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::http::HeaderValue;
use axum::routing::{get, post};
use dashmap::DashMap;
use serde_json::{Map, Value};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::Result;
use crate::config::ServerConfig;
use crate::pipeline::ChatPipeline;

/// Shared state handed to request handlers
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<ChatPipeline>,
    /// Per-session conversation context, merged on every chat turn.
    /// Ephemeral by design: nothing here survives a restart.
    pub sessions: Arc<DashMap<String, Map<String, Value>>>,
}

impl AppState {
    #[inline]
    pub fn new(pipeline: Arc<ChatPipeline>) -> Self {
        Self {
            pipeline,
            sessions: Arc::new(DashMap::new()),
        }
    }
}

/// Build the router with CORS and request tracing layers
#[inline]
pub fn build_router(state: AppState, cors_origins: &[String]) -> Router {
    Router::new()
        .route("/", get(routes::root))
        .route("/chat", post(routes::chat))
        .layer(build_cors(cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn build_cors(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if origins.iter().any(|origin| origin == "*") {
        return cors.allow_origin(Any);
    }

    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    cors.allow_origin(AllowOrigin::list(parsed))
}

/// Bind the configured address and serve until the process is stopped
#[inline]
pub async fn serve(config: &ServerConfig, state: AppState) -> Result<()> {
    let app = build_router(state, &config.cors_origins);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("Holos backend listening on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
