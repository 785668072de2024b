//! HTTP API
//!
//! Provides the REST and SSE surface the chat UI talks to.
//!
//! # Endpoints
//!
//! - POST /start - Create a session from a task and agent list
//! - GET /chat-stream - Run a session and stream its records (SSE)
//! - GET /stop - Cancel a running session
//! - POST /chat - Single model reply without a team
//! - POST /conversations, /conversations/user, /conversations/delete
//! - GET/POST /teams, GET/PUT/DELETE /teams/:team_id
//! - POST /initialize-teams (also under its historical misspelling)
//! - GET /health

pub mod auth;
pub mod chat;
pub mod conversations;
pub mod error;
pub mod teams;

pub use auth::AuthUser;
pub use error::ApiError;

use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::Config;
use crate::db::Database;
use crate::llm::LLMProvider;
use crate::session::SessionRegistry;

/// State shared by every route
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: Database,
    pub client: Arc<dyn LLMProvider>,
    pub sessions: SessionRegistry,
}

impl AppState {
    pub fn new(config: Config, db: Database, client: Arc<dyn LLMProvider>) -> Self {
        Self {
            config: Arc::new(config),
            db,
            client,
            sessions: SessionRegistry::new(),
        }
    }
}

/// `{status, message}` body used by the action routes
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusResponse {
    pub status: String,
    pub message: String,
}

impl StatusResponse {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: "success".to_string(),
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
        }
    }
}

/// Build the router with permissive CORS and request tracing
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/start", post(chat::start))
        .route("/chat", post(chat::chat))
        .route("/chat-stream", get(chat::chat_stream))
        .route("/stop", get(chat::stop))
        .route("/conversations", post(conversations::list))
        .route("/conversations/user", post(conversations::for_user))
        .route("/conversations/delete", post(conversations::delete))
        .route("/teams", get(teams::list).post(teams::create))
        .route(
            "/teams/:team_id",
            get(teams::get).put(teams::update).delete(teams::delete),
        )
        .route("/initialize-teams", post(teams::initialize))
        .route("/inititalize-teams", post(teams::initialize))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "framework": "Dream Team",
        "version": env!("CARGO_PKG_VERSION"),
        "commit": env!("GIT_COMMIT_HASH"),
    }))
}

/// Serve until `shutdown` is cancelled
pub async fn serve(state: AppState, shutdown: CancellationToken) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", state.config.server.host, state.config.server.port)
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid listen address: {}", e))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind {}: {}", addr, e))?;
    let bound = listener.local_addr()?;
    info!("API server listening on http://{}", bound);

    let sessions = state.sessions.clone();
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            shutdown.cancelled().await;
            info!(
                "API server shutting down gracefully ({} sessions running)",
                sessions.len()
            );
        })
        .await?;

    Ok(())
}
