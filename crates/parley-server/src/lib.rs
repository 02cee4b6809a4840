//! Parley server library logic.

pub mod api_ws;
pub mod auth;
pub mod config;
pub mod responder;

use auth::Authenticator;
use axum::{routing::get, Extension, Json, Router};
use config::Config;
use parley_agent::{
    default_tools, ChatModel, Orchestrator, SessionRegistry, SqliteTaskStore, TaskStore,
    ToolError, ToolRegistry,
};
use parley_db::DbPool;
use parley_voice::{AsrConfig, ConnectorFactory, TurnDispatcher};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub auth: Arc<Authenticator>,
    /// Live voice sessions, one per open socket.
    pub sessions: SessionRegistry,
    pub orchestrator: Arc<Orchestrator>,
    /// Persistence used at connect time (user notes) and by the tools.
    pub store: Arc<dyn TaskStore>,
    pub transcriber: Arc<dyn ConnectorFactory>,
    pub asr: AsrConfig,
    pub dispatcher: TurnDispatcher,
}

impl AppState {
    /// Wires the built-in tools and the orchestrator around `model` and
    /// `transcriber`.
    ///
    /// # Errors
    ///
    /// Returns `ToolError` if the tool catalogue fails validation.
    pub fn new(
        config: &Config,
        pool: DbPool,
        model: Arc<dyn ChatModel>,
        transcriber: Arc<dyn ConnectorFactory>,
    ) -> Result<Self, ToolError> {
        let store: Arc<dyn TaskStore> = Arc::new(SqliteTaskStore::new(pool.clone()));
        let tools = ToolRegistry::new(default_tools(&config.tools, Arc::clone(&store))?)?;
        let sessions = SessionRegistry::new();
        let orchestrator = Orchestrator::new(
            model,
            Arc::new(tools),
            sessions.clone(),
            config.agent.orchestrator(),
        );

        Ok(Self {
            auth: Arc::new(Authenticator::new(&config.auth.jwt_secret, pool.clone())),
            pool,
            sessions,
            orchestrator: Arc::new(orchestrator),
            store,
            transcriber,
            asr: config.asr.clone(),
            dispatcher: TurnDispatcher::new(config.agent.min_transcript_chars),
        })
    }
}

async fn health(Extension(state): Extension<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "sessions": state.sessions.len().await,
    }))
}

async fn list_sessions(Extension(state): Extension<Arc<AppState>>) -> Json<Value> {
    let ids = state.sessions.ids().await;
    Json(json!({
        "active_sessions": ids.len(),
        "session_ids": ids,
    }))
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/sessions", get(list_sessions))
        .route("/ws", get(api_ws::ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(Extension(Arc::new(state)))
}
