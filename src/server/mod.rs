//! HTTP API server
//!
//! Exposes the chat relay and the session store over HTTP with axum.

pub mod error;
pub mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    routing::{delete, get, patch, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::error::Result;
use crate::providers::create_provider;
use crate::relay::ChatRelay;
use crate::storage::SessionStore;

pub use error::ApiError;
pub use handlers::{ChatRequest, StatusResponse, TitleUpdate};

/// Shared handler state, built once at startup
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<SessionStore>,
    pub relay: ChatRelay,
}

impl AppState {
    /// State over an existing relay; handlers read through the relay's store
    pub fn new(relay: ChatRelay) -> Self {
        Self {
            store: Arc::clone(relay.store()),
            relay,
        }
    }

    /// Build the store, the model provider and the relay from configuration
    ///
    /// # Errors
    ///
    /// Returns error if the store backend or the provider cannot be created
    pub fn from_config(config: &Config) -> Result<Self> {
        let store = Arc::new(SessionStore::from_config(&config.store)?);
        let provider = create_provider(&config.model)?;
        Ok(Self::new(ChatRelay::new(store, provider)))
    }
}

/// Build the API router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/chat", post(handlers::chat_handler))
        .route("/history/:session_id", get(handlers::history_handler))
        .route("/sessions", get(handlers::sessions_handler))
        .route("/sessions/:session_id", delete(handlers::delete_session_handler))
        .route(
            "/sessions/:session_id/title",
            patch(handlers::update_title_handler),
        )
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the API server until Ctrl-C or SIGTERM
///
/// # Errors
///
/// Returns error if the state cannot be built or the listener cannot bind
pub async fn run_server(config: &Config) -> Result<()> {
    let state = AppState::from_config(config)?;
    tracing::info!(
        "Relaying to model {} with {} store",
        state.relay.provider().model_name(),
        state.store.backend_name()
    );

    let host = config.server.host.as_str();
    let port = config.server.port;
    let listener = TcpListener::bind((host, port))
        .await
        .with_context(|| format!("Failed to bind {}:{}", host, port))?;
    let addr: SocketAddr = listener.local_addr().context("Failed to read local address")?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Role;
    use crate::test_utils::{temp_store, OpenFailure, ScriptedProvider};
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn app(provider: ScriptedProvider) -> (Router, Arc<SessionStore>, tempfile::TempDir) {
        let (store, dir) = temp_store();
        let relay = ChatRelay::new(Arc::clone(&store), Arc::new(provider));
        (router(AppState::new(relay)), store, dir)
    }

    fn chat_request(session_id: &str, message: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/chat")
            .header("content-type", "application/json")
            .body(Body::from(
                serde_json::json!({"session_id": session_id, "message": message}).to_string(),
            ))
            .unwrap()
    }

    #[tokio::test]
    async fn test_chat_streams_plain_text() {
        let (app, store, _dir) = app(ScriptedProvider::replying(&["Hi", " there"]));

        let response = app.oneshot(chat_request("s1", "Hello")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("text/plain"));

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"Hi there");
        assert_eq!(store.get_chat_history("s1").await.len(), 2);
    }

    #[tokio::test]
    async fn test_chat_upstream_unavailable_is_502() {
        let (app, _store, _dir) = app(ScriptedProvider::failing_to_open(OpenFailure::Unavailable));
        let response = app.oneshot(chat_request("s1", "Hello")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["code"], "upstream_unavailable");
    }

    #[tokio::test]
    async fn test_chat_upstream_timeout_is_504() {
        let (app, _store, _dir) = app(ScriptedProvider::failing_to_open(OpenFailure::Timeout));
        let response = app.oneshot(chat_request("s1", "Hello")).await.unwrap();
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[tokio::test]
    async fn test_chat_mid_stream_failure_aborts_body() {
        let (app, store, _dir) = app(ScriptedProvider::failing_after(&["Part"], "reset"));
        let response = app.oneshot(chat_request("s1", "Hello")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        assert!(to_bytes(response.into_body(), usize::MAX).await.is_err());
        assert_eq!(store.get_chat_history("s1").await.len(), 1);
    }

    #[tokio::test]
    async fn test_chat_malformed_body_rejected() {
        let (app, _store, _dir) = app(ScriptedProvider::replying(&["Hi"]));
        let request = Request::builder()
            .method("POST")
            .uri("/chat")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"session_id": "s1"}"#))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert!(response.status().is_client_error());
    }

    #[tokio::test]
    async fn test_sessions_history_title_and_delete() {
        let (app, store, _dir) = app(ScriptedProvider::replying(&[]));
        store.add_message("s1", Role::User, "Hello").await.unwrap();

        let response = app
            .clone()
            .oneshot(Request::get("/sessions").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json, serde_json::json!([{"id": "s1", "title": "Hello"}]));

        let response = app
            .clone()
            .oneshot(Request::get("/history/s1").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json, serde_json::json!([{"role": "user", "parts": ["Hello"]}]));

        let response = app
            .clone()
            .oneshot(
                Request::patch("/sessions/s1/title")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"title": "Greetings"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(store.get_all_sessions().await[0].title, "Greetings");

        let response = app
            .oneshot(Request::delete("/sessions/s1").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json, serde_json::json!({"status": "success"}));
        assert!(store.get_all_sessions().await.is_empty());
    }
}
