//! HTTP transport: `POST /mcp` takes one JSON-RPC message per request,
//! `GET /health` reports the upstream session.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::trace::TraceLayer;

use eve_domain::config::ServerConfig;

use crate::server::McpServer;

pub fn router(server: McpServer, max_concurrent: usize) -> Router {
    Router::new()
        .route("/mcp", post(mcp))
        .route("/health", get(health))
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_concurrent.max(1)))
        .layer(TraceLayer::new_for_http())
        .with_state(server)
}

async fn mcp(State(server): State<McpServer>, body: Bytes) -> Response {
    let text = String::from_utf8_lossy(&body);
    match server.handle_line(&text).await {
        Some(json) => ([(header::CONTENT_TYPE, "application/json")], json).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}

async fn health(State(server): State<McpServer>) -> impl IntoResponse {
    let session = server.core().snapshot().to_json();
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "session": session,
    }))
}

/// Bind `host:port` and serve until SIGINT or SIGTERM.
pub async fn serve_http(server: McpServer, config: &ServerConfig) -> std::io::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(
        addr = %addr,
        max_concurrent = config.max_concurrent_requests,
        "HTTP transport listening"
    );

    let app = router(server, config.max_concurrent_requests);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => tracing::info!("received SIGINT, shutting down"),
                    _ = sigterm.recv() => tracing::info!("received SIGTERM, shutting down"),
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "SIGTERM handler unavailable");
                let _ = ctrl_c.await;
                tracing::info!("received SIGINT, shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
        tracing::info!("received SIGINT, shutting down");
    }
}
