//! HTTP Server implementation

use anyhow::{Context, Result};
use axum::{response::Json, routing::get, Router};
use serde_json::json;
use tracing::{debug, info, warn};

use chatbridge_api::create_router;
use chatbridge_api::AppState as ApiAppState;
use chatbridge_core::{ChatHost, RealtimeEvent};
use tokio::sync::broadcast::error::RecvError;

use crate::app::AppState;

pub struct Server {
    state: AppState,
}

impl Server {
    pub fn new(state: AppState) -> Result<Self> {
        Ok(Self { state })
    }

    pub async fn run(self) -> Result<()> {
        let addr = self.state.config.server.address();
        let app = self.build_http_router();

        spawn_realtime_logger(self.state.host.subscribe());

        let listener = tokio::net::TcpListener::bind(addr.as_str())
            .await
            .with_context(|| format!("Failed to bind HTTP server to {}", addr))?;

        info!("HTTP server listening on {}", addr);

        axum::serve(listener, app.into_make_service())
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("HTTP server error")?;

        Ok(())
    }

    fn build_http_router(&self) -> Router {
        let api_state = ApiAppState::new(self.state.commands.clone())
            .with_token_header(&self.state.config.webhook.token_header);

        Router::new()
            .route("/", get(root))
            .merge(create_router(api_state))
    }
}

/// Log realtime notifications pushed to chat clients
fn spawn_realtime_logger(mut events: tokio::sync::broadcast::Receiver<RealtimeEvent>) {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => debug!(event = ?event, "Realtime notification"),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Realtime logger lagged behind")
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

// Route handlers

async fn root() -> Json<serde_json::Value> {
    Json(json!({
        "service": "chatbridge",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running"
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_root_handler() {
        let response = root().await;
        assert_eq!(response.0["service"], "chatbridge");
        assert_eq!(response.0["status"], "running");
    }
}
