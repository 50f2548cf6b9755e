//! Webhook transport
//!
//! The single HTTP call of an outbound notification sits behind
//! [`WebhookTransport`] so the notifier can be tested without a network.

use crate::{payload::OutboundPayload, Result, WebhookError};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use std::time::Duration;
use tracing::{debug, warn};

/// Default header carrying the outgoing token
pub const DEFAULT_TOKEN_HEADER: &str = "X-N8N-Token";

const USER_AGENT: &str = concat!("chatbridge/", env!("CARGO_PKG_VERSION"));

/// One outbound webhook call
pub struct OutboundRequest {
    pub url: String,
    /// Sent in the token header; the header is omitted when `None`
    pub token: Option<Secret<String>>,
    pub payload: OutboundPayload,
}

impl std::fmt::Debug for OutboundRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutboundRequest")
            .field("url", &self.url)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("payload", &self.payload)
            .finish()
    }
}

/// Result of a completed call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryReceipt {
    pub status_code: u16,
    pub duration_ms: u64,
}

/// Performs outbound webhook calls
#[async_trait]
pub trait WebhookTransport: Send + Sync {
    /// Deliver one request. Non-2xx responses are errors.
    async fn deliver(&self, request: OutboundRequest) -> Result<DeliveryReceipt>;
}

/// `reqwest`-backed transport
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    token_header: String,
}

impl HttpTransport {
    /// Create a transport whose calls give up after `timeout`
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| WebhookError::Client(e.to_string()))?;

        Ok(Self {
            client,
            token_header: DEFAULT_TOKEN_HEADER.to_string(),
        })
    }

    pub fn with_token_header(mut self, header: &str) -> Self {
        self.token_header = header.to_string();
        self
    }
}

#[async_trait]
impl WebhookTransport for HttpTransport {
    async fn deliver(&self, request: OutboundRequest) -> Result<DeliveryReceipt> {
        let started_at = Utc::now();

        let mut builder = self.client.post(&request.url).json(&request.payload);
        if let Some(token) = &request.token {
            builder = builder.header(self.token_header.as_str(), token.expose_secret().as_str());
        }

        let response = builder.send().await?;
        let status = response.status();
        let duration_ms = (Utc::now() - started_at).num_milliseconds().max(0) as u64;

        if !status.is_success() {
            warn!(
                url = %request.url,
                status = %status,
                duration_ms,
                "Webhook received non-success response"
            );
            return Err(WebhookError::DeliveryFailed(format!("HTTP {}", status)));
        }

        debug!(url = %request.url, status = %status, duration_ms, "Webhook delivered");
        Ok(DeliveryReceipt {
            status_code: status.as_u16(),
            duration_ms,
        })
    }
}
