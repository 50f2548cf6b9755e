//! Webhook plumbing for the chat bridge
//!
//! This crate provides both directions of the bridge:
//! - Inbound token authentication against the three settings tiers
//! - Outbound notification of new chat messages to the automation service
//!
//! # Features
//!
//! - **Authentication**: strict first-configured-tier secret check with
//!   constant-time comparison
//! - **Loop prevention**: bot-authored or bot-marked messages are never forwarded
//! - **Human handoff**: a staff message latches the channel to `human` and
//!   mutes further forwarding
//! - **Fire-and-forget delivery**: each webhook call runs on a detached task
//!   behind the [`WebhookTransport`] boundary
//!
//! # Example
//!
//! ```rust,ignore
//! use chatbridge_webhook::{HttpTransport, OutboundNotifier};
//! use std::sync::Arc;
//!
//! let transport = Arc::new(HttpTransport::new(config.webhook.timeout())?);
//! let notifier = Arc::new(OutboundNotifier::new(store, settings, directory, transport));
//! host.register_observer(notifier);
//! ```

pub mod auth;
pub mod payload;
pub mod transport;
pub mod notifier;

pub use auth::*;
pub use notifier::*;
pub use payload::*;
pub use transport::*;

use chatbridge_core::BridgeError;
use thiserror::Error;

/// Webhook errors
#[derive(Error, Debug)]
pub enum WebhookError {
    #[error("Invalid webhook URL: {0}")]
    InvalidUrl(String),

    #[error("Delivery failed: {0}")]
    DeliveryFailed(String),

    #[error("Delivery timed out")]
    Timeout,

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Client error: {0}")]
    Client(String),
}

pub type Result<T> = std::result::Result<T, WebhookError>;

impl From<reqwest::Error> for WebhookError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            WebhookError::Timeout
        } else if err.is_builder() {
            WebhookError::InvalidUrl(err.to_string())
        } else {
            WebhookError::Http(err.to_string())
        }
    }
}

impl From<WebhookError> for BridgeError {
    fn from(err: WebhookError) -> Self {
        BridgeError::Delivery(err.to_string())
    }
}
