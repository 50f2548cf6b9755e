//! Inbound side of the chat bridge
//!
//! Command handlers for the automation service (state, replies, typing) and
//! the HTTP routes exposing them:
//!
//! | Route | Command |
//! |---|---|
//! | `POST /n8n_bridge/update_state` | [`BridgeCommands::set_state`] |
//! | `GET /n8n_bridge/get_state/:channel_id` | [`BridgeCommands::get_state`] |
//! | `POST /n8n_bridge/chat_response` | [`BridgeCommands::post_reply`] |
//! | `POST /n8n_bridge/set_typing` | [`BridgeCommands::set_typing`] |
//! | `POST /n8n_bridge/message` | [`BridgeCommands::ingest_message`] |

pub mod commands;
pub mod error;
pub mod rest;

pub use commands::*;
pub use error::ApiError;
pub use rest::create_router;

use chatbridge_webhook::DEFAULT_TOKEN_HEADER;
use std::sync::Arc;

/// Shared state of the HTTP layer
#[derive(Clone)]
pub struct AppState {
    pub commands: Arc<BridgeCommands>,
    /// Header carrying the inbound token
    pub token_header: String,
}

impl AppState {
    pub fn new(commands: Arc<BridgeCommands>) -> Self {
        Self {
            commands,
            token_header: DEFAULT_TOKEN_HEADER.to_string(),
        }
    }

    pub fn with_token_header(mut self, header: &str) -> Self {
        self.token_header = header.to_string();
        self
    }
}
