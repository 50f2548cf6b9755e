//! Channel state store for the chat bridge
//!
//! Persists, per chat channel, which specialist currently owns the
//! conversation plus an opaque session context blob.
//!
//! # Handoff state machine
//!
//! `active_specialist` moves between three states:
//!
//! - unset (no row, or an empty tag): default ownership
//! - a specialist tag naming an automated workflow
//! - [`HUMAN_SPECIALIST`]: a human operator took over, forwarding stops
//!
//! The only write path is [`ChannelStateStore::set_specialist`]. It has
//! get-or-create semantics and is safe under concurrent first writes: exactly
//! one row per channel survives and the losing writer updates it.

pub mod memory;
pub mod model;
pub mod postgres;

pub use memory::InMemoryChannelStateStore;
pub use model::{ChannelState, HUMAN_SPECIALIST};
pub use postgres::PgChannelStateStore;

use async_trait::async_trait;
use chatbridge_core::{BridgeError, ChannelId, TenantContext};
use thiserror::Error;

/// State store errors
#[derive(Error, Debug)]
pub enum StateError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),
}

pub type Result<T> = std::result::Result<T, StateError>;

impl From<StateError> for BridgeError {
    fn from(err: StateError) -> Self {
        BridgeError::Storage(err.to_string())
    }
}

/// Storage of per-channel handoff state
#[async_trait]
pub trait ChannelStateStore: Send + Sync {
    /// Full state of a channel, `None` when no state exists yet
    async fn get_state(
        &self,
        ctx: &TenantContext,
        channel: ChannelId,
    ) -> Result<Option<ChannelState>>;

    /// Current specialist tag, `None` when no state exists or the tag is unset
    async fn get_specialist(
        &self,
        ctx: &TenantContext,
        channel: ChannelId,
    ) -> Result<Option<String>> {
        Ok(self
            .get_state(ctx, channel)
            .await?
            .and_then(|s| s.specialist().map(String::from)))
    }

    /// Create or update the state of a channel.
    ///
    /// Always refreshes `last_interaction`. A supplied `context` replaces the
    /// stored blob wholesale; `None` leaves it untouched. An empty specialist
    /// tag resets ownership to unset.
    async fn set_specialist(
        &self,
        ctx: &TenantContext,
        channel: ChannelId,
        specialist: Option<&str>,
        context: Option<String>,
    ) -> Result<ChannelState>;
}

/// Treat empty tags as unset
pub(crate) fn normalize_specialist(specialist: Option<&str>) -> Option<String> {
    specialist
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}
