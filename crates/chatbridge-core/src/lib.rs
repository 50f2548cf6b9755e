//! Core types for the chat bridge
//!
//! Shared by every crate in the workspace:
//! - Record identifiers, chat messages and the explicit tenant context
//! - The error taxonomy surfaced at the HTTP boundary
//! - Application configuration
//! - The three-tier settings resolution (channel > environment > global)
//! - The chat host abstraction and an in-memory host

pub mod config;
pub mod error;
pub mod host;
pub mod settings;
pub mod types;

pub use config::*;
pub use error::*;
pub use types::*;

pub use host::{
    ChatHost, InMemoryChatHost, InMemoryPartnerDirectory, MessageObserver, NewMessage,
    PartnerDirectory, RealtimeEvent,
};
pub use settings::{
    env_vars, keys, BridgeSettings, ChannelSettingsTier, EnvironmentTier, GlobalSettingsTier,
    ResolvedTarget, SettingKey, SettingsResolver, SettingsTier, TierScope,
};
