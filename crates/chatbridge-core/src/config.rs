use crate::settings::BridgeSettings;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// Prefix of environment overrides for [`AppConfig`], e.g. `CHATBRIDGE__SERVER__PORT`
pub const ENV_PREFIX: &str = "CHATBRIDGE";

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub webhook: WebhookConfig,
    #[serde(default)]
    pub typing: TypingConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Per-tenant channel and global settings, keyed by tenant id
    #[serde(default)]
    pub tenants: HashMap<String, TenantConfig>,
}

impl AppConfig {
    /// Load configuration from environment variables only
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration from an optional TOML file with environment overrides.
    ///
    /// A missing file is not an error; defaults apply.
    pub fn load_from(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("server.host", default_host())?
            .set_default("server.port", default_port() as i64)?
            .set_default("webhook.timeout_secs", default_timeout_secs() as i64)?
            .set_default("webhook.bot_marker", default_bot_marker())?
            .set_default("webhook.token_header", default_token_header())?
            .set_default("typing.pause_ms", default_pause_ms() as i64)?;

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(false));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        config.try_deserialize()
    }

    /// Configuration for a tenant, if any was declared
    pub fn tenant(&self, tenant_id: &str) -> Option<&TenantConfig> {
        self.tenants.get(tenant_id)
    }
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl ServerConfig {
    pub fn new() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }

    pub fn with_host(mut self, host: String) -> Self {
        self.host = host;
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Outbound webhook configuration
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookConfig {
    /// Timeout of a single outbound call
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Substring that marks bot-authored content; messages containing it are never forwarded
    #[serde(default = "default_bot_marker")]
    pub bot_marker: String,
    /// Header carrying the shared secret, both inbound and outbound
    #[serde(default = "default_token_header")]
    pub token_header: String,
}

impl WebhookConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            bot_marker: default_bot_marker(),
            token_header: default_token_header(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    5
}

fn default_bot_marker() -> String {
    r#"<span class="n8n-bot">"#.to_string()
}

fn default_token_header() -> String {
    "X-N8N-Token".to_string()
}

/// Typing simulation for bot replies
#[derive(Debug, Clone, Deserialize)]
pub struct TypingConfig {
    /// Pause between switching the typing flag on and posting the reply
    #[serde(default = "default_pause_ms")]
    pub pause_ms: u64,
}

impl TypingConfig {
    pub fn pause(&self) -> Duration {
        Duration::from_millis(self.pause_ms)
    }
}

impl Default for TypingConfig {
    fn default() -> Self {
        Self {
            pause_ms: default_pause_ms(),
        }
    }
}

fn default_pause_ms() -> u64 {
    1000
}

/// Database configuration. Without a URL the in-memory state store is used.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: default_max_connections(),
        }
    }
}

fn default_max_connections() -> u32 {
    5
}

/// Settings declared for one tenant
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TenantConfig {
    /// Global (system parameter) tier
    #[serde(default)]
    pub global: BridgeSettings,
    /// Per-channel tier, keyed by channel id
    #[serde(default)]
    pub channels: HashMap<String, BridgeSettings>,
    /// Display name given to bot partners in the partner directory
    #[serde(default)]
    pub bot_name: Option<String>,
}
