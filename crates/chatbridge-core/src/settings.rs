//! Three-tier settings resolution
//!
//! Every bridge setting is looked up through an ordered chain of tiers, first
//! match wins:
//!
//! 1. the chat channel's own settings
//! 2. the process environment (snapshotted at startup)
//! 3. the tenant's global persisted parameters
//!
//! Tiers are injected into [`SettingsResolver`] so tests can substitute fakes.

use crate::{AppConfig, ChannelId, PartnerId, TenantContext};
use dashmap::DashMap;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Global parameter keys
pub mod keys {
    pub const WEBHOOK_URL: &str = "n8n_bridge.webhook_url";
    pub const OUTGOING_TOKEN: &str = "n8n_bridge.outgoing_token";
    pub const INCOMING_TOKEN: &str = "n8n_bridge.incoming_token";
    pub const BOT_PARTNER_ID: &str = "n8n_bridge.bot_partner_id";
}

/// Environment variables read by [`EnvironmentTier::from_env`]
pub mod env_vars {
    pub const WEBHOOK_URL: &str = "N8N_BRIDGE_WEBHOOK_URL";
    pub const OUTGOING_TOKEN: &str = "N8N_BRIDGE_OUTGOING_TOKEN";
    pub const INCOMING_TOKEN: &str = "N8N_BRIDGE_INCOMING_TOKEN";
}

/// A bridge setting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingKey {
    /// Destination of outbound message webhooks
    WebhookUrl,
    /// Secret sent with outbound webhooks
    OutgoingToken,
    /// Secret expected on inbound requests
    IncomingToken,
    /// Partner used as the bot identity
    BotPartnerId,
}

impl SettingKey {
    /// Key of this setting in the global parameter tier
    pub fn parameter(&self) -> &'static str {
        match self {
            SettingKey::WebhookUrl => keys::WEBHOOK_URL,
            SettingKey::OutgoingToken => keys::OUTGOING_TOKEN,
            SettingKey::IncomingToken => keys::INCOMING_TOKEN,
            SettingKey::BotPartnerId => keys::BOT_PARTNER_ID,
        }
    }
}

/// Where a tier's values come from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TierScope {
    Channel,
    Environment,
    Global,
}

impl TierScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            TierScope::Channel => "channel",
            TierScope::Environment => "environment",
            TierScope::Global => "global",
        }
    }
}

impl std::fmt::Display for TierScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bridge settings as declared for a channel or for a tenant's global tier
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BridgeSettings {
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default)]
    pub outgoing_token: Option<String>,
    #[serde(default)]
    pub incoming_token: Option<String>,
    #[serde(default)]
    pub bot_partner_id: Option<i64>,
}

impl BridgeSettings {
    pub fn with_webhook(mut self, url: &str, token: Option<&str>) -> Self {
        self.webhook_url = Some(url.to_string());
        self.outgoing_token = token.map(String::from);
        self
    }

    pub fn with_incoming_token(mut self, token: &str) -> Self {
        self.incoming_token = Some(token.to_string());
        self
    }

    pub fn with_bot_partner(mut self, partner_id: i64) -> Self {
        self.bot_partner_id = Some(partner_id);
        self
    }

    /// Value of a setting; empty strings count as unset
    pub fn get(&self, key: SettingKey) -> Option<String> {
        let value = match key {
            SettingKey::WebhookUrl => self.webhook_url.clone(),
            SettingKey::OutgoingToken => self.outgoing_token.clone(),
            SettingKey::IncomingToken => self.incoming_token.clone(),
            SettingKey::BotPartnerId => self.bot_partner_id.map(|id| id.to_string()),
        };
        non_empty(value)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// One tier of the settings chain
pub trait SettingsTier: Send + Sync {
    fn scope(&self) -> TierScope;

    /// Look up a setting. Tiers that are not channel-scoped ignore `channel`.
    fn lookup(
        &self,
        ctx: &TenantContext,
        channel: Option<ChannelId>,
        key: SettingKey,
    ) -> Option<String>;
}

/// Per-channel settings
#[derive(Default)]
pub struct ChannelSettingsTier {
    channels: DashMap<(String, ChannelId), BridgeSettings>,
}

impl ChannelSettingsTier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from the `channels` tables of every configured tenant
    pub fn from_config(config: &AppConfig) -> Self {
        let tier = Self::new();
        for (tenant_id, tenant) in &config.tenants {
            let ctx = TenantContext::new(tenant_id.clone());
            for (raw_id, settings) in &tenant.channels {
                match raw_id.parse::<i64>() {
                    Ok(id) => tier.set_channel(&ctx, ChannelId::new(id), settings.clone()),
                    Err(_) => warn!(
                        tenant_id = %tenant_id,
                        channel = %raw_id,
                        "Ignoring channel settings with a non-numeric channel id"
                    ),
                }
            }
        }
        tier
    }

    pub fn set_channel(&self, ctx: &TenantContext, channel: ChannelId, settings: BridgeSettings) {
        debug!(
            tenant_id = %ctx.tenant_id,
            channel_id = %channel,
            "Setting channel bridge settings"
        );
        self.channels.insert(ctx.scoped(channel), settings);
    }

    pub fn remove_channel(&self, ctx: &TenantContext, channel: ChannelId) {
        self.channels.remove(&ctx.scoped(channel));
    }
}

impl SettingsTier for ChannelSettingsTier {
    fn scope(&self) -> TierScope {
        TierScope::Channel
    }

    fn lookup(
        &self,
        ctx: &TenantContext,
        channel: Option<ChannelId>,
        key: SettingKey,
    ) -> Option<String> {
        let channel = channel?;
        self.channels.get(&ctx.scoped(channel))?.get(key)
    }
}

/// Process environment, captured once
#[derive(Debug, Clone, Default)]
pub struct EnvironmentTier {
    values: HashMap<SettingKey, String>,
}

impl EnvironmentTier {
    /// Snapshot the `N8N_BRIDGE_*` variables
    pub fn from_env() -> Self {
        let mut values = HashMap::new();
        for (key, var) in [
            (SettingKey::WebhookUrl, env_vars::WEBHOOK_URL),
            (SettingKey::OutgoingToken, env_vars::OUTGOING_TOKEN),
            (SettingKey::IncomingToken, env_vars::INCOMING_TOKEN),
        ] {
            if let Some(value) = non_empty(std::env::var(var).ok()) {
                values.insert(key, value);
            }
        }
        Self { values }
    }

    pub fn from_pairs<I, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (SettingKey, V)>,
        V: Into<String>,
    {
        Self {
            values: pairs.into_iter().map(|(k, v)| (k, v.into())).collect(),
        }
    }
}

impl SettingsTier for EnvironmentTier {
    fn scope(&self) -> TierScope {
        TierScope::Environment
    }

    fn lookup(
        &self,
        _ctx: &TenantContext,
        _channel: Option<ChannelId>,
        key: SettingKey,
    ) -> Option<String> {
        non_empty(self.values.get(&key).cloned())
    }
}

/// Global persisted parameters, per tenant
#[derive(Default)]
pub struct GlobalSettingsTier {
    params: DashMap<(String, String), String>,
}

impl GlobalSettingsTier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from the `global` table of every configured tenant
    pub fn from_config(config: &AppConfig) -> Self {
        let tier = Self::new();
        for (tenant_id, tenant) in &config.tenants {
            let ctx = TenantContext::new(tenant_id.clone());
            tier.apply(&ctx, &tenant.global);
        }
        tier
    }

    /// Write every value present in `settings` as a parameter
    pub fn apply(&self, ctx: &TenantContext, settings: &BridgeSettings) {
        for key in [
            SettingKey::WebhookUrl,
            SettingKey::OutgoingToken,
            SettingKey::IncomingToken,
            SettingKey::BotPartnerId,
        ] {
            if let Some(value) = settings.get(key) {
                self.set_param(ctx, key.parameter(), &value);
            }
        }
    }

    pub fn set_param(&self, ctx: &TenantContext, key: &str, value: &str) {
        self.params.insert(ctx.scoped(key.to_string()), value.to_string());
    }

    pub fn get_param(&self, ctx: &TenantContext, key: &str) -> Option<String> {
        self.params.get(&ctx.scoped(key.to_string())).map(|v| v.clone())
    }
}

impl SettingsTier for GlobalSettingsTier {
    fn scope(&self) -> TierScope {
        TierScope::Global
    }

    fn lookup(
        &self,
        ctx: &TenantContext,
        _channel: Option<ChannelId>,
        key: SettingKey,
    ) -> Option<String> {
        non_empty(self.get_param(ctx, key.parameter()))
    }
}

/// Webhook destination resolved for one outbound attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    pub url: String,
    pub outgoing_token: Option<String>,
    /// Tier the destination came from
    pub source: TierScope,
}

/// Ordered chain of settings tiers
#[derive(Clone)]
pub struct SettingsResolver {
    tiers: Vec<Arc<dyn SettingsTier>>,
}

impl SettingsResolver {
    /// Build the standard chain: channel, then environment, then global
    pub fn new(
        channel: Arc<dyn SettingsTier>,
        environment: Arc<dyn SettingsTier>,
        global: Arc<dyn SettingsTier>,
    ) -> Self {
        Self {
            tiers: vec![channel, environment, global],
        }
    }

    pub fn tiers(&self) -> &[Arc<dyn SettingsTier>] {
        &self.tiers
    }

    /// First configured value for `key`, with the tier it came from
    pub fn lookup(
        &self,
        ctx: &TenantContext,
        channel: Option<ChannelId>,
        key: SettingKey,
    ) -> Option<(TierScope, String)> {
        self.tiers
            .iter()
            .find_map(|tier| tier.lookup(ctx, channel, key).map(|v| (tier.scope(), v)))
    }

    /// Resolve the webhook destination for a channel.
    ///
    /// URL and token are taken as a pair from the first tier that has a URL.
    pub fn resolve_target(
        &self,
        ctx: &TenantContext,
        channel: ChannelId,
    ) -> Option<ResolvedTarget> {
        self.tiers.iter().find_map(|tier| {
            let url = tier.lookup(ctx, Some(channel), SettingKey::WebhookUrl)?;
            Some(ResolvedTarget {
                url,
                outgoing_token: tier.lookup(ctx, Some(channel), SettingKey::OutgoingToken),
                source: tier.scope(),
            })
        })
    }

    /// Bot identity for a channel: the channel's own bot, else the global fallback.
    ///
    /// A non-numeric id is skipped and the next tier is consulted.
    pub fn bot_partner(&self, ctx: &TenantContext, channel: ChannelId) -> Option<PartnerId> {
        self.tiers.iter().find_map(|tier| {
            let raw = tier.lookup(ctx, Some(channel), SettingKey::BotPartnerId)?;
            match raw.trim().parse::<i64>() {
                Ok(id) => Some(PartnerId::new(id)),
                Err(_) => {
                    warn!(tier = %tier.scope(), value = %raw, "Bot partner id is not numeric");
                    None
                }
            }
        })
    }

    /// Every bot identity that may author messages in a channel
    pub fn bot_partners(&self, ctx: &TenantContext, channel: ChannelId) -> Vec<PartnerId> {
        self.tiers
            .iter()
            .filter_map(|tier| tier.lookup(ctx, Some(channel), SettingKey::BotPartnerId))
            .filter_map(|raw| raw.trim().parse::<i64>().ok())
            .map(PartnerId::new)
            .collect()
    }
}
