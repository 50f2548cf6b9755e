//! Inbound request authentication
//!
//! Requests from the automation service carry a shared secret. The secret is
//! resolved through the settings chain (channel, environment, global) and the
//! first tier that has one decides: a mismatch there rejects without looking
//! further. With no secret configured anywhere every request is rejected.

use chatbridge_core::{
    BridgeError, ChannelId, Result, SettingKey, SettingsResolver, TenantContext, TierScope,
};
use secrecy::{ExposeSecret, Secret};
use std::sync::Arc;
use tracing::{debug, warn};

/// Number of token characters that may appear in logs
const LOGGED_PREFIX_LEN: usize = 4;

/// Validates inbound tokens
#[derive(Clone)]
pub struct InboundAuthenticator {
    settings: Arc<SettingsResolver>,
}

impl InboundAuthenticator {
    pub fn new(settings: Arc<SettingsResolver>) -> Self {
        Self { settings }
    }

    /// Check `token` for a request, optionally scoped to a channel.
    ///
    /// Returns the tier whose secret matched. Every rejection is the same
    /// [`BridgeError::Unauthorized`] so callers learn nothing about the tiers.
    pub fn authenticate(
        &self,
        ctx: &TenantContext,
        token: Option<&str>,
        channel: Option<ChannelId>,
    ) -> Result<TierScope> {
        let Some((scope, secret)) = self.settings.lookup(ctx, channel, SettingKey::IncomingToken)
        else {
            warn!(
                tenant_id = %ctx.tenant_id,
                channel_id = ?channel.map(|c| c.get()),
                "Rejecting request: no incoming token configured"
            );
            return Err(BridgeError::Unauthorized);
        };
        let secret = Secret::new(secret);

        let Some(token) = token.filter(|t| !t.is_empty()) else {
            warn!(
                tenant_id = %ctx.tenant_id,
                channel_id = ?channel.map(|c| c.get()),
                "Rejecting request: missing token"
            );
            return Err(BridgeError::Unauthorized);
        };

        if !constant_time_compare(token, secret.expose_secret()) {
            warn!(
                tenant_id = %ctx.tenant_id,
                channel_id = ?channel.map(|c| c.get()),
                tier = %scope,
                token_prefix = %token_prefix(token),
                "Rejecting request: token mismatch"
            );
            return Err(BridgeError::Unauthorized);
        }

        debug!(tenant_id = %ctx.tenant_id, tier = %scope, "Request authenticated");
        Ok(scope)
    }

    pub fn is_authorized(
        &self,
        ctx: &TenantContext,
        token: Option<&str>,
        channel: Option<ChannelId>,
    ) -> bool {
        self.authenticate(ctx, token, channel).is_ok()
    }
}

/// Constant-time string comparison
pub fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }

    result == 0
}

/// Loggable prefix of a token, never more than half of it
pub fn token_prefix(token: &str) -> String {
    let visible = LOGGED_PREFIX_LEN.min(token.chars().count() / 2);
    let prefix: String = token.chars().take(visible).collect();
    format!("{}...", prefix)
}
