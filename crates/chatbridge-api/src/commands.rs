//! Inbound commands from the automation service
//!
//! Every command authenticates before it touches anything, so a rejected
//! request has no side effects.

use chatbridge_core::{
    Author, BridgeError, ChannelId, ChatHost, ChatMessage, NewMessage, PartnerDirectory,
    PartnerId, Result, SettingsResolver, TenantContext, TypingConfig,
};
use chatbridge_state::{ChannelState, ChannelStateStore};
use chatbridge_webhook::InboundAuthenticator;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Author name used when the bot partner has no name on record
pub const DEFAULT_BOT_NAME: &str = "n8n Bot";

/// SetState input
#[derive(Debug, Clone)]
pub struct SetStateCommand {
    pub channel_id: ChannelId,
    /// Empty or `None` resets ownership to unset
    pub specialist: Option<String>,
    /// Replaces the stored context when present
    pub context: Option<String>,
}

/// GetState output
#[derive(Debug, Clone, PartialEq)]
pub struct StateSnapshot {
    pub channel_id: ChannelId,
    pub active_specialist: Option<String>,
    pub context_data: Value,
}

impl From<&ChannelState> for StateSnapshot {
    fn from(state: &ChannelState) -> Self {
        Self {
            channel_id: state.channel_id,
            active_specialist: state.specialist().map(String::from),
            context_data: state.context_value(),
        }
    }
}

/// PostReply input
#[derive(Debug, Clone)]
pub struct PostReplyCommand {
    pub channel_id: ChannelId,
    pub body: String,
    pub simulate_typing: bool,
}

/// Command handlers shared by every transport
pub struct BridgeCommands {
    store: Arc<dyn ChannelStateStore>,
    host: Arc<dyn ChatHost>,
    directory: Arc<dyn PartnerDirectory>,
    settings: Arc<SettingsResolver>,
    authenticator: InboundAuthenticator,
    typing_pause: Duration,
}

impl BridgeCommands {
    pub fn new(
        store: Arc<dyn ChannelStateStore>,
        host: Arc<dyn ChatHost>,
        directory: Arc<dyn PartnerDirectory>,
        settings: Arc<SettingsResolver>,
    ) -> Self {
        Self {
            store,
            host,
            directory,
            authenticator: InboundAuthenticator::new(settings.clone()),
            settings,
            typing_pause: TypingConfig::default().pause(),
        }
    }

    pub fn with_typing_pause(mut self, pause: Duration) -> Self {
        self.typing_pause = pause;
        self
    }

    fn authenticate(
        &self,
        ctx: &TenantContext,
        token: Option<&str>,
        channel: Option<ChannelId>,
    ) -> Result<()> {
        self.authenticator.authenticate(ctx, token, channel).map(|_| ())
    }

    /// Assign the specialist owning a channel
    pub async fn set_state(
        &self,
        ctx: &TenantContext,
        token: Option<&str>,
        command: SetStateCommand,
    ) -> Result<ChannelState> {
        self.authenticate(ctx, token, Some(command.channel_id))?;

        let state = self
            .store
            .set_specialist(
                ctx,
                command.channel_id,
                command.specialist.as_deref(),
                command.context,
            )
            .await?;

        info!(
            tenant_id = %ctx.tenant_id,
            channel_id = %command.channel_id,
            active_specialist = ?state.active_specialist,
            "Channel specialist updated"
        );
        Ok(state)
    }

    /// Read the state of a channel
    pub async fn get_state(
        &self,
        ctx: &TenantContext,
        token: Option<&str>,
        channel: ChannelId,
    ) -> Result<StateSnapshot> {
        self.authenticate(ctx, token, Some(channel))?;

        let state = self
            .store
            .get_state(ctx, channel)
            .await?
            .ok_or_else(|| BridgeError::NotFound(format!("channel {}", channel)))?;
        Ok(StateSnapshot::from(&state))
    }

    /// Post a reply into a channel as the bot
    pub async fn post_reply(
        &self,
        ctx: &TenantContext,
        token: Option<&str>,
        command: PostReplyCommand,
    ) -> Result<ChatMessage> {
        let channel = command.channel_id;
        self.authenticate(ctx, token, Some(channel))?;

        if command.body.trim().is_empty() {
            return Err(BridgeError::BadRequest("body is required".to_string()));
        }
        let bot = self.join_as_bot(ctx, channel).await?;

        if command.simulate_typing {
            self.host.set_typing(ctx, channel, bot, true).await?;
            tokio::time::sleep(self.typing_pause).await;
        }

        let name = self
            .directory
            .partner_name(ctx, bot)
            .await?
            .unwrap_or_else(|| DEFAULT_BOT_NAME.to_string());
        let posted = self
            .host
            .post_message(
                ctx,
                NewMessage {
                    channel_id: channel,
                    author: Author::Partner {
                        id: bot,
                        name: Some(name),
                    },
                    body: command.body,
                },
            )
            .await;

        if command.simulate_typing {
            if let Err(e) = self.host.set_typing(ctx, channel, bot, false).await {
                warn!(channel_id = %channel, error = %e, "Failed to clear typing flag");
            }
        }

        let message = posted?;
        debug!(
            tenant_id = %ctx.tenant_id,
            channel_id = %channel,
            message_id = %message.id,
            "Bot reply posted"
        );
        Ok(message)
    }

    /// Toggle the bot's typing indicator
    pub async fn set_typing(
        &self,
        ctx: &TenantContext,
        token: Option<&str>,
        channel: ChannelId,
        is_typing: bool,
    ) -> Result<()> {
        self.authenticate(ctx, token, Some(channel))?;

        let bot = self.join_as_bot(ctx, channel).await?;
        self.host.set_typing(ctx, channel, bot, is_typing).await
    }

    /// Append a message written by a person on the host side
    pub async fn ingest_message(
        &self,
        ctx: &TenantContext,
        token: Option<&str>,
        message: NewMessage,
    ) -> Result<ChatMessage> {
        self.authenticate(ctx, token, Some(message.channel_id))?;

        if !self.host.channel_exists(ctx, message.channel_id).await? {
            return Err(BridgeError::NotFound(format!("channel {}", message.channel_id)));
        }
        self.host.post_message(ctx, message).await
    }

    /// Resolve the bot identity of a channel and make sure it is a member
    async fn join_as_bot(&self, ctx: &TenantContext, channel: ChannelId) -> Result<PartnerId> {
        if !self.host.channel_exists(ctx, channel).await? {
            return Err(BridgeError::NotFound(format!("channel {}", channel)));
        }

        let bot = self.settings.bot_partner(ctx, channel).ok_or_else(|| {
            BridgeError::Unconfigured("no bot partner configured".to_string())
        })?;

        if !self.host.is_member(ctx, channel, bot).await? {
            self.host.add_member(ctx, channel, bot).await?;
        }
        Ok(bot)
    }
}
