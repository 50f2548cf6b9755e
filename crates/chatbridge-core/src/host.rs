//! Chat host abstraction
//!
//! The host application owns channels, partners and the message log. The
//! bridge talks to it through [`ChatHost`] and [`PartnerDirectory`], and
//! subscribes to new messages as a [`MessageObserver`] (an after-create hook).

use crate::{
    Author, BridgeError, ChannelId, ChatMessage, MessageId, PartnerId, Result, TenantContext,
    CHANNEL_MODEL,
};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Realtime notification pushed to connected chat clients
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RealtimeEvent {
    MessagePosted {
        tenant_id: String,
        channel_id: ChannelId,
        message: ChatMessage,
    },
    Typing {
        tenant_id: String,
        channel_id: ChannelId,
        partner_id: PartnerId,
        is_typing: bool,
    },
    MemberJoined {
        tenant_id: String,
        channel_id: ChannelId,
        partner_id: PartnerId,
    },
}

/// A message to append to a channel
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub channel_id: ChannelId,
    pub author: Author,
    pub body: String,
}

/// After-create hook on the host's message log
#[async_trait]
pub trait MessageObserver: Send + Sync {
    async fn on_messages_created(&self, ctx: &TenantContext, messages: &[ChatMessage]);
}

/// Partner lookups
#[async_trait]
pub trait PartnerDirectory: Send + Sync {
    /// Whether the partner belongs to an internal (non-share) user, i.e. staff
    async fn is_internal_partner(&self, ctx: &TenantContext, partner: PartnerId) -> Result<bool>;

    async fn partner_name(&self, ctx: &TenantContext, partner: PartnerId) -> Result<Option<String>>;
}

/// Channel operations of the host application
#[async_trait]
pub trait ChatHost: Send + Sync {
    async fn channel_exists(&self, ctx: &TenantContext, channel: ChannelId) -> Result<bool>;

    async fn is_member(
        &self,
        ctx: &TenantContext,
        channel: ChannelId,
        partner: PartnerId,
    ) -> Result<bool>;

    async fn add_member(
        &self,
        ctx: &TenantContext,
        channel: ChannelId,
        partner: PartnerId,
    ) -> Result<()>;

    /// Append a message, notify connected clients and run after-create hooks
    async fn post_message(&self, ctx: &TenantContext, message: NewMessage) -> Result<ChatMessage>;

    /// Set the transient "is typing" flag of a member
    async fn set_typing(
        &self,
        ctx: &TenantContext,
        channel: ChannelId,
        partner: PartnerId,
        is_typing: bool,
    ) -> Result<()>;

    /// Subscribe to realtime notifications
    fn subscribe(&self) -> broadcast::Receiver<RealtimeEvent>;
}

#[derive(Debug, Clone)]
struct PartnerRecord {
    name: String,
    internal: bool,
}

/// In-memory partner directory
#[derive(Default)]
pub struct InMemoryPartnerDirectory {
    partners: DashMap<(String, PartnerId), PartnerRecord>,
}

impl InMemoryPartnerDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a partner; `internal` marks staff (non-share) users
    pub fn register(&self, ctx: &TenantContext, partner: PartnerId, name: &str, internal: bool) {
        self.partners.insert(
            ctx.scoped(partner),
            PartnerRecord {
                name: name.to_string(),
                internal,
            },
        );
    }
}

#[async_trait]
impl PartnerDirectory for InMemoryPartnerDirectory {
    async fn is_internal_partner(&self, ctx: &TenantContext, partner: PartnerId) -> Result<bool> {
        Ok(self
            .partners
            .get(&ctx.scoped(partner))
            .map(|p| p.internal)
            .unwrap_or(false))
    }

    async fn partner_name(
        &self,
        ctx: &TenantContext,
        partner: PartnerId,
    ) -> Result<Option<String>> {
        Ok(self.partners.get(&ctx.scoped(partner)).map(|p| p.name.clone()))
    }
}

#[derive(Debug, Default)]
struct ChannelRecord {
    members: HashSet<PartnerId>,
    typing: HashSet<PartnerId>,
    messages: Vec<ChatMessage>,
}

/// In-memory chat host used when the bridge runs standalone and in tests
pub struct InMemoryChatHost {
    channels: DashMap<(String, ChannelId), ChannelRecord>,
    observers: RwLock<Vec<Arc<dyn MessageObserver>>>,
    realtime: broadcast::Sender<RealtimeEvent>,
    next_message_id: AtomicI64,
}

impl InMemoryChatHost {
    pub fn new() -> Self {
        let (realtime, _) = broadcast::channel(256);
        Self {
            channels: DashMap::new(),
            observers: RwLock::new(Vec::new()),
            realtime,
            next_message_id: AtomicI64::new(1),
        }
    }

    /// Register an after-create hook
    pub fn register_observer(&self, observer: Arc<dyn MessageObserver>) {
        self.observers.write().push(observer);
    }

    /// Create a channel if it does not exist yet
    pub fn create_channel(&self, ctx: &TenantContext, channel: ChannelId) {
        self.channels.entry(ctx.scoped(channel)).or_default();
    }

    /// Messages of a channel, oldest first
    pub fn messages(&self, ctx: &TenantContext, channel: ChannelId) -> Vec<ChatMessage> {
        self.channels
            .get(&ctx.scoped(channel))
            .map(|c| c.messages.clone())
            .unwrap_or_default()
    }

    pub fn members(&self, ctx: &TenantContext, channel: ChannelId) -> HashSet<PartnerId> {
        self.channels
            .get(&ctx.scoped(channel))
            .map(|c| c.members.clone())
            .unwrap_or_default()
    }

    pub fn is_typing(&self, ctx: &TenantContext, channel: ChannelId, partner: PartnerId) -> bool {
        self.channels
            .get(&ctx.scoped(channel))
            .map(|c| c.typing.contains(&partner))
            .unwrap_or(false)
    }

    fn emit(&self, event: RealtimeEvent) {
        // No subscribers is fine
        let _ = self.realtime.send(event);
    }

    fn missing_channel(channel: ChannelId) -> BridgeError {
        BridgeError::NotFound(format!("channel {}", channel))
    }
}

impl Default for InMemoryChatHost {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatHost for InMemoryChatHost {
    async fn channel_exists(&self, ctx: &TenantContext, channel: ChannelId) -> Result<bool> {
        Ok(self.channels.contains_key(&ctx.scoped(channel)))
    }

    async fn is_member(
        &self,
        ctx: &TenantContext,
        channel: ChannelId,
        partner: PartnerId,
    ) -> Result<bool> {
        let record = self
            .channels
            .get(&ctx.scoped(channel))
            .ok_or_else(|| Self::missing_channel(channel))?;
        Ok(record.members.contains(&partner))
    }

    async fn add_member(
        &self,
        ctx: &TenantContext,
        channel: ChannelId,
        partner: PartnerId,
    ) -> Result<()> {
        let added = {
            let mut record = self
                .channels
                .get_mut(&ctx.scoped(channel))
                .ok_or_else(|| Self::missing_channel(channel))?;
            record.members.insert(partner)
        };

        if added {
            info!(
                tenant_id = %ctx.tenant_id,
                channel_id = %channel,
                partner_id = %partner,
                "Partner joined channel"
            );
            self.emit(RealtimeEvent::MemberJoined {
                tenant_id: ctx.tenant_id.clone(),
                channel_id: channel,
                partner_id: partner,
            });
        }
        Ok(())
    }

    async fn post_message(&self, ctx: &TenantContext, message: NewMessage) -> Result<ChatMessage> {
        let created = ChatMessage {
            id: MessageId::new(self.next_message_id.fetch_add(1, Ordering::SeqCst)),
            model: Some(CHANNEL_MODEL.to_string()),
            res_id: Some(message.channel_id.get()),
            author: message.author,
            body: message.body,
            created_at: Utc::now(),
        };

        {
            let mut record = self
                .channels
                .get_mut(&ctx.scoped(message.channel_id))
                .ok_or_else(|| Self::missing_channel(message.channel_id))?;
            record.messages.push(created.clone());
        }

        debug!(
            tenant_id = %ctx.tenant_id,
            channel_id = %message.channel_id,
            message_id = %created.id,
            "Message appended"
        );

        self.emit(RealtimeEvent::MessagePosted {
            tenant_id: ctx.tenant_id.clone(),
            channel_id: message.channel_id,
            message: created.clone(),
        });

        let observers = self.observers.read().clone();
        for observer in observers {
            observer
                .on_messages_created(ctx, std::slice::from_ref(&created))
                .await;
        }

        Ok(created)
    }

    async fn set_typing(
        &self,
        ctx: &TenantContext,
        channel: ChannelId,
        partner: PartnerId,
        is_typing: bool,
    ) -> Result<()> {
        let changed = {
            let mut record = self
                .channels
                .get_mut(&ctx.scoped(channel))
                .ok_or_else(|| Self::missing_channel(channel))?;
            if is_typing {
                record.typing.insert(partner)
            } else {
                record.typing.remove(&partner)
            }
        };

        if changed {
            self.emit(RealtimeEvent::Typing {
                tenant_id: ctx.tenant_id.clone(),
                channel_id: channel,
                partner_id: partner,
                is_typing,
            });
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<RealtimeEvent> {
        self.realtime.subscribe()
    }
}
