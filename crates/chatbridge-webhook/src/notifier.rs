//! Outbound notifier
//!
//! Runs for every new chat message and decides whether the automation service
//! hears about it. Per message:
//!
//! 1. only channel messages not written by a bot are eligible
//! 2. a message from internal staff latches the channel to `human` and stops
//! 3. a channel owned by `human` is muted
//! 4. the destination is resolved through the settings tiers
//! 5. the call is handed to a detached task; its result is only logged
//!
//! Nothing in here ever fails the caller that created the message.

use crate::{
    payload::OutboundPayload,
    transport::{OutboundRequest, WebhookTransport},
};
use async_trait::async_trait;
use chatbridge_core::{
    ChannelId, ChatMessage, MessageObserver, PartnerDirectory, Result, SettingsResolver,
    TenantContext, WebhookConfig,
};
use chatbridge_state::{ChannelStateStore, HUMAN_SPECIALIST};
use secrecy::Secret;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Why a message was not forwarded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Not attached to a chat channel
    NotChannelMessage,
    /// Authored by a bot identity of the channel
    BotAuthor,
    /// Body carries the bot marker
    BotMarker,
    /// A state or partner lookup failed
    LookupFailed,
}

/// What the notifier did with one message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyOutcome {
    /// Handed to a background delivery task
    Dispatched,
    Skipped(SkipReason),
    /// Staff message; the channel now belongs to a human
    HumanLatched,
    /// The channel belongs to a human
    Muted,
    /// No webhook URL at any tier
    Unconfigured,
}

/// Forwards new chat messages to the automation service
pub struct OutboundNotifier {
    store: Arc<dyn ChannelStateStore>,
    settings: Arc<SettingsResolver>,
    directory: Arc<dyn PartnerDirectory>,
    transport: Arc<dyn WebhookTransport>,
    bot_marker: String,
}

impl OutboundNotifier {
    pub fn new(
        store: Arc<dyn ChannelStateStore>,
        settings: Arc<SettingsResolver>,
        directory: Arc<dyn PartnerDirectory>,
        transport: Arc<dyn WebhookTransport>,
    ) -> Self {
        Self {
            store,
            settings,
            directory,
            transport,
            bot_marker: WebhookConfig::default().bot_marker,
        }
    }

    pub fn with_bot_marker(mut self, marker: &str) -> Self {
        self.bot_marker = marker.to_string();
        self
    }

    /// Process a batch of newly created messages
    pub async fn notify(
        &self,
        ctx: &TenantContext,
        messages: &[ChatMessage],
    ) -> Vec<NotifyOutcome> {
        let mut outcomes = Vec::with_capacity(messages.len());
        for message in messages {
            outcomes.push(self.process_message(ctx, message).await);
        }
        outcomes
    }

    /// Process one message
    pub async fn process_message(
        &self,
        ctx: &TenantContext,
        message: &ChatMessage,
    ) -> NotifyOutcome {
        let Some(channel) = message.channel_id() else {
            return NotifyOutcome::Skipped(SkipReason::NotChannelMessage);
        };

        match self.evaluate(ctx, channel, message).await {
            Ok(outcome) => {
                debug!(
                    tenant_id = %ctx.tenant_id,
                    channel_id = %channel,
                    message_id = %message.id,
                    outcome = ?outcome,
                    "Message processed by notifier"
                );
                outcome
            }
            Err(e) => {
                error!(
                    tenant_id = %ctx.tenant_id,
                    channel_id = %channel,
                    message_id = %message.id,
                    error = %e,
                    "Failed to process message for webhook"
                );
                NotifyOutcome::Skipped(SkipReason::LookupFailed)
            }
        }
    }

    async fn evaluate(
        &self,
        ctx: &TenantContext,
        channel: ChannelId,
        message: &ChatMessage,
    ) -> Result<NotifyOutcome> {
        let author = message.author.partner_id();

        if let Some(partner) = author {
            if self.settings.bot_partners(ctx, channel).contains(&partner) {
                return Ok(NotifyOutcome::Skipped(SkipReason::BotAuthor));
            }
        }
        if !self.bot_marker.is_empty() && message.body.contains(&self.bot_marker) {
            return Ok(NotifyOutcome::Skipped(SkipReason::BotMarker));
        }

        if let Some(partner) = author {
            if self.directory.is_internal_partner(ctx, partner).await? {
                self.store
                    .set_specialist(ctx, channel, Some(HUMAN_SPECIALIST), None)
                    .await?;
                info!(
                    tenant_id = %ctx.tenant_id,
                    channel_id = %channel,
                    partner_id = %partner,
                    "Staff message, channel handed to a human"
                );
                return Ok(NotifyOutcome::HumanLatched);
            }
        }

        let state = self.store.get_state(ctx, channel).await?;
        if state.as_ref().is_some_and(|s| s.is_human()) {
            return Ok(NotifyOutcome::Muted);
        }

        let Some(target) = self.settings.resolve_target(ctx, channel) else {
            warn!(
                tenant_id = %ctx.tenant_id,
                channel_id = %channel,
                "No webhook URL configured, message not forwarded"
            );
            return Ok(NotifyOutcome::Unconfigured);
        };

        let request = OutboundRequest {
            url: target.url,
            token: target.outgoing_token.map(Secret::new),
            payload: OutboundPayload::new(message, channel, state.as_ref()),
        };
        debug!(
            channel_id = %channel,
            url = %request.url,
            tier = %target.source,
            "Dispatching webhook"
        );
        self.dispatch(request);

        Ok(NotifyOutcome::Dispatched)
    }

    /// Deliver on a detached task; at most once, no retry
    fn dispatch(&self, request: OutboundRequest) {
        let transport = self.transport.clone();
        tokio::spawn(async move {
            let url = request.url.clone();
            let message_id = request.payload.message_id;
            match transport.deliver(request).await {
                Ok(receipt) => debug!(
                    url = %url,
                    message_id,
                    status = receipt.status_code,
                    duration_ms = receipt.duration_ms,
                    "Webhook call completed"
                ),
                Err(e) => error!(url = %url, message_id, error = %e, "Webhook call failed"),
            }
        });
    }
}

#[async_trait]
impl MessageObserver for OutboundNotifier {
    async fn on_messages_created(&self, ctx: &TenantContext, messages: &[ChatMessage]) {
        self.notify(ctx, messages).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::WebhookError;
    use chatbridge_core::{
        keys, Author, BridgeSettings, ChannelSettingsTier, EnvironmentTier,
        GlobalSettingsTier, InMemoryPartnerDirectory, MessageId, PartnerId, CHANNEL_MODEL,
    };
    use chatbridge_state::{ChannelState, InMemoryChannelStateStore};
    use chrono::Utc;
    use secrecy::ExposeSecret;
    use serde_json::json;
    use std::time::Duration;
    use tokio::sync::mpsc;

    const CHANNEL: ChannelId = ChannelId::new(42);
    const BOT: i64 = 3;
    const STAFF: i64 = 7;
    const GLOBAL_URL: &str = "https://n8n.example.com/webhook/chat";

    struct RecordingTransport {
        sent: mpsc::UnboundedSender<OutboundRequest>,
    }

    #[async_trait]
    impl WebhookTransport for RecordingTransport {
        async fn deliver(&self, request: OutboundRequest) -> crate::Result<crate::DeliveryReceipt> {
            self.sent
                .send(request)
                .map_err(|e| WebhookError::DeliveryFailed(e.to_string()))?;
            Ok(crate::DeliveryReceipt {
                status_code: 200,
                duration_ms: 0,
            })
        }
    }

    struct FailingStore;

    #[async_trait]
    impl ChannelStateStore for FailingStore {
        async fn get_state(
            &self,
            _ctx: &TenantContext,
            _channel: ChannelId,
        ) -> chatbridge_state::Result<Option<ChannelState>> {
            Err(chatbridge_state::StateError::InvalidRecord("offline".into()))
        }

        async fn set_specialist(
            &self,
            _ctx: &TenantContext,
            _channel: ChannelId,
            _specialist: Option<&str>,
            _context: Option<String>,
        ) -> chatbridge_state::Result<ChannelState> {
            Err(chatbridge_state::StateError::InvalidRecord("offline".into()))
        }
    }

    struct Fixture {
        notifier: OutboundNotifier,
        store: Arc<InMemoryChannelStateStore>,
        channel_tier: Arc<ChannelSettingsTier>,
        sent: mpsc::UnboundedReceiver<OutboundRequest>,
        ctx: TenantContext,
    }

    fn fixture() -> Fixture {
        let ctx = TenantContext::default();
        let store = Arc::new(InMemoryChannelStateStore::new());
        let channel_tier = Arc::new(ChannelSettingsTier::new());
        let global = Arc::new(GlobalSettingsTier::new());
        global.set_param(&ctx, keys::WEBHOOK_URL, GLOBAL_URL);
        global.set_param(&ctx, keys::OUTGOING_TOKEN, "global-out");
        global.set_param(&ctx, keys::BOT_PARTNER_ID, &BOT.to_string());
        let settings = Arc::new(SettingsResolver::new(
            channel_tier.clone(),
            Arc::new(EnvironmentTier::default()),
            global,
        ));

        let directory = Arc::new(InMemoryPartnerDirectory::new());
        directory.register(&ctx, PartnerId::new(STAFF), "Olivia Operator", true);
        directory.register(&ctx, PartnerId::new(BOT), "n8n Bot", false);

        let (tx, rx) = mpsc::unbounded_channel();
        let notifier = OutboundNotifier::new(
            store.clone(),
            settings,
            directory,
            Arc::new(RecordingTransport { sent: tx }),
        );

        Fixture {
            notifier,
            store,
            channel_tier,
            sent: rx,
            ctx,
        }
    }

    fn message(author: Author, body: &str) -> ChatMessage {
        ChatMessage {
            id: MessageId::new(100),
            model: Some(CHANNEL_MODEL.to_string()),
            res_id: Some(CHANNEL.get()),
            author,
            body: body.to_string(),
            created_at: Utc::now(),
        }
    }

    async fn next_request(rx: &mut mpsc::UnboundedReceiver<OutboundRequest>) -> OutboundRequest {
        tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap()
    }

    async fn assert_nothing_sent(rx: &mut mpsc::UnboundedReceiver<OutboundRequest>) {
        tokio::task::yield_now().await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_guest_message_forwarded_to_global_url() {
        let mut f = fixture();

        let outcome = f
            .notifier
            .process_message(&f.ctx, &message(Author::guest(5, "Alice"), "hi"))
            .await;
        assert_eq!(outcome, NotifyOutcome::Dispatched);

        let request = next_request(&mut f.sent).await;
        assert_eq!(request.url, GLOBAL_URL);
        assert_eq!(
            request.token.as_ref().map(|t| t.expose_secret().as_str()),
            Some("global-out")
        );
        let body = serde_json::to_value(&request.payload).unwrap();
        assert_eq!(body["body"], json!("hi"));
        assert_eq!(body["author_id"], json!("guest_5"));
        assert_eq!(body["author_name"], json!("Alice"));
        assert_eq!(body["res_id"], json!(42));
        assert_eq!(body["active_specialist"], json!(false));
        assert_eq!(body["context_data"], json!({}));
    }

    #[tokio::test]
    async fn test_staff_message_latches_human() {
        let mut f = fixture();

        let outcome = f
            .notifier
            .process_message(&f.ctx, &message(Author::partner(STAFF, "Olivia"), "I'll take it"))
            .await;

        assert_eq!(outcome, NotifyOutcome::HumanLatched);
        assert_eq!(
            f.store.get_specialist(&f.ctx, CHANNEL).await.unwrap().as_deref(),
            Some(HUMAN_SPECIALIST)
        );
        assert_nothing_sent(&mut f.sent).await;

        // Idempotent
        let outcome = f
            .notifier
            .process_message(&f.ctx, &message(Author::partner(STAFF, "Olivia"), "again"))
            .await;
        assert_eq!(outcome, NotifyOutcome::HumanLatched);
        assert!(f.store.get_state(&f.ctx, CHANNEL).await.unwrap().unwrap().is_human());
    }

    #[tokio::test]
    async fn test_human_channel_is_muted() {
        let mut f = fixture();
        f.store
            .set_specialist(&f.ctx, CHANNEL, Some(HUMAN_SPECIALIST), None)
            .await
            .unwrap();

        let outcome = f
            .notifier
            .process_message(&f.ctx, &message(Author::guest(5, "Alice"), "hello?"))
            .await;

        assert_eq!(outcome, NotifyOutcome::Muted);
        assert_nothing_sent(&mut f.sent).await;
    }

    #[tokio::test]
    async fn test_bot_messages_never_forwarded() {
        let mut f = fixture();

        let by_bot = f
            .notifier
            .process_message(&f.ctx, &message(Author::partner(BOT, "n8n Bot"), "Hello!"))
            .await;
        assert_eq!(by_bot, NotifyOutcome::Skipped(SkipReason::BotAuthor));

        let marked = f
            .notifier
            .process_message(
                &f.ctx,
                &message(Author::guest(5, "Alice"), r#"<span class="n8n-bot">echo</span>"#),
            )
            .await;
        assert_eq!(marked, NotifyOutcome::Skipped(SkipReason::BotMarker));

        // A channel-specific bot is recognized as well
        f.channel_tier.set_channel(
            &f.ctx,
            CHANNEL,
            BridgeSettings::default().with_bot_partner(50),
        );
        let by_channel_bot = f
            .notifier
            .process_message(&f.ctx, &message(Author::partner(50, "Sales Bot"), "Hi"))
            .await;
        assert_eq!(by_channel_bot, NotifyOutcome::Skipped(SkipReason::BotAuthor));

        assert_nothing_sent(&mut f.sent).await;
    }

    #[tokio::test]
    async fn test_channel_destination_wins() {
        let mut f = fixture();
        f.channel_tier.set_channel(
            &f.ctx,
            CHANNEL,
            BridgeSettings::default().with_webhook("https://channel.example.com/hook", None),
        );
        f.store
            .set_specialist(&f.ctx, CHANNEL, Some("sales"), Some(r#"{"lead":"warm"}"#.into()))
            .await
            .unwrap();

        let outcome = f
            .notifier
            .process_message(&f.ctx, &message(Author::partner(9, "Portal Pete"), "quote?"))
            .await;
        assert_eq!(outcome, NotifyOutcome::Dispatched);

        let request = next_request(&mut f.sent).await;
        assert_eq!(request.url, "https://channel.example.com/hook");
        // Token comes from the same tier as the URL
        assert!(request.token.is_none());
        assert_eq!(request.payload.active_specialist.as_deref(), Some("sales"));
        assert_eq!(request.payload.context_data, json!({"lead": "warm"}));
    }

    #[tokio::test]
    async fn test_unconfigured_and_non_channel_messages() {
        let mut f = fixture();
        let other = TenantContext::new("globex");

        let outcome = f
            .notifier
            .process_message(&other, &message(Author::guest(5, "Alice"), "hi"))
            .await;
        assert_eq!(outcome, NotifyOutcome::Unconfigured);

        let mut note = message(Author::guest(5, "Alice"), "hi");
        note.model = Some("res.partner".to_string());
        let outcome = f.notifier.process_message(&f.ctx, &note).await;
        assert_eq!(outcome, NotifyOutcome::Skipped(SkipReason::NotChannelMessage));

        assert_nothing_sent(&mut f.sent).await;
    }

    #[tokio::test]
    async fn test_store_failure_is_swallowed() {
        let f = fixture();
        let notifier = OutboundNotifier::new(
            Arc::new(FailingStore),
            f.notifier.settings.clone(),
            f.notifier.directory.clone(),
            f.notifier.transport.clone(),
        );

        let outcomes = notifier
            .notify(
                &f.ctx,
                &[
                    message(Author::guest(5, "Alice"), "hi"),
                    message(Author::partner(BOT, "n8n Bot"), "reply"),
                ],
            )
            .await;

        assert_eq!(
            outcomes,
            vec![
                NotifyOutcome::Skipped(SkipReason::LookupFailed),
                NotifyOutcome::Skipped(SkipReason::BotAuthor),
            ]
        );
    }
}
