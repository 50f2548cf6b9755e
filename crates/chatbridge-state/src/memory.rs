use crate::{normalize_specialist, ChannelState, ChannelStateStore, Result};
use async_trait::async_trait;
use chatbridge_core::{ChannelId, TenantContext};
use chrono::Utc;
use dashmap::DashMap;
use tracing::debug;

/// In-memory channel state store.
///
/// The map entry is held locked for the whole get-or-create, which gives the
/// same guarantee as the unique constraint of the database store.
#[derive(Default)]
pub struct InMemoryChannelStateStore {
    states: DashMap<(String, ChannelId), ChannelState>,
}

impl InMemoryChannelStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of channels with state for a tenant
    pub fn len(&self, ctx: &TenantContext) -> usize {
        self.states
            .iter()
            .filter(|s| s.key().0 == ctx.tenant_id)
            .count()
    }

    pub fn is_empty(&self, ctx: &TenantContext) -> bool {
        self.len(ctx) == 0
    }
}

#[async_trait]
impl ChannelStateStore for InMemoryChannelStateStore {
    async fn get_state(
        &self,
        ctx: &TenantContext,
        channel: ChannelId,
    ) -> Result<Option<ChannelState>> {
        Ok(self.states.get(&ctx.scoped(channel)).map(|s| s.clone()))
    }

    async fn set_specialist(
        &self,
        ctx: &TenantContext,
        channel: ChannelId,
        specialist: Option<&str>,
        context: Option<String>,
    ) -> Result<ChannelState> {
        let specialist = normalize_specialist(specialist);

        let mut entry = self
            .states
            .entry(ctx.scoped(channel))
            .or_insert_with(|| ChannelState::new(&ctx.tenant_id, channel));

        entry.active_specialist = specialist;
        entry.last_interaction = Utc::now();
        if let Some(context) = context {
            entry.context = Some(context);
        }

        debug!(
            tenant_id = %ctx.tenant_id,
            channel_id = %channel,
            active_specialist = ?entry.active_specialist,
            "Channel state updated"
        );

        Ok(entry.clone())
    }
}
