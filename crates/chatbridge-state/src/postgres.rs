//! PostgreSQL channel state store
//!
//! One row per (tenant, channel), guarded by a unique constraint. Writes are a
//! single upsert, so a create race between two writers leaves one row and the
//! second writer's statement becomes an update.

use crate::{normalize_specialist, ChannelState, ChannelStateStore, Result, StateError};
use async_trait::async_trait;
use chatbridge_core::{ChannelId, TenantContext};
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use tracing::{debug, info};

const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS bridge_channel_state (
    id BIGSERIAL PRIMARY KEY,
    tenant_id TEXT NOT NULL,
    channel_id BIGINT NOT NULL,
    active_specialist TEXT,
    last_interaction TIMESTAMPTZ NOT NULL DEFAULT now(),
    context_data TEXT,
    lead_id BIGINT,
    CONSTRAINT bridge_channel_state_channel_unique UNIQUE (tenant_id, channel_id)
)
"#;

const SELECT_STATE: &str = r#"
SELECT tenant_id, channel_id, active_specialist, last_interaction, context_data, lead_id
FROM bridge_channel_state
WHERE tenant_id = $1 AND channel_id = $2
"#;

// context_data is only overwritten when a new blob is supplied
const UPSERT_STATE: &str = r#"
INSERT INTO bridge_channel_state
    (tenant_id, channel_id, active_specialist, last_interaction, context_data)
VALUES ($1, $2, $3, $4, $5)
ON CONFLICT (tenant_id, channel_id) DO UPDATE SET
    active_specialist = EXCLUDED.active_specialist,
    last_interaction = EXCLUDED.last_interaction,
    context_data = COALESCE(EXCLUDED.context_data, bridge_channel_state.context_data)
RETURNING tenant_id, channel_id, active_specialist, last_interaction, context_data, lead_id
"#;

/// Channel state store backed by PostgreSQL
#[derive(Clone)]
pub struct PgChannelStateStore {
    pool: PgPool,
}

impl PgChannelStateStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect a pool to `url`
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        info!(max_connections, "Connected channel state store to PostgreSQL");
        Ok(Self::new(pool))
    }

    /// Create the state table if it does not exist
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(CREATE_TABLE)
            .execute(&self.pool)
            .await
            .map_err(|e| StateError::Migration(e.to_string()))?;
        Ok(())
    }

    fn parse_row(row: PgRow) -> Result<ChannelState> {
        let channel_id: i64 = row.try_get("channel_id")?;
        let last_interaction: DateTime<Utc> = row.try_get("last_interaction")?;
        Ok(ChannelState {
            tenant_id: row.try_get("tenant_id")?,
            channel_id: ChannelId::new(channel_id),
            active_specialist: row.try_get("active_specialist")?,
            last_interaction,
            context: row.try_get("context_data")?,
            lead_id: row.try_get("lead_id")?,
        })
    }
}

#[async_trait]
impl ChannelStateStore for PgChannelStateStore {
    async fn get_state(
        &self,
        ctx: &TenantContext,
        channel: ChannelId,
    ) -> Result<Option<ChannelState>> {
        let row = sqlx::query(SELECT_STATE)
            .bind(&ctx.tenant_id)
            .bind(channel.get())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::parse_row).transpose()
    }

    async fn set_specialist(
        &self,
        ctx: &TenantContext,
        channel: ChannelId,
        specialist: Option<&str>,
        context: Option<String>,
    ) -> Result<ChannelState> {
        let row = sqlx::query(UPSERT_STATE)
            .bind(&ctx.tenant_id)
            .bind(channel.get())
            .bind(normalize_specialist(specialist))
            .bind(Utc::now())
            .bind(context)
            .fetch_one(&self.pool)
            .await?;

        let state = Self::parse_row(row)?;
        debug!(
            tenant_id = %ctx.tenant_id,
            channel_id = %channel,
            active_specialist = ?state.active_specialist,
            "Channel state upserted"
        );
        Ok(state)
    }
}
