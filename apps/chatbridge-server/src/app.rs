//! Application state and initialization

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

use chatbridge_api::{BridgeCommands, DEFAULT_BOT_NAME};
use chatbridge_core::{
    AppConfig, ChannelId, ChannelSettingsTier, EnvironmentTier, GlobalSettingsTier,
    InMemoryChatHost, InMemoryPartnerDirectory, SettingKey, SettingsResolver, SettingsTier,
    TenantContext,
};
use chatbridge_state::{ChannelStateStore, InMemoryChannelStateStore, PgChannelStateStore};
use chatbridge_webhook::{HttpTransport, OutboundNotifier};

use crate::cli::Args;
use crate::server::Server;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub commands: Arc<BridgeCommands>,
    pub host: Arc<InMemoryChatHost>,
}

impl AppState {
    /// Wire every component from configuration
    pub async fn new(config: AppConfig, database_url: Option<String>) -> Result<Self> {
        info!("Initializing application components");

        let channel_tier = Arc::new(ChannelSettingsTier::from_config(&config));
        let global_tier = Arc::new(GlobalSettingsTier::from_config(&config));
        let settings = Arc::new(SettingsResolver::new(
            channel_tier.clone(),
            Arc::new(EnvironmentTier::from_env()),
            global_tier.clone(),
        ));

        let directory = Arc::new(InMemoryPartnerDirectory::new());
        let host = Arc::new(InMemoryChatHost::new());
        seed_host(&config, &host, &directory, channel_tier.as_ref(), global_tier.as_ref());

        let store = build_store(&config, database_url).await?;

        let transport = HttpTransport::new(config.webhook.timeout())
            .context("Failed to create webhook HTTP client")?
            .with_token_header(&config.webhook.token_header);
        let notifier = OutboundNotifier::new(
            store.clone(),
            settings.clone(),
            directory.clone(),
            Arc::new(transport),
        )
        .with_bot_marker(&config.webhook.bot_marker);
        host.register_observer(Arc::new(notifier));

        let commands = BridgeCommands::new(store, host.clone(), directory, settings)
            .with_typing_pause(config.typing.pause());

        Ok(Self {
            config,
            commands: Arc::new(commands),
            host,
        })
    }
}

async fn build_store(
    config: &AppConfig,
    database_url: Option<String>,
) -> Result<Arc<dyn ChannelStateStore>> {
    let Some(url) = database_url.or_else(|| config.database.url.clone()) else {
        warn!("No database URL configured, channel state is kept in memory");
        return Ok(Arc::new(InMemoryChannelStateStore::new()));
    };

    let store = PgChannelStateStore::connect(&url, config.database.max_connections)
        .await
        .context("Failed to connect to PostgreSQL")?;
    store
        .migrate()
        .await
        .context("Failed to create channel state table")?;
    Ok(Arc::new(store))
}

/// Register configured channels and bot partners with the in-memory host
fn seed_host(
    config: &AppConfig,
    host: &InMemoryChatHost,
    directory: &InMemoryPartnerDirectory,
    channel_tier: &ChannelSettingsTier,
    global_tier: &GlobalSettingsTier,
) {
    for (tenant_id, tenant) in &config.tenants {
        let ctx = TenantContext::new(tenant_id.clone());
        let bot_name = tenant.bot_name.as_deref().unwrap_or(DEFAULT_BOT_NAME);

        let mut channels = Vec::new();
        for raw_id in tenant.channels.keys() {
            if let Ok(id) = raw_id.parse::<i64>() {
                let channel = ChannelId::new(id);
                host.create_channel(&ctx, channel);
                channels.push(channel);
            }
        }

        let channel_bots = channels
            .iter()
            .filter_map(|c| channel_tier.lookup(&ctx, Some(*c), SettingKey::BotPartnerId));
        let global_bot = global_tier.lookup(&ctx, None, SettingKey::BotPartnerId);
        for raw in channel_bots.chain(global_bot) {
            match raw.parse::<i64>() {
                Ok(id) => directory.register(&ctx, id.into(), bot_name, false),
                Err(_) => warn!(
                    tenant_id = %tenant_id,
                    value = %raw,
                    "Ignoring non-numeric bot partner id"
                ),
            }
        }

        info!(
            tenant_id = %tenant_id,
            channels = channels.len(),
            "Tenant configured"
        );
    }
}

/// Main application
pub struct App {
    args: Args,
    state: AppState,
}

impl App {
    /// Build the application with all dependencies
    pub async fn build(args: Args) -> Result<Self> {
        let mut config = AppConfig::load_from(Some(args.config.as_path())).with_context(|| {
            format!("Failed to load configuration from {}", args.config.display())
        })?;
        if let Some(port) = args.port {
            config.server.port = port;
        }

        let state = AppState::new(config, args.database_url.clone()).await?;

        Ok(Self { args, state })
    }

    /// Run the application
    pub async fn run(self) -> Result<()> {
        info!(config = %self.args.config.display(), "Starting server");

        let server = Server::new(self.state)?;
        server.run().await?;

        Ok(())
    }
}
