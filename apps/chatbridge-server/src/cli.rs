//! Command-line argument parsing

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "chatbridge-server",
    about = "Chat bridge server",
    version,
    long_about = "Forwards live-chat messages to an automation webhook service and \
                  accepts its replies, typing updates and specialist handoffs."
)]
pub struct Args {
    /// Path to configuration file
    #[arg(
        short,
        long,
        env = "CONFIG_PATH",
        default_value = "config/default.toml"
    )]
    pub config: PathBuf,

    /// HTTP server port, overrides the configuration file
    #[arg(short, long, env = "PORT")]
    pub port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(
        short,
        long,
        env = "LOG_LEVEL",
        default_value = "info",
        value_parser = ["trace", "debug", "info", "warn", "error"]
    )]
    pub log_level: String,

    /// Enable JSON log format (useful for production)
    #[arg(long, env = "JSON_LOGS")]
    pub json_logs: bool,

    /// PostgreSQL URL for channel state; in-memory state when absent
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,
}
