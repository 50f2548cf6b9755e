//! chatbridge-server: live-chat host to automation webhook bridge

mod app;
mod cli;
mod server;
mod telemetry;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use crate::{app::App, cli::Args, telemetry::init_telemetry};

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine
    let env_file = dotenv::dotenv().ok();

    let args = Args::parse();
    let _guards = init_telemetry(&args)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        env_file = ?env_file,
        "Starting chat bridge"
    );

    let app = App::build(args)
        .await
        .inspect_err(|e| error!("Failed to start chat bridge: {:#}", e))?;
    app.run()
        .await
        .inspect_err(|e| error!("Chat bridge stopped with an error: {:#}", e))?;

    info!("Chat bridge stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }
}
