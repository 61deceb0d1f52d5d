//! OneStop gateway daemon
//!
//! The gateway serves the OneStop municipal services API:
//! - Accounts, businesses, and team invitations
//! - Document upload and officer verification
//! - Permit applications through the staged review chain
//! - Invoicing and payment against the MBMB council gateway
//! - Push notifications and WhatsApp OTP

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use onestop_gateway::config::{GatewayConfig, StorageConfig};
use onestop_gateway::error::GatewayError;
use onestop_gateway::server::Server;

/// OneStop Gateway CLI
#[derive(Parser)]
#[command(name = "onestopd")]
#[command(about = "OneStop gateway - Melaka municipal services backend", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "ONESTOP_CONFIG")]
    config: Option<String>,

    /// Listen address (overrides the configuration file)
    #[arg(short, long, env = "ONESTOP_LISTEN_ADDR")]
    listen: Option<String>,

    /// Log level
    #[arg(long, env = "ONESTOP_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Enable JSON logging
    #[arg(long, env = "ONESTOP_LOG_JSON")]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| cli.log_level.clone().into());

    if cli.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    // Load configuration
    let mut config =
        GatewayConfig::load(cli.config.as_deref()).map_err(|e| GatewayError::Config(e.to_string()))?;

    // Override with CLI args
    if let Some(listen) = &cli.listen {
        config.server.listen_addr = listen
            .parse()
            .map_err(|e| GatewayError::Config(format!("Invalid listen address: {}", e)))?;
    }

    let storage_kind = match &config.storage {
        StorageConfig::Memory => "memory",
        StorageConfig::Postgres { .. } => "postgres",
    };

    // Print startup banner
    println!(
        r#"
   ___             ____  _
  / _ \ _ __   ___/ ___|| |_ ___  _ __
 | | | | '_ \ / _ \___ \| __/ _ \| '_ \
 | |_| | | | |  __/___) | || (_) | |_) |
  \___/|_| |_|\___|____/ \__\___/| .__/
                                 |_|

  OneStop - Melaka municipal services gateway
  Version: {}
  Storage: {}
  Listening: {}
"#,
        env!("CARGO_PKG_VERSION"),
        storage_kind,
        config.server.listen_addr
    );

    // Create and run server
    let server = Server::new(config).await?;
    server.run().await?;
    Ok(())
}
