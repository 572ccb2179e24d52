//! linkmapd: environment variable conflict service

use clap::Parser;
use linkmap_service::{LinkmapConfig, Server};
use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "linkmapd", version, about = "Linkmap environment variable service")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "LINKMAP_CONFIG")]
    config: Option<String>,

    /// Listen address, overrides `server.listen_addr`
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Log level, overrides `logging.level`
    #[arg(long, env = "LINKMAP_LOG_LEVEL")]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, env = "LINKMAP_LOG_JSON")]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = LinkmapConfig::load(cli.config.as_deref())?;
    if let Some(listen) = cli.listen {
        config.server.listen_addr = listen;
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    config.logging.json |= cli.json;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.logging.level.clone().into());

    if config.logging.json {
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

    tracing::info!(
        listen = %config.server.listen_addr,
        storage = config.storage.label(),
        "starting linkmapd"
    );

    let server = Server::new(config).await?;
    server.run().await?;
    Ok(())
}
