//! notifyd - notification delivery with channel fallback

use anyhow::Result;
use clap::Parser;
use notifyd::{app::App, cli::Cli, config::Config};
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration by layering sources: defaults, file, environment, and CLI args.
    let config = Config::load(&cli).unwrap_or_else(|err| {
        tracing_subscriber::fmt().init();
        error!("Failed to load configuration: {:#}", err);
        std::process::exit(1);
    });

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.core.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("notifyd starting up...");

    info!("-------------------- Configuration --------------------");
    info!("Log Level: {}", config.core.log_level);
    info!("Listen Address: {}", config.server.listen_address);
    let priority: Vec<&str> = config.dispatch.priority.iter().map(|c| c.as_str()).collect();
    info!("Channel Priority: {}", priority.join(" -> "));
    info!("Attempt Timeout: {}ms", config.dispatch.attempt_timeout_ms);
    info!(
        "Record Exhausted Incidents: {}",
        config.dispatch.record_exhausted_incidents
    );
    for channel in &config.dispatch.priority {
        let channel_config = config.channels.get(*channel);
        info!("Channel {}: {:?} sender", channel, channel_config.kind);
    }
    info!(
        "Incident Database: {}",
        config.incidents.database_path.display()
    );
    if config.metrics.enabled {
        info!("Metrics: enabled on {}", config.metrics.listen_address);
    } else {
        info!("Metrics: disabled");
    }
    info!("-------------------------------------------------------");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let app = App::builder(config).build(shutdown_rx).await?;

    info!("notifyd initialized successfully.");

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received. Shutting down gracefully...");
    let _ = shutdown_tx.send(true);

    app.run().await
}
