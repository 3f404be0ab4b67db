use std::path::PathBuf;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use relaybot::config::Config;
use relaybot::Relay;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,relaybot=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    info!("Loading configuration from: {}", config_path.display());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    info!("Configuration loaded successfully");
    info!("  Administrators: {:?}", config.telegram.administrators);
    info!("  Whitelist: {:?}", config.telegram.whitelist);
    info!("  Allow all: {}", config.telegram.allow_all);
    info!("  Poll timeout: {}s", config.polling.timeout_secs);

    let (relay, mut inbound) = Relay::from_config(&config.telegram, config.polling.settings());
    if let Err(e) = relay
        .handle()
        .notify_administrators("<b>relaybot</b> started")
    {
        warn!("Failed to announce startup: {}", e);
    }

    let cancel = CancellationToken::new();
    let tasks = relay.enable(cancel.clone());

    info!("Relay is running, press Ctrl-C to stop");

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            received = inbound.recv() => match received {
                Some(received) => {
                    info!(
                        chat_id = received.message.chat_id,
                        "Message at {}: {}",
                        received.message.timestamp.format("%Y-%m-%d %H:%M:%S"),
                        received.message.text
                    );
                    received.reply(format!("Received: {}", received.message.text));
                }
                None => break,
            },
            signal = &mut shutdown => {
                if let Err(e) = signal {
                    warn!("Failed to listen for Ctrl-C: {}", e);
                }
                info!("Shutting down...");
                break;
            }
        }
    }

    cancel.cancel();
    tasks.join().await;

    Ok(())
}
