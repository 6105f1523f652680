use std::sync::Arc;

use anyhow::Context;
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tubebot::discovery::EndpointResolver;
use tubebot::{Bot, BotConfig, SessionExit, SocketIoTransport, SourceRegistry, Transport};
use tubebot_youtube_client::YoutubeClient;

const EVENT_BUFFER: usize = 256;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration (merges .env first)
    let config = BotConfig::load().context("Failed to load configuration")?;

    // Initialize tracing from RUST_LOG or LOG_LEVEL
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_new(&config.common.log_level)
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        room = %config.room().url,
        channel = %config.room().channel,
        environment = %config.common.environment,
        "Starting tubebot"
    );

    // Initialize the source registry
    let registry = SourceRegistry::connect(config.database())
        .await
        .context("Failed to open source registry")?;
    tracing::info!("Source registry initialized");

    let youtube = Arc::new(YoutubeClient::new().context("Failed to build YouTube client")?);

    let http = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(10))
        .build()
        .context("Failed to build HTTP client")?;
    let resolver = EndpointResolver::new(http, config.room().clone());

    let (events_tx, mut events) = mpsc::channel(EVENT_BUFFER);
    let transport = Arc::new(SocketIoTransport::new(resolver, events_tx));

    let reconnect_delay = config.reconnect_delay;
    let mut bot = Bot::new(
        config,
        transport.clone(),
        registry,
        youtube.clone(),
        youtube,
    );

    loop {
        bot.prepare_reconnect();
        // A failed attempt is reported as a connect error event and retried by the loop
        let _ = transport.connect().await;

        let exit = tokio::select! {
            exit = bot.run(&mut events) => exit,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupt received, disconnecting");
                let _ = transport.disconnect().await;
                SessionExit::Killed
            }
        };

        match exit {
            SessionExit::Killed => break,
            SessionExit::ConnectionLost => {
                bot.wait_for_operation().await;
                tracing::warn!(
                    delay_secs = reconnect_delay.as_secs(),
                    "Connection lost, reconnecting"
                );
                tokio::time::sleep(reconnect_delay).await;
            }
        }
    }

    tracing::info!("Tubebot stopped");
    Ok(())
}
