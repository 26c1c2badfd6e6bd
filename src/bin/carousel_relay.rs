//! Carousel Relay runtime
//!
//! Wires the Bot API poller, the aggregation engine, the webhook emitter and
//! the liveness/relay HTTP server, then runs until CTRL+C.
//!
//! Usage:
//!   cargo run --release --bin carousel_relay
//!
//! Environment variables:
//!   TELEGRAM_TOKEN      - Bot credential (required)
//!   WEBHOOK_URL         - Downstream webhook (required, MAKE_WEBHOOK_URL accepted)
//!   TELEGRAM_CHANNEL_ID - Enables POST /webhook relay into this channel
//!   PORT                - HTTP port (default: 5000)
//!   QUIET_PERIOD_MS     - Album quiet period (default: 2000)

use carousel_relay::{
    aggregator_core::AggregationEngine,
    config::RuntimeConfig,
    delivery::WebhookEmitter,
    server::{self, RelayTarget},
    telegram::{TelegramClient, UpdatePoller},
};
use dotenv::dotenv;
use log::{error, info, warn};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    info!("🚀 Starting Carousel Relay...");

    let config = match RuntimeConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("❌ Configuration error: {}", e);
            return Err(e.into());
        }
    };

    info!("📊 Configuration:");
    info!("   ├─ Webhook: {}", config.webhook_url);
    info!("   ├─ Quiet period: {}ms", config.quiet_period.as_millis());
    info!("   ├─ Webhook timeout: {}s", config.webhook_timeout.as_secs());
    info!("   ├─ Port: {}", config.port);
    info!(
        "   └─ Relay channel: {}",
        config.channel_id.as_deref().unwrap_or("disabled")
    );

    let telegram = Arc::new(TelegramClient::new(&config.telegram_api_url, &config.telegram_token)?);
    let emitter = Arc::new(WebhookEmitter::new(&config.webhook_url, config.webhook_timeout)?);

    let engine = AggregationEngine::new(config.quiet_period, telegram.clone(), emitter)
        .with_notifier(telegram.clone());
    info!("✅ Aggregation engine ready");

    let relay = config.channel_id.clone().map(|channel_id| RelayTarget {
        publisher: telegram.clone(),
        channel_id,
    });
    let app = server::router(relay);
    let listener = match server::bind(config.port).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("❌ Could not bind HTTP server on port {}: {}", config.port, e);
            return Err(e.into());
        }
    };
    let mut server_handle = tokio::spawn(server::serve(listener, app));

    let poller = UpdatePoller::new(telegram.clone(), engine.clone(), config.poll_timeout_secs);

    info!("🔄 Press CTRL+C to shutdown gracefully");

    let outcome: Result<(), Box<dyn std::error::Error>> = tokio::select! {
        result = poller.run() => match result {
            Ok(()) => Ok(()),
            Err(e) => {
                error!("❌ Update poller stopped: {}", e);
                Err(e.into())
            }
        },
        served = &mut server_handle => match served {
            Ok(Ok(())) => Err("HTTP server exited unexpectedly".into()),
            Ok(Err(e)) => {
                error!("❌ HTTP server failed: {}", e);
                Err(e.into())
            }
            Err(e) => {
                error!("❌ HTTP server task failed: {}", e);
                Err(e.into())
            }
        },
        signal = tokio::signal::ctrl_c() => {
            match signal {
                Ok(()) => info!("⚠️  Received CTRL+C, shutting down..."),
                Err(e) => error!("❌ Failed to listen for CTRL+C: {}", e),
            }
            Ok(())
        }
    };

    let settled = engine.shutdown(config.flush_on_shutdown).await;
    if settled > 0 && !config.flush_on_shutdown {
        warn!("⚠️  {} pending or in-flight batches dropped", settled);
    }

    server_handle.abort();

    info!("✅ Carousel Relay stopped");
    outcome
}
