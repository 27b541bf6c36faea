//! Timeclock bridge entry point

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use timeclock_bridge::discovery::ArpLocator;
use timeclock_bridge::external::{RelayClient, ZkConnector};
use timeclock_bridge::services::BridgeService;
use timeclock_bridge::{config, routes, ListenerState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Timestamped log lines to an append-only file, mirrored to stdout
    let file_appender = tracing_appender::rolling::never("logs", "bridge.log");
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "timeclock_bridge=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false),
        )
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = config::Config::load()?;
    config.validate()?;

    tracing::info!("Starting timeclock bridge");
    tracing::info!("Environment: {}", config.environment);
    tracing::info!("Device: {} port {}", config.device.mac, config.device.port);
    tracing::info!("Relay: {}", config.relay.url);

    let relay = RelayClient::new(&config.relay)?;
    let cancel = CancellationToken::new();

    // Operator interrupt: finish the cycle in flight, then stop
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("interrupt received, stopping after current cycle");
                cancel.cancel();
            }
        });
    }

    // Optional push-mode listener
    if config.listener.enabled {
        let state = ListenerState {
            relay: relay.clone(),
            config: Arc::new(config.clone()),
        };
        let app = routes::iclock_routes()
            .with_state(state)
            .layer(TraceLayer::new_for_http());
        let addr = format!("{}:{}", config.listener.host, config.listener.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        tracing::info!("iClock listener on {}", addr);
        let shutdown = cancel.clone();
        tokio::spawn(async move {
            let served = axum::serve(listener, app)
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await;
            if let Err(err) = served {
                tracing::error!(error = %err, "iClock listener failed");
            }
        });
    }

    // Poll-mode bridge loop, runs until the token cancels
    let locator = ArpLocator::new(config.device.broadcast_addr);
    let connector = ZkConnector::new(
        config.device.port,
        Duration::from_secs(config.device.connect_timeout_secs),
    );
    let service = BridgeService::new(&config, locator, connector, relay);
    service.run(cancel).await;

    Ok(())
}
