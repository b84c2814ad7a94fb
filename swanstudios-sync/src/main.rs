//! # SwanStudios Offline Gateway
//!
//! Local proxy in front of the API. Serves cached responses while offline,
//! queues workout writes and replays them in the background.
//!
//! ## Usage
//!
//! ```bash
//! UPSTREAM_URL=http://127.0.0.1:8080 cargo run -p swanstudios-sync
//! ```

use std::sync::Arc;
use swanstudios_sync::{
    cache::{CacheNames, InMemoryCache},
    config::SyncConfig,
    gateway::OfflineGateway,
    messages::MessageHandler,
    proxy::{build_router, ProxyState},
    queue::{FileQueue, OfflineQueue},
    sync::{BackgroundSync, SyncWorker},
    transport::HttpTransport,
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "swanstudios_sync=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        "SwanStudios Offline Gateway v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let config = SyncConfig::from_env()?;

    let transport = Arc::new(HttpTransport::new(
        config.upstream_url.clone(),
        config.upstream_timeout,
    )?);
    let queue = Arc::new(FileQueue::open(&config.queue_dir).await?);
    let pending = queue.pending().await?.len();
    if pending > 0 {
        tracing::info!(pending, dir = %queue.dir().display(), "Offline workouts waiting from a previous run");
    }

    let gateway = Arc::new(OfflineGateway::new(
        transport.clone(),
        Arc::new(InMemoryCache::new()),
        queue.clone(),
        CacheNames::new(config.cache_version.clone()),
    ));
    let sync = Arc::new(BackgroundSync::new(transport, queue));

    let worker = SyncWorker::new(sync.clone(), config.sync_interval);
    let shutdown = worker.shutdown_token();
    let worker_handle = tokio::spawn(async move { worker.run().await });

    let app = build_router(ProxyState {
        gateway: gateway.clone(),
        messages: Arc::new(MessageHandler::new(gateway, sync)),
    });

    let bind_address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    tracing::info!(upstream = %config.upstream_url, "Gateway listening on http://{}", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    shutdown.cancel();
    worker_handle.await?;
    tracing::info!("Gateway stopped");

    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM, cancelling `token`
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
    token.cancel();
}
