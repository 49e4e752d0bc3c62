//! Webhook notifier binary.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::get;
use axum::{Json, Router};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ffq_notifier::{NotifierConfig, NotifierExecutor};
use ffq_queue::TaskQueue;

#[tokio::main]
async fn main() {
    // Install rustls crypto provider (required for TLS/HTTPS)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("starting ffq-notifier");

    let config = NotifierConfig::from_env();
    info!("notifier config: {config:?}");

    let queue = match TaskQueue::from_env() {
        Ok(q) => q,
        Err(e) => {
            error!("failed to create task queue: {e}");
            std::process::exit(1);
        }
    };
    if let Err(e) = queue.ping().await {
        error!("broker unreachable: {e}");
        std::process::exit(1);
    }

    // Standalone health endpoint on its own port.
    let health_addr = SocketAddr::from(([0, 0, 0, 0], config.health_port));
    let health_listener = match tokio::net::TcpListener::bind(health_addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("failed to bind health port {health_addr}: {e}");
            std::process::exit(1);
        }
    };
    tokio::spawn(async move {
        let app = Router::new().route(
            "/health",
            get(|| async { Json(serde_json::json!({"status": "ok"})) }),
        );
        info!("health endpoint listening on {health_addr}");
        if let Err(e) = axum::serve(health_listener, app).await {
            error!("health server error: {e}");
        }
    });

    let executor = match NotifierExecutor::new(config, queue) {
        Ok(e) => Arc::new(e),
        Err(e) => {
            error!("failed to create notifier executor: {e}");
            std::process::exit(1);
        }
    };

    let shutdown_executor = Arc::clone(&executor);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("received shutdown signal");
        shutdown_executor.shutdown();
    });

    if let Err(e) = executor.run().await {
        error!("notifier error: {e}");
        std::process::exit(1);
    }

    info!("notifier shutdown complete");
}
