//! FFmpeg processing worker binary.

use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ffq_media::detect_hardware;
use ffq_queue::TaskQueue;
use ffq_worker::{resources, CommandProcessor, JobExecutor, WorkerConfig};

#[tokio::main]
async fn main() {
    // Install rustls crypto provider (required for TLS/HTTPS)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    dotenvy::dotenv().ok();
    init_tracing();

    info!("starting ffq-worker");

    let config = WorkerConfig::from_env();
    info!("worker config: {config:?}");

    if let Err(e) = std::fs::create_dir_all(&config.work_dir) {
        error!("failed to create work dir {}: {e}", config.work_dir.display());
        std::process::exit(1);
    }

    let hardware = detect_hardware();
    info!(
        "hardware acceleration: {} (H.264: {}, HEVC: {})",
        hardware.accel.as_str(),
        hardware.h264_encoder,
        hardware.hevc_encoder
    );

    if config.resource_check_enabled {
        let status = resources::resource_status();
        match status.memory_usage_percent {
            Some(percent) => info!(
                "resource monitoring enabled (max memory: {:.1}%, current: {percent:.1}%)",
                config.max_memory_percent
            ),
            None => info!(
                "resource monitoring enabled (max memory: {:.1}%, no platform reading)",
                config.max_memory_percent
            ),
        }
    }

    let storage = match ffq_storage::new_adapter().await {
        Ok(s) => s,
        Err(e) => {
            error!("failed to initialize storage adapter: {e}");
            std::process::exit(1);
        }
    };
    info!("storage adapter: {}", storage.name());

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

    let processor = CommandProcessor::new(config.clone(), storage, hardware);
    let executor = Arc::new(JobExecutor::new(config, queue, processor));

    let shutdown_executor = Arc::clone(&executor);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("received shutdown signal");
        shutdown_executor.shutdown();
    });

    if let Err(e) = executor.run().await {
        error!("executor error: {e}");
        std::process::exit(1);
    }

    info!("worker shutdown complete");
}

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}
