use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tryon_db::PgStore;
use tryon_pipeline::RemoteBackend;
use tryon_worker::{JobQueue, WorkerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tryon_worker=debug,tryon_pipeline=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = WorkerConfig::from_env().context("Invalid worker configuration")?;
    tracing::info!(
        max_concurrent = config.max_concurrent_jobs,
        generation_api_url = %config.generation_api_url,
        "Loaded worker configuration",
    );

    // --- Database ---
    let pool = tryon_db::create_pool(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Database connection pool created");

    tryon_db::health_check(&pool)
        .await
        .context("Database health check failed")?;
    tryon_db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database migrations applied");

    // --- Queue ---
    let backend = RemoteBackend::new(config.remote_config())
        .context("Failed to build generation API client")?;
    let queue = JobQueue::new(
        Arc::new(PgStore::new(pool)),
        Arc::new(backend),
        config.queue_config(),
    );

    let cancel = CancellationToken::new();
    let dispatcher_handle = queue.start(cancel.clone());

    shutdown_signal().await;
    cancel.cancel();
    let _ = dispatcher_handle.await;

    tracing::info!(
        in_flight = queue.dispatcher().in_flight_count(),
        timeout_secs = config.shutdown_timeout.as_secs(),
        "Draining in-flight jobs",
    );
    if queue.shutdown(config.shutdown_timeout).await {
        tracing::info!("Graceful shutdown complete");
    } else {
        tracing::warn!(
            still_running = ?queue.dispatcher().in_flight_jobs(),
            "Shutdown timeout elapsed with jobs still processing",
        );
    }

    Ok(())
}

/// Wait for SIGINT or (on Unix) SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
