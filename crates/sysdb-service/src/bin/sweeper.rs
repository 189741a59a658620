//! Periodically finalises soft-deleted databases whose retention elapsed.

use anyhow::Context;
use sysdb_metadata::{create_sqlite_pool, run_migrations, MetaStore};
use sysdb_service::{init_tracing, sweep_expired_databases, Config, Coordinator};
use tokio::time::MissedTickBehavior;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("Warning: Failed to load config: {}. Using defaults.", e);
        Config::default()
    });
    config.validate()?;

    init_tracing(&config.logging);

    tracing::info!(path = %config.database.path, "connecting to metadata store");
    let pool = create_sqlite_pool(&config.database.path, config.database.pool_options())
        .await
        .context("failed to open metadata store")?;
    run_migrations(&pool)
        .await
        .context("failed to run metadata migrations")?;

    let coordinator = Coordinator::with_store(MetaStore::new(pool.clone()))
        .with_request_timeout(config.server.request_timeout());

    let grace = config.retention.database_grace();
    let mut ticker = tokio::time::interval(config.retention.sweep_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::info!(
        grace_seconds = config.retention.database_grace_seconds,
        interval_seconds = config.retention.sweep_interval_seconds,
        "database deletion sweeper started"
    );

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = ticker.tick() => {
                sweep_expired_databases(&coordinator, grace).await;
            }
        }
    }

    pool.close().await;
    tracing::info!("sweeper shutdown complete");
    Ok(())
}

/// Wait for SIGTERM or SIGINT signal for graceful shutdown.
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl+C: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!("failed to install SIGTERM handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("received SIGINT, shutting down");
        },
        _ = terminate => {
            tracing::info!("received SIGTERM, shutting down");
        },
    }
}
