use anyhow::Result;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use pulsemon_server::app;
use pulsemon_server::config::ServerConfig;
use pulsemon_server::durability;
use pulsemon_server::state::AppState;
use pulsemon_storage::memory::MemStorage;
use pulsemon_storage::relational::SqliteStorage;
use pulsemon_storage::MetricStorage;

const SHUTDOWN_DEADLINE: Duration = Duration::from_secs(3);

#[tokio::main]
async fn main() -> Result<()> {
    let config = ServerConfig::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!(
        listen = %config.address,
        store_interval = config.store_interval,
        file = %config.file_storage_path,
        restore = config.restore,
        db = %config.database_dsn,
        "server starting"
    );

    let storage: Arc<dyn MetricStorage> = if config.database_dsn.is_empty() {
        Arc::new(MemStorage::new())
    } else {
        Arc::new(SqliteStorage::open(&config.database_dsn)?)
    };
    let use_file = config.database_dsn.is_empty();
    let snapshot_path = PathBuf::from(&config.file_storage_path);

    if config.restore && use_file {
        tracing::info!(file = %snapshot_path.display(), "restoring metrics from snapshot");
        if let Err(e) = durability::restore(storage.as_ref(), &snapshot_path).await {
            tracing::error!(error = %e, "metrics were not restored, continuing with empty state");
        }
    }

    let state = AppState::new(storage.clone())
        .with_key((!config.key.is_empty()).then(|| config.key.clone()))
        .with_sync_snapshot((use_file && config.store_interval == 0).then(|| snapshot_path.clone()));
    if state.sync_snapshot_path.is_some() {
        tracing::info!("synchronous snapshot writing is used");
    }

    let ticker = (use_file && config.store_interval > 0).then(|| {
        tokio::spawn(durability::run_ticker(
            storage.clone(),
            snapshot_path.clone(),
            Duration::from_secs(config.store_interval),
        ))
    });

    let app = app::build_router(state);
    let listener = tokio::net::TcpListener::bind(&config.address).await?;
    tracing::info!(listen = %config.address, "server started");

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
        })
        .await
    });

    tokio::signal::ctrl_c().await?;
    tracing::info!("stopping server");
    let _ = shutdown_tx.send(());
    match tokio::time::timeout(SHUTDOWN_DEADLINE, server).await {
        Ok(Ok(Ok(()))) => tracing::info!("server stopped gracefully"),
        Ok(Ok(Err(e))) => tracing::error!(error = %e, "server error"),
        Ok(Err(e)) => tracing::error!(error = %e, "server task failed"),
        Err(_) => tracing::warn!("shutdown deadline exceeded, dropping in-flight requests"),
    }

    if let Some(handle) = ticker {
        handle.abort();
    }
    if use_file {
        match tokio::time::timeout(
            SHUTDOWN_DEADLINE,
            durability::save_snapshot(storage.as_ref(), &snapshot_path),
        )
        .await
        {
            Ok(Ok(())) => {
                tracing::info!(file = %snapshot_path.display(), "final snapshot written")
            }
            Ok(Err(e)) => tracing::error!(error = %e, "final snapshot failed"),
            Err(_) => tracing::error!("final snapshot timed out"),
        }
    }
    if let Err(e) = storage.close() {
        tracing::error!(error = %e, "closing storage");
    }
    tracing::info!("server stopped");
    Ok(())
}
