//! Bundle Porter daemon - entry point
//! Wires the import queue, the catalogue and the JSON-RPC server.

mod config;
mod logging;

use anyhow::{Context, Result};
use config::DaemonConfig;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};

use porter_api_rpc::{RpcHandler, RpcServer, RpcServerConfig};
use porter_core::application::runner::constants::RUNNER_STOP_TIMEOUT;
use porter_core::application::{
    shutdown_channel, spawn_queue_runner, CatalogService, ImportQueue, PathResolver,
    PersistedQueueStore, QueueEvent,
};
use porter_core::port::time_provider::SystemTimeProvider;
use porter_core::port::{ImportExecutor, InstallationTracker, TimeProvider};
use porter_infra_sqlite::{
    create_pool, run_migrations, SqliteInstallationTracker, SqlitePreferenceStore,
    SqliteProductCatalog,
};
use porter_infra_system::{CommandImportExecutor, CopyImportExecutor};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Configuration and logging
    let config = DaemonConfig::from_env()?;
    let _log_guard = logging::init(&config.log)?;

    info!("Bundle Porter daemon v{} starting...", VERSION);

    // 2. State database
    if let Some(dir) = config.db_path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create state directory {}", dir.display()))?;
    }
    let db_path = config.db_path.to_string_lossy().into_owned();
    info!(db_path = %db_path, "Initializing database...");

    let pool = create_pool(&db_path)
        .await
        .context("DB pool creation failed")?;
    run_migrations(&pool).await.context("Migration failed")?;

    // 3. Adapters
    let time_provider: Arc<dyn TimeProvider> = Arc::new(SystemTimeProvider);
    let prefs = Arc::new(SqlitePreferenceStore::new(pool.clone(), time_provider.clone()));
    let tracker: Arc<dyn InstallationTracker> = Arc::new(SqliteInstallationTracker::new(
        pool.clone(),
        time_provider.clone(),
    ));
    let executor: Arc<dyn ImportExecutor> = match &config.import_command {
        Some(command) => {
            info!(command = %command, "Using external import command");
            Arc::new(
                CommandImportExecutor::from_command_line(command, time_provider.clone())
                    .context("Invalid PORTER_IMPORT_COMMAND")?,
            )
        }
        None => {
            info!(import_root = %config.import_root.display(), "Using file copy import");
            Arc::new(CopyImportExecutor::new(config.import_root.clone()))
        }
    };

    // 4. Import queue, recovered from the last run
    let queue = ImportQueue::load(PersistedQueueStore::new(prefs), executor, tracker.clone())
        .await
        .context("Import queue recovery failed")?;

    let (shutdown_tx, shutdown_rx) = shutdown_channel();
    let (queue, runner_handle) = spawn_queue_runner(queue, shutdown_rx);
    tokio::spawn(log_queue_events(queue.subscribe()));

    // 5. Catalogue (optional)
    let resolver = PathResolver::new(config.resolver_config());
    let catalog = match SqliteProductCatalog::open(&config.catalog_db).await {
        Ok(reader) => {
            info!(catalog_db = %config.catalog_db.display(), "Catalogue database opened");
            Some(Arc::new(CatalogService::new(
                Arc::new(reader),
                resolver.clone(),
                Some(config.thumbnail_cache.clone()),
            )))
        }
        Err(e) => {
            warn!(error = %e, "Catalogue unavailable, catalogue methods disabled");
            None
        }
    };

    // 6. JSON-RPC server
    let rpc_config = RpcServerConfig {
        port: config.rpc_port,
        ..Default::default()
    };
    let handler = RpcHandler::new(queue, resolver, catalog, tracker);
    let rpc_handle = RpcServer::new(rpc_config, handler)
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("RPC server start failed: {}", e))?;

    info!("System ready. Press Ctrl+C to shutdown");

    // 7. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;

    info!("Shutdown signal received. Exiting gracefully...");

    // 8. Graceful shutdown; the queue state is already persisted
    shutdown_tx.shutdown();
    rpc_handle
        .stop()
        .map_err(|e| anyhow::anyhow!("RPC server stop failed: {}", e))?;
    if tokio::time::timeout(RUNNER_STOP_TIMEOUT, runner_handle)
        .await
        .is_err()
    {
        warn!("Queue runner did not stop in time");
    }
    pool.close().await;

    info!("Shutdown complete.");

    Ok(())
}

async fn log_queue_events(mut events: broadcast::Receiver<QueueEvent>) {
    loop {
        match events.recv().await {
            Ok(QueueEvent::ItemFinished { item }) => {
                info!(path = %item.source_path(), owner_id = %item.owner_id(), "Import finished");
            }
            Ok(QueueEvent::ActivityChanged { active }) => {
                info!(active = active, "Import activity changed");
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped = skipped, "Queue event log lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
