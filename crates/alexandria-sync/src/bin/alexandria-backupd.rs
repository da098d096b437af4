//! alexandria-backupd: connects both stores and runs scheduled backups.
//!
//! Environment variables:
//!   DATABASE_URL          - relational store (default: postgres://localhost/alexandria)
//!   GRAPH_DATABASE_URL    - graph projection (default: DATABASE_URL)
//!   BACKUP_STORAGE_PATH   - snapshot directory (default: /var/lib/alexandria/backups)
//!   BACKUP_INTERVAL_SECS, BACKUP_ENABLED, BACKUP_BASE_NAME - see SchedulerConfig
//!   DB_MAX_CONNECTIONS, DB_CONNECT_ATTEMPTS, DB_CONNECT_RETRY_SECS - see PoolConfig
//!   LOG_FORMAT            - "json" or "text" (default: "text")
//!   RUST_LOG              - standard env filter

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use alexandria_core::defaults;
use alexandria_db::{
    log_pool_metrics, FilesystemBlobStore, PgGraphStore, PgRelationalStore, PoolConfig,
};
use alexandria_sync::{log_completed_backups, BackupScheduler, SchedulerConfig, SnapshotBuilder};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "alexandria_sync=info,alexandria_db=info".into());
    let registry = tracing_subscriber::registry().with(env_filter);
    if log_format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| defaults::DATABASE_URL.to_string());
    let graph_url = std::env::var("GRAPH_DATABASE_URL").unwrap_or_else(|_| database_url.clone());
    let storage_path = std::env::var("BACKUP_STORAGE_PATH")
        .unwrap_or_else(|_| defaults::BACKUP_STORAGE_PATH.to_string());
    let pool_config = PoolConfig::from_env();
    let scheduler_config = SchedulerConfig::from_env();

    // Either store failing its retry budget aborts startup.
    info!("Connecting to relational store...");
    let relational = PgRelationalStore::connect(&database_url, &pool_config).await?;
    relational.migrate().await?;

    info!("Connecting to graph store...");
    let graph = PgGraphStore::connect(&graph_url, &pool_config).await?;
    graph.migrate().await?;
    info!("Stores connected and migrated");
    log_pool_metrics(relational.pool());
    log_pool_metrics(graph.pool());

    let builder = SnapshotBuilder::new(
        Arc::new(relational),
        Arc::new(FilesystemBlobStore::new(&storage_path)),
    )
    .with_base_name(scheduler_config.base_name.clone());

    let handle = BackupScheduler::start(builder, scheduler_config);
    tokio::spawn(log_completed_backups(handle.events()));

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");
    handle.shutdown().await?;

    Ok(())
}
