//! Periodic backup scheduler.

use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use alexandria_core::defaults;
use alexandria_core::Result;

use crate::snapshot::SnapshotBuilder;

/// Configuration for the backup scheduler.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Time between scheduled backups.
    pub interval: Duration,
    /// Whether scheduled backups run at all.
    pub enabled: bool,
    /// Blob name prefix for scheduled snapshots.
    pub base_name: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(defaults::BACKUP_INTERVAL_SECS),
            enabled: true,
            base_name: defaults::BACKUP_BASE_NAME.to_string(),
        }
    }
}

impl SchedulerConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `BACKUP_ENABLED` | `true` | Enable/disable scheduled backups |
    /// | `BACKUP_INTERVAL_SECS` | `1800` | Seconds between backups |
    /// | `BACKUP_BASE_NAME` | `backup` | Snapshot blob name prefix |
    pub fn from_env() -> Self {
        let enabled = std::env::var("BACKUP_ENABLED")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        let interval_secs = std::env::var("BACKUP_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults::BACKUP_INTERVAL_SECS)
            .max(1);

        let base_name = std::env::var("BACKUP_BASE_NAME")
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| defaults::BACKUP_BASE_NAME.to_string());

        Self {
            interval: Duration::from_secs(interval_secs),
            enabled,
            base_name,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Enable or disable scheduled backups.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_base_name(mut self, base_name: impl Into<String>) -> Self {
        self.base_name = base_name.into();
        self
    }
}

/// Event emitted by the backup scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackupEvent {
    /// A backup run began.
    Started,
    /// A backup was written.
    Completed { location: String },
    /// A backup run failed; the scheduler keeps going.
    Failed { error: String },
    /// Scheduler stopped.
    Stopped,
}

/// Handle for controlling a running scheduler.
pub struct SchedulerHandle {
    shutdown_tx: mpsc::Sender<()>,
    event_rx: broadcast::Receiver<BackupEvent>,
}

impl SchedulerHandle {
    /// Stop scheduling new backups. Runs already spawned finish on their own.
    ///
    /// A scheduler that already exited (disabled, or stopped earlier) has
    /// dropped its receiver; that counts as stopped.
    pub async fn shutdown(&self) -> Result<()> {
        if self.shutdown_tx.send(()).await.is_err() {
            debug!(
                subsystem = "sync",
                component = "scheduler",
                "Backup scheduler already stopped"
            );
        }
        Ok(())
    }

    /// Get a receiver for scheduler events.
    pub fn events(&self) -> broadcast::Receiver<BackupEvent> {
        self.event_rx.resubscribe()
    }
}

/// Runs one backup at start, then one per interval.
///
/// Each tick spawns an independent backup task, so a slow backup never
/// delays the next tick and runs may overlap.
pub struct BackupScheduler {
    builder: SnapshotBuilder,
    config: SchedulerConfig,
    event_tx: broadcast::Sender<BackupEvent>,
}

impl BackupScheduler {
    pub fn new(builder: SnapshotBuilder, config: SchedulerConfig) -> Self {
        let (event_tx, _) = broadcast::channel(defaults::EVENT_BUS_CAPACITY);
        Self {
            builder,
            config,
            event_tx,
        }
    }

    /// Start the scheduler on the current runtime and return its handle.
    pub fn start(builder: SnapshotBuilder, config: SchedulerConfig) -> SchedulerHandle {
        Self::new(builder, config).spawn()
    }

    fn spawn(self) -> SchedulerHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);
        let event_rx = self.event_tx.subscribe();

        tokio::spawn(async move {
            self.run(&mut shutdown_rx).await;
        });

        SchedulerHandle {
            shutdown_tx,
            event_rx,
        }
    }

    async fn run(&self, shutdown_rx: &mut mpsc::Receiver<()>) {
        if !self.config.enabled {
            info!(
                subsystem = "sync",
                component = "scheduler",
                "Backup scheduler is disabled, not starting"
            );
            let _ = self.event_tx.send(BackupEvent::Stopped);
            return;
        }

        info!(
            subsystem = "sync",
            component = "scheduler",
            interval_secs = self.config.interval.as_secs(),
            base_name = %self.builder.base_name(),
            "Backup scheduler started"
        );

        // The first tick completes immediately.
        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!(subsystem = "sync", component = "scheduler", "Backup scheduler received shutdown signal");
                    break;
                }
                _ = ticker.tick() => {
                    let builder = self.builder.clone();
                    let event_tx = self.event_tx.clone();
                    tokio::spawn(async move {
                        run_backup(&builder, &event_tx).await;
                    });
                }
            }
        }

        let _ = self.event_tx.send(BackupEvent::Stopped);
        info!(
            subsystem = "sync",
            component = "scheduler",
            "Backup scheduler stopped"
        );
    }
}

/// Log every completed backup until the event bus closes.
///
/// Returns how many completions were seen. A lagging receiver skips the
/// overwritten events and keeps listening.
pub async fn log_completed_backups(mut events: broadcast::Receiver<BackupEvent>) -> usize {
    let mut completed = 0;
    loop {
        match events.recv().await {
            Ok(BackupEvent::Completed { location }) => {
                completed += 1;
                info!(
                    subsystem = "sync",
                    component = "scheduler",
                    location = %location,
                    "Backup available"
                );
            }
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                warn!(
                    subsystem = "sync",
                    component = "scheduler",
                    skipped,
                    "Backup event listener lagged"
                );
            }
            Err(RecvError::Closed) => return completed,
        }
    }
}

async fn run_backup(builder: &SnapshotBuilder, event_tx: &broadcast::Sender<BackupEvent>) {
    debug!(subsystem = "sync", component = "scheduler", op = "tick", "Scheduled backup starting");
    let _ = event_tx.send(BackupEvent::Started);

    match builder.backup().await {
        Ok(location) => {
            let _ = event_tx.send(BackupEvent::Completed { location });
        }
        Err(e) => {
            error!(
                subsystem = "sync",
                component = "scheduler",
                op = "backup",
                error = %e,
                "Scheduled backup failed"
            );
            let _ = event_tx.send(BackupEvent::Failed {
                error: e.to_string(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockBlobStore, MockRelationalStore};
    use std::sync::Arc;

    fn builder(relational: &MockRelationalStore, blobs: &MockBlobStore) -> SnapshotBuilder {
        SnapshotBuilder::new(Arc::new(relational.clone()), Arc::new(blobs.clone()))
    }

    async fn next_outcome(events: &mut broadcast::Receiver<BackupEvent>) -> BackupEvent {
        loop {
            match events.recv().await.unwrap() {
                BackupEvent::Started => continue,
                other => return other,
            }
        }
    }

    #[test]
    fn test_config_defaults() {
        let config = SchedulerConfig::default();
        assert_eq!(config.interval, Duration::from_secs(30 * 60));
        assert!(config.enabled);
        assert_eq!(config.base_name, "backup");
    }

    #[test]
    fn test_config_builder() {
        let config = SchedulerConfig::default()
            .with_interval(Duration::from_secs(5))
            .with_enabled(false)
            .with_base_name("hourly");
        assert_eq!(config.interval, Duration::from_secs(5));
        assert!(!config.enabled);
        assert_eq!(config.base_name, "hourly");
    }

    #[tokio::test(start_paused = true)]
    async fn test_immediate_backup_then_one_per_interval() {
        let relational = MockRelationalStore::new();
        let blobs = MockBlobStore::new();
        let start = tokio::time::Instant::now();

        let handle = BackupScheduler::start(
            builder(&relational, &blobs),
            SchedulerConfig::default().with_interval(Duration::from_secs(60)),
        );
        let mut events = handle.events();

        let first = next_outcome(&mut events).await;
        assert!(matches!(first, BackupEvent::Completed { .. }));
        assert!(start.elapsed() < Duration::from_secs(60));

        for _ in 0..2 {
            assert!(matches!(
                next_outcome(&mut events).await,
                BackupEvent::Completed { .. }
            ));
        }
        assert!(start.elapsed() >= Duration::from_secs(120));
        assert_eq!(blobs.call_count("save"), 3);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_are_reported_and_ticking_continues() {
        let relational = MockRelationalStore::new().with_failure("find_all_links");
        let blobs = MockBlobStore::new();

        let handle = BackupScheduler::start(
            builder(&relational, &blobs),
            SchedulerConfig::default().with_interval(Duration::from_secs(60)),
        );
        let mut events = handle.events();

        for _ in 0..2 {
            assert!(matches!(
                next_outcome(&mut events).await,
                BackupEvent::Failed { .. }
            ));
        }

        // Recovery on a later tick.
        relational.set_failure("find_all_links", false);
        assert!(matches!(
            next_outcome(&mut events).await,
            BackupEvent::Completed { .. }
        ));
        assert_eq!(blobs.call_count("save"), 1);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_ticking() {
        let relational = MockRelationalStore::new();
        let blobs = MockBlobStore::new();

        let handle = BackupScheduler::start(
            builder(&relational, &blobs),
            SchedulerConfig::default().with_interval(Duration::from_secs(60)),
        );
        let mut events = handle.events();
        assert!(matches!(
            next_outcome(&mut events).await,
            BackupEvent::Completed { .. }
        ));

        handle.shutdown().await.unwrap();
        assert_eq!(next_outcome(&mut events).await, BackupEvent::Stopped);

        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(blobs.call_count("save"), 1);
    }

    #[tokio::test]
    async fn test_disabled_scheduler_never_backs_up() {
        let relational = MockRelationalStore::new();
        let blobs = MockBlobStore::new();

        let handle = BackupScheduler::start(
            builder(&relational, &blobs),
            SchedulerConfig::default().with_enabled(false),
        );
        let mut events = handle.events();

        assert_eq!(events.recv().await.unwrap(), BackupEvent::Stopped);
        assert_eq!(blobs.call_count("save"), 0);
        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_event_logger_survives_lag() {
        let (tx, rx) = broadcast::channel(2);
        for i in 0..4 {
            tx.send(BackupEvent::Completed {
                location: format!("mock://backup-{}.json", i),
            })
            .unwrap();
        }
        tx.send(BackupEvent::Stopped).unwrap();
        drop(tx);

        // Capacity 2: only the last completion and Stopped survive.
        assert_eq!(log_completed_backups(rx).await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_twice_is_ok() {
        let relational = MockRelationalStore::new();
        let blobs = MockBlobStore::new();

        let handle = BackupScheduler::start(
            builder(&relational, &blobs),
            SchedulerConfig::default().with_interval(Duration::from_secs(60)),
        );
        let mut events = handle.events();
        handle.shutdown().await.unwrap();
        // The immediate tick may race the shutdown signal.
        while events.recv().await.unwrap() != BackupEvent::Stopped {}

        handle.shutdown().await.unwrap();
    }
}
