//! # alexandria-sync
//!
//! Keeps the relational store and its graph projection in step, and moves
//! the whole dataset in and out of snapshot blobs.
//!
//! - [`TaggingCoordinator`]: dual-write tagging, relational first
//! - [`SnapshotBuilder`]: concurrent aggregate read and backup
//! - [`RestoreEngine`]: transactional relational replay, then graph replay
//! - [`BackupScheduler`]: periodic backups on an owned background task
//! - [`NetworkService`]: derived resource/tag network
//! - `mock` (feature `mock`): in-memory stores for deterministic tests

// In-memory stores for testing
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod network;
pub mod restore;
pub mod scheduler;
pub mod snapshot;
pub mod tagging;

pub use network::NetworkService;
pub use restore::RestoreEngine;
pub use scheduler::{
    log_completed_backups, BackupEvent, BackupScheduler, SchedulerConfig, SchedulerHandle,
};
pub use snapshot::{snapshot_name, SnapshotBuilder};
pub use tagging::TaggingCoordinator;
