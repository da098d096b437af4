//! Centralized default constants for alexandria.
//!
//! **This module is the single source of truth** for shared default values.
//! Config structs in the other crates fall back to these when an environment
//! variable is unset.

// =============================================================================
// DATABASE
// =============================================================================

/// Default maximum number of connections in a pool.
pub const POOL_MAX_CONNECTIONS: u32 = 10;

/// Default minimum number of idle connections kept open.
pub const POOL_MIN_CONNECTIONS: u32 = 1;

/// Default connection acquire timeout in seconds.
pub const POOL_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default idle timeout in seconds.
pub const POOL_IDLE_TIMEOUT_SECS: u64 = 600;

/// Default maximum connection lifetime in seconds.
pub const POOL_MAX_LIFETIME_SECS: u64 = 1800;

/// Connection attempts made at startup before a store is declared unavailable.
pub const CONNECT_ATTEMPTS: u32 = 3;

/// Fixed delay between startup connection attempts, in seconds.
pub const CONNECT_RETRY_DELAY_SECS: u64 = 10;

// =============================================================================
// TAGS
// =============================================================================

/// Maximum length of a tag slug, in characters.
pub const TAG_NAME_MAX_LEN: usize = 100;

// =============================================================================
// BACKUP
// =============================================================================

/// Interval between scheduled backups, in seconds (30 minutes).
pub const BACKUP_INTERVAL_SECS: u64 = 1800;

/// Base name of snapshot blobs; a timestamp suffix is appended per backup.
pub const BACKUP_BASE_NAME: &str = "backup";

/// Extension of snapshot blobs.
pub const BACKUP_EXTENSION: &str = "json";

/// Capacity of the scheduler's event broadcast channel.
pub const EVENT_BUS_CAPACITY: usize = 64;

// =============================================================================
// DAEMON
// =============================================================================

/// Default relational database URL.
pub const DATABASE_URL: &str = "postgres://localhost/alexandria";

/// Default directory for snapshot blobs.
pub const BACKUP_STORAGE_PATH: &str = "/var/lib/alexandria/backups";
