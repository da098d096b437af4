//! Structured logging schema and field name constants for alexandria.
//!
//! All crates log with these field names so log aggregation can query by
//! the same keys across subsystems.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events (startup, shutdown), operation completions |
//! | DEBUG | Decision points, intermediate values, config choices |
//! | TRACE | Per-item iteration, high-volume data |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "db", "sync", "storage"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "pool", "relational", "graph", "tagging", "snapshot", "scheduler"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "add_resource_tag", "backup", "restore", "connect"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Tag UUID being operated on.
pub const TAG_ID: &str = "tag_id";

/// Slugged tag display name.
pub const TAG_NAME: &str = "tag_name";

/// Document or link UUID being operated on.
pub const RESOURCE_ID: &str = "resource_id";

/// Resource type wire name ("book", "paper", "link").
pub const RESOURCE_TYPE: &str = "resource_type";

/// Snapshot blob name used for restore.
pub const SNAPSHOT_ID: &str = "snapshot_id";

/// Location returned by blob storage.
pub const LOCATION: &str = "location";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of rows or items returned or written.
pub const RESULT_COUNT: &str = "result_count";

/// Connection attempt number (1-based).
pub const ATTEMPT: &str = "attempt";
