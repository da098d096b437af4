//! # alexandria-db
//!
//! PostgreSQL storage layer for alexandria.
//!
//! This crate provides:
//! - Connection pool management with a bounded startup retry
//! - [`PgRelationalStore`], the authoritative store for documents, links,
//!   journal entries, tags and tag associations
//! - [`PgGraphStore`], the labelled-graph projection of resources and tags
//! - [`FilesystemBlobStore`] for snapshot blobs
//!
//! ## Example
//!
//! ```rust,ignore
//! use alexandria_db::{PgRelationalStore, PoolConfig, TagRepository};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = PgRelationalStore::connect("postgres://localhost/alexandria", &PoolConfig::from_env()).await?;
//!     store.migrate().await?;
//!
//!     let tag = store.upsert_tag("machine-learning").await?;
//!     println!("Tag {} is {}", tag.display_name, tag.color);
//!     Ok(())
//! }
//! ```
pub mod blob;
pub mod documents;
pub mod field_filter;
pub mod graph;
pub mod journal;
pub mod links;
pub mod pool;
pub mod relational;
pub mod restore;
pub mod tags;

// Compiled outside cfg(test) so integration tests (in tests/) can use it.
#[cfg(feature = "migrations")]
pub mod test_fixtures;

// Re-export core types
pub use alexandria_core::*;

pub use blob::FilesystemBlobStore;
pub use field_filter::{FieldFilterQueryBuilder, QueryParam};
pub use graph::PgGraphStore;
pub use pool::{connect_with_retry, create_pool_with_config, log_pool_metrics, PoolConfig};
pub use relational::PgRelationalStore;
