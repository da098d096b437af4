//! # alexandria-core
//!
//! Core types, traits, and abstractions for the alexandria storage core.
//!
//! This crate provides the domain model (documents, links, journal entries,
//! tags, snapshots), the error type, and the store traits that the database
//! and synchronization crates implement and consume.

pub mod defaults;
pub mod error;
pub mod filter;
pub mod logging;
pub mod models;
pub mod slug;
pub mod traits;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use filter::FieldFilter;
pub use models::*;
pub use slug::{canonical_tag_name, slugify};
pub use traits::*;
