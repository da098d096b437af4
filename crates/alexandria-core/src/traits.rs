//! Core traits for alexandria abstractions.
//!
//! The relational store is split into per-entity repositories, composed by
//! [`RelationalStore`]. The graph store and blob store are single traits.
//! Concrete backends live in `alexandria-db`; in-memory doubles live in
//! `alexandria-sync::mock`.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::filter::FieldFilter;
use crate::models::*;

// =============================================================================
// RELATIONAL STORE TRAITS
// =============================================================================

/// Repository for document CRUD.
#[async_trait]
pub trait DocumentRepository: Send + Sync {
    /// List documents matching every field of `filter`, ordered by display
    /// name. Each document carries its tag ids.
    async fn find_all_documents(&self, filter: &FieldFilter) -> Result<Vec<Document>>;

    /// Fetch one document; `None` when absent.
    async fn find_document(&self, id: Uuid) -> Result<Option<Document>>;

    /// Insert a new document and return it with its assigned id.
    async fn insert_document(&self, req: CreateDocumentRequest) -> Result<Document>;

    /// Update editable fields and bump `updated`; `None` when absent.
    async fn update_document(
        &self,
        id: Uuid,
        req: UpdateDocumentRequest,
    ) -> Result<Option<Document>>;
}

/// Repository for bookmarked links.
#[async_trait]
pub trait LinkRepository: Send + Sync {
    /// List all links, newest first, each with its tag ids.
    async fn find_all_links(&self) -> Result<Vec<Link>>;

    /// Fetch one link; `None` when absent.
    async fn find_link(&self, id: Uuid) -> Result<Option<Link>>;

    /// Insert a new link and return it with its assigned id.
    async fn insert_link(&self, req: CreateLinkRequest) -> Result<Link>;
}

/// Repository for journal entries.
#[async_trait]
pub trait JournalRepository: Send + Sync {
    async fn find_all_entries(&self) -> Result<Vec<JournalEntry>>;

    async fn insert_entry(&self, content: &str) -> Result<JournalEntry>;
}

/// Repository for tags and tag associations.
#[async_trait]
pub trait TagRepository: Send + Sync {
    /// List all tags ordered by display name.
    async fn find_all_tags(&self) -> Result<Vec<Tag>>;

    /// Look up a tag by slug; `None` when absent.
    async fn find_tag_by_name(&self, slug: &str) -> Result<Option<Tag>>;

    /// Create the tag if the slug is new, otherwise return the existing one.
    /// Never fails with a conflict.
    async fn upsert_tag(&self, slug: &str) -> Result<Tag>;

    /// Record an association. Re-adding an existing pair is a no-op.
    async fn add_resource_tag(&self, assoc: &TaggedResource) -> Result<()>;

    /// Delete an association. Deleting an absent pair is a no-op.
    async fn remove_resource_tag(&self, tag_id: Uuid, resource_id: Uuid) -> Result<()>;
}

/// Bulk replay of a snapshot.
#[async_trait]
pub trait RestoreRepository: Send + Sync {
    /// Insert tags, journal entries, documents, links, then associations,
    /// all inside one transaction. Any failure rolls everything back.
    async fn restore(&self, plan: &RestorePlan<'_>) -> Result<()>;
}

/// The authoritative store: every relational repository in one bound.
pub trait RelationalStore:
    DocumentRepository + LinkRepository + JournalRepository + TagRepository + RestoreRepository
{
}

impl<T> RelationalStore for T where
    T: DocumentRepository + LinkRepository + JournalRepository + TagRepository + RestoreRepository
{
}

// =============================================================================
// GRAPH STORE TRAIT
// =============================================================================

/// Best-effort mirror of resources and associations as a labelled graph.
///
/// The graph store never issues identifiers; every id it receives was
/// assigned by the relational store.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Create a `Tag` node, merging on id: a second call is a no-op.
    async fn create_tag_node(&self, tag: &Tag) -> Result<()>;

    /// Create a resource node. Not idempotent: a duplicate id is an error.
    async fn create_resource_node(&self, node: &ResourceNode) -> Result<()>;

    /// Whether a node with this id already carries the label of `resource_type`.
    async fn has_resource_node(&self, node_id: Uuid, resource_type: ResourceType) -> Result<bool>;

    /// Create a `HAS_TAG` edge from a resource to a tag.
    ///
    /// Both endpoints must exist with the expected labels, otherwise
    /// [`Error::Referential`](crate::Error::Referential) is returned. An edge
    /// that already exists is merged (no duplicate).
    async fn create_association_edge(
        &self,
        resource_id: Uuid,
        resource_type: ResourceType,
        tag_id: Uuid,
    ) -> Result<()>;

    /// Delete the edge between a resource and a tag; silent when absent.
    async fn delete_association_edge(&self, resource_id: Uuid, tag_id: Uuid) -> Result<()>;

    /// Resources connected to the given tag node.
    async fn find_resources_by_tag(&self, tag_id: Uuid) -> Result<Vec<TaggedResourceSummary>>;
}

// =============================================================================
// BLOB STORE TRAIT
// =============================================================================

/// Blob persistence for snapshots.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Persist `data` under `name` and return where it landed.
    async fn save(&self, name: &str, data: Vec<u8>) -> Result<String>;

    /// Read the blob stored under `name`, or under a location returned by
    /// [`save`](BlobStore::save).
    /// Returns [`Error::NotFound`](crate::Error::NotFound) when absent.
    async fn read(&self, name: &str) -> Result<Vec<u8>>;
}
