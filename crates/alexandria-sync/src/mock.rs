//! In-memory store doubles for deterministic testing.
//!
//! Each mock implements the same trait as its PostgreSQL or filesystem
//! counterpart, records every call, and can be told to fail a named
//! operation or to delay it.
//!
//! ```rust
//! use std::sync::Arc;
//! use alexandria_sync::mock::{MockBlobStore, MockGraphStore, MockRelationalStore};
//! use alexandria_sync::TaggingCoordinator;
//!
//! let relational = MockRelationalStore::new();
//! let graph = MockGraphStore::new().with_failure("create_association_edge");
//! let coordinator = TaggingCoordinator::new(Arc::new(relational.clone()), Arc::new(graph.clone()));
//! # let _ = (coordinator, MockBlobStore::new());
//! ```

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use alexandria_core::{
    BlobStore, CreateDocumentRequest, CreateLinkRequest, Document, DocumentRepository, Error,
    FieldFilter, GraphStore, JournalEntry, JournalRepository, Link, LinkRepository, NodeLabel,
    ResourceNode, ResourceType, RestorePlan, RestoreRepository, Result, Tag, TagColor,
    TagRepository, TaggedResource, TaggedResourceSummary, UpdateDocumentRequest,
};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A recorded mock invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockCall {
    pub operation: String,
    pub input: String,
}

/// Shared failure injection and call bookkeeping.
#[derive(Clone, Default)]
struct Behavior {
    failures: Arc<Mutex<HashSet<String>>>,
    latencies: Arc<Mutex<HashMap<String, Duration>>>,
    calls: Arc<Mutex<Vec<MockCall>>>,
    completed: Arc<Mutex<Vec<String>>>,
}

impl Behavior {
    fn set_failure(&self, operation: &str, fail: bool) {
        let mut failures = lock(&self.failures);
        if fail {
            failures.insert(operation.to_string());
        } else {
            failures.remove(operation);
        }
    }

    fn set_latency(&self, operation: &str, latency: Duration) {
        lock(&self.latencies).insert(operation.to_string(), latency);
    }

    /// Log the call, apply latency, then fail if configured to.
    async fn enter(&self, operation: &str, input: impl Into<String>) -> Result<()> {
        lock(&self.calls).push(MockCall {
            operation: operation.to_string(),
            input: input.into(),
        });

        let latency = lock(&self.latencies).get(operation).copied();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        if lock(&self.failures).contains(operation) {
            return Err(Error::Internal(format!("simulated {} failure", operation)));
        }
        Ok(())
    }

    fn complete(&self, operation: &str) {
        lock(&self.completed).push(operation.to_string());
    }

    fn calls(&self) -> Vec<MockCall> {
        lock(&self.calls).clone()
    }

    fn call_count(&self, operation: &str) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|c| c.operation == operation)
            .count()
    }

    fn completed(&self) -> Vec<String> {
        lock(&self.completed).clone()
    }
}

macro_rules! behavior_api {
    () => {
        /// Fail every call to `operation` until cleared.
        pub fn with_failure(self, operation: &str) -> Self {
            self.behavior.set_failure(operation, true);
            self
        }

        /// Delay every call to `operation`.
        pub fn with_latency(self, operation: &str, latency: Duration) -> Self {
            self.behavior.set_latency(operation, latency);
            self
        }

        /// Toggle failure injection at runtime.
        pub fn set_failure(&self, operation: &str, fail: bool) {
            self.behavior.set_failure(operation, fail);
        }

        /// Get all logged calls for assertion.
        pub fn get_calls(&self) -> Vec<MockCall> {
            self.behavior.calls()
        }

        pub fn call_count(&self, operation: &str) -> usize {
            self.behavior.call_count(operation)
        }

        /// Operations that ran to completion, in order.
        pub fn completed_calls(&self) -> Vec<String> {
            self.behavior.completed()
        }
    };
}

// =============================================================================
// RELATIONAL
// =============================================================================

#[derive(Default)]
struct RelationalState {
    documents: Vec<Document>,
    links: Vec<Link>,
    entries: Vec<JournalEntry>,
    tags: Vec<Tag>,
    associations: Vec<TaggedResource>,
}

impl RelationalState {
    fn tags_of(&self, resource_id: Uuid) -> Vec<Uuid> {
        self.associations
            .iter()
            .filter(|a| a.resource_id == resource_id)
            .map(|a| a.tag_id)
            .collect()
    }

    fn with_tags_doc(&self, doc: &Document) -> Document {
        Document {
            tags: self.tags_of(doc.id),
            ..doc.clone()
        }
    }

    fn with_tags_link(&self, link: &Link) -> Link {
        Link {
            tags: self.tags_of(link.id),
            ..link.clone()
        }
    }

    fn has_id(&self, id: Uuid) -> bool {
        self.documents.iter().any(|d| d.id == id)
            || self.links.iter().any(|l| l.id == id)
            || self.entries.iter().any(|e| e.id == id)
            || self.tags.iter().any(|t| t.id == id)
    }

    fn insert_association(&mut self, assoc: &TaggedResource) -> Result<()> {
        if !self.tags.iter().any(|t| t.id == assoc.tag_id) {
            return Err(Error::Referential(format!("No tag with id {}", assoc.tag_id)));
        }
        let exists = self
            .associations
            .iter()
            .any(|a| a.tag_id == assoc.tag_id && a.resource_id == assoc.resource_id);
        if !exists {
            self.associations.push(*assoc);
        }
        Ok(())
    }
}

fn document_matches(doc: &Document, filter: &FieldFilter) -> Result<bool> {
    for (field, value) in filter.iter() {
        let actual = match field {
            "id" => doc.id.to_string(),
            "name" => doc.name.clone(),
            "display_name" => doc.display_name.clone(),
            "path" => doc.path.clone(),
            "type" => doc.kind.as_str().to_string(),
            "description" => doc.description.clone(),
            other => {
                return Err(Error::InvalidInput(format!(
                    "Unknown filter field: {}",
                    other
                )))
            }
        };
        if actual != value {
            return Ok(false);
        }
    }
    Ok(true)
}

/// In-memory [`RelationalStore`](alexandria_core::RelationalStore).
#[derive(Clone, Default)]
pub struct MockRelationalStore {
    state: Arc<Mutex<RelationalState>>,
    behavior: Behavior,
}

impl MockRelationalStore {
    pub fn new() -> Self {
        Self::default()
    }

    behavior_api!();

    /// All associations currently stored.
    pub fn associations(&self) -> Vec<TaggedResource> {
        lock(&self.state).associations.clone()
    }

    pub fn associations_for(&self, resource_id: Uuid) -> Vec<TaggedResource> {
        lock(&self.state)
            .associations
            .iter()
            .filter(|a| a.resource_id == resource_id)
            .copied()
            .collect()
    }

    pub fn tag_count(&self) -> usize {
        lock(&self.state).tags.len()
    }

    pub fn document_count(&self) -> usize {
        lock(&self.state).documents.len()
    }
}

#[async_trait]
impl DocumentRepository for MockRelationalStore {
    async fn find_all_documents(&self, filter: &FieldFilter) -> Result<Vec<Document>> {
        self.behavior.enter("find_all_documents", "").await?;
        let state = lock(&self.state);
        let mut docs = Vec::new();
        for doc in &state.documents {
            if document_matches(doc, filter)? {
                docs.push(state.with_tags_doc(doc));
            }
        }
        docs.sort_by(|a, b| a.display_name.cmp(&b.display_name).then(a.id.cmp(&b.id)));
        self.behavior.complete("find_all_documents");
        Ok(docs)
    }

    async fn find_document(&self, id: Uuid) -> Result<Option<Document>> {
        self.behavior.enter("find_document", id.to_string()).await?;
        let state = lock(&self.state);
        Ok(state
            .documents
            .iter()
            .find(|d| d.id == id)
            .map(|d| state.with_tags_doc(d)))
    }

    async fn insert_document(&self, req: CreateDocumentRequest) -> Result<Document> {
        self.behavior
            .enter("insert_document", req.display_name.clone())
            .await?;
        let now = Utc::now();
        let doc = Document {
            id: Uuid::now_v7(),
            name: req.name,
            display_name: req.display_name,
            path: req.path,
            kind: req.kind,
            description: req.description,
            created: now,
            updated: now,
            tags: Vec::new(),
        };
        lock(&self.state).documents.push(doc.clone());
        Ok(doc)
    }

    async fn update_document(
        &self,
        id: Uuid,
        req: UpdateDocumentRequest,
    ) -> Result<Option<Document>> {
        self.behavior.enter("update_document", id.to_string()).await?;
        let mut state = lock(&self.state);
        let Some(doc) = state.documents.iter_mut().find(|d| d.id == id) else {
            return Ok(None);
        };
        if let Some(display_name) = req.display_name {
            doc.display_name = display_name;
        }
        if let Some(description) = req.description {
            doc.description = description;
        }
        if let Some(kind) = req.kind {
            doc.kind = kind;
        }
        doc.updated = Utc::now();
        let doc = doc.clone();
        Ok(Some(state.with_tags_doc(&doc)))
    }
}

#[async_trait]
impl LinkRepository for MockRelationalStore {
    async fn find_all_links(&self) -> Result<Vec<Link>> {
        self.behavior.enter("find_all_links", "").await?;
        let state = lock(&self.state);
        let mut links: Vec<Link> = state.links.iter().map(|l| state.with_tags_link(l)).collect();
        links.sort_by(|a, b| b.created.cmp(&a.created).then(a.id.cmp(&b.id)));
        self.behavior.complete("find_all_links");
        Ok(links)
    }

    async fn find_link(&self, id: Uuid) -> Result<Option<Link>> {
        self.behavior.enter("find_link", id.to_string()).await?;
        let state = lock(&self.state);
        Ok(state
            .links
            .iter()
            .find(|l| l.id == id)
            .map(|l| state.with_tags_link(l)))
    }

    async fn insert_link(&self, req: CreateLinkRequest) -> Result<Link> {
        self.behavior.enter("insert_link", req.link.clone()).await?;
        let link = Link {
            id: Uuid::now_v7(),
            link: req.link,
            display_name: req.display_name,
            icon_path: req.icon_path,
            created: Utc::now(),
            tags: Vec::new(),
        };
        lock(&self.state).links.push(link.clone());
        Ok(link)
    }
}

#[async_trait]
impl JournalRepository for MockRelationalStore {
    async fn find_all_entries(&self) -> Result<Vec<JournalEntry>> {
        self.behavior.enter("find_all_entries", "").await?;
        let entries = lock(&self.state).entries.clone();
        self.behavior.complete("find_all_entries");
        Ok(entries)
    }

    async fn insert_entry(&self, content: &str) -> Result<JournalEntry> {
        self.behavior.enter("insert_entry", content).await?;
        let entry = JournalEntry {
            id: Uuid::now_v7(),
            content: content.to_string(),
            created: Utc::now(),
        };
        lock(&self.state).entries.push(entry.clone());
        Ok(entry)
    }
}

#[async_trait]
impl TagRepository for MockRelationalStore {
    async fn find_all_tags(&self) -> Result<Vec<Tag>> {
        self.behavior.enter("find_all_tags", "").await?;
        let mut tags = lock(&self.state).tags.clone();
        tags.sort_by(|a, b| a.display_name.cmp(&b.display_name));
        self.behavior.complete("find_all_tags");
        Ok(tags)
    }

    async fn find_tag_by_name(&self, slug: &str) -> Result<Option<Tag>> {
        self.behavior.enter("find_tag_by_name", slug).await?;
        Ok(lock(&self.state)
            .tags
            .iter()
            .find(|t| t.display_name == slug)
            .cloned())
    }

    async fn upsert_tag(&self, slug: &str) -> Result<Tag> {
        self.behavior.enter("upsert_tag", slug).await?;
        let mut state = lock(&self.state);
        if let Some(tag) = state.tags.iter().find(|t| t.display_name == slug) {
            return Ok(tag.clone());
        }
        let tag = Tag {
            id: Uuid::now_v7(),
            display_name: slug.to_string(),
            color: TagColor::random(),
        };
        state.tags.push(tag.clone());
        Ok(tag)
    }

    async fn add_resource_tag(&self, assoc: &TaggedResource) -> Result<()> {
        self.behavior
            .enter(
                "add_resource_tag",
                format!("{}:{}", assoc.resource_id, assoc.tag_id),
            )
            .await?;
        lock(&self.state).insert_association(assoc)
    }

    async fn remove_resource_tag(&self, tag_id: Uuid, resource_id: Uuid) -> Result<()> {
        self.behavior
            .enter("remove_resource_tag", format!("{}:{}", resource_id, tag_id))
            .await?;
        lock(&self.state)
            .associations
            .retain(|a| !(a.tag_id == tag_id && a.resource_id == resource_id));
        Ok(())
    }
}

#[async_trait]
impl RestoreRepository for MockRelationalStore {
    async fn restore(&self, plan: &RestorePlan<'_>) -> Result<()> {
        self.behavior.enter("restore", "").await?;
        let snapshot = plan.snapshot;
        let mut state = lock(&self.state);

        // Work on a copy so a failure leaves the store untouched.
        let mut next = RelationalState {
            documents: state.documents.clone(),
            links: state.links.clone(),
            entries: state.entries.clone(),
            tags: state.tags.clone(),
            associations: state.associations.clone(),
        };

        for tag in &snapshot.tags {
            if next.has_id(tag.id) || next.tags.iter().any(|t| t.display_name == tag.display_name)
            {
                return Err(Error::InvalidInput(format!("Duplicate tag {}", tag.id)));
            }
            next.tags.push(tag.clone());
        }
        for entry in &snapshot.journal_entries {
            if next.has_id(entry.id) {
                return Err(Error::InvalidInput(format!("Duplicate entry {}", entry.id)));
            }
            next.entries.push(entry.clone());
        }
        for doc in &snapshot.documents {
            if next.has_id(doc.id) {
                return Err(Error::InvalidInput(format!("Duplicate document {}", doc.id)));
            }
            next.documents.push(Document {
                tags: Vec::new(),
                ..doc.clone()
            });
        }
        for link in &snapshot.links {
            if next.has_id(link.id) {
                return Err(Error::InvalidInput(format!("Duplicate link {}", link.id)));
            }
            next.links.push(Link {
                tags: Vec::new(),
                ..link.clone()
            });
        }
        for assoc in &plan.associations {
            next.insert_association(assoc)?;
        }

        *state = next;
        Ok(())
    }
}

// =============================================================================
// GRAPH
// =============================================================================

#[derive(Default)]
struct GraphState {
    nodes: HashMap<Uuid, (NodeLabel, String)>,
    edges: Vec<(Uuid, Uuid)>,
}

/// In-memory [`GraphStore`].
#[derive(Clone, Default)]
pub struct MockGraphStore {
    state: Arc<Mutex<GraphState>>,
    behavior: Behavior,
}

impl MockGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    behavior_api!();

    pub fn node_count(&self) -> usize {
        lock(&self.state).nodes.len()
    }

    pub fn node_label(&self, id: Uuid) -> Option<NodeLabel> {
        lock(&self.state).nodes.get(&id).map(|(label, _)| *label)
    }

    /// All `(resource_id, tag_id)` edges, in creation order.
    pub fn edges(&self) -> Vec<(Uuid, Uuid)> {
        lock(&self.state).edges.clone()
    }

    pub fn has_edge(&self, resource_id: Uuid, tag_id: Uuid) -> bool {
        lock(&self.state).edges.contains(&(resource_id, tag_id))
    }
}

#[async_trait]
impl GraphStore for MockGraphStore {
    async fn create_tag_node(&self, tag: &Tag) -> Result<()> {
        self.behavior.enter("create_tag_node", tag.display_name.clone()).await?;
        lock(&self.state)
            .nodes
            .entry(tag.id)
            .or_insert((NodeLabel::Tag, tag.display_name.clone()));
        Ok(())
    }

    async fn create_resource_node(&self, node: &ResourceNode) -> Result<()> {
        self.behavior
            .enter("create_resource_node", node.id.to_string())
            .await?;
        let mut state = lock(&self.state);
        if state.nodes.contains_key(&node.id) {
            return Err(Error::InvalidInput(format!("Duplicate node {}", node.id)));
        }
        state.nodes.insert(
            node.id,
            (node.resource_type.node_label(), node.display_name.clone()),
        );
        Ok(())
    }

    async fn has_resource_node(&self, node_id: Uuid, resource_type: ResourceType) -> Result<bool> {
        self.behavior
            .enter("has_resource_node", node_id.to_string())
            .await?;
        Ok(self.node_label(node_id) == Some(resource_type.node_label()))
    }

    async fn create_association_edge(
        &self,
        resource_id: Uuid,
        resource_type: ResourceType,
        tag_id: Uuid,
    ) -> Result<()> {
        self.behavior
            .enter(
                "create_association_edge",
                format!("{}:{}", resource_id, tag_id),
            )
            .await?;
        let mut state = lock(&self.state);
        let label = resource_type.node_label();
        if !matches!(state.nodes.get(&resource_id), Some((l, _)) if *l == label) {
            return Err(Error::Referential(format!(
                "No {} node with id {}",
                label, resource_id
            )));
        }
        if !matches!(state.nodes.get(&tag_id), Some((NodeLabel::Tag, _))) {
            return Err(Error::Referential(format!("No Tag node with id {}", tag_id)));
        }
        if !state.edges.contains(&(resource_id, tag_id)) {
            state.edges.push((resource_id, tag_id));
        }
        Ok(())
    }

    async fn delete_association_edge(&self, resource_id: Uuid, tag_id: Uuid) -> Result<()> {
        self.behavior
            .enter(
                "delete_association_edge",
                format!("{}:{}", resource_id, tag_id),
            )
            .await?;
        lock(&self.state)
            .edges
            .retain(|e| *e != (resource_id, tag_id));
        Ok(())
    }

    async fn find_resources_by_tag(&self, tag_id: Uuid) -> Result<Vec<TaggedResourceSummary>> {
        self.behavior
            .enter("find_resources_by_tag", tag_id.to_string())
            .await?;
        let state = lock(&self.state);
        let mut found: Vec<TaggedResourceSummary> = state
            .edges
            .iter()
            .filter(|(_, t)| *t == tag_id)
            .filter_map(|(resource_id, _)| {
                let (label, display_name) = state.nodes.get(resource_id)?;
                Some(TaggedResourceSummary {
                    id: *resource_id,
                    display_name: display_name.clone(),
                    resource_type: label.resource_type()?,
                })
            })
            .collect();
        found.sort_by(|a, b| a.display_name.cmp(&b.display_name));
        Ok(found)
    }
}

// =============================================================================
// BLOB
// =============================================================================

/// In-memory [`BlobStore`]. Locations are `mock://{name}`; reads accept either form.
#[derive(Clone, Default)]
pub struct MockBlobStore {
    blobs: Arc<Mutex<BTreeMap<String, Vec<u8>>>>,
    behavior: Behavior,
}

impl MockBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    behavior_api!();

    /// Seed a blob directly.
    pub fn insert(&self, name: &str, data: impl Into<Vec<u8>>) {
        lock(&self.blobs).insert(name.to_string(), data.into());
    }

    pub fn names(&self) -> Vec<String> {
        lock(&self.blobs).keys().cloned().collect()
    }

    pub fn get(&self, name: &str) -> Option<Vec<u8>> {
        lock(&self.blobs).get(name).cloned()
    }
}

#[async_trait]
impl BlobStore for MockBlobStore {
    async fn save(&self, name: &str, data: Vec<u8>) -> Result<String> {
        self.behavior.enter("save", name).await?;
        lock(&self.blobs).insert(name.to_string(), data);
        Ok(format!("mock://{}", name))
    }

    async fn read(&self, name: &str) -> Result<Vec<u8>> {
        self.behavior.enter("read", name).await?;
        let name = name.strip_prefix("mock://").unwrap_or(name);
        lock(&self.blobs)
            .get(name)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Snapshot '{}' not found", name)))
    }
}
