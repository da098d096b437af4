//! Core data models for alexandria.
//!
//! These types are shared across all alexandria crates and represent the
//! core domain entities, the snapshot aggregate, and the derived network view.

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use std::collections::HashSet;
use uuid::Uuid;

use crate::error::{Error, Result};

// =============================================================================
// RESOURCE TYPES
// =============================================================================

/// Kind of a stored document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Book,
    Paper,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Book => "book",
            Self::Paper => "paper",
        }
    }

    /// Resource type used when a document of this kind is tagged.
    pub fn resource_type(&self) -> ResourceType {
        match self {
            Self::Book => ResourceType::Book,
            Self::Paper => ResourceType::Paper,
        }
    }
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DocumentKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "book" => Ok(Self::Book),
            "paper" => Ok(Self::Paper),
            other => Err(Error::Config(format!("unknown document kind: {}", other))),
        }
    }
}

/// Type of a taggable resource as recorded on an association.
///
/// The set is closed: an unrecognized type string is a configuration error,
/// never silently mapped to a default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Book,
    Paper,
    Link,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Book => "book",
            Self::Paper => "paper",
            Self::Link => "link",
        }
    }

    /// Graph node label for resources of this type.
    pub fn node_label(&self) -> NodeLabel {
        match self {
            Self::Book => NodeLabel::Book,
            Self::Paper => NodeLabel::Paper,
            Self::Link => NodeLabel::Link,
        }
    }
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ResourceType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "book" => Ok(Self::Book),
            "paper" => Ok(Self::Paper),
            "link" => Ok(Self::Link),
            other => Err(Error::Config(format!("unknown resource type: {}", other))),
        }
    }
}

/// Label attached to a node in the graph store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeLabel {
    Book,
    Paper,
    Link,
    Tag,
}

impl NodeLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Book => "Book",
            Self::Paper => "Paper",
            Self::Link => "Link",
            Self::Tag => "Tag",
        }
    }

    /// Resource type for a resource label; `None` for `Tag`.
    pub fn resource_type(&self) -> Option<ResourceType> {
        match self {
            Self::Book => Some(ResourceType::Book),
            Self::Paper => Some(ResourceType::Paper),
            Self::Link => Some(ResourceType::Link),
            Self::Tag => None,
        }
    }
}

impl std::fmt::Display for NodeLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for NodeLabel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Book" => Ok(Self::Book),
            "Paper" => Ok(Self::Paper),
            "Link" => Ok(Self::Link),
            "Tag" => Ok(Self::Tag),
            other => Err(Error::Config(format!("unknown node label: {}", other))),
        }
    }
}

// =============================================================================
// ENTITIES
// =============================================================================

/// A stored book or paper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    /// Storage name of the underlying file.
    pub name: String,
    pub display_name: String,
    /// Path into blob storage.
    pub path: String,
    #[serde(rename = "type")]
    pub kind: DocumentKind,
    #[serde(default)]
    pub description: String,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    /// Associated tag ids, derived from the association join.
    #[serde(default)]
    pub tags: Vec<Uuid>,
}

impl Document {
    pub fn resource_type(&self) -> ResourceType {
        self.kind.resource_type()
    }
}

/// A bookmarked URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub id: Uuid,
    /// Target URL.
    pub link: String,
    pub display_name: String,
    #[serde(default)]
    pub icon_path: String,
    pub created: DateTime<Utc>,
    #[serde(default)]
    pub tags: Vec<Uuid>,
}

/// A free-form note. Journal entries cannot be tagged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: Uuid,
    pub content: String,
    pub created: DateTime<Utc>,
}

/// Display color assigned to a tag on first creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagColor {
    Red,
    Orange,
    Yellow,
    Green,
    Teal,
    Blue,
    Indigo,
    Purple,
    Pink,
    Gray,
}

impl TagColor {
    pub const ALL: [TagColor; 10] = [
        Self::Red,
        Self::Orange,
        Self::Yellow,
        Self::Green,
        Self::Teal,
        Self::Blue,
        Self::Indigo,
        Self::Purple,
        Self::Pink,
        Self::Gray,
    ];

    /// Pick a color uniformly from the palette.
    pub fn random() -> Self {
        *Self::ALL
            .choose(&mut rand::thread_rng())
            .unwrap_or(&Self::Gray)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Red => "red",
            Self::Orange => "orange",
            Self::Yellow => "yellow",
            Self::Green => "green",
            Self::Teal => "teal",
            Self::Blue => "blue",
            Self::Indigo => "indigo",
            Self::Purple => "purple",
            Self::Pink => "pink",
            Self::Gray => "gray",
        }
    }
}

impl std::fmt::Display for TagColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TagColor {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| Error::Serialization(format!("unknown tag color: {}", s)))
    }
}

/// A tag. `display_name` is the slug and the natural key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: Uuid,
    pub display_name: String,
    pub color: TagColor,
}

/// A (tag, resource) association.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaggedResource {
    pub tag_id: Uuid,
    pub resource_id: Uuid,
    pub resource_type: ResourceType,
}

/// A resource found by walking tag edges in the graph store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaggedResourceSummary {
    pub id: Uuid,
    pub display_name: String,
    #[serde(rename = "type")]
    pub resource_type: ResourceType,
}

/// Attributes of a resource node in the graph store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceNode {
    pub id: Uuid,
    pub resource_type: ResourceType,
    pub display_name: String,
    /// Remaining label-specific properties (path, link, description, ...).
    pub properties: JsonValue,
}

impl From<&Document> for ResourceNode {
    fn from(doc: &Document) -> Self {
        Self {
            id: doc.id,
            resource_type: doc.resource_type(),
            display_name: doc.display_name.clone(),
            properties: json!({
                "name": doc.name,
                "path": doc.path,
                "description": doc.description,
            }),
        }
    }
}

impl From<&Link> for ResourceNode {
    fn from(link: &Link) -> Self {
        Self {
            id: link.id,
            resource_type: ResourceType::Link,
            display_name: link.display_name.clone(),
            properties: json!({
                "link": link.link,
                "icon_path": link.icon_path,
            }),
        }
    }
}

// =============================================================================
// REQUESTS
// =============================================================================

/// Request for inserting a document. The store assigns the id.
#[derive(Debug, Clone)]
pub struct CreateDocumentRequest {
    pub name: String,
    pub display_name: String,
    pub path: String,
    pub kind: DocumentKind,
    pub description: String,
}

/// Partial update of a document's editable fields.
#[derive(Debug, Clone, Default)]
pub struct UpdateDocumentRequest {
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub kind: Option<DocumentKind>,
}

/// Request for inserting a link. The store assigns the id.
#[derive(Debug, Clone)]
pub struct CreateLinkRequest {
    pub link: String,
    pub display_name: String,
    pub icon_path: String,
}

// =============================================================================
// SNAPSHOT TYPES
// =============================================================================

/// Point-in-time-ish aggregate of the whole dataset.
///
/// Associations are not stored directly; they are reconstructed from each
/// resource's tag list. Collections are unordered sets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub documents: Vec<Document>,
    #[serde(default)]
    pub journal_entries: Vec<JournalEntry>,
    #[serde(default)]
    pub links: Vec<Link>,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

impl Snapshot {
    /// Decode a snapshot from its JSON blob.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Encode the snapshot as JSON.
    pub fn to_vec(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Associations implied by the resources' tag lists, documents first.
    /// Repeated tag ids on one resource collapse to one association.
    pub fn associations(&self) -> Vec<TaggedResource> {
        let mut seen = HashSet::new();
        let docs = self.documents.iter().flat_map(|d| {
            d.tags.iter().map(move |tag_id| TaggedResource {
                tag_id: *tag_id,
                resource_id: d.id,
                resource_type: d.resource_type(),
            })
        });
        let links = self.links.iter().flat_map(|l| {
            l.tags.iter().map(move |tag_id| TaggedResource {
                tag_id: *tag_id,
                resource_id: l.id,
                resource_type: ResourceType::Link,
            })
        });
        docs.chain(links)
            .filter(|tr| seen.insert((tr.tag_id, tr.resource_id)))
            .collect()
    }

    /// Split the implied associations into those whose tag exists in this
    /// snapshot and those that dangle.
    pub fn partition_associations(&self) -> (Vec<TaggedResource>, Vec<TaggedResource>) {
        let known: HashSet<Uuid> = self.tags.iter().map(|t| t.id).collect();
        self.associations()
            .into_iter()
            .partition(|tr| known.contains(&tr.tag_id))
    }

    /// Total number of entities across all collections.
    pub fn entity_count(&self) -> usize {
        self.documents.len() + self.journal_entries.len() + self.links.len() + self.tags.len()
    }
}

/// Everything the relational store needs to replay a snapshot.
#[derive(Debug, Clone)]
pub struct RestorePlan<'a> {
    pub snapshot: &'a Snapshot,
    /// Associations to insert after all resources, dangling ones removed.
    pub associations: Vec<TaggedResource>,
}

/// Which stores a restore repopulates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestoreScope {
    All,
    RelationalOnly,
    GraphOnly,
}

impl RestoreScope {
    pub fn includes_relational(&self) -> bool {
        matches!(self, Self::All | Self::RelationalOnly)
    }

    pub fn includes_graph(&self) -> bool {
        matches!(self, Self::All | Self::GraphOnly)
    }
}

impl std::fmt::Display for RestoreScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::All => write!(f, "all"),
            Self::RelationalOnly => write!(f, "relational"),
            Self::GraphOnly => write!(f, "graph"),
        }
    }
}

impl std::str::FromStr for RestoreScope {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "all" | "" => Ok(Self::All),
            "relational" | "postgres" => Ok(Self::RelationalOnly),
            "graph" | "neo4j" => Ok(Self::GraphOnly),
            other => Err(Error::InvalidInput(format!(
                "unsupported restore scope: {}",
                other
            ))),
        }
    }
}

// =============================================================================
// NETWORK VIEW
// =============================================================================

/// Node of the derived network view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkNode {
    pub id: Uuid,
    pub display_name: String,
    #[serde(rename = "type")]
    pub node_type: String,
}

/// Edge of the derived network view, resource to tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkEdge {
    pub node_a: Uuid,
    pub node_b: Uuid,
}

/// Whole-dataset node/edge view built from a snapshot aggregate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    pub nodes: Vec<NetworkNode>,
    pub edges: Vec<NetworkEdge>,
}

impl From<&Snapshot> for Network {
    fn from(snapshot: &Snapshot) -> Self {
        let mut network = Network::default();

        for tag in &snapshot.tags {
            network.nodes.push(NetworkNode {
                id: tag.id,
                display_name: tag.display_name.clone(),
                node_type: "tag".to_string(),
            });
        }

        for doc in &snapshot.documents {
            network.nodes.push(NetworkNode {
                id: doc.id,
                display_name: doc.display_name.clone(),
                node_type: doc.kind.as_str().to_string(),
            });
        }

        for link in &snapshot.links {
            network.nodes.push(NetworkNode {
                id: link.id,
                display_name: link.display_name.clone(),
                node_type: ResourceType::Link.as_str().to_string(),
            });
        }

        network.edges = snapshot
            .associations()
            .into_iter()
            .map(|tr| NetworkEdge {
                node_a: tr.resource_id,
                node_b: tr.tag_id,
            })
            .collect();

        network
    }
}
