//! Snapshot restore into both stores.
//!
//! The relational replay is one transaction. The graph replay runs only after
//! that transaction commits and is not atomic. Re-running it converges: tag
//! nodes and edges merge, and resource nodes already present are reused.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info, warn};

use alexandria_core::{
    BlobStore, GraphStore, RelationalStore, ResourceNode, RestorePlan, RestoreScope, Result,
    Snapshot, TaggedResource,
};

/// Repopulates empty stores from a stored snapshot.
#[derive(Clone)]
pub struct RestoreEngine {
    relational: Arc<dyn RelationalStore>,
    graph: Arc<dyn GraphStore>,
    blobs: Arc<dyn BlobStore>,
}

impl RestoreEngine {
    pub fn new(
        relational: Arc<dyn RelationalStore>,
        graph: Arc<dyn GraphStore>,
        blobs: Arc<dyn BlobStore>,
    ) -> Self {
        Self {
            relational,
            graph,
            blobs,
        }
    }

    /// Restore the snapshot stored under `snapshot_id` into the stores
    /// selected by `scope`.
    ///
    /// A malformed payload fails before anything is written. A relational
    /// failure rolls back and leaves the graph untouched.
    pub async fn restore(&self, snapshot_id: &str, scope: RestoreScope) -> Result<()> {
        let start = Instant::now();
        info!(
            subsystem = "sync",
            component = "restore",
            op = "restore",
            snapshot_id = %snapshot_id,
            scope = %scope,
            "Restore started"
        );

        let bytes = self.blobs.read(snapshot_id).await?;
        let snapshot = Snapshot::from_slice(&bytes)?;

        let (associations, dangling) = snapshot.partition_associations();
        if !dangling.is_empty() {
            warn!(
                subsystem = "sync",
                component = "restore",
                op = "restore",
                snapshot_id = %snapshot_id,
                dangling = dangling.len(),
                "Skipping associations to tags absent from the snapshot"
            );
        }

        if scope.includes_relational() {
            let plan = RestorePlan {
                snapshot: &snapshot,
                associations: associations.clone(),
            };
            if let Err(e) = self.relational.restore(&plan).await {
                error!(
                    subsystem = "sync",
                    component = "restore",
                    op = "relational_restore",
                    snapshot_id = %snapshot_id,
                    error = %e,
                    "Relational restore rolled back, graph untouched"
                );
                return Err(e);
            }
        }

        if scope.includes_graph() {
            if let Err(e) = self.replay_graph(&snapshot, &associations).await {
                error!(
                    subsystem = "sync",
                    component = "restore",
                    op = "graph_restore",
                    snapshot_id = %snapshot_id,
                    error = %e,
                    "Graph restore failed part way"
                );
                return Err(e);
            }
        }

        info!(
            subsystem = "sync",
            component = "restore",
            op = "restore",
            snapshot_id = %snapshot_id,
            scope = %scope,
            result_count = snapshot.entity_count(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Restore completed"
        );
        Ok(())
    }

    /// Tag nodes, then resource nodes (documents before links), then edges.
    async fn replay_graph(
        &self,
        snapshot: &Snapshot,
        associations: &[TaggedResource],
    ) -> Result<()> {
        for tag in &snapshot.tags {
            self.graph.create_tag_node(tag).await?;
        }
        let nodes = snapshot
            .documents
            .iter()
            .map(ResourceNode::from)
            .chain(snapshot.links.iter().map(ResourceNode::from));
        let mut existing = 0usize;
        for node in nodes {
            // A previous partial replay may have left the node behind.
            if self
                .graph
                .has_resource_node(node.id, node.resource_type)
                .await?
            {
                existing += 1;
                continue;
            }
            self.graph.create_resource_node(&node).await?;
        }
        if existing > 0 {
            debug!(
                subsystem = "sync",
                component = "restore",
                op = "graph_restore",
                existing,
                "Resource nodes already present, reused"
            );
        }
        for assoc in associations {
            self.graph
                .create_association_edge(assoc.resource_id, assoc.resource_type, assoc.tag_id)
                .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockBlobStore, MockGraphStore, MockRelationalStore};
    use alexandria_core::{
        Document, DocumentKind, DocumentRepository, Error, FieldFilter, JournalEntry, Link,
        LinkRepository, NodeLabel, Tag, TagColor, TagRepository,
    };
    use chrono::Utc;
    use uuid::Uuid;

    struct Fixture {
        relational: MockRelationalStore,
        graph: MockGraphStore,
        blobs: MockBlobStore,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                relational: MockRelationalStore::new(),
                graph: MockGraphStore::new(),
                blobs: MockBlobStore::new(),
            }
        }

        fn engine(&self) -> RestoreEngine {
            RestoreEngine::new(
                Arc::new(self.relational.clone()),
                Arc::new(self.graph.clone()),
                Arc::new(self.blobs.clone()),
            )
        }

        fn store(&self, name: &str, snapshot: &Snapshot) {
            self.blobs.insert(name, snapshot.to_vec().unwrap());
        }
    }

    fn tag(name: &str) -> Tag {
        Tag {
            id: Uuid::now_v7(),
            display_name: name.to_string(),
            color: TagColor::Teal,
        }
    }

    fn sample() -> Snapshot {
        let fiction = tag("fiction");
        let science = tag("science");
        let now = Utc::now();
        Snapshot {
            documents: vec![
                Document {
                    id: Uuid::now_v7(),
                    name: "dune.pdf".to_string(),
                    display_name: "Dune".to_string(),
                    path: "books/dune.pdf".to_string(),
                    kind: DocumentKind::Book,
                    description: String::new(),
                    created: now,
                    updated: now,
                    tags: vec![fiction.id, science.id],
                },
                Document {
                    id: Uuid::now_v7(),
                    name: "attention.pdf".to_string(),
                    display_name: "Attention Is All You Need".to_string(),
                    path: "papers/attention.pdf".to_string(),
                    kind: DocumentKind::Paper,
                    description: String::new(),
                    created: now,
                    updated: now,
                    tags: vec![science.id],
                },
            ],
            journal_entries: vec![JournalEntry {
                id: Uuid::now_v7(),
                content: "Finished Dune".to_string(),
                created: now,
            }],
            links: vec![Link {
                id: Uuid::now_v7(),
                link: "https://arxiv.org".to_string(),
                display_name: "arXiv".to_string(),
                icon_path: String::new(),
                created: now,
                tags: vec![science.id],
            }],
            tags: vec![fiction, science],
        }
    }

    #[tokio::test]
    async fn test_restore_all_creates_one_edge_per_association() {
        let fx = Fixture::new();
        let snapshot = sample();
        fx.store("snap.json", &snapshot);

        fx.engine()
            .restore("snap.json", RestoreScope::All)
            .await
            .unwrap();

        let expected = snapshot.associations();
        assert_eq!(expected.len(), 4);
        assert_eq!(fx.graph.edges().len(), expected.len());
        for assoc in &expected {
            assert!(fx.graph.has_edge(assoc.resource_id, assoc.tag_id));
        }
        assert_eq!(fx.graph.node_count(), 5);
        assert_eq!(
            fx.graph.node_label(snapshot.documents[1].id),
            Some(NodeLabel::Paper)
        );
        assert_eq!(fx.relational.associations().len(), 4);
    }

    #[tokio::test]
    async fn test_restore_reproduces_relational_entities() {
        let fx = Fixture::new();
        let snapshot = sample();
        fx.store("snap.json", &snapshot);

        fx.engine()
            .restore("snap.json", RestoreScope::RelationalOnly)
            .await
            .unwrap();

        let mut documents = fx
            .relational
            .find_all_documents(&FieldFilter::new())
            .await
            .unwrap();
        documents.sort_by_key(|d| d.id);
        let mut expected = snapshot.documents.clone();
        expected.sort_by_key(|d| d.id);
        assert_eq!(documents, expected);
        assert_eq!(fx.relational.find_all_links().await.unwrap(), snapshot.links);
        assert_eq!(fx.relational.find_all_tags().await.unwrap(), snapshot.tags);
        assert_eq!(fx.graph.get_calls().len(), 0);
    }

    #[tokio::test]
    async fn test_graph_only_leaves_relational_alone() {
        let fx = Fixture::new();
        fx.store("snap.json", &sample());

        fx.engine()
            .restore("snap.json", RestoreScope::GraphOnly)
            .await
            .unwrap();

        assert_eq!(fx.relational.call_count("restore"), 0);
        assert_eq!(fx.graph.edges().len(), 4);
    }

    #[tokio::test]
    async fn test_malformed_payload_fails_before_any_write() {
        let fx = Fixture::new();
        fx.blobs.insert("bad.json", b"{\"documents\": [".to_vec());

        let err = fx
            .engine()
            .restore("bad.json", RestoreScope::All)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Serialization(_)));
        assert_eq!(fx.relational.call_count("restore"), 0);
        assert!(fx.graph.get_calls().is_empty());
    }

    #[tokio::test]
    async fn test_missing_snapshot_is_not_found() {
        let fx = Fixture::new();
        let err = fx
            .engine()
            .restore("nope.json", RestoreScope::All)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_relational_failure_leaves_graph_untouched() {
        let fx = Fixture::new();
        fx.store("snap.json", &sample());
        fx.relational.set_failure("restore", true);

        assert!(fx
            .engine()
            .restore("snap.json", RestoreScope::All)
            .await
            .is_err());

        assert!(fx.graph.get_calls().is_empty());
        assert_eq!(fx.relational.tag_count(), 0);
    }

    #[tokio::test]
    async fn test_dangling_tag_reference_is_skipped() {
        let fx = Fixture::new();
        let mut snapshot = sample();
        let ghost = Uuid::now_v7();
        snapshot.documents[0].tags.push(ghost);
        fx.store("snap.json", &snapshot);

        fx.engine()
            .restore("snap.json", RestoreScope::All)
            .await
            .unwrap();

        assert_eq!(fx.relational.document_count(), 2);
        assert_eq!(fx.relational.associations().len(), 4);
        assert_eq!(fx.graph.edges().len(), 4);
        assert!(!fx.graph.has_edge(snapshot.documents[0].id, ghost));
    }

    #[tokio::test]
    async fn test_graph_replay_is_ordered_tags_resources_edges() {
        let fx = Fixture::new();
        fx.store("snap.json", &sample());

        fx.engine()
            .restore("snap.json", RestoreScope::GraphOnly)
            .await
            .unwrap();

        let ops: Vec<String> = fx.graph.get_calls().into_iter().map(|c| c.operation).collect();
        let last_tag = ops.iter().rposition(|o| o == "create_tag_node").unwrap();
        let first_node = ops.iter().position(|o| o == "create_resource_node").unwrap();
        let last_node = ops.iter().rposition(|o| o == "create_resource_node").unwrap();
        let first_edge = ops
            .iter()
            .position(|o| o == "create_association_edge")
            .unwrap();
        assert!(last_tag < first_node);
        assert!(last_node < first_edge);
    }

    #[tokio::test]
    async fn test_graph_rerun_after_partial_failure_converges() {
        let fx = Fixture::new();
        let snapshot = sample();
        fx.store("snap.json", &snapshot);
        fx.graph.set_failure("create_association_edge", true);

        let first = fx.engine().restore("snap.json", RestoreScope::GraphOnly).await;
        assert!(first.is_err());
        assert_eq!(fx.graph.node_count(), 5);
        assert!(fx.graph.edges().is_empty());

        fx.graph.set_failure("create_association_edge", false);
        fx.engine()
            .restore("snap.json", RestoreScope::GraphOnly)
            .await
            .unwrap();

        let expected = snapshot.associations();
        assert_eq!(fx.graph.edges().len(), expected.len());
        for assoc in &expected {
            assert!(fx.graph.has_edge(assoc.resource_id, assoc.tag_id));
        }
        assert_eq!(fx.graph.node_count(), 5);
        assert_eq!(fx.graph.call_count("create_resource_node"), 3);
    }

    #[tokio::test]
    async fn test_node_with_other_label_still_conflicts() {
        let fx = Fixture::new();
        let snapshot = sample();
        fx.store("snap.json", &snapshot);
        // Same id as the Dune book, mirrored under the wrong label.
        fx.graph
            .create_resource_node(&ResourceNode {
                id: snapshot.documents[0].id,
                resource_type: alexandria_core::ResourceType::Link,
                display_name: "Dune".to_string(),
                properties: serde_json::json!({}),
            })
            .await
            .unwrap();

        let err = fx
            .engine()
            .restore("snap.json", RestoreScope::GraphOnly)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_round_trip_through_backup() {
        let source = MockRelationalStore::new();
        let blobs = MockBlobStore::new();
        let doc = source
            .insert_document(alexandria_core::CreateDocumentRequest {
                name: "a.pdf".to_string(),
                display_name: "A".to_string(),
                path: "books/a.pdf".to_string(),
                kind: DocumentKind::Book,
                description: String::new(),
            })
            .await
            .unwrap();
        let tag = source.upsert_tag("classic").await.unwrap();
        source
            .add_resource_tag(&TaggedResource {
                tag_id: tag.id,
                resource_id: doc.id,
                resource_type: doc.resource_type(),
            })
            .await
            .unwrap();

        let location = crate::SnapshotBuilder::new(Arc::new(source.clone()), Arc::new(blobs.clone()))
            .backup()
            .await
            .unwrap();

        let target = MockRelationalStore::new();
        let graph = MockGraphStore::new();
        RestoreEngine::new(
            Arc::new(target.clone()),
            Arc::new(graph.clone()),
            Arc::new(blobs.clone()),
        )
        .restore(&location, RestoreScope::All)
        .await
        .unwrap();

        let restored = target.find_document(doc.id).await.unwrap().unwrap();
        assert_eq!(restored.tags, vec![tag.id]);
        assert!(graph.has_edge(doc.id, tag.id));
    }
}
