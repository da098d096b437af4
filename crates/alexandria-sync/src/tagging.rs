//! Dual-store tagging.
//!
//! The relational store is written first and is authoritative. The graph is
//! mirrored afterwards on a best-effort basis: a graph failure is logged at
//! WARN and never undoes or fails the relational write.

use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use alexandria_core::{
    canonical_tag_name, CreateDocumentRequest, CreateLinkRequest, Document, GraphStore, Link,
    RelationalStore, ResourceNode, ResourceType, Result, Tag, TaggedResource,
    TaggedResourceSummary,
};

/// Keeps tag associations consistent across the relational and graph stores.
#[derive(Clone)]
pub struct TaggingCoordinator {
    relational: Arc<dyn RelationalStore>,
    graph: Arc<dyn GraphStore>,
}

impl TaggingCoordinator {
    pub fn new(relational: Arc<dyn RelationalStore>, graph: Arc<dyn GraphStore>) -> Self {
        Self { relational, graph }
    }

    /// Create (or reuse) the tag named `display_name` and mirror its node.
    ///
    /// The name is slugged first, so "Machine Learning" and
    /// "machine-learning" resolve to the same tag.
    pub async fn create_tag(&self, display_name: &str) -> Result<Tag> {
        let slug = canonical_tag_name(display_name)?;
        let tag = self.relational.upsert_tag(&slug).await?;

        if let Err(e) = self.graph.create_tag_node(&tag).await {
            warn!(
                subsystem = "sync",
                component = "tagging",
                op = "create_tag",
                tag_id = %tag.id,
                tag_name = %slug,
                error = %e,
                "Graph mirror failed, tag node missing from graph"
            );
        }
        Ok(tag)
    }

    /// Tag a resource, creating the tag when the slug is new.
    pub async fn add_resource_tag(
        &self,
        resource_id: Uuid,
        resource_type: ResourceType,
        tag_name: &str,
    ) -> Result<()> {
        let slug = canonical_tag_name(tag_name)?;
        let tag = self.relational.upsert_tag(&slug).await?;
        self.relational
            .add_resource_tag(&TaggedResource {
                tag_id: tag.id,
                resource_id,
                resource_type,
            })
            .await?;

        if let Err(e) = self.mirror_association(&tag, resource_id, resource_type).await {
            warn!(
                subsystem = "sync",
                component = "tagging",
                op = "add_resource_tag",
                tag_id = %tag.id,
                tag_name = %slug,
                resource_id = %resource_id,
                resource_type = resource_type.as_str(),
                error = %e,
                "Graph mirror failed, association committed relationally only"
            );
            return Ok(());
        }

        debug!(
            subsystem = "sync",
            component = "tagging",
            op = "add_resource_tag",
            tag_id = %tag.id,
            resource_id = %resource_id,
            "Resource tagged"
        );
        Ok(())
    }

    async fn mirror_association(
        &self,
        tag: &Tag,
        resource_id: Uuid,
        resource_type: ResourceType,
    ) -> Result<()> {
        self.graph.create_tag_node(tag).await?;
        self.graph
            .create_association_edge(resource_id, resource_type, tag.id)
            .await
    }

    /// Untag a resource. Unknown tags and absent associations are no-ops.
    pub async fn remove_resource_tag(&self, resource_id: Uuid, tag_name: &str) -> Result<()> {
        let slug = canonical_tag_name(tag_name)?;
        let Some(tag) = self.relational.find_tag_by_name(&slug).await? else {
            debug!(
                subsystem = "sync",
                component = "tagging",
                op = "remove_resource_tag",
                tag_name = %slug,
                "Unknown tag, nothing to remove"
            );
            return Ok(());
        };

        self.relational
            .remove_resource_tag(tag.id, resource_id)
            .await?;

        if let Err(e) = self.graph.delete_association_edge(resource_id, tag.id).await {
            warn!(
                subsystem = "sync",
                component = "tagging",
                op = "remove_resource_tag",
                tag_id = %tag.id,
                resource_id = %resource_id,
                error = %e,
                "Graph edge removal failed, stale edge left in graph"
            );
        }
        Ok(())
    }

    /// Resources carrying the tag, resolved through the graph.
    pub async fn tagged_resources(&self, tag_name: &str) -> Result<Vec<TaggedResourceSummary>> {
        let slug = canonical_tag_name(tag_name)?;
        match self.relational.find_tag_by_name(&slug).await? {
            Some(tag) => self.graph.find_resources_by_tag(tag.id).await,
            None => Ok(Vec::new()),
        }
    }

    /// Insert a document and mirror its node.
    pub async fn register_document(&self, req: CreateDocumentRequest) -> Result<Document> {
        let doc = self.relational.insert_document(req).await?;
        self.mirror_node(ResourceNode::from(&doc)).await;
        Ok(doc)
    }

    /// Insert a link and mirror its node.
    pub async fn register_link(&self, req: CreateLinkRequest) -> Result<Link> {
        let link = self.relational.insert_link(req).await?;
        self.mirror_node(ResourceNode::from(&link)).await;
        Ok(link)
    }

    async fn mirror_node(&self, node: ResourceNode) {
        match self.graph.create_resource_node(&node).await {
            Ok(()) => info!(
                subsystem = "sync",
                component = "tagging",
                op = "register",
                resource_id = %node.id,
                resource_type = node.resource_type.as_str(),
                "Resource registered"
            ),
            Err(e) => warn!(
                subsystem = "sync",
                component = "tagging",
                op = "register",
                resource_id = %node.id,
                resource_type = node.resource_type.as_str(),
                error = %e,
                "Graph mirror failed, resource node missing from graph"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockGraphStore, MockRelationalStore};
    use alexandria_core::{DocumentKind, DocumentRepository, Error, TagRepository};

    fn coordinator(
        relational: &MockRelationalStore,
        graph: &MockGraphStore,
    ) -> TaggingCoordinator {
        TaggingCoordinator::new(Arc::new(relational.clone()), Arc::new(graph.clone()))
    }

    fn book(name: &str) -> CreateDocumentRequest {
        CreateDocumentRequest {
            name: format!("{}.pdf", name),
            display_name: name.to_string(),
            path: format!("books/{}.pdf", name),
            kind: DocumentKind::Book,
            description: String::new(),
        }
    }

    #[tokio::test]
    async fn test_create_tag_slugs_and_reuses_id() {
        let relational = MockRelationalStore::new();
        let graph = MockGraphStore::new();
        let coordinator = coordinator(&relational, &graph);

        let first = coordinator.create_tag("Machine Learning").await.unwrap();
        let second = coordinator.create_tag("machine-learning").await.unwrap();

        assert_eq!(first.display_name, "machine-learning");
        assert_eq!(first.id, second.id);
        assert_eq!(relational.tag_count(), 1);
        assert_eq!(graph.node_count(), 1);
    }

    #[tokio::test]
    async fn test_add_twice_equals_add_once() {
        let relational = MockRelationalStore::new();
        let graph = MockGraphStore::new();
        let coordinator = coordinator(&relational, &graph);
        let doc = coordinator.register_document(book("dune")).await.unwrap();

        for _ in 0..2 {
            coordinator
                .add_resource_tag(doc.id, ResourceType::Book, "fiction")
                .await
                .unwrap();
        }

        assert_eq!(relational.associations_for(doc.id).len(), 1);
        assert_eq!(graph.edges().len(), 1);
    }

    #[tokio::test]
    async fn test_add_then_remove_leaves_no_associations() {
        let relational = MockRelationalStore::new();
        let graph = MockGraphStore::new();
        let coordinator = coordinator(&relational, &graph);
        let doc = coordinator.register_document(book("dune")).await.unwrap();

        coordinator
            .add_resource_tag(doc.id, ResourceType::Book, "fiction")
            .await
            .unwrap();
        coordinator
            .remove_resource_tag(doc.id, "fiction")
            .await
            .unwrap();

        assert!(relational.associations_for(doc.id).is_empty());
        assert!(graph.edges().iter().all(|(r, _)| *r != doc.id));
        // The tag itself survives.
        assert_eq!(relational.tag_count(), 1);
    }

    #[tokio::test]
    async fn test_graph_failure_is_swallowed_and_relational_kept() {
        let relational = MockRelationalStore::new();
        let graph = MockGraphStore::new().with_failure("create_association_edge");
        let coordinator = coordinator(&relational, &graph);
        let doc = coordinator.register_document(book("dune")).await.unwrap();

        coordinator
            .add_resource_tag(doc.id, ResourceType::Book, "fiction")
            .await
            .unwrap();

        assert_eq!(relational.associations_for(doc.id).len(), 1);
        assert!(graph.edges().is_empty());
    }

    #[tokio::test]
    async fn test_missing_graph_node_does_not_fail_add() {
        let relational = MockRelationalStore::new();
        let graph = MockGraphStore::new();
        let coordinator = coordinator(&relational, &graph);
        // Inserted without the coordinator, so no graph node exists.
        let doc = relational.insert_document(book("dune")).await.unwrap();

        coordinator
            .add_resource_tag(doc.id, ResourceType::Book, "fiction")
            .await
            .unwrap();

        assert_eq!(relational.associations_for(doc.id).len(), 1);
        assert!(graph.edges().is_empty());
    }

    #[tokio::test]
    async fn test_relational_failure_aborts_before_graph() {
        let relational = MockRelationalStore::new().with_failure("add_resource_tag");
        let graph = MockGraphStore::new();
        let coordinator = coordinator(&relational, &graph);

        let err = coordinator
            .add_resource_tag(Uuid::new_v4(), ResourceType::Link, "rust")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Internal(_)));
        assert_eq!(graph.call_count("create_tag_node"), 0);
        assert_eq!(graph.call_count("create_association_edge"), 0);
    }

    #[tokio::test]
    async fn test_remove_unknown_tag_is_noop() {
        let relational = MockRelationalStore::new();
        let graph = MockGraphStore::new();
        let coordinator = coordinator(&relational, &graph);

        coordinator
            .remove_resource_tag(Uuid::new_v4(), "never-created")
            .await
            .unwrap();

        assert_eq!(relational.call_count("remove_resource_tag"), 0);
        assert_eq!(graph.call_count("delete_association_edge"), 0);
    }

    #[tokio::test]
    async fn test_remove_absent_association_is_silent() {
        let relational = MockRelationalStore::new();
        let graph = MockGraphStore::new();
        let coordinator = coordinator(&relational, &graph);
        coordinator.create_tag("fiction").await.unwrap();

        coordinator
            .remove_resource_tag(Uuid::new_v4(), "fiction")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_invalid_tag_name_rejected() {
        let relational = MockRelationalStore::new();
        let graph = MockGraphStore::new();
        let coordinator = coordinator(&relational, &graph);

        let err = coordinator
            .add_resource_tag(Uuid::new_v4(), ResourceType::Book, "  ***  ")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert_eq!(relational.call_count("upsert_tag"), 0);
    }

    #[tokio::test]
    async fn test_tagged_resources_via_graph() {
        let relational = MockRelationalStore::new();
        let graph = MockGraphStore::new();
        let coordinator = coordinator(&relational, &graph);
        let doc = coordinator.register_document(book("dune")).await.unwrap();
        coordinator
            .add_resource_tag(doc.id, ResourceType::Book, "Sci Fi")
            .await
            .unwrap();

        let found = coordinator.tagged_resources("sci-fi").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, doc.id);
        assert_eq!(found[0].resource_type, ResourceType::Book);

        assert!(coordinator.tagged_resources("unknown").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_existing_tag_keeps_color() {
        let relational = MockRelationalStore::new();
        let graph = MockGraphStore::new();
        let coordinator = coordinator(&relational, &graph);

        let created = coordinator.create_tag("history").await.unwrap();
        let again = relational.upsert_tag("history").await.unwrap();
        assert_eq!(created.color, again.color);
    }
}
