//! PostgreSQL graph projection.
//!
//! Resources and tags are mirrored as labelled rows in `graph_node`;
//! associations become `HAS_TAG` rows in `graph_edge`. The projection keeps
//! no foreign key into the relational tables and does its own endpoint
//! checks, so it can live in a different database.

use std::time::Instant;

use async_trait::async_trait;
use sqlx::{Pool, Postgres};
use tracing::{debug, info};
use uuid::Uuid;

use alexandria_core::{
    Error, GraphStore, NodeLabel, ResourceNode, ResourceType, Result, Tag, TaggedResourceSummary,
};

use crate::pool::{connect_with_retry, PoolConfig};
use crate::relational::{get, map_write_error};

/// Label carried by every association edge.
pub const HAS_TAG: &str = "HAS_TAG";

/// PostgreSQL implementation of [`GraphStore`].
#[derive(Clone)]
pub struct PgGraphStore {
    pool: Pool<Postgres>,
}

impl PgGraphStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Connect with the startup retry budget from `config`.
    pub async fn connect(url: &str, config: &PoolConfig) -> Result<Self> {
        let pool = connect_with_retry(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Run pending graph migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        let mut migrator = sqlx::migrate!("./migrations/graph");
        migrator.set_ignore_missing(true);
        migrator
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        info!(
            subsystem = "db",
            component = "graph",
            op = "migrate",
            "Graph migrations applied"
        );
        Ok(())
    }

    pub fn pool(&self) -> &Pool<Postgres> {
        &self.pool
    }

    /// Count every edge in the projection.
    pub async fn edge_count(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM graph_edge")
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?;
        get(&row, "count")
    }
}

#[async_trait]
impl GraphStore for PgGraphStore {
    async fn create_tag_node(&self, tag: &Tag) -> Result<()> {
        sqlx::query(
            "INSERT INTO graph_node (id, label, display_name, properties)
             VALUES ($1, $2, $3, jsonb_build_object('color', $4::text))
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(tag.id)
        .bind(NodeLabel::Tag.as_str())
        .bind(&tag.display_name)
        .bind(tag.color.as_str())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn create_resource_node(&self, node: &ResourceNode) -> Result<()> {
        sqlx::query(
            "INSERT INTO graph_node (id, label, display_name, properties)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(node.id)
        .bind(node.resource_type.node_label().as_str())
        .bind(&node.display_name)
        .bind(&node.properties)
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;
        Ok(())
    }

    async fn has_resource_node(&self, node_id: Uuid, resource_type: ResourceType) -> Result<bool> {
        let row = sqlx::query(
            "SELECT EXISTS (SELECT 1 FROM graph_node WHERE id = $1 AND label = $2) AS found",
        )
        .bind(node_id)
        .bind(resource_type.node_label().as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;
        get(&row, "found")
    }

    async fn create_association_edge(
        &self,
        resource_id: Uuid,
        resource_type: ResourceType,
        tag_id: Uuid,
    ) -> Result<()> {
        let label = resource_type.node_label();
        let row = sqlx::query(
            "SELECT
                EXISTS (SELECT 1 FROM graph_node WHERE id = $1 AND label = $2) AS resource_found,
                EXISTS (SELECT 1 FROM graph_node WHERE id = $3 AND label = $4) AS tag_found",
        )
        .bind(resource_id)
        .bind(label.as_str())
        .bind(tag_id)
        .bind(NodeLabel::Tag.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        if !get::<bool>(&row, "resource_found")? {
            return Err(Error::Referential(format!(
                "No {} node with id {}",
                label, resource_id
            )));
        }
        if !get::<bool>(&row, "tag_found")? {
            return Err(Error::Referential(format!("No Tag node with id {}", tag_id)));
        }

        let created = sqlx::query(
            "INSERT INTO graph_edge (resource_id, tag_id, label) VALUES ($1, $2, $3)
             ON CONFLICT (resource_id, tag_id) DO NOTHING",
        )
        .bind(resource_id)
        .bind(tag_id)
        .bind(HAS_TAG)
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?
        .rows_affected();

        debug!(
            subsystem = "db",
            component = "graph",
            op = "create_edge",
            resource_id = %resource_id,
            tag_id = %tag_id,
            merged = created == 0,
            "Association edge ensured"
        );
        Ok(())
    }

    async fn delete_association_edge(&self, resource_id: Uuid, tag_id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM graph_edge WHERE resource_id = $1 AND tag_id = $2")
            .bind(resource_id)
            .bind(tag_id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }

    async fn find_resources_by_tag(&self, tag_id: Uuid) -> Result<Vec<TaggedResourceSummary>> {
        let start = Instant::now();
        let rows = sqlx::query(
            "SELECT n.id, n.display_name, n.label
             FROM graph_edge e
             JOIN graph_node n ON n.id = e.resource_id
             WHERE e.tag_id = $1
             ORDER BY n.display_name ASC, n.id",
        )
        .bind(tag_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        let mut resources = Vec::with_capacity(rows.len());
        for row in &rows {
            let label: String = get(row, "label")?;
            let resource_type = label.parse::<NodeLabel>()?.resource_type().ok_or_else(|| {
                Error::Internal(format!("Tag {} has an edge to a Tag node", tag_id))
            })?;
            resources.push(TaggedResourceSummary {
                id: get(row, "id")?,
                display_name: get(row, "display_name")?,
                resource_type,
            });
        }

        debug!(
            subsystem = "db",
            component = "graph",
            op = "find_resources_by_tag",
            tag_id = %tag_id,
            result_count = resources.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Resolved tagged resources"
        );
        Ok(resources)
    }
}
