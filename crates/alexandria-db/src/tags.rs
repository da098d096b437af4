//! Tag and tag-association repository implementation.
//!
//! Tags are keyed by their slug (`display_name`). Upserting an existing slug
//! returns the stored tag unchanged, color included.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use tracing::debug;
use uuid::Uuid;

use alexandria_core::{Error, Result, Tag, TagColor, TagRepository, TaggedResource};

use crate::relational::{get, map_write_error, PgRelationalStore};

pub(crate) fn tag_from_row(row: &PgRow) -> Result<Tag> {
    let color: String = get(row, "color")?;
    Ok(Tag {
        id: get(row, "id")?,
        display_name: get(row, "display_name")?,
        color: color.parse::<TagColor>()?,
    })
}

#[async_trait]
impl TagRepository for PgRelationalStore {
    async fn find_all_tags(&self) -> Result<Vec<Tag>> {
        let rows = sqlx::query("SELECT id, display_name, color FROM tags ORDER BY display_name ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;
        rows.iter().map(tag_from_row).collect()
    }

    async fn find_tag_by_name(&self, slug: &str) -> Result<Option<Tag>> {
        let row = sqlx::query("SELECT id, display_name, color FROM tags WHERE display_name = $1")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;
        row.as_ref().map(tag_from_row).transpose()
    }

    async fn upsert_tag(&self, slug: &str) -> Result<Tag> {
        let inserted = sqlx::query(
            "INSERT INTO tags (id, display_name, color) VALUES ($1, $2, $3)
             ON CONFLICT (display_name) DO NOTHING",
        )
        .bind(Uuid::now_v7())
        .bind(slug)
        .bind(TagColor::random().as_str())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?
        .rows_affected();

        let tag = self
            .find_tag_by_name(slug)
            .await?
            .ok_or_else(|| Error::Internal(format!("Tag '{}' missing after upsert", slug)))?;

        debug!(
            subsystem = "db",
            component = "tags",
            op = "upsert",
            tag_id = %tag.id,
            tag_name = %slug,
            created = inserted > 0,
            "Upserted tag"
        );
        Ok(tag)
    }

    async fn add_resource_tag(&self, assoc: &TaggedResource) -> Result<()> {
        sqlx::query(
            "INSERT INTO tagged_resources (tag_id, resource_id, resource_type)
             VALUES ($1, $2, $3)
             ON CONFLICT (tag_id, resource_id) DO NOTHING",
        )
        .bind(assoc.tag_id)
        .bind(assoc.resource_id)
        .bind(assoc.resource_type.as_str())
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;
        Ok(())
    }

    async fn remove_resource_tag(&self, tag_id: Uuid, resource_id: Uuid) -> Result<()> {
        let removed = sqlx::query(
            "DELETE FROM tagged_resources WHERE tag_id = $1 AND resource_id = $2",
        )
        .bind(tag_id)
        .bind(resource_id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?
        .rows_affected();

        debug!(
            subsystem = "db",
            component = "tags",
            op = "remove_association",
            tag_id = %tag_id,
            resource_id = %resource_id,
            removed,
            "Removed tag association"
        );
        Ok(())
    }
}
