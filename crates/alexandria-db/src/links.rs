//! Link repository implementation.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::PgRow;
use uuid::Uuid;

use alexandria_core::{CreateLinkRequest, Error, Link, LinkRepository, Result};

use crate::relational::{get, map_write_error, tag_ids, PgRelationalStore, TAG_IDS_AGG};

fn select_links(where_clause: &str) -> String {
    format!(
        "SELECT l.id, l.link, l.display_name, l.icon_path, l.created, {}
         FROM links l
         LEFT JOIN tagged_resources tr ON tr.resource_id = l.id
         WHERE {}
         GROUP BY l.id
         ORDER BY l.created DESC, l.id",
        TAG_IDS_AGG, where_clause
    )
}

fn link_from_row(row: &PgRow) -> Result<Link> {
    Ok(Link {
        id: get(row, "id")?,
        link: get(row, "link")?,
        display_name: get(row, "display_name")?,
        icon_path: get(row, "icon_path")?,
        created: get(row, "created")?,
        tags: tag_ids(row)?,
    })
}

#[async_trait]
impl LinkRepository for PgRelationalStore {
    async fn find_all_links(&self) -> Result<Vec<Link>> {
        let rows = sqlx::query(&select_links("TRUE"))
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;
        rows.iter().map(link_from_row).collect()
    }

    async fn find_link(&self, id: Uuid) -> Result<Option<Link>> {
        let row = sqlx::query(&select_links("l.id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;
        row.as_ref().map(link_from_row).transpose()
    }

    async fn insert_link(&self, req: CreateLinkRequest) -> Result<Link> {
        let id = Uuid::now_v7();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO links (id, link, display_name, icon_path, created)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(id)
        .bind(&req.link)
        .bind(&req.display_name)
        .bind(&req.icon_path)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;

        Ok(Link {
            id,
            link: req.link,
            display_name: req.display_name,
            icon_path: req.icon_path,
            created: now,
            tags: Vec::new(),
        })
    }
}
