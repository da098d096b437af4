//! Bulk snapshot replay into the relational store.
//!
//! Every collection is inserted with a single `UNNEST` statement, in
//! dependency order, inside one transaction. Dropping the transaction on an
//! early `?` return rolls it back.

use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Postgres, Transaction};
use tracing::info;
use uuid::Uuid;

use alexandria_core::{Error, RestorePlan, RestoreRepository, Result, Snapshot, TaggedResource};

use crate::relational::{map_write_error, PgRelationalStore};

async fn insert_tags(tx: &mut Transaction<'_, Postgres>, snapshot: &Snapshot) -> Result<()> {
    if snapshot.tags.is_empty() {
        return Ok(());
    }
    let ids: Vec<Uuid> = snapshot.tags.iter().map(|t| t.id).collect();
    let names: Vec<&str> = snapshot.tags.iter().map(|t| t.display_name.as_str()).collect();
    let colors: Vec<&str> = snapshot.tags.iter().map(|t| t.color.as_str()).collect();

    sqlx::query(
        "INSERT INTO tags (id, display_name, color)
         SELECT * FROM UNNEST($1::uuid[], $2::text[], $3::text[])",
    )
    .bind(&ids)
    .bind(&names)
    .bind(&colors)
    .execute(&mut **tx)
    .await
    .map_err(map_write_error)?;
    Ok(())
}

async fn insert_entries(tx: &mut Transaction<'_, Postgres>, snapshot: &Snapshot) -> Result<()> {
    if snapshot.journal_entries.is_empty() {
        return Ok(());
    }
    let entries = &snapshot.journal_entries;
    let ids: Vec<Uuid> = entries.iter().map(|e| e.id).collect();
    let contents: Vec<&str> = entries.iter().map(|e| e.content.as_str()).collect();
    let created: Vec<DateTime<Utc>> = entries.iter().map(|e| e.created).collect();

    sqlx::query(
        "INSERT INTO journal_entry (id, content, created)
         SELECT * FROM UNNEST($1::uuid[], $2::text[], $3::timestamptz[])",
    )
    .bind(&ids)
    .bind(&contents)
    .bind(&created)
    .execute(&mut **tx)
    .await
    .map_err(map_write_error)?;
    Ok(())
}

async fn insert_documents(tx: &mut Transaction<'_, Postgres>, snapshot: &Snapshot) -> Result<()> {
    if snapshot.documents.is_empty() {
        return Ok(());
    }
    let docs = &snapshot.documents;
    let ids: Vec<Uuid> = docs.iter().map(|d| d.id).collect();
    let names: Vec<&str> = docs.iter().map(|d| d.name.as_str()).collect();
    let display_names: Vec<&str> = docs.iter().map(|d| d.display_name.as_str()).collect();
    let paths: Vec<&str> = docs.iter().map(|d| d.path.as_str()).collect();
    let kinds: Vec<&str> = docs.iter().map(|d| d.kind.as_str()).collect();
    let descriptions: Vec<&str> = docs.iter().map(|d| d.description.as_str()).collect();
    let created: Vec<DateTime<Utc>> = docs.iter().map(|d| d.created).collect();
    let updated: Vec<DateTime<Utc>> = docs.iter().map(|d| d.updated).collect();

    sqlx::query(
        "INSERT INTO documents (id, name, display_name, path, type, description, created, updated)
         SELECT * FROM UNNEST($1::uuid[], $2::text[], $3::text[], $4::text[], $5::text[],
                              $6::text[], $7::timestamptz[], $8::timestamptz[])",
    )
    .bind(&ids)
    .bind(&names)
    .bind(&display_names)
    .bind(&paths)
    .bind(&kinds)
    .bind(&descriptions)
    .bind(&created)
    .bind(&updated)
    .execute(&mut **tx)
    .await
    .map_err(map_write_error)?;
    Ok(())
}

async fn insert_links(tx: &mut Transaction<'_, Postgres>, snapshot: &Snapshot) -> Result<()> {
    if snapshot.links.is_empty() {
        return Ok(());
    }
    let links = &snapshot.links;
    let ids: Vec<Uuid> = links.iter().map(|l| l.id).collect();
    let urls: Vec<&str> = links.iter().map(|l| l.link.as_str()).collect();
    let display_names: Vec<&str> = links.iter().map(|l| l.display_name.as_str()).collect();
    let icons: Vec<&str> = links.iter().map(|l| l.icon_path.as_str()).collect();
    let created: Vec<DateTime<Utc>> = links.iter().map(|l| l.created).collect();

    sqlx::query(
        "INSERT INTO links (id, link, display_name, icon_path, created)
         SELECT * FROM UNNEST($1::uuid[], $2::text[], $3::text[], $4::text[], $5::timestamptz[])",
    )
    .bind(&ids)
    .bind(&urls)
    .bind(&display_names)
    .bind(&icons)
    .bind(&created)
    .execute(&mut **tx)
    .await
    .map_err(map_write_error)?;
    Ok(())
}

async fn insert_associations(
    tx: &mut Transaction<'_, Postgres>,
    associations: &[TaggedResource],
) -> Result<()> {
    if associations.is_empty() {
        return Ok(());
    }
    let tag_ids: Vec<Uuid> = associations.iter().map(|a| a.tag_id).collect();
    let resource_ids: Vec<Uuid> = associations.iter().map(|a| a.resource_id).collect();
    let types: Vec<&str> = associations
        .iter()
        .map(|a| a.resource_type.as_str())
        .collect();

    sqlx::query(
        "INSERT INTO tagged_resources (tag_id, resource_id, resource_type)
         SELECT * FROM UNNEST($1::uuid[], $2::uuid[], $3::text[])
         ON CONFLICT (tag_id, resource_id) DO NOTHING",
    )
    .bind(&tag_ids)
    .bind(&resource_ids)
    .bind(&types)
    .execute(&mut **tx)
    .await
    .map_err(map_write_error)?;
    Ok(())
}

#[async_trait]
impl RestoreRepository for PgRelationalStore {
    async fn restore(&self, plan: &RestorePlan<'_>) -> Result<()> {
        let start = Instant::now();
        let snapshot = plan.snapshot;

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        insert_tags(&mut tx, snapshot).await?;
        insert_entries(&mut tx, snapshot).await?;
        insert_documents(&mut tx, snapshot).await?;
        insert_links(&mut tx, snapshot).await?;
        insert_associations(&mut tx, &plan.associations).await?;

        tx.commit().await.map_err(Error::Database)?;

        info!(
            subsystem = "db",
            component = "restore",
            op = "relational_restore",
            tags = snapshot.tags.len(),
            journal_entries = snapshot.journal_entries.len(),
            documents = snapshot.documents.len(),
            links = snapshot.links.len(),
            associations = plan.associations.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Relational restore committed"
        );
        Ok(())
    }
}
