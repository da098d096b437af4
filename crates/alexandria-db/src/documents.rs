//! Document repository implementation.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::PgRow;
use tracing::debug;
use uuid::Uuid;

use alexandria_core::{
    CreateDocumentRequest, Document, DocumentKind, DocumentRepository, Error, FieldFilter, Result,
    UpdateDocumentRequest,
};

use crate::field_filter::{FieldFilterQueryBuilder, QueryParam};
use crate::relational::{get, map_write_error, tag_ids, PgRelationalStore, TAG_IDS_AGG};

fn select_documents(where_clause: &str) -> String {
    format!(
        "SELECT d.id, d.name, d.display_name, d.path, d.type, d.description, d.created, d.updated,
                {}
         FROM documents d
         LEFT JOIN tagged_resources tr ON tr.resource_id = d.id
         WHERE {}
         GROUP BY d.id
         ORDER BY d.display_name ASC, d.id",
        TAG_IDS_AGG, where_clause
    )
}

fn document_from_row(row: &PgRow) -> Result<Document> {
    let kind: String = get(row, "type")?;
    Ok(Document {
        id: get(row, "id")?,
        name: get(row, "name")?,
        display_name: get(row, "display_name")?,
        path: get(row, "path")?,
        kind: kind.parse::<DocumentKind>()?,
        description: get(row, "description")?,
        created: get(row, "created")?,
        updated: get(row, "updated")?,
        tags: tag_ids(row)?,
    })
}

#[async_trait]
impl DocumentRepository for PgRelationalStore {
    async fn find_all_documents(&self, filter: &FieldFilter) -> Result<Vec<Document>> {
        let (where_clause, params) = FieldFilterQueryBuilder::new(filter, 0).build()?;
        let sql = select_documents(&where_clause);

        let mut q = sqlx::query(&sql);
        for param in params {
            q = match param {
                QueryParam::Uuid(id) => q.bind(id),
                QueryParam::String(s) => q.bind(s),
            };
        }

        let rows = q.fetch_all(&self.pool).await.map_err(Error::Database)?;
        debug!(
            subsystem = "db",
            component = "documents",
            op = "find_all",
            filter_fields = filter.len(),
            result_count = rows.len(),
            "Listed documents"
        );
        rows.iter().map(document_from_row).collect()
    }

    async fn find_document(&self, id: Uuid) -> Result<Option<Document>> {
        let sql = select_documents("d.id = $1");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;
        row.as_ref().map(document_from_row).transpose()
    }

    async fn insert_document(&self, req: CreateDocumentRequest) -> Result<Document> {
        let id = Uuid::now_v7();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO documents (id, name, display_name, path, type, description, created, updated)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $7)",
        )
        .bind(id)
        .bind(&req.name)
        .bind(&req.display_name)
        .bind(&req.path)
        .bind(req.kind.as_str())
        .bind(&req.description)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;

        debug!(
            subsystem = "db",
            component = "documents",
            op = "insert",
            resource_id = %id,
            resource_type = req.kind.as_str(),
            "Inserted document"
        );

        Ok(Document {
            id,
            name: req.name,
            display_name: req.display_name,
            path: req.path,
            kind: req.kind,
            description: req.description,
            created: now,
            updated: now,
            tags: Vec::new(),
        })
    }

    async fn update_document(
        &self,
        id: Uuid,
        req: UpdateDocumentRequest,
    ) -> Result<Option<Document>> {
        let result = sqlx::query(
            "UPDATE documents SET
                display_name = COALESCE($2, display_name),
                description = COALESCE($3, description),
                type = COALESCE($4, type),
                updated = $5
             WHERE id = $1",
        )
        .bind(id)
        .bind(req.display_name.as_deref())
        .bind(req.description.as_deref())
        .bind(req.kind.map(|k| k.as_str()))
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.find_document(id).await
    }
}
