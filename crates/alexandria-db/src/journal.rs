//! Journal entry repository implementation.

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use alexandria_core::{Error, JournalEntry, JournalRepository, Result};

use crate::relational::{get, PgRelationalStore};

#[async_trait]
impl JournalRepository for PgRelationalStore {
    async fn find_all_entries(&self) -> Result<Vec<JournalEntry>> {
        let rows = sqlx::query(
            "SELECT id, content, created FROM journal_entry ORDER BY created DESC, id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.iter()
            .map(|row| {
                Ok(JournalEntry {
                    id: get(row, "id")?,
                    content: get(row, "content")?,
                    created: get(row, "created")?,
                })
            })
            .collect()
    }

    async fn insert_entry(&self, content: &str) -> Result<JournalEntry> {
        let entry = JournalEntry {
            id: Uuid::now_v7(),
            content: content.to_string(),
            created: Utc::now(),
        };

        sqlx::query("INSERT INTO journal_entry (id, content, created) VALUES ($1, $2, $3)")
            .bind(entry.id)
            .bind(&entry.content)
            .bind(entry.created)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(entry)
    }
}
