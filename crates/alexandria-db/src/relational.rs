//! PostgreSQL relational store.
//!
//! [`PgRelationalStore`] owns the authoritative pool. The repository traits
//! it implements are split across `documents`, `links`, `journal`, `tags`
//! and `restore`.

use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};
use tracing::info;
use uuid::Uuid;

use alexandria_core::{Error, Result};

use crate::pool::{connect_with_retry, PoolConfig};

/// Foreign key violation.
const PG_FOREIGN_KEY_VIOLATION: &str = "23503";
/// Unique violation.
const PG_UNIQUE_VIOLATION: &str = "23505";

/// PostgreSQL implementation of every relational repository trait.
#[derive(Clone)]
pub struct PgRelationalStore {
    pub(crate) pool: Pool<Postgres>,
}

impl PgRelationalStore {
    /// Wrap an existing pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Connect with the startup retry budget from `config`.
    pub async fn connect(url: &str, config: &PoolConfig) -> Result<Self> {
        let pool = connect_with_retry(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Run pending relational migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        let mut migrator = sqlx::migrate!("./migrations/relational");
        // The graph migrator may share this database and its history table.
        migrator.set_ignore_missing(true);
        migrator
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        info!(
            subsystem = "db",
            component = "relational",
            op = "migrate",
            "Relational migrations applied"
        );
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &Pool<Postgres> {
        &self.pool
    }
}

/// Map a write error, turning constraint violations into domain errors.
pub(crate) fn map_write_error(e: sqlx::Error) -> Error {
    let code = e
        .as_database_error()
        .and_then(|db| db.code())
        .map(|c| c.into_owned());
    match code.as_deref() {
        Some(PG_FOREIGN_KEY_VIOLATION) => Error::Referential(e.to_string()),
        Some(PG_UNIQUE_VIOLATION) => Error::InvalidInput(format!("Duplicate key: {}", e)),
        _ => Error::Database(e),
    }
}

pub(crate) fn get<'r, T>(row: &'r PgRow, column: &str) -> Result<T>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(column).map_err(Error::Database)
}

/// The aggregated tag id list of a resource row.
pub(crate) fn tag_ids(row: &PgRow) -> Result<Vec<Uuid>> {
    get::<Vec<Uuid>>(row, "tags")
}

/// SQL expression collapsing joined `tagged_resources tr` rows into one
/// ordered id array, empty when the resource has no tags.
pub(crate) const TAG_IDS_AGG: &str = "COALESCE(array_agg(tr.tag_id ORDER BY tr.created, tr.tag_id) \
     FILTER (WHERE tr.tag_id IS NOT NULL), '{}'::uuid[]) AS tags";
