//! Read-only client directory: workshop contact fields by id, with a
//! bounded cache in front of the lookup.

use async_trait::async_trait;
use chrono::Utc;
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientContact {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("directory lookup failed: {0}")]
    Lookup(String),
}

impl From<sqlx::Error> for DirectoryError {
    fn from(error: sqlx::Error) -> Self {
        DirectoryError::Lookup(error.to_string())
    }
}

/// Read-only lookup of workshop contact fields by id.
#[async_trait]
pub trait ClientDirectory: Send + Sync {
    async fn lookup(&self, workshop_id: Uuid) -> Result<Option<ClientContact>, DirectoryError>;
}

/// SQLite-backed directory with a moka cache (contact fields change
/// rarely; lookups happen on every notification).
pub struct CachedSqliteDirectory {
    pool: SqlitePool,
    cache: Cache<Uuid, ClientContact>,
}

impl CachedSqliteDirectory {
    pub fn new(pool: SqlitePool) -> Self {
        let cache = Cache::builder()
            .max_capacity(1024)
            .time_to_live(Duration::from_secs(300))
            .build();

        Self { pool, cache }
    }

    /// Seed or update a workshop record. Invalidates the cached entry so
    /// the next lookup sees the new contact fields.
    pub async fn upsert(&self, contact: &ClientContact) -> Result<(), DirectoryError> {
        sqlx::query(
            r#"
            INSERT INTO workshops (id, name, contact_email, contact_phone, created_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (id) DO UPDATE SET
                name = excluded.name,
                contact_email = excluded.contact_email,
                contact_phone = excluded.contact_phone
            "#,
        )
        .bind(contact.id.to_string())
        .bind(contact.name.clone())
        .bind(contact.email.clone())
        .bind(contact.phone.clone())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        self.cache.invalidate(&contact.id).await;
        Ok(())
    }
}

#[async_trait]
impl ClientDirectory for CachedSqliteDirectory {
    async fn lookup(&self, workshop_id: Uuid) -> Result<Option<ClientContact>, DirectoryError> {
        if let Some(cached) = self.cache.get(&workshop_id).await {
            debug!(workshop.id = %workshop_id, "directory cache hit");
            return Ok(Some(cached));
        }

        let row = sqlx::query("SELECT id, name, contact_email, contact_phone FROM workshops WHERE id = ?")
            .bind(workshop_id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let id: String = row.try_get("id")?;
        let contact = ClientContact {
            id: Uuid::parse_str(&id).map_err(|e| DirectoryError::Lookup(e.to_string()))?,
            name: row.try_get("name")?,
            email: row.try_get("contact_email")?,
            phone: row.try_get("contact_phone")?,
        };

        self.cache.insert(workshop_id, contact.clone()).await;
        Ok(Some(contact))
    }
}
