//! Durable notification queue rows.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::TemplateId;
use crate::lifecycle::types::UnknownValue;
use crate::store::{with_bounded_retry, RetryPolicy, StoreError};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutboxStatus {
    Pending,
    Sent,
    Failed,
}

impl OutboxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutboxStatus::Pending => "pending",
            OutboxStatus::Sent => "sent",
            OutboxStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for OutboxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutboxStatus {
    type Err = UnknownValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OutboxStatus::Pending),
            "sent" => Ok(OutboxStatus::Sent),
            "failed" => Ok(OutboxStatus::Failed),
            other => Err(UnknownValue(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutboxMessage {
    pub id: Uuid,
    pub workshop_id: Uuid,
    pub template: TemplateId,
    pub params: serde_json::Value,
    pub status: OutboxStatus,
    pub attempts: i64,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct NotificationOutbox {
    pool: SqlitePool,
    retry: RetryPolicy,
}

impl NotificationOutbox {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            retry: RetryPolicy::default(),
        }
    }

    /// Queue a message inside the triggering flow. Delivery happens later,
    /// in the dispatcher.
    pub async fn enqueue(
        &self,
        workshop_id: Uuid,
        template: TemplateId,
        params: serde_json::Value,
    ) -> Result<OutboxMessage, StoreError> {
        let message = OutboxMessage {
            id: Uuid::new_v4(),
            workshop_id,
            template,
            params,
            status: OutboxStatus::Pending,
            attempts: 0,
            last_error: None,
            created_at: Utc::now(),
            sent_at: None,
        };
        let params_json = serde_json::to_string(&message.params)?;

        with_bounded_retry("outbox.enqueue", &self.retry, || {
            sqlx::query(
                r#"
                INSERT INTO notification_outbox (id, workshop_id, template, params, status, attempts, created_at)
                VALUES (?, ?, ?, ?, 'pending', 0, ?)
                "#,
            )
            .bind(message.id.to_string())
            .bind(message.workshop_id.to_string())
            .bind(message.template.as_str())
            .bind(params_json.clone())
            .bind(message.created_at)
            .execute(&self.pool)
        })
        .await?;

        Ok(message)
    }

    pub async fn pending(&self, limit: i64) -> Result<Vec<OutboxMessage>, StoreError> {
        let rows = with_bounded_retry("outbox.pending", &self.retry, || {
            sqlx::query(
                "SELECT * FROM notification_outbox WHERE status = 'pending' ORDER BY created_at LIMIT ?",
            )
            .bind(limit)
            .fetch_all(&self.pool)
        })
        .await?;

        rows.iter().map(message_from_row).collect()
    }

    pub async fn all(&self) -> Result<Vec<OutboxMessage>, StoreError> {
        let rows = with_bounded_retry("outbox.all", &self.retry, || {
            sqlx::query("SELECT * FROM notification_outbox ORDER BY created_at")
                .fetch_all(&self.pool)
        })
        .await?;

        rows.iter().map(message_from_row).collect()
    }

    pub async fn mark_sent(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError> {
        with_bounded_retry("outbox.mark_sent", &self.retry, || {
            sqlx::query(
                "UPDATE notification_outbox SET status = 'sent', sent_at = ?, attempts = attempts + 1 WHERE id = ?",
            )
            .bind(at)
            .bind(id.to_string())
            .execute(&self.pool)
        })
        .await?;

        Ok(())
    }

    /// Record a failed attempt, keeping the message pending for a later
    /// drain pass.
    pub async fn record_attempt(&self, id: Uuid, error: &str) -> Result<(), StoreError> {
        with_bounded_retry("outbox.record_attempt", &self.retry, || {
            sqlx::query(
                "UPDATE notification_outbox SET attempts = attempts + 1, last_error = ? WHERE id = ?",
            )
            .bind(error.to_string())
            .bind(id.to_string())
            .execute(&self.pool)
        })
        .await?;

        Ok(())
    }

    /// Give up on a message for good.
    pub async fn mark_failed(&self, id: Uuid, error: &str) -> Result<(), StoreError> {
        with_bounded_retry("outbox.mark_failed", &self.retry, || {
            sqlx::query(
                "UPDATE notification_outbox SET status = 'failed', attempts = attempts + 1, last_error = ? WHERE id = ?",
            )
            .bind(error.to_string())
            .bind(id.to_string())
            .execute(&self.pool)
        })
        .await?;

        Ok(())
    }
}

fn message_from_row(row: &SqliteRow) -> Result<OutboxMessage, StoreError> {
    let id: String = row.try_get("id")?;
    let workshop_id: String = row.try_get("workshop_id")?;
    let template: String = row.try_get("template")?;
    let status: String = row.try_get("status")?;
    let params: String = row.try_get("params")?;

    Ok(OutboxMessage {
        id: crate::store::parse_uuid(&id, "id")?,
        workshop_id: crate::store::parse_uuid(&workshop_id, "workshop_id")?,
        template: crate::store::parse_enum::<TemplateId>(&template, "template")?,
        params: serde_json::from_str(&params)?,
        status: crate::store::parse_enum::<OutboxStatus>(&status, "status")?,
        attempts: row.try_get("attempts")?,
        last_error: row.try_get("last_error")?,
        created_at: row.try_get("created_at")?,
        sent_at: row.try_get("sent_at")?,
    })
}
