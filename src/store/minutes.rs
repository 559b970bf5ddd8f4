//! Minutes document persistence.
//!
//! Documents are never deleted automatically; `delete` exists for the
//! explicit, privileged, irreversible operation only.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::{parse_enum, parse_uuid, with_bounded_retry, RetryPolicy, StoreError};
use crate::minutes::{Commitment, MinutesDocument, MinutesKind, MinutesStatus};

#[derive(Clone)]
pub struct MinutesStore {
    pool: SqlitePool,
    retry: RetryPolicy,
}

impl MinutesStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            retry: RetryPolicy::default(),
        }
    }

    pub async fn insert(&self, document: &MinutesDocument) -> Result<(), StoreError> {
        let participants = serde_json::to_string(&document.participants)?;
        let agenda = serde_json::to_string(&document.agenda)?;
        let objectives = serde_json::to_string(&document.objectives)?;
        let decisions = serde_json::to_string(&document.decisions)?;
        let commitments = serde_json::to_string(&document.commitments)?;
        let references = serde_json::to_string(&document.references)?;

        with_bounded_retry("minutes.insert", &self.retry, || {
            sqlx::query(
                r#"
                INSERT INTO minutes_documents (
                    id, code, appointment_id, workshop_id, kind, status,
                    meeting_at, participants, agenda, objectives, decisions,
                    commitments, narrative, doc_references, created_at, finalized_at
                )
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(document.id.to_string())
            .bind(document.code.clone())
            .bind(document.appointment_id.to_string())
            .bind(document.workshop_id.to_string())
            .bind(document.kind.as_str())
            .bind(document.status.as_str())
            .bind(document.meeting_at)
            .bind(participants.clone())
            .bind(agenda.clone())
            .bind(objectives.clone())
            .bind(decisions.clone())
            .bind(commitments.clone())
            .bind(document.narrative.clone())
            .bind(references.clone())
            .bind(document.created_at)
            .bind(document.finalized_at)
            .execute(&self.pool)
        })
        .await?;

        Ok(())
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<MinutesDocument>, StoreError> {
        let row = with_bounded_retry("minutes.get", &self.retry, || {
            sqlx::query("SELECT * FROM minutes_documents WHERE id = ?")
                .bind(id.to_string())
                .fetch_optional(&self.pool)
        })
        .await?;

        row.map(|r| minutes_from_row(&r)).transpose()
    }

    pub async fn list(&self) -> Result<Vec<MinutesDocument>, StoreError> {
        let rows = with_bounded_retry("minutes.list", &self.retry, || {
            sqlx::query("SELECT * FROM minutes_documents ORDER BY code").fetch_all(&self.pool)
        })
        .await?;

        rows.iter().map(minutes_from_row).collect()
    }

    pub async fn list_for_appointment(
        &self,
        appointment_id: Uuid,
    ) -> Result<Vec<MinutesDocument>, StoreError> {
        let rows = with_bounded_retry("minutes.list_for_appointment", &self.retry, || {
            sqlx::query("SELECT * FROM minutes_documents WHERE appointment_id = ? ORDER BY code")
                .bind(appointment_id.to_string())
                .fetch_all(&self.pool)
        })
        .await?;

        rows.iter().map(minutes_from_row).collect()
    }

    /// Promote a draft to final. Conditional on the document still being a
    /// draft; finalized content is never rewritten.
    pub async fn finalize(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool, StoreError> {
        let result = with_bounded_retry("minutes.finalize", &self.retry, || {
            sqlx::query(
                r#"
                UPDATE minutes_documents
                SET status = 'final', finalized_at = ?
                WHERE id = ? AND status = 'draft'
                "#,
            )
            .bind(at)
            .bind(id.to_string())
            .execute(&self.pool)
        })
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Irreversible removal. Callers are expected to have confirmed intent;
    /// nothing in the lifecycle engine calls this.
    pub async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = with_bounded_retry("minutes.delete", &self.retry, || {
            sqlx::query("DELETE FROM minutes_documents WHERE id = ?")
                .bind(id.to_string())
                .execute(&self.pool)
        })
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

fn minutes_from_row(row: &SqliteRow) -> Result<MinutesDocument, StoreError> {
    let id: String = row.try_get("id")?;
    let appointment_id: String = row.try_get("appointment_id")?;
    let workshop_id: String = row.try_get("workshop_id")?;
    let kind: String = row.try_get("kind")?;
    let status: String = row.try_get("status")?;
    let participants: String = row.try_get("participants")?;
    let agenda: String = row.try_get("agenda")?;
    let objectives: String = row.try_get("objectives")?;
    let decisions: String = row.try_get("decisions")?;
    let commitments: String = row.try_get("commitments")?;
    let references: String = row.try_get("doc_references")?;

    Ok(MinutesDocument {
        id: parse_uuid(&id, "id")?,
        code: row.try_get("code")?,
        appointment_id: parse_uuid(&appointment_id, "appointment_id")?,
        workshop_id: parse_uuid(&workshop_id, "workshop_id")?,
        kind: parse_enum::<MinutesKind>(&kind, "kind")?,
        status: parse_enum::<MinutesStatus>(&status, "status")?,
        meeting_at: row.try_get("meeting_at")?,
        participants: serde_json::from_str::<Vec<String>>(&participants)?,
        agenda: serde_json::from_str::<Vec<String>>(&agenda)?,
        objectives: serde_json::from_str::<Vec<String>>(&objectives)?,
        decisions: serde_json::from_str::<Vec<String>>(&decisions)?,
        commitments: serde_json::from_str::<Vec<Commitment>>(&commitments)?,
        narrative: row.try_get("narrative")?,
        references: serde_json::from_str::<Vec<String>>(&references)?,
        created_at: row.try_get("created_at")?,
        finalized_at: row.try_get("finalized_at")?,
    })
}
