//! Appointment records with optimistic, conditional status writes.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::{parse_enum, parse_uuid, with_bounded_retry, RetryPolicy, StoreError};
use crate::lifecycle::types::{
    ActionItem, Appointment, AppointmentKind, AppointmentStatus, NewAppointment,
};
use crate::reschedule::{Liability, OutcomeCode, ReasonCode};

/// Fields written when an appointment completes.
#[derive(Debug, Clone)]
pub struct CompletionUpdate {
    pub completed_at: DateTime<Utc>,
    pub actual_end: DateTime<Utc>,
    pub actual_minutes: Option<i64>,
    pub notes: String,
    pub decisions: Vec<String>,
    pub next_steps: Option<String>,
}

/// Fields written by the reschedule/cancellation workflow.
#[derive(Debug, Clone)]
pub struct AttributionUpdate {
    pub status: AppointmentStatus,
    /// New occurrence instant; `None` leaves the schedule untouched.
    pub scheduled_at: Option<DateTime<Utc>>,
    pub outcome: OutcomeCode,
    pub liability: Liability,
    pub reason: ReasonCode,
    pub note: Option<String>,
}

#[derive(Clone)]
pub struct AppointmentStore {
    pool: SqlitePool,
    retry: RetryPolicy,
}

impl AppointmentStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(pool: SqlitePool, retry: RetryPolicy) -> Self {
        Self { pool, retry }
    }

    pub async fn create(&self, new: NewAppointment) -> Result<Appointment, StoreError> {
        let now = Utc::now();
        let appointment = Appointment {
            id: Uuid::new_v4(),
            workshop_id: new.workshop_id,
            consultant_id: new.consultant_id,
            kind: new.kind,
            status: AppointmentStatus::Scheduled,
            scheduled_at: new.scheduled_at,
            actual_start: None,
            actual_end: None,
            completed_at: None,
            planned_minutes: new.planned_minutes,
            actual_minutes: None,
            reschedule_reason: None,
            outcome_code: None,
            liability: None,
            reason_code: None,
            agenda: new.agenda,
            topics: Vec::new(),
            decisions: Vec::new(),
            action_items: Vec::new(),
            notes: None,
            next_steps: None,
            minutes_document_id: None,
            created_at: now,
            updated_at: now,
        };

        let agenda_json = serde_json::to_string(&appointment.agenda)?;
        with_bounded_retry("appointments.create", &self.retry, || {
            sqlx::query(
                r#"
                INSERT INTO appointments (
                    id, workshop_id, consultant_id, kind, status,
                    scheduled_at, planned_minutes, agenda, created_at, updated_at
                )
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(appointment.id.to_string())
            .bind(appointment.workshop_id.to_string())
            .bind(appointment.consultant_id.to_string())
            .bind(appointment.kind.as_str())
            .bind(appointment.status.as_str())
            .bind(appointment.scheduled_at)
            .bind(appointment.planned_minutes)
            .bind(agenda_json.clone())
            .bind(appointment.created_at)
            .bind(appointment.updated_at)
            .execute(&self.pool)
        })
        .await?;

        Ok(appointment)
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<Appointment>, StoreError> {
        let row = with_bounded_retry("appointments.get", &self.retry, || {
            sqlx::query("SELECT * FROM appointments WHERE id = ?")
                .bind(id.to_string())
                .fetch_optional(&self.pool)
        })
        .await?;

        row.map(|r| appointment_from_row(&r)).transpose()
    }

    pub async fn list(
        &self,
        status: Option<AppointmentStatus>,
    ) -> Result<Vec<Appointment>, StoreError> {
        let rows = match status {
            Some(status) => {
                with_bounded_retry("appointments.list", &self.retry, || {
                    sqlx::query(
                        "SELECT * FROM appointments WHERE status = ? ORDER BY scheduled_at",
                    )
                    .bind(status.as_str())
                    .fetch_all(&self.pool)
                })
                .await?
            }
            None => {
                with_bounded_retry("appointments.list", &self.retry, || {
                    sqlx::query("SELECT * FROM appointments ORDER BY scheduled_at")
                        .fetch_all(&self.pool)
                })
                .await?
            }
        };

        rows.iter().map(appointment_from_row).collect()
    }

    /// Non-terminal appointments the overdue detector may act on.
    pub async fn list_overdue_candidates(&self) -> Result<Vec<Appointment>, StoreError> {
        let rows = with_bounded_retry("appointments.list_overdue_candidates", &self.retry, || {
            sqlx::query(
                r#"
                SELECT * FROM appointments
                WHERE status IN ('scheduled', 'confirmed', 'rescheduled')
                ORDER BY scheduled_at
                "#,
            )
            .fetch_all(&self.pool)
        })
        .await?;

        rows.iter().map(appointment_from_row).collect()
    }

    /// Conditional status swap. Returns `false` when the expected status no
    /// longer matches, without touching the row.
    pub async fn update_status(
        &self,
        id: Uuid,
        expected: AppointmentStatus,
        new_status: AppointmentStatus,
    ) -> Result<bool, StoreError> {
        let result = with_bounded_retry("appointments.update_status", &self.retry, || {
            sqlx::query(
                "UPDATE appointments SET status = ?, updated_at = ? WHERE id = ? AND status = ?",
            )
            .bind(new_status.as_str())
            .bind(Utc::now())
            .bind(id.to_string())
            .bind(expected.as_str())
            .execute(&self.pool)
        })
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// `{scheduled, confirmed, rescheduled, overdue} -> in-progress`,
    /// recording the actual start instant.
    pub async fn begin_session(
        &self,
        id: Uuid,
        expected: AppointmentStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let result = with_bounded_retry("appointments.begin_session", &self.retry, || {
            sqlx::query(
                r#"
                UPDATE appointments
                SET status = 'in-progress', actual_start = ?, updated_at = ?
                WHERE id = ? AND status = ?
                "#,
            )
            .bind(at)
            .bind(Utc::now())
            .bind(id.to_string())
            .bind(expected.as_str())
            .execute(&self.pool)
        })
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Terminal completion write: status, instants, and captured content in
    /// one conditional statement.
    pub async fn complete(
        &self,
        id: Uuid,
        expected: AppointmentStatus,
        update: &CompletionUpdate,
    ) -> Result<bool, StoreError> {
        let decisions_json = serde_json::to_string(&update.decisions)?;
        let result = with_bounded_retry("appointments.complete", &self.retry, || {
            sqlx::query(
                r#"
                UPDATE appointments
                SET status = 'completed',
                    completed_at = ?,
                    actual_end = ?,
                    actual_minutes = ?,
                    notes = ?,
                    decisions = ?,
                    next_steps = ?,
                    updated_at = ?
                WHERE id = ? AND status = ?
                "#,
            )
            .bind(update.completed_at)
            .bind(update.actual_end)
            .bind(update.actual_minutes)
            .bind(update.notes.clone())
            .bind(decisions_json.clone())
            .bind(update.next_steps.clone())
            .bind(Utc::now())
            .bind(id.to_string())
            .bind(expected.as_str())
            .execute(&self.pool)
        })
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Reschedule/cancellation write: target status, attribution metadata,
    /// and (for a new occurrence) the overwritten scheduled instant.
    pub async fn apply_attribution(
        &self,
        id: Uuid,
        expected: AppointmentStatus,
        update: &AttributionUpdate,
    ) -> Result<bool, StoreError> {
        let result = with_bounded_retry("appointments.apply_attribution", &self.retry, || {
            sqlx::query(
                r#"
                UPDATE appointments
                SET status = ?,
                    scheduled_at = COALESCE(?, scheduled_at),
                    outcome_code = ?,
                    liability = ?,
                    reason_code = ?,
                    reschedule_reason = ?,
                    updated_at = ?
                WHERE id = ? AND status = ?
                "#,
            )
            .bind(update.status.as_str())
            .bind(update.scheduled_at)
            .bind(update.outcome.as_str())
            .bind(update.liability.as_str())
            .bind(update.reason.as_str())
            .bind(update.note.clone())
            .bind(Utc::now())
            .bind(id.to_string())
            .bind(expected.as_str())
            .execute(&self.pool)
        })
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Back-reference from the appointment to its session minutes document.
    pub async fn set_minutes_reference(
        &self,
        id: Uuid,
        minutes_id: Uuid,
    ) -> Result<(), StoreError> {
        with_bounded_retry("appointments.set_minutes_reference", &self.retry, || {
            sqlx::query("UPDATE appointments SET minutes_document_id = ?, updated_at = ? WHERE id = ?")
                .bind(minutes_id.to_string())
                .bind(Utc::now())
                .bind(id.to_string())
                .execute(&self.pool)
        })
        .await?;

        Ok(())
    }
}

fn appointment_from_row(row: &SqliteRow) -> Result<Appointment, StoreError> {
    let id: String = row.try_get("id")?;
    let workshop_id: String = row.try_get("workshop_id")?;
    let consultant_id: String = row.try_get("consultant_id")?;
    let kind: String = row.try_get("kind")?;
    let status: String = row.try_get("status")?;
    let outcome_code: Option<String> = row.try_get("outcome_code")?;
    let liability: Option<String> = row.try_get("liability")?;
    let reason_code: Option<String> = row.try_get("reason_code")?;
    let agenda: String = row.try_get("agenda")?;
    let topics: String = row.try_get("topics")?;
    let decisions: String = row.try_get("decisions")?;
    let action_items: String = row.try_get("action_items")?;
    let minutes_document_id: Option<String> = row.try_get("minutes_document_id")?;

    Ok(Appointment {
        id: parse_uuid(&id, "id")?,
        workshop_id: parse_uuid(&workshop_id, "workshop_id")?,
        consultant_id: parse_uuid(&consultant_id, "consultant_id")?,
        kind: parse_enum::<AppointmentKind>(&kind, "kind")?,
        status: parse_enum::<AppointmentStatus>(&status, "status")?,
        scheduled_at: row.try_get("scheduled_at")?,
        actual_start: row.try_get("actual_start")?,
        actual_end: row.try_get("actual_end")?,
        completed_at: row.try_get("completed_at")?,
        planned_minutes: row.try_get("planned_minutes")?,
        actual_minutes: row.try_get("actual_minutes")?,
        reschedule_reason: row.try_get("reschedule_reason")?,
        outcome_code: outcome_code
            .as_deref()
            .map(|s| parse_enum::<OutcomeCode>(s, "outcome_code"))
            .transpose()?,
        liability: liability
            .as_deref()
            .map(|s| parse_enum::<Liability>(s, "liability"))
            .transpose()?,
        reason_code: reason_code
            .as_deref()
            .map(|s| parse_enum::<ReasonCode>(s, "reason_code"))
            .transpose()?,
        agenda: serde_json::from_str::<Vec<String>>(&agenda)?,
        topics: serde_json::from_str::<Vec<String>>(&topics)?,
        decisions: serde_json::from_str::<Vec<String>>(&decisions)?,
        action_items: serde_json::from_str::<Vec<ActionItem>>(&action_items)?,
        notes: row.try_get("notes")?,
        next_steps: row.try_get("next_steps")?,
        minutes_document_id: minutes_document_id
            .as_deref()
            .map(|s| parse_uuid(s, "minutes_document_id"))
            .transpose()?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
