//! The single transition authority for appointment status.
//!
//! Interactive callers and the overdue detector both go through this
//! engine; every transition commits as one conditional update keyed on
//! `(id, expected_status)`, and a losing writer gets `Conflict` instead of
//! overwriting concurrent state.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::time::Duration;
use tracing::{error, info};
use uuid::Uuid;

use super::transitions;
use super::types::{Appointment, AppointmentStatus, LifecycleError, NewAppointment};
use crate::finalization::{
    FinalizationOrchestrator, FinalizeOptions, FinalizePayload, SideEffectWarning,
};
use crate::minutes::MinutesDocument;
use crate::notify::{NotificationOutbox, TemplateId};
use crate::overdue::CutoffPolicy;
use crate::reschedule::{self, Liability, RescheduleRequest};
use crate::store::{
    AppointmentStore, AttributionUpdate, CompletionUpdate, MinutesStore, SequenceGenerator,
    StoreError,
};

/// Capability token for system-only transitions.
///
/// `mark_overdue` is the one transition no human may invoke directly; only
/// in-crate callers (the overdue detector) can obtain this token.
pub struct SystemAuthority {
    _private: (),
}

impl SystemAuthority {
    pub(crate) fn issue() -> Self {
        SystemAuthority { _private: () }
    }
}

#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Sequence family (and textual prefix) for minutes codes.
    pub minutes_family: String,
    pub cutoff: CutoffPolicy,
    pub side_effect_timeout: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            minutes_family: "MIN".to_string(),
            cutoff: CutoffPolicy::default(),
            side_effect_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug)]
pub struct FinalizeOutcome {
    pub appointment: Appointment,
    pub minutes: Option<MinutesDocument>,
    pub warnings: Vec<SideEffectWarning>,
}

#[derive(Debug)]
pub struct RescheduleOutcome {
    pub appointment: Appointment,
    pub minutes: Option<MinutesDocument>,
    pub warnings: Vec<SideEffectWarning>,
}

pub struct LifecycleEngine {
    appointments: AppointmentStore,
    minutes: MinutesStore,
    sequences: SequenceGenerator,
    outbox: NotificationOutbox,
    finalization: FinalizationOrchestrator,
    settings: EngineSettings,
}

impl LifecycleEngine {
    pub fn new(pool: SqlitePool, settings: EngineSettings) -> Self {
        let appointments = AppointmentStore::new(pool.clone());
        let minutes = MinutesStore::new(pool.clone());
        let sequences = SequenceGenerator::new(pool.clone());
        let outbox = NotificationOutbox::new(pool);
        let finalization = FinalizationOrchestrator::new(
            appointments.clone(),
            minutes.clone(),
            sequences.clone(),
            outbox.clone(),
            settings.minutes_family.clone(),
            settings.side_effect_timeout,
        );

        Self {
            appointments,
            minutes,
            sequences,
            outbox,
            finalization,
            settings,
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Put a new appointment on the calendar in `scheduled` status.
    pub async fn schedule(&self, new: NewAppointment) -> Result<Appointment, LifecycleError> {
        let appointment = self
            .appointments
            .create(new)
            .await
            .map_err(|e| unavailable("schedule", e))?;
        info!(
            appointment.id = %appointment.id,
            workshop.id = %appointment.workshop_id,
            kind = %appointment.kind,
            scheduled_at = %appointment.scheduled_at,
            "appointment scheduled"
        );
        Ok(appointment)
    }

    /// `scheduled -> confirmed`.
    pub async fn confirm(&self, id: Uuid) -> Result<Appointment, LifecycleError> {
        let appointment = self.require(id).await?;
        if !transitions::can_confirm(appointment.status) {
            return Err(LifecycleError::InvalidTransition {
                from: appointment.status,
                operation: "confirm",
            });
        }

        let swapped = self
            .appointments
            .update_status(id, appointment.status, AppointmentStatus::Confirmed)
            .await
            .map_err(|e| unavailable("confirm", e))?;
        if !swapped {
            return Err(LifecycleError::Conflict { id });
        }

        info!(appointment.id = %id, from = %appointment.status, "appointment confirmed");
        let mut updated = appointment;
        updated.status = AppointmentStatus::Confirmed;
        Ok(updated)
    }

    /// `{scheduled, confirmed, rescheduled, overdue} -> in-progress`,
    /// recording the actual start.
    pub async fn start(&self, id: Uuid, at: DateTime<Utc>) -> Result<Appointment, LifecycleError> {
        let appointment = self.require(id).await?;
        if !transitions::can_start(appointment.status) {
            return Err(LifecycleError::InvalidTransition {
                from: appointment.status,
                operation: "start",
            });
        }

        let swapped = self
            .appointments
            .begin_session(id, appointment.status, at)
            .await
            .map_err(|e| unavailable("start", e))?;
        if !swapped {
            return Err(LifecycleError::Conflict { id });
        }

        info!(appointment.id = %id, from = %appointment.status, at = %at, "session started");
        let mut updated = appointment;
        updated.status = AppointmentStatus::InProgress;
        updated.actual_start = Some(at);
        Ok(updated)
    }

    /// Any non-terminal status -> `completed`, then post-commit side
    /// effects (minutes draft, client notification) per the caller's
    /// options. Side-effect failures come back as warnings and never
    /// revert the completion.
    pub async fn finalize(
        &self,
        id: Uuid,
        payload: FinalizePayload,
        options: FinalizeOptions,
    ) -> Result<FinalizeOutcome, LifecycleError> {
        if payload.notes.trim().is_empty() {
            return Err(LifecycleError::Validation {
                reason: "consultant notes must not be empty".to_string(),
            });
        }

        let appointment = self.require(id).await?;
        if !transitions::can_finalize(appointment.status) {
            return Err(LifecycleError::InvalidTransition {
                from: appointment.status,
                operation: "finalize",
            });
        }

        let actual_minutes = appointment
            .actual_start
            .map(|started| (payload.ended_at - started).num_minutes());
        let update = CompletionUpdate {
            completed_at: payload.ended_at,
            actual_end: payload.ended_at,
            actual_minutes,
            notes: payload.notes.clone(),
            decisions: payload.decisions.clone(),
            next_steps: payload.next_steps.clone(),
        };

        let swapped = self
            .appointments
            .complete(id, appointment.status, &update)
            .await
            .map_err(|e| unavailable("finalize", e))?;
        if !swapped {
            return Err(LifecycleError::Conflict { id });
        }

        info!(
            appointment.id = %id,
            from = %appointment.status,
            actual_minutes = ?actual_minutes,
            "appointment completed"
        );

        let mut updated = appointment;
        updated.status = AppointmentStatus::Completed;
        updated.completed_at = Some(payload.ended_at);
        updated.actual_end = Some(payload.ended_at);
        updated.actual_minutes = actual_minutes;
        updated.notes = Some(payload.notes);
        updated.decisions = payload.decisions;
        updated.next_steps = payload.next_steps;

        let report = self.finalization.run(&updated, &options).await;
        if let Some(document) = &report.minutes {
            updated.minutes_document_id = Some(document.id);
        }

        Ok(FinalizeOutcome {
            appointment: updated,
            minutes: report.minutes,
            warnings: report.warnings,
        })
    }

    /// Reschedule/cancellation with liability attribution.
    ///
    /// Lands on `rescheduled`, `overdue` (client liability, no future
    /// occurrence), or `canceled` (company/shared liability, no future
    /// occurrence). Always emits an audit minutes document; queues the
    /// contractual-fulfillment notice when liability is the client's.
    pub async fn reschedule(
        &self,
        id: Uuid,
        request: RescheduleRequest,
    ) -> Result<RescheduleOutcome, LifecycleError> {
        request.validate()?;

        let appointment = self.require(id).await?;
        if !transitions::can_reschedule(appointment.status) {
            return Err(LifecycleError::InvalidTransition {
                from: appointment.status,
                operation: "reschedule",
            });
        }

        let target = request.target_status();
        // target == current happens for an already-overdue appointment with
        // client liability and no new date: attribution is recorded, status
        // stays put.
        if target != appointment.status && !transitions::allowed(appointment.status, target) {
            return Err(LifecycleError::InvalidTransition {
                from: appointment.status,
                operation: "reschedule",
            });
        }

        let update = AttributionUpdate {
            status: target,
            scheduled_at: request.new_when,
            outcome: request.outcome,
            liability: request.liability,
            reason: request.reason,
            note: request.note.clone(),
        };
        let swapped = self
            .appointments
            .apply_attribution(id, appointment.status, &update)
            .await
            .map_err(|e| unavailable("reschedule", e))?;
        if !swapped {
            return Err(LifecycleError::Conflict { id });
        }

        info!(
            appointment.id = %id,
            from = %appointment.status,
            to = %target,
            outcome = %request.outcome,
            liability = %request.liability,
            "appointment rescheduled"
        );

        let mut warnings = Vec::new();
        let minutes = match self.emit_reschedule_minutes(&appointment, &request).await {
            Ok(document) => Some(document),
            Err(error) => {
                warnings.push(side_effect_warning("reschedule-minutes", &error, id));
                None
            }
        };

        if request.liability == Liability::Client {
            let params = serde_json::json!({
                "appointment_id": id,
                "outcome": request.outcome,
                "counted_as_fulfilled": true,
                "new_when": request.new_when,
            });
            if let Err(error) = self
                .outbox
                .enqueue(
                    appointment.workshop_id,
                    TemplateId::SessionFulfilledNotice,
                    params,
                )
                .await
            {
                warnings.push(side_effect_warning("fulfillment-notice", &error, id));
            }
        }

        let mut updated = appointment;
        updated.status = target;
        if let Some(new_when) = request.new_when {
            updated.scheduled_at = new_when;
        }
        updated.outcome_code = Some(request.outcome);
        updated.liability = Some(request.liability);
        updated.reason_code = Some(request.reason);
        updated.reschedule_reason = request.note;

        Ok(RescheduleOutcome {
            appointment: updated,
            minutes,
            warnings,
        })
    }

    /// Cancellation entry point: same attribution validation, but the
    /// outcome must not book a future occurrence.
    pub async fn cancel(
        &self,
        id: Uuid,
        request: RescheduleRequest,
    ) -> Result<RescheduleOutcome, LifecycleError> {
        if request.outcome.books_future_occurrence() {
            return Err(LifecycleError::Validation {
                reason: format!(
                    "outcome {} books a new occurrence; use reschedule",
                    request.outcome
                ),
            });
        }
        self.reschedule(id, request).await
    }

    /// System-only, time-driven `-> overdue` transition.
    ///
    /// A no-op (current record, no error) when the appointment is already
    /// `overdue`, `completed`, or `canceled`, so detector replicas can race
    /// freely.
    pub async fn mark_overdue(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
        _authority: &SystemAuthority,
    ) -> Result<Appointment, LifecycleError> {
        let appointment = self.require(id).await?;
        match appointment.status {
            AppointmentStatus::Overdue
            | AppointmentStatus::Completed
            | AppointmentStatus::Canceled => return Ok(appointment),
            AppointmentStatus::InProgress => {
                return Err(LifecycleError::InvalidTransition {
                    from: appointment.status,
                    operation: "mark-overdue",
                });
            }
            AppointmentStatus::Scheduled
            | AppointmentStatus::Confirmed
            | AppointmentStatus::Rescheduled => {}
        }

        let cutoff = self.settings.cutoff.cutoff_for(appointment.scheduled_at);
        if now <= cutoff {
            return Err(LifecycleError::Validation {
                reason: format!("cutoff {cutoff} has not been reached"),
            });
        }

        let swapped = self
            .appointments
            .update_status(id, appointment.status, AppointmentStatus::Overdue)
            .await
            .map_err(|e| unavailable("mark-overdue", e))?;
        if !swapped {
            return Err(LifecycleError::Conflict { id });
        }

        info!(
            appointment.id = %id,
            from = %appointment.status,
            cutoff = %cutoff,
            "appointment marked overdue"
        );
        let mut updated = appointment;
        updated.status = AppointmentStatus::Overdue;
        Ok(updated)
    }

    async fn require(&self, id: Uuid) -> Result<Appointment, LifecycleError> {
        self.appointments
            .get(id)
            .await
            .map_err(|e| unavailable("fetch", e))?
            .ok_or(LifecycleError::NotFound { id })
    }

    async fn emit_reschedule_minutes(
        &self,
        appointment_before: &Appointment,
        request: &RescheduleRequest,
    ) -> Result<MinutesDocument, StoreError> {
        let code = self.sequences.next_code(&self.settings.minutes_family).await?;
        let narrative = reschedule::audit_narrative(appointment_before, request);
        let document =
            MinutesDocument::reschedule_record(code, appointment_before, narrative, Utc::now());
        self.minutes.insert(&document).await?;
        info!(
            appointment.id = %appointment_before.id,
            minutes.code = %document.code,
            "reschedule audit minutes recorded"
        );
        Ok(document)
    }
}

fn unavailable(operation: &'static str, error: StoreError) -> LifecycleError {
    error!(operation, error = %error, "storage dependency failed");
    LifecycleError::Unavailable {
        operation: operation.to_string(),
    }
}

fn side_effect_warning(effect: &'static str, error: &StoreError, id: Uuid) -> SideEffectWarning {
    tracing::warn!(
        appointment.id = %id,
        effect,
        error = %error,
        "post-commit side effect failed; transition stands"
    );
    SideEffectWarning {
        effect,
        message: error.to_string(),
    }
}
