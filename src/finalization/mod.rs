//! Side-effect orchestration on completion.
//!
//! Both effects run after the state commit, concurrently and independently
//! wrapped: a failure in one never blocks the other, and nothing here can
//! revert the `completed` status. Failures surface as warnings.

use chrono::{DateTime, Utc};
use serde_json::json;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::lifecycle::types::Appointment;
use crate::minutes::MinutesDocument;
use crate::notify::{NotificationOutbox, TemplateId};
use crate::store::{AppointmentStore, MinutesStore, SequenceGenerator, StoreError};

/// Caller-controlled opt-outs for the finalization side effects.
#[derive(Debug, Clone)]
pub struct FinalizeOptions {
    pub generate_minutes: bool,
    pub notify_client: bool,
}

impl Default for FinalizeOptions {
    fn default() -> Self {
        Self {
            generate_minutes: true,
            notify_client: true,
        }
    }
}

/// Content captured when an appointment completes.
#[derive(Debug, Clone)]
pub struct FinalizePayload {
    pub notes: String,
    pub decisions: Vec<String>,
    pub next_steps: Option<String>,
    pub ended_at: DateTime<Utc>,
}

/// A side effect that failed without affecting the lifecycle.
#[derive(Debug, Clone)]
pub struct SideEffectWarning {
    pub effect: &'static str,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct FinalizationReport {
    pub minutes: Option<MinutesDocument>,
    pub warnings: Vec<SideEffectWarning>,
}

pub struct FinalizationOrchestrator {
    appointments: AppointmentStore,
    minutes: MinutesStore,
    sequences: SequenceGenerator,
    outbox: NotificationOutbox,
    code_family: String,
    effect_timeout: Duration,
}

impl FinalizationOrchestrator {
    pub fn new(
        appointments: AppointmentStore,
        minutes: MinutesStore,
        sequences: SequenceGenerator,
        outbox: NotificationOutbox,
        code_family: String,
        effect_timeout: Duration,
    ) -> Self {
        Self {
            appointments,
            minutes,
            sequences,
            outbox,
            code_family,
            effect_timeout,
        }
    }

    /// Run both effects for a freshly completed appointment.
    pub async fn run(
        &self,
        appointment: &Appointment,
        options: &FinalizeOptions,
    ) -> FinalizationReport {
        let (minutes_result, notify_result) = tokio::join!(
            self.generate_minutes(appointment, options),
            self.notify_client(appointment, options),
        );

        let mut report = FinalizationReport::default();
        match minutes_result {
            Ok(minutes) => report.minutes = minutes,
            Err(warning) => report.warnings.push(warning),
        }
        if let Err(warning) = notify_result {
            report.warnings.push(warning);
        }
        report
    }

    async fn generate_minutes(
        &self,
        appointment: &Appointment,
        options: &FinalizeOptions,
    ) -> Result<Option<MinutesDocument>, SideEffectWarning> {
        if !options.generate_minutes {
            return Ok(None);
        }

        let generate = async {
            let code = self.sequences.next_code(&self.code_family).await?;
            let document = MinutesDocument::session_draft(code, appointment, Utc::now());
            self.minutes.insert(&document).await?;
            self.appointments
                .set_minutes_reference(appointment.id, document.id)
                .await?;
            Ok::<_, StoreError>(document)
        };

        match timeout(self.effect_timeout, generate).await {
            Ok(Ok(document)) => {
                info!(
                    appointment.id = %appointment.id,
                    minutes.code = %document.code,
                    "minutes draft generated"
                );
                Ok(Some(document))
            }
            Ok(Err(error)) => Err(self.warn("minutes-generation", error.to_string(), appointment)),
            Err(_) => Err(self.warn("minutes-generation", "timed out".to_string(), appointment)),
        }
    }

    async fn notify_client(
        &self,
        appointment: &Appointment,
        options: &FinalizeOptions,
    ) -> Result<(), SideEffectWarning> {
        if !options.notify_client {
            return Ok(());
        }

        let enqueue = async {
            let params = json!({
                "appointment_id": appointment.id,
                "kind": appointment.kind,
                "completed_at": appointment.completed_at,
            });
            self.outbox
                .enqueue(appointment.workshop_id, TemplateId::SessionCompleted, params)
                .await?;
            self.outbox
                .enqueue(
                    appointment.workshop_id,
                    TemplateId::SatisfactionSurvey,
                    json!({ "appointment_id": appointment.id }),
                )
                .await?;
            Ok::<_, StoreError>(())
        };

        match timeout(self.effect_timeout, enqueue).await {
            Ok(Ok(())) => {
                info!(
                    appointment.id = %appointment.id,
                    workshop.id = %appointment.workshop_id,
                    "client notification and survey queued"
                );
                Ok(())
            }
            Ok(Err(error)) => Err(self.warn("client-notification", error.to_string(), appointment)),
            Err(_) => Err(self.warn("client-notification", "timed out".to_string(), appointment)),
        }
    }

    fn warn(
        &self,
        effect: &'static str,
        message: String,
        appointment: &Appointment,
    ) -> SideEffectWarning {
        warn!(
            appointment.id = %appointment.id,
            effect,
            message = %message,
            "finalization side effect failed; lifecycle state is unaffected"
        );
        SideEffectWarning { effect, message }
    }
}
