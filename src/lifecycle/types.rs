use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Raised when a textual value from storage or the CLI does not name a
/// known enum variant.
#[derive(Debug, Clone, Error)]
#[error("unknown value: {0}")]
pub struct UnknownValue(pub String);

/// Lifecycle status of an appointment.
///
/// `Completed` and `Canceled` are terminal. `Overdue` and `Rescheduled`
/// may still receive further transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AppointmentStatus {
    Scheduled,
    Confirmed,
    InProgress,
    Completed,
    Overdue,
    Rescheduled,
    Canceled,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::InProgress => "in-progress",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Overdue => "overdue",
            AppointmentStatus::Rescheduled => "rescheduled",
            AppointmentStatus::Canceled => "canceled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Completed | AppointmentStatus::Canceled
        )
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppointmentStatus {
    type Err = UnknownValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(AppointmentStatus::Scheduled),
            "confirmed" => Ok(AppointmentStatus::Confirmed),
            "in-progress" => Ok(AppointmentStatus::InProgress),
            "completed" => Ok(AppointmentStatus::Completed),
            "overdue" => Ok(AppointmentStatus::Overdue),
            "rescheduled" => Ok(AppointmentStatus::Rescheduled),
            "canceled" => Ok(AppointmentStatus::Canceled),
            other => Err(UnknownValue(other.to_string())),
        }
    }
}

/// Kind of consulting session being delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AppointmentKind {
    InitialDiagnostic,
    MonthlyFollowup,
    StrategicSession,
    Training,
    Audit,
    GoalReview,
    IndividualImmersion,
    InPersonImmersion,
    GroupWorkshop,
    InPersonAccelerator,
    OnlineImmersion,
    Mentoring,
    Other,
}

impl AppointmentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentKind::InitialDiagnostic => "initial-diagnostic",
            AppointmentKind::MonthlyFollowup => "monthly-followup",
            AppointmentKind::StrategicSession => "strategic-session",
            AppointmentKind::Training => "training",
            AppointmentKind::Audit => "audit",
            AppointmentKind::GoalReview => "goal-review",
            AppointmentKind::IndividualImmersion => "individual-immersion",
            AppointmentKind::InPersonImmersion => "in-person-immersion",
            AppointmentKind::GroupWorkshop => "group-workshop",
            AppointmentKind::InPersonAccelerator => "in-person-accelerator",
            AppointmentKind::OnlineImmersion => "online-immersion",
            AppointmentKind::Mentoring => "mentoring",
            AppointmentKind::Other => "other",
        }
    }
}

impl fmt::Display for AppointmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppointmentKind {
    type Err = UnknownValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "initial-diagnostic" => Ok(AppointmentKind::InitialDiagnostic),
            "monthly-followup" => Ok(AppointmentKind::MonthlyFollowup),
            "strategic-session" => Ok(AppointmentKind::StrategicSession),
            "training" => Ok(AppointmentKind::Training),
            "audit" => Ok(AppointmentKind::Audit),
            "goal-review" => Ok(AppointmentKind::GoalReview),
            "individual-immersion" => Ok(AppointmentKind::IndividualImmersion),
            "in-person-immersion" => Ok(AppointmentKind::InPersonImmersion),
            "group-workshop" => Ok(AppointmentKind::GroupWorkshop),
            "in-person-accelerator" => Ok(AppointmentKind::InPersonAccelerator),
            "online-immersion" => Ok(AppointmentKind::OnlineImmersion),
            "mentoring" => Ok(AppointmentKind::Mentoring),
            "other" => Ok(AppointmentKind::Other),
            other => Err(UnknownValue(other.to_string())),
        }
    }
}

/// A follow-up item generated during a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionItem {
    pub description: String,
    pub owner: Option<String>,
    pub due: Option<DateTime<Utc>>,
}

/// The central entity: one scheduled consulting session between a
/// consultant and a client workshop.
///
/// A reschedule overwrites `scheduled_at` in place; the appointment keeps
/// its id, and history is recoverable only through the generated minutes
/// documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub workshop_id: Uuid,
    pub consultant_id: Uuid,
    pub kind: AppointmentKind,
    pub status: AppointmentStatus,
    pub scheduled_at: DateTime<Utc>,
    pub actual_start: Option<DateTime<Utc>>,
    pub actual_end: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub planned_minutes: i64,
    pub actual_minutes: Option<i64>,
    pub reschedule_reason: Option<String>,
    pub outcome_code: Option<crate::reschedule::OutcomeCode>,
    pub liability: Option<crate::reschedule::Liability>,
    pub reason_code: Option<crate::reschedule::ReasonCode>,
    pub agenda: Vec<String>,
    pub topics: Vec<String>,
    pub decisions: Vec<String>,
    pub action_items: Vec<ActionItem>,
    pub notes: Option<String>,
    pub next_steps: Option<String>,
    pub minutes_document_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields required to put a new appointment on the calendar.
#[derive(Debug, Clone)]
pub struct NewAppointment {
    pub workshop_id: Uuid,
    pub consultant_id: Uuid,
    pub kind: AppointmentKind,
    pub scheduled_at: DateTime<Utc>,
    pub planned_minutes: i64,
    pub agenda: Vec<String>,
}

/// Error taxonomy for lifecycle operations.
///
/// `InvalidTransition` and `Validation` reject without mutating.
/// `Conflict` means a conditional update lost a race; the caller should
/// refetch and decide whether to retry. `Unavailable` means a dependency
/// stayed unreachable after the bounded retry.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("{operation} is not allowed from status {from}")]
    InvalidTransition {
        from: AppointmentStatus,
        operation: &'static str,
    },

    #[error("validation failed: {reason}")]
    Validation { reason: String },

    #[error("appointment {id} was modified concurrently")]
    Conflict { id: Uuid },

    #[error("appointment {id} not found")]
    NotFound { id: Uuid },

    #[error("{operation} unavailable after retry")]
    Unavailable { operation: String },
}
