//! Minutes documents: the immutable-after-finalization audit record of a
//! session occurrence or of a reschedule/cancellation event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::lifecycle::types::{Appointment, UnknownValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MinutesKind {
    /// Record of a delivered session, generated at finalization.
    Session,
    /// Audit record of a reschedule/cancellation event.
    Reschedule,
}

impl MinutesKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MinutesKind::Session => "session",
            MinutesKind::Reschedule => "reschedule",
        }
    }
}

impl fmt::Display for MinutesKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MinutesKind {
    type Err = UnknownValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "session" => Ok(MinutesKind::Session),
            "reschedule" => Ok(MinutesKind::Reschedule),
            other => Err(UnknownValue(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MinutesStatus {
    Draft,
    Final,
}

impl MinutesStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MinutesStatus::Draft => "draft",
            MinutesStatus::Final => "final",
        }
    }
}

impl fmt::Display for MinutesStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MinutesStatus {
    type Err = UnknownValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(MinutesStatus::Draft),
            "final" => Ok(MinutesStatus::Final),
            other => Err(UnknownValue(other.to_string())),
        }
    }
}

/// A follow-up commitment captured in the minutes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Commitment {
    pub description: String,
    pub owner: Option<String>,
    pub due: Option<DateTime<Utc>>,
}

/// The structured audit document. Once `Final`, content is the system of
/// record for the occurrence and is never modified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinutesDocument {
    pub id: Uuid,
    /// Sequential human-readable code, `<PREFIX>.<4-digit ordinal>`.
    pub code: String,
    pub appointment_id: Uuid,
    pub workshop_id: Uuid,
    pub kind: MinutesKind,
    pub status: MinutesStatus,
    pub meeting_at: DateTime<Utc>,
    pub participants: Vec<String>,
    pub agenda: Vec<String>,
    pub objectives: Vec<String>,
    pub decisions: Vec<String>,
    pub commitments: Vec<Commitment>,
    pub narrative: Option<String>,
    pub references: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub finalized_at: Option<DateTime<Utc>>,
}

impl MinutesDocument {
    /// Draft summarizing a completed session, built from the appointment's
    /// captured content.
    pub fn session_draft(code: String, appointment: &Appointment, now: DateTime<Utc>) -> Self {
        let narrative = match (&appointment.notes, &appointment.next_steps) {
            (Some(notes), Some(next)) => Some(format!("{notes}\n\nNext steps: {next}")),
            (Some(notes), None) => Some(notes.clone()),
            (None, Some(next)) => Some(format!("Next steps: {next}")),
            (None, None) => None,
        };

        MinutesDocument {
            id: Uuid::new_v4(),
            code,
            appointment_id: appointment.id,
            workshop_id: appointment.workshop_id,
            kind: MinutesKind::Session,
            status: MinutesStatus::Draft,
            meeting_at: appointment.actual_start.unwrap_or(appointment.scheduled_at),
            participants: vec![
                format!("consultant:{}", appointment.consultant_id),
                format!("workshop:{}", appointment.workshop_id),
            ],
            agenda: appointment.agenda.clone(),
            objectives: appointment.topics.clone(),
            decisions: appointment.decisions.clone(),
            commitments: appointment
                .action_items
                .iter()
                .map(|item| Commitment {
                    description: item.description.clone(),
                    owner: item.owner.clone(),
                    due: item.due,
                })
                .collect(),
            narrative,
            references: Vec::new(),
            created_at: now,
            finalized_at: None,
        }
    }

    /// Audit record of a reschedule/cancellation event. Finalized
    /// immediately: there is no human editing pass for these.
    pub fn reschedule_record(
        code: String,
        appointment: &Appointment,
        narrative: String,
        now: DateTime<Utc>,
    ) -> Self {
        MinutesDocument {
            id: Uuid::new_v4(),
            code,
            appointment_id: appointment.id,
            workshop_id: appointment.workshop_id,
            kind: MinutesKind::Reschedule,
            status: MinutesStatus::Final,
            meeting_at: appointment.scheduled_at,
            participants: vec![
                format!("consultant:{}", appointment.consultant_id),
                format!("workshop:{}", appointment.workshop_id),
            ],
            agenda: Vec::new(),
            objectives: Vec::new(),
            decisions: Vec::new(),
            commitments: Vec::new(),
            narrative: Some(narrative),
            references: Vec::new(),
            created_at: now,
            finalized_at: Some(now),
        }
    }
}
