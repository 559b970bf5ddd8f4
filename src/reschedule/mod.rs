//! Reschedule/cancellation workflow: outcome taxonomy, liability
//! attribution, liability-scoped reason vocabularies, and request
//! validation.
//!
//! The workflow never touches status itself; it shapes and validates a
//! [`RescheduleRequest`] and the engine drives the transition.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::lifecycle::types::{Appointment, AppointmentStatus, LifecycleError, UnknownValue};

/// Post-sale outcome taxonomy recorded on every reschedule/cancel event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutcomeCode {
    CanceledByClientRescheduled,
    CanceledByClientNoReschedule,
    CanceledByCompanyRescheduled,
    CanceledByCompanyNoReschedule,
    NoShowClient,
    NoShowCompany,
    SuspendedClientImpediment,
    PausedRisk,
}

impl OutcomeCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeCode::CanceledByClientRescheduled => "canceled-by-client-rescheduled",
            OutcomeCode::CanceledByClientNoReschedule => "canceled-by-client-no-reschedule",
            OutcomeCode::CanceledByCompanyRescheduled => "canceled-by-company-rescheduled",
            OutcomeCode::CanceledByCompanyNoReschedule => "canceled-by-company-no-reschedule",
            OutcomeCode::NoShowClient => "no-show-client",
            OutcomeCode::NoShowCompany => "no-show-company",
            OutcomeCode::SuspendedClientImpediment => "suspended-client-impediment",
            OutcomeCode::PausedRisk => "paused-risk",
        }
    }

    /// Whether this outcome books a new occurrence of the session.
    pub fn books_future_occurrence(&self) -> bool {
        matches!(
            self,
            OutcomeCode::CanceledByClientRescheduled | OutcomeCode::CanceledByCompanyRescheduled
        )
    }

    /// Liability implied by the outcome itself, where the taxonomy pins one.
    pub fn implied_liability(&self) -> Option<Liability> {
        match self {
            OutcomeCode::CanceledByClientRescheduled
            | OutcomeCode::CanceledByClientNoReschedule
            | OutcomeCode::NoShowClient
            | OutcomeCode::SuspendedClientImpediment => Some(Liability::Client),
            OutcomeCode::CanceledByCompanyRescheduled
            | OutcomeCode::CanceledByCompanyNoReschedule
            | OutcomeCode::NoShowCompany => Some(Liability::Company),
            OutcomeCode::PausedRisk => None,
        }
    }
}

impl fmt::Display for OutcomeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutcomeCode {
    type Err = UnknownValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "canceled-by-client-rescheduled" => Ok(OutcomeCode::CanceledByClientRescheduled),
            "canceled-by-client-no-reschedule" => Ok(OutcomeCode::CanceledByClientNoReschedule),
            "canceled-by-company-rescheduled" => Ok(OutcomeCode::CanceledByCompanyRescheduled),
            "canceled-by-company-no-reschedule" => Ok(OutcomeCode::CanceledByCompanyNoReschedule),
            "no-show-client" => Ok(OutcomeCode::NoShowClient),
            "no-show-company" => Ok(OutcomeCode::NoShowCompany),
            "suspended-client-impediment" => Ok(OutcomeCode::SuspendedClientImpediment),
            "paused-risk" => Ok(OutcomeCode::PausedRisk),
            other => Err(UnknownValue(other.to_string())),
        }
    }
}

/// Which party is responsible for the reschedule/cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Liability {
    Client,
    Company,
    Shared,
}

impl Liability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Liability::Client => "client",
            Liability::Company => "company",
            Liability::Shared => "shared",
        }
    }
}

impl fmt::Display for Liability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Liability {
    type Err = UnknownValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "client" => Ok(Liability::Client),
            "company" => Ok(Liability::Company),
            "shared" => Ok(Liability::Shared),
            other => Err(UnknownValue(other.to_string())),
        }
    }
}

/// Liability-scoped reason code. Client-caused and company-caused events
/// draw from distinct vocabularies; a small shared set covers mutual
/// decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReasonCode {
    ClientFinancialDifficulty,
    ClientScheduleConflict,
    ClientNoShow,
    ClientLostEngagement,
    ClientEmergency,
    ClientOther,
    CompanyConsultantUnavailable,
    CompanyConsultantEmergency,
    CompanySchedulingError,
    CompanyCapacityReallocation,
    CompanyOther,
    SharedMutualAgreement,
    SharedForceMajeure,
}

impl ReasonCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasonCode::ClientFinancialDifficulty => "client-financial-difficulty",
            ReasonCode::ClientScheduleConflict => "client-schedule-conflict",
            ReasonCode::ClientNoShow => "client-no-show",
            ReasonCode::ClientLostEngagement => "client-lost-engagement",
            ReasonCode::ClientEmergency => "client-emergency",
            ReasonCode::ClientOther => "client-other",
            ReasonCode::CompanyConsultantUnavailable => "company-consultant-unavailable",
            ReasonCode::CompanyConsultantEmergency => "company-consultant-emergency",
            ReasonCode::CompanySchedulingError => "company-scheduling-error",
            ReasonCode::CompanyCapacityReallocation => "company-capacity-reallocation",
            ReasonCode::CompanyOther => "company-other",
            ReasonCode::SharedMutualAgreement => "shared-mutual-agreement",
            ReasonCode::SharedForceMajeure => "shared-force-majeure",
        }
    }

    /// The liability this reason belongs to.
    pub fn liability(&self) -> Liability {
        match self {
            ReasonCode::ClientFinancialDifficulty
            | ReasonCode::ClientScheduleConflict
            | ReasonCode::ClientNoShow
            | ReasonCode::ClientLostEngagement
            | ReasonCode::ClientEmergency
            | ReasonCode::ClientOther => Liability::Client,
            ReasonCode::CompanyConsultantUnavailable
            | ReasonCode::CompanyConsultantEmergency
            | ReasonCode::CompanySchedulingError
            | ReasonCode::CompanyCapacityReallocation
            | ReasonCode::CompanyOther => Liability::Company,
            ReasonCode::SharedMutualAgreement | ReasonCode::SharedForceMajeure => Liability::Shared,
        }
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReasonCode {
    type Err = UnknownValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "client-financial-difficulty" => Ok(ReasonCode::ClientFinancialDifficulty),
            "client-schedule-conflict" => Ok(ReasonCode::ClientScheduleConflict),
            "client-no-show" => Ok(ReasonCode::ClientNoShow),
            "client-lost-engagement" => Ok(ReasonCode::ClientLostEngagement),
            "client-emergency" => Ok(ReasonCode::ClientEmergency),
            "client-other" => Ok(ReasonCode::ClientOther),
            "company-consultant-unavailable" => Ok(ReasonCode::CompanyConsultantUnavailable),
            "company-consultant-emergency" => Ok(ReasonCode::CompanyConsultantEmergency),
            "company-scheduling-error" => Ok(ReasonCode::CompanySchedulingError),
            "company-capacity-reallocation" => Ok(ReasonCode::CompanyCapacityReallocation),
            "company-other" => Ok(ReasonCode::CompanyOther),
            "shared-mutual-agreement" => Ok(ReasonCode::SharedMutualAgreement),
            "shared-force-majeure" => Ok(ReasonCode::SharedForceMajeure),
            other => Err(UnknownValue(other.to_string())),
        }
    }
}

/// Everything the reschedule/cancellation workflow captures before the
/// engine drives the transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RescheduleRequest {
    pub new_when: Option<DateTime<Utc>>,
    pub outcome: OutcomeCode,
    pub liability: Liability,
    pub reason: ReasonCode,
    pub note: Option<String>,
}

impl RescheduleRequest {
    /// Validate attribution completeness and vocabulary scoping.
    pub fn validate(&self) -> Result<(), LifecycleError> {
        if self.reason.liability() != self.liability {
            return Err(LifecycleError::Validation {
                reason: format!(
                    "reason code {} belongs to {} liability, not {}",
                    self.reason,
                    self.reason.liability(),
                    self.liability
                ),
            });
        }
        if let Some(implied) = self.outcome.implied_liability() {
            if implied != self.liability {
                return Err(LifecycleError::Validation {
                    reason: format!(
                        "outcome {} implies {} liability, not {}",
                        self.outcome, implied, self.liability
                    ),
                });
            }
        }
        if self.outcome.books_future_occurrence() && self.new_when.is_none() {
            return Err(LifecycleError::Validation {
                reason: format!("outcome {} requires a new date/time", self.outcome),
            });
        }
        if !self.outcome.books_future_occurrence() && self.new_when.is_some() {
            return Err(LifecycleError::Validation {
                reason: format!("outcome {} does not book a new occurrence", self.outcome),
            });
        }
        Ok(())
    }

    /// The status this attribution lands on.
    ///
    /// A cancellation attributed to the client that books no new session is
    /// contractually counted as a fulfilled obligation: it must not read as
    /// canceled, so it lands on `overdue`. Company/shared liability with no
    /// future occurrence is a genuine cancellation.
    pub fn target_status(&self) -> AppointmentStatus {
        if self.outcome.books_future_occurrence() {
            AppointmentStatus::Rescheduled
        } else if self.liability == Liability::Client {
            AppointmentStatus::Overdue
        } else {
            AppointmentStatus::Canceled
        }
    }
}

/// Narrative for the audit minutes document, combining the old and new
/// scheduled instants.
pub fn audit_narrative(appointment: &Appointment, request: &RescheduleRequest) -> String {
    let mut narrative = match request.new_when {
        Some(new_when) => format!(
            "Session scheduled for {} was moved to {}. Outcome: {}. Liability: {}. Reason: {}.",
            appointment.scheduled_at.to_rfc3339(),
            new_when.to_rfc3339(),
            request.outcome,
            request.liability,
            request.reason
        ),
        None => format!(
            "Session scheduled for {} was closed without a new occurrence. Outcome: {}. Liability: {}. Reason: {}.",
            appointment.scheduled_at.to_rfc3339(),
            request.outcome,
            request.liability,
            request.reason
        ),
    };
    if let Some(note) = &request.note {
        if !note.trim().is_empty() {
            narrative.push_str(" Note: ");
            narrative.push_str(note.trim());
        }
    }
    narrative
}
