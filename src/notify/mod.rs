//! Client-facing notifications.
//!
//! Lifecycle flows never talk to a channel directly: they enqueue into the
//! `notification_outbox` table and a dispatcher delivers out-of-band, so a
//! slow or failing channel can never block or revert a state transition.
//! Delivery is fire-and-forget.

mod dispatcher;
mod outbox;

pub use dispatcher::{DrainReport, OutboxDispatcher};
pub use outbox::{NotificationOutbox, OutboxMessage, OutboxStatus};

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::info;

use crate::directory::ClientContact;
use crate::lifecycle::types::UnknownValue;

/// Message templates the channel knows how to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateId {
    /// Post-session wrap-up to the client.
    SessionCompleted,
    /// Post-session satisfaction survey.
    SatisfactionSurvey,
    /// Contractual notice: a client-caused cancellation counts as a
    /// fulfilled session whether or not a new occurrence is booked.
    SessionFulfilledNotice,
    /// Plain reschedule confirmation.
    RescheduleNotice,
}

impl TemplateId {
    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateId::SessionCompleted => "session-completed",
            TemplateId::SatisfactionSurvey => "satisfaction-survey",
            TemplateId::SessionFulfilledNotice => "session-fulfilled-notice",
            TemplateId::RescheduleNotice => "reschedule-notice",
        }
    }
}

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TemplateId {
    type Err = UnknownValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "session-completed" => Ok(TemplateId::SessionCompleted),
            "satisfaction-survey" => Ok(TemplateId::SatisfactionSurvey),
            "session-fulfilled-notice" => Ok(TemplateId::SessionFulfilledNotice),
            "reschedule-notice" => Ok(TemplateId::RescheduleNotice),
            other => Err(UnknownValue(other.to_string())),
        }
    }
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("channel rejected message: {0}")]
    Channel(String),

    #[error("delivery timed out")]
    Timeout,
}

/// Outbound delivery seam. Implementations render the template for the
/// recipient; the engine only supplies structured parameters.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    async fn send(
        &self,
        contact: &ClientContact,
        template: TemplateId,
        params: &Value,
    ) -> Result<(), NotifyError>;
}

/// Default channel: logs deliveries. Deployments swap in a real transport.
#[derive(Debug, Default, Clone)]
pub struct TracingChannel;

#[async_trait]
impl NotificationChannel for TracingChannel {
    async fn send(
        &self,
        contact: &ClientContact,
        template: TemplateId,
        params: &Value,
    ) -> Result<(), NotifyError> {
        info!(
            recipient = %contact.name,
            template = %template,
            params = %params,
            "notification delivered"
        );
        Ok(())
    }
}
