//! Outbox dispatcher: drains pending messages through the notification
//! channel with rate limiting, bounded timeouts, and a single in-pass
//! retry. Runs out-of-band from lifecycle transitions.

use governor::{DefaultDirectRateLimiter, Jitter, Quota, RateLimiter};
use rand::Rng;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::{NotificationChannel, NotificationOutbox, NotifyError, OutboxMessage};
use crate::directory::{ClientContact, ClientDirectory};

const DRAIN_BATCH: i64 = 100;

#[derive(Debug, Default, Clone)]
pub struct DrainReport {
    pub examined: usize,
    pub delivered: usize,
    pub failed: usize,
    /// Messages left pending for a later pass (transient failures,
    /// directory unavailability).
    pub deferred: usize,
}

pub struct OutboxDispatcher {
    outbox: NotificationOutbox,
    directory: Arc<dyn ClientDirectory>,
    channel: Arc<dyn NotificationChannel>,
    limiter: DefaultDirectRateLimiter,
    send_timeout: Duration,
    retry_base_delay: Duration,
    max_attempts: i64,
}

impl OutboxDispatcher {
    pub fn new(
        outbox: NotificationOutbox,
        directory: Arc<dyn ClientDirectory>,
        channel: Arc<dyn NotificationChannel>,
        sends_per_second: u32,
        burst_capacity: u32,
        send_timeout: Duration,
        max_attempts: i64,
    ) -> Self {
        let quota = Quota::per_second(NonZeroU32::new(sends_per_second).unwrap_or(NonZeroU32::MIN))
            .allow_burst(NonZeroU32::new(burst_capacity).unwrap_or(NonZeroU32::MIN));

        Self {
            outbox,
            directory,
            channel,
            limiter: RateLimiter::direct(quota),
            send_timeout,
            retry_base_delay: Duration::from_millis(250),
            max_attempts,
        }
    }

    /// Process the current pending batch. Each message is independent; one
    /// bad recipient never halts the drain.
    pub async fn drain(&self) -> DrainReport {
        let mut report = DrainReport::default();

        let pending = match self.outbox.pending(DRAIN_BATCH).await {
            Ok(pending) => pending,
            Err(error) => {
                warn!(error = %error, "outbox drain could not list pending messages");
                return report;
            }
        };

        for message in pending {
            report.examined += 1;
            self.limiter
                .until_ready_with_jitter(Jitter::up_to(Duration::from_millis(100)))
                .await;

            let contact = match self.directory.lookup(message.workshop_id).await {
                Ok(Some(contact)) => contact,
                Ok(None) => {
                    // Permanent: no amount of retrying invents a contact.
                    warn!(
                        message.id = %message.id,
                        workshop.id = %message.workshop_id,
                        "no contact on file, dropping notification"
                    );
                    if let Err(error) = self.outbox.mark_failed(message.id, "no contact on file").await {
                        warn!(message.id = %message.id, error = %error, "could not record delivery failure");
                    }
                    report.failed += 1;
                    continue;
                }
                Err(error) => {
                    debug!(
                        message.id = %message.id,
                        error = %error,
                        "directory unavailable, deferring notification"
                    );
                    report.deferred += 1;
                    continue;
                }
            };

            match self.deliver(&contact, &message).await {
                Ok(()) => {
                    if let Err(error) = self.outbox.mark_sent(message.id, chrono::Utc::now()).await
                    {
                        warn!(message.id = %message.id, error = %error, "could not mark message sent");
                    }
                    report.delivered += 1;
                }
                Err(error) => {
                    warn!(
                        message.id = %message.id,
                        template = %message.template,
                        error = %error,
                        "notification delivery failed"
                    );
                    self.close_out(&message, &error.to_string(), &mut report)
                        .await;
                }
            }
        }

        info!(
            examined = report.examined,
            delivered = report.delivered,
            failed = report.failed,
            deferred = report.deferred,
            "outbox drain complete"
        );
        report
    }

    /// One timed attempt plus a single backoff retry, then give up for
    /// this pass.
    async fn deliver(&self, contact: &ClientContact, message: &OutboxMessage) -> Result<(), NotifyError> {
        match self.try_send(contact, message).await {
            Ok(()) => Ok(()),
            Err(first_error) => {
                let jitter = Duration::from_millis(rand::rng().random_range(0..=100u64));
                debug!(
                    message.id = %message.id,
                    error = %first_error,
                    "retrying delivery after backoff"
                );
                tokio::time::sleep(self.retry_base_delay + jitter).await;
                self.try_send(contact, message).await
            }
        }
    }

    async fn try_send(&self, contact: &ClientContact, message: &OutboxMessage) -> Result<(), NotifyError> {
        timeout(
            self.send_timeout,
            self.channel.send(contact, message.template, &message.params),
        )
        .await
        .map_err(|_| NotifyError::Timeout)?
    }

    /// Record the failure: keep pending while attempts remain, otherwise
    /// mark failed for good.
    async fn close_out(&self, message: &OutboxMessage, error: &str, report: &mut DrainReport) {
        let exhausted = message.attempts + 1 >= self.max_attempts;
        let result = if exhausted {
            self.outbox.mark_failed(message.id, error).await
        } else {
            self.outbox.record_attempt(message.id, error).await
        };
        if let Err(store_error) = result {
            warn!(message.id = %message.id, error = %store_error, "could not record delivery failure");
        }
        if exhausted {
            report.failed += 1;
        } else {
            report.deferred += 1;
        }
    }
}
