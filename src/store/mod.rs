//! Persistence layer: appointment records, minutes documents, sequence
//! counters, and the notification outbox, all over a shared `SqlitePool`.
//!
//! Every status write is a conditional update keyed on
//! `(id, expected_status)`; callers learn about lost races from the
//! affected-row count, never by overwriting concurrent state.

pub mod appointments;
pub mod minutes;
pub mod sequence;

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

pub use appointments::{AppointmentStore, AttributionUpdate, CompletionUpdate};
pub use minutes::MinutesStore;
pub use sequence::SequenceGenerator;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("stored value could not be decoded: {0}")]
    Decode(String),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Bounded retry: one initial attempt plus `max_attempts - 1` retries with
/// exponential backoff and jitter. Storage calls never retry forever; the
/// caller surfaces `Unavailable` once this gives up.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    fn delay_for(&self, attempt: u32) -> Duration {
        let exp = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(self.max_delay);
        let jitter_ms = rand::rng().random_range(0..=50u64);
        exp + Duration::from_millis(jitter_ms)
    }
}

/// Transient errors are worth one more try; everything else fails fast.
fn is_retryable(error: &sqlx::Error) -> bool {
    match error {
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut => true,
        sqlx::Error::Database(db) => {
            let message = db.message().to_ascii_lowercase();
            message.contains("locked") || message.contains("busy")
        }
        _ => false,
    }
}

pub(crate) async fn with_bounded_retry<T, F, Fut>(
    operation: &str,
    policy: &RetryPolicy,
    mut run: F,
) -> Result<T, sqlx::Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, sqlx::Error>>,
{
    let mut attempt = 0;
    loop {
        match run().await {
            Ok(value) => return Ok(value),
            Err(error) if attempt + 1 < policy.max_attempts && is_retryable(&error) => {
                let delay = policy.delay_for(attempt);
                warn!(
                    operation,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "storage operation failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(error) => return Err(error),
        }
    }
}

pub(crate) fn parse_uuid(value: &str, column: &str) -> Result<uuid::Uuid, StoreError> {
    uuid::Uuid::parse_str(value)
        .map_err(|e| StoreError::Decode(format!("{column}: {value:?} is not a uuid: {e}")))
}

pub(crate) fn parse_enum<T>(value: &str, column: &str) -> Result<T, StoreError>
where
    T: std::str::FromStr<Err = crate::lifecycle::types::UnknownValue>,
{
    value
        .parse::<T>()
        .map_err(|e| StoreError::Decode(format!("{column}: {e}")))
}
