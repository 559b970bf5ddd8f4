//! Durable sequence counters for minutes document codes.
//!
//! Allocation is a single atomic upsert-increment; concurrent callers can
//! never observe the same ordinal. Counting existing documents and adding
//! one is exactly the race this module exists to replace.

use sqlx::SqlitePool;

use super::{with_bounded_retry, RetryPolicy, StoreError};

#[derive(Clone)]
pub struct SequenceGenerator {
    pool: SqlitePool,
    retry: RetryPolicy,
}

impl SequenceGenerator {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            retry: RetryPolicy::default(),
        }
    }

    /// Claim the next ordinal for a code family.
    pub async fn next_ordinal(&self, family: &str) -> Result<i64, StoreError> {
        let value = with_bounded_retry("sequence.next_ordinal", &self.retry, || {
            sqlx::query_scalar::<_, i64>(
                r#"
                INSERT INTO sequence_counters (family, value)
                VALUES (?, 1)
                ON CONFLICT (family) DO UPDATE SET value = value + 1
                RETURNING value
                "#,
            )
            .bind(family.to_string())
            .fetch_one(&self.pool)
        })
        .await?;

        Ok(value)
    }

    /// Claim and render the next code for a family,
    /// e.g. `MIN.0042`.
    pub async fn next_code(&self, family: &str) -> Result<String, StoreError> {
        let ordinal = self.next_ordinal(family).await?;
        Ok(format_code(family, ordinal))
    }
}

/// Fixed textual form `<PREFIX>.<4-digit zero-padded ordinal>`; stable once
/// assigned. Ordinals past 9999 widen rather than wrap.
pub fn format_code(family: &str, ordinal: i64) -> String {
    format!("{family}.{ordinal:04}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_zero_padded_to_four_digits() {
        assert_eq!(format_code("MIN", 1), "MIN.0001");
        assert_eq!(format_code("MIN", 42), "MIN.0042");
        assert_eq!(format_code("MIN", 9999), "MIN.9999");
    }

    #[test]
    fn large_ordinals_widen_instead_of_wrapping() {
        assert_eq!(format_code("MIN", 10000), "MIN.10000");
    }
}
