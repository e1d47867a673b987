//! The window-counter limiter.

use peanut_core::{Error, Result, Timestamp};
use peanut_storage::{tables, Database, StorageError};
use serde::Deserialize;
use tracing::warn;

use crate::policy::RatePolicy;

/// Windows older than this multiple of the policy window are pruned
/// lazily on write.
const RETENTION_MULTIPLE: u64 = 10;

/// Outcome of a permitted [`RateLimiter::check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    /// Requests left in the current window.
    pub remaining: u32,
    /// When the current window ends.
    pub reset_at: Timestamp,
    /// The policy's per-window budget.
    pub limit: u32,
}

#[derive(Debug, Deserialize)]
struct WindowRow {
    count: i64,
}

/// Fixed-window counter over the persistence port.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    db: Database,
}

impl RateLimiter {
    /// Create a limiter over the shared database handle.
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Count a request against `key` under `policy`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RateLimited`] when the caller exceeded the
    /// budget of a policy with backoff enabled. A policy without
    /// backoff never raises; overshoot reports `remaining: 0`.
    /// Storage failures fail open: the request is allowed and the
    /// condition logged.
    pub async fn check(&self, key: &str, policy: &RatePolicy) -> Result<RateDecision> {
        let now = Timestamp::now();
        let count = match self.bump(key, policy, now).await {
            Ok(count) => count,
            Err(err) => {
                warn!(key, error = %err, "rate-limit store unavailable, failing open");
                return Ok(RateDecision {
                    remaining: policy.max_requests,
                    reset_at: now,
                    limit: policy.max_requests,
                });
            },
        };

        let window_start_ms = Self::window_start_ms(now, policy);
        let reset_at = Timestamp::from_unix_millis(
            i64::try_from(window_start_ms.saturating_add(policy.window_ms))
                .unwrap_or(i64::MAX),
        );

        if count > u64::from(policy.max_requests) && policy.exponential_backoff {
            let excess = count.saturating_sub(u64::from(policy.max_requests));
            let doublings = u32::try_from(excess / 10).unwrap_or(u32::MAX);
            let factor = 1u64.checked_shl(doublings).unwrap_or(u64::MAX);
            let retry_after_ms = policy
                .max_backoff_ms
                .min(policy.window_ms.saturating_mul(factor));

            return Err(Error::RateLimited {
                retry_after_secs: retry_after_ms.div_ceil(1000).max(1),
            });
        }

        // A non-backoff policy never raises: overshoot reports zero
        // remaining and the window's reset time.
        Ok(RateDecision {
            remaining: policy
                .max_requests
                .saturating_sub(u32::try_from(count).unwrap_or(u32::MAX)),
            reset_at,
            limit: policy.max_requests,
        })
    }

    /// Increment the `(key, window_start)` counter and prune stale
    /// windows for the key, in one request (one transaction).
    async fn bump(
        &self,
        key: &str,
        policy: &RatePolicy,
        now: Timestamp,
    ) -> std::result::Result<u64, StorageError> {
        let window_start_ms = Self::window_start_ms(now, policy);
        let window_start =
            Timestamp::from_unix_millis(i64::try_from(window_start_ms).unwrap_or(0));
        let cutoff = Timestamp::from_unix_millis(
            now.unix_millis()
                .saturating_sub(i64::try_from(policy.window_ms).unwrap_or(i64::MAX).saturating_mul(
                    i64::try_from(RETENTION_MULTIPLE).unwrap_or(10),
                )),
        );
        let record = format!("{key}|{}", window_start.to_rfc3339());

        let mut response = self
            .db
            .client()
            .query("DELETE type::table($tb) WHERE key = $key AND window_start < $cutoff")
            .query(
                "UPSERT type::thing($tb, $record) SET \
                 count = (count ?? 0) + 1, key = $key, window_start = $window_start \
                 RETURN AFTER",
            )
            .bind(("tb", tables::RATE_LIMIT_WINDOWS))
            .bind(("key", key.to_string()))
            .bind(("cutoff", cutoff.to_rfc3339()))
            .bind(("record", record))
            .bind(("window_start", window_start.to_rfc3339()))
            .await?;
        let row: Option<WindowRow> = response.take(1)?;
        let count = row.map_or(1, |r| u64::try_from(r.count).unwrap_or(u64::MAX));
        Ok(count)
    }

    fn window_start_ms(now: Timestamp, policy: &RatePolicy) -> u64 {
        let now_ms = u64::try_from(now.unix_millis()).unwrap_or(0);
        (now_ms / policy.window_ms) * policy.window_ms
    }
}
