//! # Write Retries
//!
//! SQLite allows one writer at a time. When two requests write at once the
//! loser gets `database is locked`; the write is simply tried again after an
//! exponential backoff.
//!
//! ```text
//! attempt 1 ──✗ busy──► wait ~50ms ──► attempt 2 ──✗ busy──► wait ~100ms
//!           ──► attempt 3 ──✓──► Ok
//!
//! Non-transient errors (NotFound, constraint, business rule) return at once.
//! ```

use std::future::Future;
use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use tracing::{debug, warn};

use crate::error::DbResult;

/// How often and how patiently a write is retried.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Retries after the first attempt. 0 disables retrying.
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_retries: 3,
            initial_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        RetryPolicy {
            max_retries: 0,
            ..RetryPolicy::default()
        }
    }

    fn create_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.initial_backoff,
            max_interval: self.max_backoff,
            multiplier: 2.0,
            max_elapsed_time: None,
            ..Default::default()
        }
    }
}

/// Runs `op` until it succeeds, fails with a non-transient error, or the
/// retry budget is spent.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, name: &str, mut op: F) -> DbResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = DbResult<T>>,
{
    let mut backoff = policy.create_backoff();
    let mut retries = 0u32;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && retries < policy.max_retries => {
                retries += 1;
                let wait = backoff.next_backoff().unwrap_or(policy.max_backoff);
                warn!(op = name, attempt = retries, error = %err, "Transient database error, retrying");
                debug!(?wait, "Waiting before retry");
                tokio::time::sleep(wait).await;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
        }
    }

    #[tokio::test]
    async fn test_retries_transient_until_success() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = with_retry(&fast(3), "test", move || async move {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err(DbError::Busy("database is locked".into()))
            } else {
                Ok(n)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_budget() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: DbResult<()> = with_retry(&fast(2), "test", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(DbError::PoolExhausted)
        })
        .await;

        assert!(matches!(result, Err(DbError::PoolExhausted)));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_is_not_retried() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: DbResult<()> = with_retry(&fast(5), "test", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(DbError::not_found("Sale", "x"))
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
