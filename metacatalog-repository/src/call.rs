//! Per-request call context for engine calls.
//!
//! Every `SearchIndexProvider` call receives a [`CallContext`]. It carries the
//! request's overall deadline, a cancellation token, and the retry policy
//! applied to transient faults.

use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, timeout, Instant};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::errors::CatalogError;

/// Timeout and retry settings for engine calls.
#[derive(Debug, Clone)]
pub struct CallPolicy {
    /// Upper bound for a single attempt.
    pub request_timeout: Duration,
    /// Upper bound for a whole request, retries included.
    pub deadline: Duration,
    /// Retries after the first attempt, for transient faults only.
    pub max_retries: u32,
    /// Delay before the first retry; grows linearly with each attempt.
    pub backoff: Duration,
}

/// Longest overall deadline a policy will carry.
pub const MAX_DEADLINE: Duration = Duration::from_secs(24 * 60 * 60);

impl Default for CallPolicy {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            deadline: Duration::from_secs(30),
            max_retries: 2,
            backoff: Duration::from_millis(200),
        }
    }
}

impl CallPolicy {
    /// Create a policy with the given per-attempt timeout and retry count.
    ///
    /// The overall deadline leaves room for every attempt plus backoff,
    /// capped at [`MAX_DEADLINE`].
    pub fn new(request_timeout: Duration, max_retries: u32) -> Self {
        let backoff = CallPolicy::default().backoff;
        let attempts = max_retries.saturating_add(1);
        let backoff_steps = u32::try_from(u64::from(max_retries) * u64::from(attempts) / 2)
            .unwrap_or(u32::MAX);
        let deadline = request_timeout
            .saturating_mul(attempts)
            .saturating_add(backoff.saturating_mul(backoff_steps))
            .min(MAX_DEADLINE);
        Self {
            request_timeout,
            deadline,
            max_retries,
            backoff,
        }
    }

    /// A policy that never retries.
    pub fn no_retry(request_timeout: Duration) -> Self {
        Self::new(request_timeout, 0)
    }
}

/// Deadline, cancellation and retry policy for one caller request.
#[derive(Debug, Clone)]
pub struct CallContext {
    deadline: Instant,
    cancel: CancellationToken,
    policy: CallPolicy,
}

impl CallContext {
    /// Start a context whose deadline runs from now.
    pub fn new(policy: CallPolicy) -> Self {
        Self::with_cancel(policy, CancellationToken::new())
    }

    /// Start a context tied to an existing cancellation token.
    pub fn with_cancel(policy: CallPolicy, cancel: CancellationToken) -> Self {
        Self {
            deadline: deadline_from_now(policy.deadline),
            cancel,
            policy,
        }
    }

    /// The token that cancels every call made through this context.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Time left before the deadline, or `None` once it has passed.
    pub fn remaining(&self) -> Option<Duration> {
        let now = Instant::now();
        if now >= self.deadline {
            None
        } else {
            Some(self.deadline - now)
        }
    }

    /// Run `call`, retrying transient faults within the deadline.
    ///
    /// Each attempt is bounded by `min(request_timeout, remaining)`. An attempt
    /// that times out counts as a transient fault. Non-transient errors are
    /// returned immediately. Cancellation wins over everything else.
    ///
    /// # Arguments
    ///
    /// * `operation` - Name of the engine operation, for errors and logs
    /// * `call` - Produces a fresh future for each attempt
    pub async fn run<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T, CatalogError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CatalogError>>,
    {
        let mut attempt: u32 = 0;
        loop {
            if self.cancel.is_cancelled() {
                return Err(CatalogError::cancelled(operation));
            }
            let remaining = self.remaining().ok_or_else(|| {
                CatalogError::timeout(format!("{} exceeded the request deadline", operation))
            })?;
            let budget = remaining.min(self.policy.request_timeout);

            let outcome = tokio::select! {
                _ = self.cancel.cancelled() => return Err(CatalogError::cancelled(operation)),
                res = timeout(budget, call()) => res,
            };

            let err = match outcome {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(e)) => e,
                Err(_) => CatalogError::timeout(format!(
                    "{} did not answer within {:?}",
                    operation, budget
                )),
            };

            if !err.is_transient() || attempt >= self.policy.max_retries {
                return Err(err);
            }

            attempt += 1;
            let delay = self.policy.backoff.saturating_mul(attempt);
            warn!(
                operation = %operation,
                attempt = attempt,
                max_retries = self.policy.max_retries,
                error = %err,
                "Transient engine fault, retrying"
            );

            tokio::select! {
                _ = self.cancel.cancelled() => return Err(CatalogError::cancelled(operation)),
                _ = sleep(delay) => {}
            }
        }
    }
}

fn deadline_from_now(budget: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(budget)
        .or_else(|| now.checked_add(MAX_DEADLINE))
        .unwrap_or(now)
}

impl Default for CallContext {
    fn default() -> Self {
        Self::new(CallPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_transient_errors_are_retried() {
        let cx = CallContext::new(CallPolicy::new(Duration::from_secs(1), 2));
        let calls = Arc::new(AtomicU32::new(0));

        let counter = calls.clone();
        let result = cx
            .run("search", || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(CatalogError::transport("connection reset"))
                    } else {
                        Ok(7)
                    }
                }
            })
            .await;

        assert_eq!(result, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_are_bounded() {
        let cx = CallContext::new(CallPolicy::new(Duration::from_secs(1), 2));
        let calls = Arc::new(AtomicU32::new(0));

        let counter = calls.clone();
        let result: Result<(), _> = cx
            .run("search", || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(CatalogError::transport("connection refused"))
                }
            })
            .await;

        assert!(matches!(result, Err(CatalogError::TransportError(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_errors_are_never_retried() {
        let cx = CallContext::new(CallPolicy::new(Duration::from_secs(1), 5));
        let calls = Arc::new(AtomicU32::new(0));

        let counter = calls.clone();
        let result: Result<(), _> = cx
            .run("create_index", || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(CatalogError::mapping_rejected("unknown field type"))
                }
            })
            .await;

        assert!(matches!(result, Err(CatalogError::MappingRejected(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_attempt_times_out() {
        let cx = CallContext::new(CallPolicy::no_retry(Duration::from_millis(100)));

        let result: Result<(), _> = cx
            .run("get", || async {
                sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(CatalogError::Timeout(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_stops_the_call() {
        let token = CancellationToken::new();
        let cx = CallContext::with_cancel(CallPolicy::default(), token.clone());

        let canceller = token.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });

        let result: Result<(), _> = cx
            .run("search", || async {
                sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(CatalogError::Cancelled(_))));
    }

    #[tokio::test]
    async fn test_already_cancelled_context_makes_no_call() {
        let cx = CallContext::default();
        cx.cancellation_token().cancel();
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = cx
            .run("search", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(()) }
            })
            .await;

        assert!(matches!(result, Err(CatalogError::Cancelled(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_policy_deadline_covers_all_attempts() {
        let policy = CallPolicy::new(Duration::from_secs(2), 2);
        assert!(policy.deadline >= Duration::from_secs(6));
    }

    #[test]
    fn test_policy_with_huge_retry_count_is_capped() {
        let policy = CallPolicy::new(Duration::from_secs(1), 100_000);
        assert_eq!(policy.max_retries, 100_000);
        assert_eq!(policy.deadline, MAX_DEADLINE);

        let policy = CallPolicy::new(Duration::MAX, u32::MAX);
        assert_eq!(policy.deadline, MAX_DEADLINE);

        let cx = CallContext::new(CallPolicy {
            deadline: Duration::MAX,
            ..CallPolicy::default()
        });
        assert!(cx.remaining().is_some());
    }
}
