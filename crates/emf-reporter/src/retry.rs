// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::constants::{DEFAULT_RETRY_ATTEMPTS, DEFAULT_RETRY_DELAY};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Bounded attempts with a fixed pause between them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_RETRY_ATTEMPTS,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// A single attempt, no retries
    pub fn none() -> Self {
        Self::fixed(1, Duration::ZERO)
    }
}

/// Runs `operation` until it succeeds, fails with an error `is_retryable`
/// rejects, or `policy.max_attempts` attempts have been made. The last error
/// is returned on give-up.
pub async fn retry<T, E, F, Fut, P>(
    policy: &RetryPolicy,
    is_retryable: P,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempts = 0;

    loop {
        attempts += 1;
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if attempts < max_attempts && is_retryable(&e) => {
                debug!(
                    "Attempt {attempts}/{max_attempts} failed: {e}, retrying in {} ms",
                    policy.delay.as_millis()
                );
                tokio::time::sleep(policy.delay).await;
            }
            Err(e) => {
                if attempts > 1 {
                    debug!("Giving up after {attempts} attempts: {e}");
                }
                return Err(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use tokio::time::Instant;

    #[derive(Debug, PartialEq)]
    enum TestError {
        Transient,
        Permanent,
    }

    impl Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{self:?}")
        }
    }

    fn is_transient(e: &TestError) -> bool {
        *e == TestError::Transient
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_policy_makes_ten_spaced_attempts() {
        let attempts = Mutex::new(Vec::new());

        let result: Result<(), TestError> = retry(&RetryPolicy::default(), is_transient, || {
            attempts.lock().expect("lock poisoned").push(Instant::now());
            async { Err(TestError::Transient) }
        })
        .await;

        assert_eq!(result, Err(TestError::Transient));
        let attempts = attempts.into_inner().expect("lock poisoned");
        assert_eq!(attempts.len(), 10);
        for pair in attempts.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(5000));
        }
        let elapsed = *attempts.last().expect("attempts") - attempts[0];
        assert!(elapsed >= Duration::from_millis(45_000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_error_is_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), TestError> = retry(&RetryPolicy::default(), is_transient, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(TestError::Permanent) }
        })
        .await;

        assert_eq!(result, Err(TestError::Permanent));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let start = Instant::now();
        let result = retry(
            &RetryPolicy::fixed(5, Duration::from_secs(1)),
            is_transient,
            || {
                let call = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if call < 2 {
                        Err(TestError::Transient)
                    } else {
                        Ok(call)
                    }
                }
            },
        )
        .await;

        assert_eq!(result, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(start.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_zero_attempts_still_runs_once() {
        let calls = AtomicU32::new(0);
        let _: Result<(), TestError> = retry(
            &RetryPolicy::fixed(0, Duration::ZERO),
            is_transient,
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(TestError::Transient) }
            },
        )
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
