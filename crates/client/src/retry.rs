// Bounded reconnection retry: fixed delay, explicit outcomes.
//
// Restart/Rejoin retry a fixed number of times with a fixed delay
// between attempts. Failures on earlier attempts are swallowed; the
// final attempt's failure is carried in the exhausted outcome instead
// of being rethrown, so retry behavior is testable without provoking
// real transport errors.

use std::future::Future;
use std::time::Duration;

/// Retry parameters for Restart/Rejoin.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { attempts: 10, delay: Duration::from_millis(200) }
    }
}

impl RetryPolicy {
    /// Whether `attempt` (0-based) is the last one in the budget.
    pub fn is_final(&self, attempt: u32) -> bool {
        attempt + 1 >= self.attempts
    }
}

/// Result of a single attempt.
#[derive(Debug)]
pub enum Attempt<T> {
    Success(T),
    /// A failure eligible for retry.
    Transient(anyhow::Error),
}

/// Result of a full retry loop.
#[derive(Debug)]
pub enum RetryOutcome<T> {
    Success(T),
    /// The budget ran out; carries the last underlying failure.
    Exhausted(anyhow::Error),
}

/// Run `attempt` until it succeeds or the policy's budget runs out,
/// sleeping `policy.delay` between attempts (but not after the last).
pub async fn run<T, F, Fut>(policy: &RetryPolicy, mut attempt: F) -> RetryOutcome<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Attempt<T>>,
{
    let mut last_error = anyhow::anyhow!("retry budget is zero");
    for n in 0..policy.attempts {
        match attempt().await {
            Attempt::Success(value) => return RetryOutcome::Success(value),
            Attempt::Transient(error) => last_error = error,
        }
        if !policy.is_final(n) {
            tokio::time::sleep(policy.delay).await;
        }
    }
    RetryOutcome::Exhausted(last_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn quick_policy(attempts: u32) -> RetryPolicy {
        RetryPolicy { attempts, delay: Duration::from_millis(200) }
    }

    // ── Policy ──────────────────────────────────────────────────────

    #[test]
    fn default_policy_is_ten_attempts_200ms_apart() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.attempts, 10);
        assert_eq!(policy.delay, Duration::from_millis(200));
    }

    #[test]
    fn is_final_marks_the_last_attempt() {
        let policy = quick_policy(3);
        assert!(!policy.is_final(0));
        assert!(!policy.is_final(1));
        assert!(policy.is_final(2));
    }

    // ── Loop behavior ───────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn stops_at_the_first_success() {
        let calls = AtomicU32::new(0);
        let outcome = run(&quick_policy(5), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Attempt::Transient(anyhow::anyhow!("not yet"))
                } else {
                    Attempt::Success(n)
                }
            }
        })
        .await;

        match outcome {
            RetryOutcome::Success(n) => assert_eq!(n, 2),
            RetryOutcome::Exhausted(_) => panic!("expected success"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_after_exactly_the_budget() {
        let calls = AtomicU32::new(0);
        let started = tokio::time::Instant::now();

        let outcome: RetryOutcome<()> = run(&quick_policy(10), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Attempt::Transient(anyhow::anyhow!("service unreachable")) }
        })
        .await;

        match outcome {
            RetryOutcome::Exhausted(error) => {
                assert!(error.to_string().contains("service unreachable"));
            }
            RetryOutcome::Success(_) => panic!("expected exhaustion"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 10);
        // Nine sleeps between ten attempts.
        assert_eq!(started.elapsed(), Duration::from_millis(1800));
    }

    #[tokio::test(start_paused = true)]
    async fn carries_the_last_failure_not_the_first() {
        let calls = AtomicU32::new(0);
        let outcome: RetryOutcome<()> = run(&quick_policy(3), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move { Attempt::Transient(anyhow::anyhow!("failure #{n}")) }
        })
        .await;

        match outcome {
            RetryOutcome::Exhausted(error) => {
                assert_eq!(error.to_string(), "failure #2");
            }
            RetryOutcome::Success(_) => panic!("expected exhaustion"),
        }
    }
}
