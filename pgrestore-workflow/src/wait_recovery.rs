//! Waiting for WAL replay to finish
//!
//! Replay after a restore can take minutes or hours and its end can only be
//! observed by asking the server. The instance is polled at a fixed interval
//! until it leaves recovery. By default there is no attempt ceiling: giving up
//! would leave a half-recovered instance nobody knows how to continue, so the
//! caller is blocked until replay ends or polling itself fails. Callers that
//! need a bound set `max_attempts` or wrap the wait in their own timeout.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use crate::error::{RestoreError, Result};
use crate::instance::SuperUserSession;

/// Interval between two recovery checks
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// How to retry an operation failing with a retryable error
#[derive(Clone, Copy)]
pub struct RecoveryWaitPolicy {
    /// Sleep between two attempts
    pub interval: Duration,
    /// Stop after this many attempts, `None` retries forever
    pub max_attempts: Option<u32>,
    /// Which errors are worth another attempt
    pub is_retryable: fn(&RestoreError) -> bool,
}

impl Default for RecoveryWaitPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_attempts: None,
            is_retryable: RestoreError::is_transient,
        }
    }
}

impl fmt::Debug for RecoveryWaitPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecoveryWaitPolicy")
            .field("interval", &self.interval)
            .field("max_attempts", &self.max_attempts)
            .finish_non_exhaustive()
    }
}

impl RecoveryWaitPolicy {
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }
}

/// Runs `op` until it succeeds or fails with an error the policy does not
/// retry
pub async fn retry_on_error<F, Fut, T>(policy: &RecoveryWaitPolicy, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempts: u32 = 0;
    loop {
        attempts = attempts.saturating_add(1);

        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if (policy.is_retryable)(&err) => {
                if let Some(max_attempts) = policy.max_attempts {
                    if attempts >= max_attempts {
                        return Err(RestoreError::RetryBudgetExhausted {
                            attempts,
                            last: Box::new(err),
                        });
                    }
                }
                tokio::time::sleep(policy.interval).await;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Returns once `session` reports the server is out of recovery
///
/// A failing check (lost connection, unreadable result) ends the wait with
/// that error, it is never retried.
pub async fn wait_until_recovery_finishes<S>(session: &S, policy: &RecoveryWaitPolicy) -> Result<()>
where
    S: SuperUserSession + ?Sized,
{
    retry_on_error(policy, || async move {
        let status = session.is_in_recovery().await?;
        tracing::info!(recovery = status, "Checking if the server is still in recovery");

        if status {
            Err(RestoreError::InstanceInRecovery)
        } else {
            Ok(())
        }
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Reports recovery for the first `recovering_polls` checks
    struct ScriptedSession {
        recovering_polls: usize,
        polls: AtomicUsize,
        broken: bool,
    }

    impl ScriptedSession {
        fn recovering_for(recovering_polls: usize) -> Self {
            Self {
                recovering_polls,
                polls: AtomicUsize::new(0),
                broken: false,
            }
        }

        fn broken() -> Self {
            Self {
                broken: true,
                ..Self::recovering_for(0)
            }
        }

        fn polls(&self) -> usize {
            self.polls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SuperUserSession for ScriptedSession {
        async fn is_in_recovery(&self) -> Result<bool> {
            let poll = self.polls.fetch_add(1, Ordering::SeqCst);
            if self.broken {
                return Err(RestoreError::io(
                    "error while reading results of pg_is_in_recovery",
                    std::io::Error::new(std::io::ErrorKind::ConnectionReset, "connection reset"),
                ));
            }
            Ok(poll < self.recovering_polls)
        }

        async fn execute(&self, _statement: &str) -> Result<()> {
            Ok(())
        }
    }

    fn fast_policy() -> RecoveryWaitPolicy {
        RecoveryWaitPolicy::default().with_interval(Duration::from_millis(1))
    }

    #[test]
    fn test_default_policy_is_unbounded() {
        let policy = RecoveryWaitPolicy::default();
        assert_eq!(policy.interval, Duration::from_secs(5));
        assert_eq!(policy.max_attempts, None);
        assert!((policy.is_retryable)(&RestoreError::InstanceInRecovery));
    }

    #[tokio::test]
    async fn test_done_on_first_poll() {
        let session = ScriptedSession::recovering_for(0);
        wait_until_recovery_finishes(&session, &fast_policy()).await.unwrap();
        assert_eq!(session.polls(), 1);
    }

    #[tokio::test]
    async fn test_polls_until_recovery_ends() {
        let session = ScriptedSession::recovering_for(7);
        wait_until_recovery_finishes(&session, &fast_policy()).await.unwrap();
        assert_eq!(session.polls(), 8);
    }

    #[tokio::test]
    async fn test_poll_failure_is_not_retried() {
        let session = ScriptedSession::broken();

        let err = wait_until_recovery_finishes(&session, &fast_policy()).await.unwrap_err();

        assert!(matches!(err, RestoreError::Io { .. }));
        assert_eq!(session.polls(), 1);
    }

    #[tokio::test]
    async fn test_ceiling_stops_the_wait() {
        let session = ScriptedSession::recovering_for(10);
        let policy = fast_policy().with_max_attempts(3);

        let err = wait_until_recovery_finishes(&session, &policy).await.unwrap_err();

        match err {
            RestoreError::RetryBudgetExhausted { attempts, last } => {
                assert_eq!(attempts, 3);
                assert!(last.is_transient());
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(session.polls(), 3);
    }

    #[tokio::test]
    async fn test_custom_classification() {
        let session = ScriptedSession::recovering_for(2);
        let policy = RecoveryWaitPolicy {
            is_retryable: |_| false,
            ..fast_policy()
        };

        let err = wait_until_recovery_finishes(&session, &policy).await.unwrap_err();
        assert!(matches!(err, RestoreError::InstanceInRecovery));
        assert_eq!(session.polls(), 1);
    }
}
