//! Retry scheduling.
//!
//! # Responsibilities
//! - Decide whether a failed attempt gets another try
//! - Wait out the backoff delay without blocking other calls
//! - Abort the wait promptly once shutdown has begun

use std::time::Duration;

use crate::client::CallError;
use crate::lifecycle::Shutdown;
use crate::resilience::backoff::Backoff;

/// Delay before the next attempt, or `None` when the call should give up.
pub fn next_delay(
    backoff: &Backoff,
    error: &CallError,
    attempt: u32,
    max_attempts: u32,
) -> Option<Duration> {
    if !error.is_retryable() || attempt >= max_attempts {
        return None;
    }
    Some(backoff.delay(attempt))
}

/// Sleep for `delay` unless shutdown is triggered first.
///
/// Returns `true` if the full delay elapsed, `false` if shutdown interrupted it.
pub async fn sleep_or_shutdown(delay: Duration, shutdown: &Shutdown) -> bool {
    if shutdown.is_triggered() {
        return false;
    }
    tokio::select! {
        _ = tokio::time::sleep(delay) => true,
        _ = shutdown.triggered() => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::TransportError;

    #[test]
    fn test_no_retry_on_last_attempt() {
        let err = CallError::Timeout { timeout_ms: 10 };
        assert_eq!(next_delay(&Backoff::default(), &err, 3, 3), None);
        assert_eq!(
            next_delay(&Backoff::default(), &err, 2, 3),
            Some(Duration::from_millis(2000))
        );
    }

    #[test]
    fn test_circuit_open_is_never_retried() {
        let err = CallError::CircuitOpen {
            destination: "quiz".into(),
            operation: "submit".into(),
        };
        assert_eq!(next_delay(&Backoff::default(), &err, 1, 3), None);

        let err = CallError::Transport(TransportError::Disconnected);
        assert!(next_delay(&Backoff::default(), &err, 1, 3).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_completes_without_shutdown() {
        let shutdown = Shutdown::new();
        assert!(sleep_or_shutdown(Duration::from_secs(2), &shutdown).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_interrupts_sleep() {
        let shutdown = Shutdown::new();
        let trigger = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.trigger();
        });

        let started = tokio::time::Instant::now();
        assert!(!sleep_or_shutdown(Duration::from_secs(60), &shutdown).await);
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
