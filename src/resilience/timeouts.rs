//! Timeout enforcement.
//!
//! Every transport attempt runs under a deadline. When the deadline passes the
//! attempt future is dropped; a late reply from the broker is discarded.

use std::future::Future;
use std::time::Duration;

use crate::client::CallError;
use crate::transport::TransportError;

/// Run one transport attempt under `timeout`.
pub async fn bounded<F, T>(timeout: Duration, attempt: F) -> Result<T, CallError>
where
    F: Future<Output = Result<T, TransportError>>,
{
    match tokio::time::timeout(timeout, attempt).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(CallError::Transport(e)),
        Err(_) => Err(CallError::Timeout {
            timeout_ms: timeout.as_millis() as u64,
        }),
    }
}
