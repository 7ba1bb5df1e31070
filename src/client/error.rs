//! Failure taxonomy surfaced to callers.

use thiserror::Error;

use crate::transport::TransportError;

/// Errors returned by a resilient call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CallError {
    /// The breaker for this key is open; no attempt was made.
    #[error("circuit breaker {destination}:{operation} is OPEN")]
    CircuitOpen { destination: String, operation: String },

    /// An attempt exceeded its time budget.
    #[error("attempt timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },

    /// Broker unreachable or connection failure.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The destination replied with an explicit failure.
    #[error("remote application error: {0}")]
    RemoteApplication(String),

    /// No client is registered under this destination name.
    #[error("unknown destination '{0}'")]
    UnknownDestination(String),

    /// The operation key was empty.
    #[error("operation key must not be empty")]
    InvalidOperation,

    /// Payload or reply could not be converted.
    #[error("codec error: {0}")]
    Codec(String),

    /// Shutdown began before the call could complete.
    #[error("call aborted: shutting down")]
    ShuttingDown,
}

impl CallError {
    /// Whether the call layer retries this error locally.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CallError::Timeout { .. } | CallError::Transport(_) | CallError::RemoteApplication(_)
        )
    }

    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            CallError::CircuitOpen { .. } => "circuit_open",
            CallError::Timeout { .. } => "timeout",
            CallError::Transport(_) => "transport",
            CallError::RemoteApplication(_) => "remote_application",
            CallError::UnknownDestination(_) => "unknown_destination",
            CallError::InvalidOperation => "invalid_operation",
            CallError::Codec(_) => "codec",
            CallError::ShuttingDown => "shutting_down",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classes() {
        assert!(CallError::Timeout { timeout_ms: 1 }.is_retryable());
        assert!(CallError::Transport(TransportError::Disconnected).is_retryable());
        assert!(CallError::RemoteApplication("nope".into()).is_retryable());

        assert!(!CallError::CircuitOpen {
            destination: "a".into(),
            operation: "b".into()
        }
        .is_retryable());
        assert!(!CallError::UnknownDestination("x".into()).is_retryable());
        assert!(!CallError::ShuttingDown.is_retryable());
    }

    #[test]
    fn test_display() {
        let err = CallError::CircuitOpen {
            destination: "lesson".into(),
            operation: "get-lesson".into(),
        };
        assert_eq!(err.to_string(), "circuit breaker lesson:get-lesson is OPEN");
    }
}
