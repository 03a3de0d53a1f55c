//! Errors raised by a single call to the generation service.

use std::time::Duration;

use thiserror::Error;

/// Failure of one attempt against the external service.
///
/// These never reach the engine: the adapter either retries them or turns
/// them into a degraded fallback.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    /// The attempt did not complete within the configured timeout.
    #[error("generation timed out after {0:?}")]
    Timeout(Duration),

    /// The service answered but the payload could not be used.
    #[error("malformed generation response: {0}")]
    Malformed(String),

    /// The request never reached the service or the connection broke.
    #[error("generation transport error: {0}")]
    Transport(String),

    /// The service answered with a non-success status.
    #[error("generation service returned {status}: {message}")]
    Upstream {
        /// HTTP status code.
        status: u16,
        /// Response body or reason.
        message: String,
    },

    /// No generation endpoint is configured.
    #[error("generation service is not configured")]
    Unconfigured,
}

impl GenerationError {
    /// Returns `true` if another attempt may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::Malformed(_) | Self::Transport(_) => true,
            Self::Upstream { status, .. } => *status == 429 || *status >= 500,
            Self::Unconfigured => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_errors_and_rate_limits_are_transient() {
        let server = GenerationError::Upstream {
            status: 503,
            message: "unavailable".into(),
        };
        let limited = GenerationError::Upstream {
            status: 429,
            message: "slow down".into(),
        };

        assert!(server.is_transient());
        assert!(limited.is_transient());
        assert!(GenerationError::Timeout(Duration::from_secs(1)).is_transient());
    }

    #[test]
    fn test_client_errors_are_not_transient() {
        let unauthorized = GenerationError::Upstream {
            status: 401,
            message: "bad key".into(),
        };

        assert!(!unauthorized.is_transient());
    }
}
