//! Retry policy for transient classifier failures.

use crate::error::ClassifyError;
use std::time::Duration;

/// Determine whether a classifier error is worth retrying.
///
/// Retryable: timeouts, rate limits (429), server errors (5xx), connection
/// failures. Everything else (bad image, auth, 4xx) fails immediately.
pub fn is_retryable(error: &ClassifyError) -> bool {
    match error {
        ClassifyError::Timeout { .. } => true,
        ClassifyError::Remote {
            status_code,
            message,
        } => {
            if let Some(code) = status_code {
                return *code == 429 || (500..=599).contains(code);
            }
            message.contains("timed out") || message.contains("connect")
        }
        _ => false,
    }
}

/// Exponential backoff: `base_delay * 2^attempt`, capped at 30 seconds.
pub fn backoff_duration(attempt: u32, base_delay_ms: u64) -> Duration {
    let delay = base_delay_ms.saturating_mul(2u64.saturating_pow(attempt));
    Duration::from_millis(delay.min(30_000))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote(status: Option<u16>, message: &str) -> ClassifyError {
        ClassifyError::Remote {
            message: message.to_string(),
            status_code: status,
        }
    }

    #[test]
    fn test_timeout_is_retryable() {
        assert!(is_retryable(&ClassifyError::Timeout { timeout_ms: 100 }));
    }

    #[test]
    fn test_status_codes() {
        assert!(is_retryable(&remote(Some(429), "slow down")));
        assert!(is_retryable(&remote(Some(503), "unavailable")));
        assert!(!is_retryable(&remote(Some(401), "unauthorized")));
        assert!(!is_retryable(&remote(Some(400), "bad request")));
    }

    #[test]
    fn test_connection_error_without_status() {
        assert!(is_retryable(&remote(None, "error trying to connect")));
        assert!(!is_retryable(&remote(None, "invalid JSON body")));
    }

    #[test]
    fn test_decode_error_not_retryable() {
        assert!(!is_retryable(&ClassifyError::Decode("truncated".to_string())));
    }

    #[test]
    fn test_backoff() {
        assert_eq!(backoff_duration(0, 1000), Duration::from_millis(1000));
        assert_eq!(backoff_duration(2, 1000), Duration::from_millis(4000));
        assert_eq!(backoff_duration(10, 1000), Duration::from_millis(30_000));
    }
}
