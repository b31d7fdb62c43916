use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("invalid short code: {0}")]
    InvalidShortCode(String),
}

/// Errors reported by [`Repository`](crate::Repository) implementations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    /// The short code is already taken. Callers minting random codes retry on this.
    #[error("short code already exists: {0}")]
    Conflict(String),
    /// The short code is unknown or its record has expired.
    #[error("short url not found: {0}")]
    NotFound(String),
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
    #[error("storage operation timed out: {0}")]
    Timeout(String),
    #[error("storage query failed: {0}")]
    Query(String),
    #[error("stored data is invalid: {0}")]
    InvalidData(String),
}

/// Errors returned by the shortening service.
#[derive(Debug, Clone, Error)]
pub enum ShortenerError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("invalid expiration: {0}")]
    InvalidExpiration(String),
    #[error("short url not found: {0}")]
    NotFound(String),
    #[error("failed to generate unique short code after {attempts} attempts: {source}")]
    Exhausted {
        attempts: u32,
        #[source]
        source: StorageError,
    },
    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },
    #[error("storage error: {0}")]
    Storage(#[source] StorageError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn exhausted_names_attempts_and_last_collision() {
        let err = ShortenerError::Exhausted {
            attempts: 5,
            source: StorageError::Conflict("aB3_xY9-".to_string()),
        };

        let message = err.to_string();
        assert!(message.contains("5 attempts"), "{message}");
        assert!(message.contains("aB3_xY9-"), "{message}");

        let source = err.source().expect("exhaustion keeps its cause");
        assert_eq!(source.to_string(), "short code already exists: aB3_xY9-");
    }

    #[test]
    fn timeout_message_names_operation() {
        let err = ShortenerError::Timeout {
            operation: "resolve",
            timeout: Duration::from_millis(200),
        };
        assert_eq!(err.to_string(), "resolve timed out after 200ms");
    }
}
