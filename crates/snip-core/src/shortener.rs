use crate::error::ShortenerError;
use crate::shortcode::ShortCode;
use async_trait::async_trait;
use jiff::{SignedDuration, Timestamp};
use serde::{Deserialize, Serialize};

type Result<T> = std::result::Result<T, ShortenerError>;

/// Expiration policy for a shortened URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExpirationPolicy {
    /// The shortened URL never expires.
    Never,
    /// The shortened URL expires after a certain duration from now.
    AfterDuration(SignedDuration),
    /// The shortened URL expires at a specific timestamp.
    AtTimestamp(Timestamp),
}

impl ExpirationPolicy {
    /// Converts the policy into an absolute expiry instant relative to `now`.
    ///
    /// Expiry instants that are not strictly in the future are rejected.
    pub fn resolve(&self, now: Timestamp) -> Result<Option<Timestamp>> {
        let expires_at = match self {
            ExpirationPolicy::Never => return Ok(None),
            ExpirationPolicy::AfterDuration(duration) => now
                .checked_add(*duration)
                .map_err(|e| ShortenerError::InvalidExpiration(format!("invalid duration: {e}")))?,
            ExpirationPolicy::AtTimestamp(timestamp) => *timestamp,
        };

        if expires_at <= now {
            return Err(ShortenerError::InvalidExpiration(format!(
                "expiration {expires_at} is not in the future"
            )));
        }

        Ok(Some(expires_at))
    }
}

/// Parameters for creating a shortened URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShortenParams {
    /// The original URL to be shortened.
    pub original_url: String,
    /// The expiration policy for the shortened URL.
    pub expiration: ExpirationPolicy,
}

impl ShortenParams {
    /// Parameters for a URL that never expires.
    pub fn new(original_url: impl Into<String>) -> Self {
        Self {
            original_url: original_url.into(),
            expiration: ExpirationPolicy::Never,
        }
    }

    pub fn with_expiration(mut self, expiration: ExpirationPolicy) -> Self {
        self.expiration = expiration;
        self
    }
}

#[async_trait]
pub trait Shortener: Send + Sync + 'static {
    /// Creates a shortened URL and returns the generated short code.
    async fn shorten(&self, params: ShortenParams) -> Result<ShortCode>;

    /// Resolves a short code to its original URL.
    /// Returns `Err(ShortenerError::NotFound)` if the code does not exist or has expired.
    async fn resolve(&self, code: &ShortCode) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_has_no_expiry() {
        let now = Timestamp::now();
        assert_eq!(ExpirationPolicy::Never.resolve(now).unwrap(), None);
    }

    #[test]
    fn after_duration_is_relative_to_now() {
        let now = Timestamp::now();
        let policy = ExpirationPolicy::AfterDuration(SignedDuration::from_hours(1));
        assert_eq!(
            policy.resolve(now).unwrap(),
            Some(now + SignedDuration::from_hours(1))
        );
    }

    #[test]
    fn past_timestamp_is_rejected() {
        let now = Timestamp::now();
        let policy = ExpirationPolicy::AtTimestamp(now - SignedDuration::from_secs(1));
        assert!(matches!(
            policy.resolve(now),
            Err(ShortenerError::InvalidExpiration(_))
        ));
    }

    #[test]
    fn negative_duration_is_rejected() {
        let now = Timestamp::now();
        let policy = ExpirationPolicy::AfterDuration(SignedDuration::from_secs(-5));
        assert!(policy.resolve(now).is_err());
    }
}
