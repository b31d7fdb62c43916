use crate::error::StorageError;
use crate::shortcode::ShortCode;
use async_trait::async_trait;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// Result type for repository operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// A stored URL record in the repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UrlRecord {
    /// The unique short code of this record.
    pub code: ShortCode,
    /// The original URL that was shortened.
    pub original_url: String,
    /// When the record was created.
    pub created_at: Timestamp,
    /// When the record expires, if ever.
    pub expires_at: Option<Timestamp>,
    /// How many times the code has been resolved.
    pub click_count: u64,
}

impl UrlRecord {
    /// Returns `true` if the record has expired at `now`.
    ///
    /// A record expires strictly after its `expires_at` instant.
    pub fn is_expired_at(&self, now: Timestamp) -> bool {
        is_expired(self.expires_at, now)
    }
}

/// Shared expiry rule for anything carrying an optional expiration instant.
pub fn is_expired(expires_at: Option<Timestamp>, now: Timestamp) -> bool {
    expires_at.is_some_and(|expires_at| now > expires_at)
}

/// The authoritative store for short code records.
///
/// Every backend must enforce code uniqueness on [`create`](Repository::create)
/// and treat expired records as absent on [`get_by_code`](Repository::get_by_code).
/// Cancellation is expressed by dropping the returned future.
#[async_trait]
pub trait Repository: Send + Sync + 'static {
    /// Idempotent schema/state initialization.
    async fn migrate(&self) -> Result<()>;

    /// Inserts a new record. Returns `Err(StorageError::Conflict)` if the code already exists.
    async fn create(
        &self,
        code: &ShortCode,
        original_url: &str,
        expires_at: Option<Timestamp>,
    ) -> Result<()>;

    /// Retrieves the record for a given short code.
    /// Returns `Err(StorageError::NotFound)` if the code does not exist or has expired.
    async fn get_by_code(&self, code: &ShortCode) -> Result<UrlRecord>;

    /// Increments the click counter of a record. Unknown codes are ignored.
    async fn record_click(&self, code: &ShortCode) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use jiff::SignedDuration;

    fn record(expires_at: Option<Timestamp>) -> UrlRecord {
        UrlRecord {
            code: ShortCode::new_unchecked("abc123"),
            original_url: "https://example.com".to_string(),
            created_at: Timestamp::now(),
            expires_at,
            click_count: 0,
        }
    }

    #[test]
    fn never_expiring_record() {
        assert!(!record(None).is_expired_at(Timestamp::now()));
    }

    #[test]
    fn expiry_is_strictly_after_deadline() {
        let deadline = Timestamp::now();
        let rec = record(Some(deadline));

        assert!(!rec.is_expired_at(deadline));
        assert!(rec.is_expired_at(deadline + SignedDuration::from_millis(1)));
        assert!(!rec.is_expired_at(deadline - SignedDuration::from_secs(1)));
    }
}
