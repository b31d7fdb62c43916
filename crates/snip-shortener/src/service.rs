use crate::stats::ClickTracker;
use async_trait::async_trait;
use jiff::Timestamp;
use snip_cache::LruCache;
use snip_core::repository::is_expired;
use snip_core::{Repository, ShortCode, ShortenParams, Shortener, ShortenerError, StorageError};
use snip_generator::Generator;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use typed_builder::TypedBuilder;

/// What the resolve path keeps per code.
///
/// The expiry travels with the URL so a cached entry never outlives its record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedUrl {
    pub original_url: String,
    pub expires_at: Option<Timestamp>,
}

impl CachedUrl {
    pub fn is_expired_at(&self, now: Timestamp) -> bool {
        is_expired(self.expires_at, now)
    }
}

pub type UrlCache = LruCache<ShortCode, CachedUrl>;

#[derive(Debug, Clone, TypedBuilder)]
pub struct ShortenerSettings {
    /// Total create attempts before giving up on collisions.
    #[builder(default = 5)]
    pub max_attempts: u32,
    #[builder(default = Duration::from_millis(500))]
    pub shorten_timeout: Duration,
    #[builder(default = Duration::from_millis(200))]
    pub resolve_timeout: Duration,
}

impl Default for ShortenerSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// A concrete implementation of the `Shortener` trait.
///
/// This service wraps a `Repository`, a `Generator` and an LRU cache:
/// - Shorten generates codes until the repository accepts one, retrying only
///   on collisions, then writes the new mapping through to the cache.
/// - Resolve is cache-aside: hits never touch the repository, misses fill
///   the cache from it.
///
/// Both operations run under their own deadline; when it passes the pending
/// repository call is dropped.
#[derive(Debug)]
pub struct ShortenerService<R, G> {
    repository: Arc<R>,
    generator: Arc<G>,
    cache: Arc<UrlCache>,
    clicks: Option<Arc<ClickTracker>>,
    settings: ShortenerSettings,
}

impl<R: Repository, G: Generator> ShortenerService<R, G> {
    pub fn new(repository: Arc<R>, generator: G, cache: Arc<UrlCache>) -> Self {
        Self {
            repository,
            generator: Arc::new(generator),
            cache,
            clicks: None,
            settings: ShortenerSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: ShortenerSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Counts a click for every successful resolve.
    pub fn with_click_tracker(mut self, clicks: Arc<ClickTracker>) -> Self {
        self.clicks = Some(clicks);
        self
    }

    pub fn settings(&self) -> &ShortenerSettings {
        &self.settings
    }

    fn validate_url(url: &str) -> Result<(), ShortenerError> {
        if url.trim().is_empty() {
            return Err(ShortenerError::InvalidUrl(
                "URL cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    async fn create_with_retry(
        &self,
        original_url: &str,
        expires_at: Option<Timestamp>,
    ) -> Result<ShortCode, ShortenerError> {
        let max_attempts = self.settings.max_attempts.max(1);
        let mut last_conflict = None;

        for attempt in 1..=max_attempts {
            let code: ShortCode = self.generator.generate().into();

            match self.repository.create(&code, original_url, expires_at).await {
                Ok(()) => {
                    self.cache.set(
                        code.clone(),
                        CachedUrl {
                            original_url: original_url.to_string(),
                            expires_at,
                        },
                    );
                    info!(code = %code, original_url, attempt, "short url created");
                    return Ok(code);
                }
                Err(err @ StorageError::Conflict(_)) => {
                    debug!(code = %code, attempt, "short code collision, retrying");
                    last_conflict = Some(err);
                }
                Err(err) => {
                    error!(code = %code, error = %err, "failed to create short url");
                    return Err(ShortenerError::Storage(err));
                }
            }
        }

        let source = last_conflict
            .unwrap_or_else(|| StorageError::Conflict("no attempt was made".to_string()));
        error!(attempts = max_attempts, error = %source, "short code space exhausted");
        Err(ShortenerError::Exhausted {
            attempts: max_attempts,
            source,
        })
    }

    fn track_click(&self, code: &ShortCode) {
        if let Some(clicks) = &self.clicks {
            clicks.track(code);
        }
    }
}

#[async_trait]
impl<R: Repository, G: Generator> Shortener for ShortenerService<R, G> {
    async fn shorten(&self, params: ShortenParams) -> Result<ShortCode, ShortenerError> {
        Self::validate_url(&params.original_url)?;
        let expires_at = params.expiration.resolve(Timestamp::now())?;

        let timeout = self.settings.shorten_timeout;
        tokio::time::timeout(timeout, self.create_with_retry(&params.original_url, expires_at))
            .await
            .map_err(|_| {
                warn!(?timeout, "shorten timed out");
                ShortenerError::Timeout {
                    operation: "shorten",
                    timeout,
                }
            })?
    }

    async fn resolve(&self, code: &ShortCode) -> Result<String, ShortenerError> {
        match self.cache.get(code) {
            Some(cached) if !cached.is_expired_at(Timestamp::now()) => {
                debug!(code = %code, "cache hit");
                self.track_click(code);
                return Ok(cached.original_url);
            }
            Some(_) => debug!(code = %code, "cached entry expired"),
            None => debug!(code = %code, "cache miss"),
        }

        let timeout = self.settings.resolve_timeout;
        let record = tokio::time::timeout(timeout, self.repository.get_by_code(code))
            .await
            .map_err(|_| {
                warn!(code = %code, ?timeout, "resolve timed out");
                ShortenerError::Timeout {
                    operation: "resolve",
                    timeout,
                }
            })?
            .map_err(|err| match err {
                StorageError::NotFound(_) => ShortenerError::NotFound(code.to_string()),
                other => {
                    error!(code = %code, error = %other, "failed to resolve short url");
                    ShortenerError::Storage(other)
                }
            })?;

        self.cache.set(
            code.clone(),
            CachedUrl {
                original_url: record.original_url.clone(),
                expires_at: record.expires_at,
            },
        );
        self.track_click(code);
        Ok(record.original_url)
    }
}
