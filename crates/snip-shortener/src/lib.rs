//! URL shortener service implementation.
//!
//! This crate ties a code generator, a repository and an in-process LRU
//! cache together. Core types are re-exported from `snip_core`.

pub mod service;
pub mod stats;

pub use service::{CachedUrl, ShortenerService, ShortenerSettings, UrlCache};
pub use snip_core::{ExpirationPolicy, ShortCode, ShortenParams, Shortener, ShortenerError};
pub use stats::ClickTracker;
