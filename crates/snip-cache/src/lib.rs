//! Bounded in-process caches shared across snip services.

pub mod lru;

pub use lru::LruCache;
