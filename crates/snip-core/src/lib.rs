//! Core types and traits for the snip URL shortener.
//!
//! This crate provides the domain types, the storage capability trait and
//! the error taxonomy shared by the storage backends, the shortening
//! service and the HTTP gateway.

pub mod error;
pub mod repository;
pub mod shortcode;
pub mod shortener;

pub use error::{CoreError, ShortenerError, StorageError};
pub use repository::{Repository, UrlRecord};
pub use shortcode::ShortCode;
pub use shortener::{ExpirationPolicy, ShortenParams, Shortener};
