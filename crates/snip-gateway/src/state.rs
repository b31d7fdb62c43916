use axum::http::header::HOST;
use axum::http::HeaderMap;
use snip_core::Shortener;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    shortener: Arc<dyn Shortener>,
    base_url: Option<String>,
}

impl AppState {
    pub fn new(shortener: Arc<dyn Shortener>) -> Self {
        Self {
            shortener,
            base_url: None,
        }
    }

    /// Fixes the public base used in generated short URLs instead of the
    /// request's `Host` header.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        self.base_url = Some(base_url.trim_end_matches('/').to_string());
        self
    }

    pub fn shortener(&self) -> &dyn Shortener {
        self.shortener.as_ref()
    }

    /// The configured base URL, or `http://<Host>` taken from the request.
    pub fn public_base(&self, headers: &HeaderMap) -> Option<String> {
        if let Some(base_url) = &self.base_url {
            return Some(base_url.clone());
        }
        let host = headers.get(HOST)?.to_str().ok()?;
        Some(format!("http://{host}"))
    }
}
