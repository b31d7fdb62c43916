//! Non-blocking structured logging for snip services.
//!
//! [`init`] installs a global `tracing` subscriber whose events are queued on
//! an [`AsyncHandler`] and written by a background thread, so request paths
//! never wait on stdout.

pub mod handler;
pub mod layer;
pub mod record;
pub mod sink;

pub use handler::AsyncHandler;
pub use layer::AsyncLayer;
pub use record::{Attr, HandlerContext, LogEntry, LogRecord};
pub use sink::{RecordSink, TextSink};

use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use typed_builder::TypedBuilder;

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("invalid log filter: {0}")]
    Filter(#[from] tracing_subscriber::filter::ParseError),
    #[error("failed to start log worker: {0}")]
    Worker(#[from] std::io::Error),
    #[error("failed to install global subscriber: {0}")]
    Install(#[from] tracing_subscriber::util::TryInitError),
}

#[derive(Debug, Clone, TypedBuilder)]
pub struct TelemetryConfig {
    /// Capacity of the log queue.
    #[builder(default = 100)]
    pub buffer: usize,
    /// Filter used when `RUST_LOG` is unset.
    #[builder(default = "info".to_string(), setter(into))]
    pub default_filter: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Closes the log handler when dropped, flushing everything queued.
#[must_use = "dropping the guard immediately stops logging"]
#[derive(Debug)]
pub struct LogGuard {
    handler: AsyncHandler,
}

impl LogGuard {
    pub fn handler(&self) -> &AsyncHandler {
        &self.handler
    }
}

impl Drop for LogGuard {
    fn drop(&mut self) {
        self.handler.close();
    }
}

/// Installs the global subscriber writing text lines to stdout.
pub fn init(config: TelemetryConfig) -> Result<LogGuard, TelemetryError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.default_filter)?,
    };
    let handler = AsyncHandler::new(TextSink::stdout(), config.buffer)?;

    tracing_subscriber::registry()
        .with(filter)
        .with(AsyncLayer::new(handler.clone()))
        .try_init()?;

    Ok(LogGuard { handler })
}
