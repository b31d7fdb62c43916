use parking_lot::Mutex;
use snip_core::{Repository, ShortCode};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tracing::{trace, warn};

/// Bounded, best-effort click accounting.
///
/// Resolves hand codes to [`track`](ClickTracker::track), which never waits:
/// when the queue is full the click is dropped. A single worker task applies
/// queued clicks to the repository in order.
#[derive(Debug)]
pub struct ClickTracker {
    queue: mpsc::Sender<ShortCode>,
    shutdown: Arc<Notify>,
    worker: Mutex<Option<JoinHandle<()>>>,
    dropped: AtomicU64,
}

impl ClickTracker {
    /// Spawns the worker on the current tokio runtime.
    ///
    /// A `capacity` of zero is treated as one.
    pub fn spawn<R: Repository>(repository: Arc<R>, capacity: usize) -> Self {
        let (queue, clicks) = mpsc::channel(capacity.max(1));
        let shutdown = Arc::new(Notify::new());
        let worker = tokio::spawn(run(repository, clicks, Arc::clone(&shutdown)));

        Self {
            queue,
            shutdown,
            worker: Mutex::new(Some(worker)),
            dropped: AtomicU64::new(0),
        }
    }

    /// Queues a click for `code`. Returns whether it was accepted.
    pub fn track(&self, code: &ShortCode) -> bool {
        match self.queue.try_send(code.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(code)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                trace!(code = %code, "click queue full, dropping click");
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    /// Number of clicks discarded because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Stops accepting clicks, applies everything already queued and waits
    /// for the worker to finish.
    pub async fn close(&self) {
        self.shutdown.notify_one();
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                warn!(error = %e, "click worker terminated abnormally");
            }
        }
    }
}

async fn run<R: Repository>(
    repository: Arc<R>,
    mut clicks: mpsc::Receiver<ShortCode>,
    shutdown: Arc<Notify>,
) {
    loop {
        tokio::select! {
            click = clicks.recv() => match click {
                Some(code) => apply(repository.as_ref(), &code).await,
                None => return,
            },
            () = shutdown.notified() => break,
        }
    }

    clicks.close();
    while let Some(code) = clicks.recv().await {
        apply(repository.as_ref(), &code).await;
    }
}

async fn apply<R: Repository>(repository: &R, code: &ShortCode) {
    if let Err(e) = repository.record_click(code).await {
        warn!(code = %code, error = %e, "failed to record click");
    }
}
