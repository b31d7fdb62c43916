use crate::record::{Attr, HandlerContext, LogEntry, LogRecord};
use crate::sink::RecordSink;
use crossbeam::channel::{self, Receiver, Sender, TrySendError};
use parking_lot::{Mutex, RwLock};
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

/// State shared by a handler and every handler derived from it.
struct Shared {
    queue: Sender<LogEntry>,
    /// Admission gate. Producers enqueue under the read side; `close` flips
    /// the flag under the write side, so nothing is admitted afterwards.
    closed: RwLock<bool>,
    /// Dropping this sender tells the worker to drain and exit.
    done: Mutex<Option<Sender<()>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    dropped: AtomicU64,
}

/// A non-blocking log handler backed by a bounded queue and one worker thread.
///
/// Producers never wait: when the queue is full the entry is discarded and
/// counted. [`close`](AsyncHandler::close) stops admission, forwards every
/// admitted entry to the sink in arrival order and joins the worker.
///
/// Handlers derived with [`with_attrs`](AsyncHandler::with_attrs) and
/// [`with_group`](AsyncHandler::with_group) feed the same queue and worker.
/// Closing any of them closes all of them.
#[derive(Clone)]
pub struct AsyncHandler {
    shared: Arc<Shared>,
    context: Arc<HandlerContext>,
}

impl AsyncHandler {
    /// Starts the worker thread. A `capacity` of zero is treated as one.
    pub fn new<S: RecordSink>(sink: S, capacity: usize) -> io::Result<Self> {
        let (queue, entries) = channel::bounded(capacity.max(1));
        let (done, shutdown) = channel::bounded::<()>(0);

        let worker = std::thread::Builder::new()
            .name("log-sink".to_string())
            .spawn(move || run(sink, entries, shutdown))?;

        Ok(Self {
            shared: Arc::new(Shared {
                queue,
                closed: RwLock::new(false),
                done: Mutex::new(Some(done)),
                worker: Mutex::new(Some(worker)),
                dropped: AtomicU64::new(0),
            }),
            context: Arc::new(HandlerContext::default()),
        })
    }

    /// Enqueues `record` without blocking. Returns whether it was admitted.
    pub fn handle(&self, record: LogRecord) -> bool {
        let closed = self.shared.closed.read();
        if *closed {
            return false;
        }

        let entry = LogEntry {
            context: Arc::clone(&self.context),
            record,
        };
        match self.shared.queue.try_send(entry) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.shared.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// Returns a handler that attaches `attrs` to every record it handles.
    ///
    /// Keys are qualified with the groups open on this handler.
    pub fn with_attrs(&self, attrs: impl IntoIterator<Item = Attr>) -> Self {
        let mut context = HandlerContext::clone(&self.context);
        for attr in attrs {
            let key = self.context.qualify(&attr.key);
            context.attrs.push(Attr::new(key, attr.value));
        }
        self.derive(context)
    }

    /// Returns a handler whose later attributes and record fields are nested
    /// under `name`. An empty name returns an equivalent handler.
    pub fn with_group(&self, name: &str) -> Self {
        if name.is_empty() {
            return self.clone();
        }
        let mut context = HandlerContext::clone(&self.context);
        context.groups.push(name.to_string());
        self.derive(context)
    }

    fn derive(&self, context: HandlerContext) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            context: Arc::new(context),
        }
    }

    /// Stops admission, drains the queue through the sink and joins the worker.
    ///
    /// Blocks until the drain has finished. Calling it again is a no-op.
    pub fn close(&self) {
        *self.shared.closed.write() = true;
        drop(self.shared.done.lock().take());

        // Held across the join so a concurrent caller also waits for the drain.
        let mut worker = self.shared.worker.lock();
        if let Some(handle) = worker.take() {
            let _ = handle.join();
        }
    }

    pub fn is_closed(&self) -> bool {
        *self.shared.closed.read()
    }

    /// Number of records discarded because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }

    pub fn context(&self) -> &HandlerContext {
        &self.context
    }
}

impl std::fmt::Debug for AsyncHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncHandler")
            .field("context", &self.context)
            .field("closed", &self.is_closed())
            .field("dropped", &self.dropped())
            .finish()
    }
}

fn run<S: RecordSink>(mut sink: S, entries: Receiver<LogEntry>, shutdown: Receiver<()>) {
    loop {
        channel::select! {
            recv(entries) -> entry => match entry {
                Ok(entry) => {
                    let _ = sink.handle(&entry);
                }
                Err(_) => break,
            },
            recv(shutdown) -> _ => {
                for entry in entries.try_iter() {
                    let _ = sink.handle(&entry);
                }
                break;
            }
        }
    }
    let _ = sink.flush();
}
