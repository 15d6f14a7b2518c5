//! Per-request resource registry.
//!
//! Anything opened while a request is processed (streams, timers, spawned
//! work) is registered here and released when the first trigger fires:
//! - the chain calls [`Closables::close_early`]
//! - the future handed to [`Closables::close_on`] completes, normally the
//!   end of the response write
//! - the connection the request arrived on closes, until `close_on` moves
//!   the trigger elsewhere
//!
//! # Invariants
//! - The registry transitions to closed exactly once; every trigger goes
//!   through one atomic flag.
//! - Every entry is closed at most once. Registering the same `Arc` or timer
//!   again is a no-op, before and after the transition. Entries registered
//!   after the transition are closed immediately by the registering caller.
//! - A failing entry never stops the sweep; its error goes to the sink.
//! - Task entries hold an `AbortHandle`, which neither owns the task nor
//!   keeps its output alive.
//!
//! Appends and the sweep only contend for the entry lock briefly: the sweep
//! takes the list under the lock and closes entries outside it. Closed
//! entries are kept until the registry drops, so identities stay unique.

use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::mem;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::{AbortHandle, JoinHandle};

use super::timer::Timer;
use crate::error::{panic_message, Error, ResourceCloseError};
use crate::net::ConnectionClosed;
use crate::observability::{metrics, ErrorSink, LoggingSink};

/// Something that holds a resource and can release it.
pub trait Closeable: Send + Sync {
    fn close(&self) -> Result<(), ResourceCloseError>;
}

impl<C: Closeable + ?Sized> Closeable for Arc<C> {
    fn close(&self) -> Result<(), ResourceCloseError> {
        (**self).close()
    }
}

enum Entry {
    Resource {
        key: usize,
        resource: Box<dyn Closeable>,
    },
    Callback(Option<Box<dyn FnOnce() + Send>>),
    Timer(Timer),
    Task(AbortHandle),
}

impl Entry {
    fn label(&self) -> &'static str {
        match self {
            Entry::Resource { .. } => "resource",
            Entry::Callback(_) => "callback",
            Entry::Timer(_) => "timer",
            Entry::Task(_) => "task",
        }
    }

    /// Identity used to skip repeated registrations.
    fn key(&self) -> Option<usize> {
        match self {
            Entry::Resource { key, .. } => Some(*key),
            Entry::Timer(timer) => Some(timer.key()),
            Entry::Callback(_) | Entry::Task(_) => None,
        }
    }

    fn close(&mut self) -> Result<(), ResourceCloseError> {
        let label = self.label();
        let result = catch_unwind(AssertUnwindSafe(|| match self {
            Entry::Resource { resource, .. } => resource.close(),
            Entry::Callback(f) => {
                if let Some(f) = f.take() {
                    f();
                }
                Ok(())
            }
            Entry::Timer(timer) => {
                timer.cancel();
                Ok(())
            }
            Entry::Task(handle) => {
                handle.abort();
                Ok(())
            }
        }));
        match result {
            Ok(outcome) => outcome,
            Err(payload) => Err(ResourceCloseError::new(
                label,
                format!("panicked while closing: {}", panic_message(payload.as_ref())),
            )),
        }
    }
}

#[derive(Default)]
struct Entries {
    pending: Vec<Entry>,
    keys: HashSet<usize>,
    retired: Vec<Entry>,
}

struct Inner {
    closed: AtomicBool,
    entries: Mutex<Entries>,
    watcher: Mutex<Option<AbortHandle>>,
    sink: Arc<dyn ErrorSink>,
}

impl Inner {
    fn entries(&self) -> MutexGuard<'_, Entries> {
        // A panic while holding the lock cannot leave the lists inconsistent.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn close_one(&self, entry: &mut Entry) -> bool {
        match entry.close() {
            Ok(()) => true,
            Err(e) => {
                self.sink.report_internal_error(&Error::ResourceClose(e));
                false
            }
        }
    }

    /// Replace the task that sweeps on an external trigger.
    fn set_watcher(&self, handle: AbortHandle) {
        let previous = self
            .watcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
    }
}

/// Registry of resources to release when a request is done with them.
///
/// Cloning yields another handle to the same registry.
#[derive(Clone)]
pub struct Closables {
    inner: Arc<Inner>,
}

impl fmt::Debug for Closables {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Closables")
            .field("closed", &self.is_closed())
            .field("pending", &self.pending())
            .finish()
    }
}

impl Default for Closables {
    fn default() -> Self {
        Self::new(Arc::new(LoggingSink))
    }
}

impl Closables {
    /// A registry that only closes when told to.
    pub fn new(sink: Arc<dyn ErrorSink>) -> Self {
        Self {
            inner: Arc::new(Inner {
                closed: AtomicBool::new(false),
                entries: Mutex::new(Entries::default()),
                watcher: Mutex::new(None),
                sink,
            }),
        }
    }

    /// A registry that also closes when `connection` closes.
    ///
    /// Must be called inside a tokio runtime.
    pub fn bound_to(connection: ConnectionClosed, sink: Arc<dyn ErrorSink>) -> Self {
        let closables = Self::new(sink);
        if connection.is_closed() {
            closables.sweep("connection_closed");
            return closables;
        }
        let connection_id = connection.connection_id();
        closables.watch("connection_closed", async move {
            connection.wait().await;
            tracing::debug!(connection_id = %connection_id, "Connection closed, releasing request resources");
        });
        closables
    }

    /// Close when `trigger` completes instead of when the connection closes.
    ///
    /// The transport hands in the end of the response write, so resources of
    /// one request on a long-lived connection do not wait for the next ones.
    pub fn close_on<F>(&self, trigger: F)
    where
        F: Future + Send + 'static,
    {
        if self.is_closed() {
            return;
        }
        self.watch("response_complete", async move {
            trigger.await;
        });
    }

    fn watch<F>(&self, trigger: &'static str, fired: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let watched = self.clone();
        let handle = tokio::spawn(async move {
            fired.await;
            watched.sweep(trigger);
        });
        self.inner.set_watcher(handle.abort_handle());
        // The registry may have closed before the handle was stored.
        if self.is_closed() {
            handle.abort();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Entries registered and not yet closed.
    pub fn pending(&self) -> usize {
        self.inner.entries().pending.len()
    }

    /// Register a closeable resource. Registering the same `Arc` again is a
    /// no-op.
    pub fn add<C: Closeable + ?Sized + 'static>(&self, resource: Arc<C>) -> &Self {
        let key = Arc::as_ptr(&resource).cast::<()>() as usize;
        self.register(Entry::Resource {
            key,
            resource: Box::new(resource),
        })
    }

    /// Register a callback to run on close.
    pub fn add_fn<F: FnOnce() + Send + 'static>(&self, f: F) -> &Self {
        self.register(Entry::Callback(Some(Box::new(f))))
    }

    /// Register a timer to cancel on close. Clones of one timer count once.
    pub fn add_timer(&self, timer: Timer) -> &Self {
        self.register(Entry::Timer(timer))
    }

    /// Schedule `f` after `delay`, cancelled if the registry closes first.
    pub fn schedule<F: FnOnce() + Send + 'static>(&self, delay: Duration, f: F) -> Timer {
        let timer = Timer::after(delay, f);
        self.add_timer(timer.clone());
        timer
    }

    /// Register a task to abort on close. The handle does not own the task.
    pub fn add_task(&self, handle: AbortHandle) -> &Self {
        self.register(Entry::Task(handle))
    }

    /// Spawn `future` and register it for cancellation.
    pub fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let handle = tokio::spawn(future);
        self.add_task(handle.abort_handle());
        handle
    }

    /// Close everything now. Later calls and the other triggers are no-ops.
    pub fn close_early(&self) {
        self.sweep("early");
    }

    /// The request was dropped before producing a response, e.g. by the
    /// request timeout.
    pub(crate) fn close_dropped(&self) {
        self.sweep("request_dropped");
    }

    fn register(&self, entry: Entry) -> &Self {
        let mut late = {
            let mut entries = self.inner.entries();
            if let Some(key) = entry.key() {
                if !entries.keys.insert(key) {
                    tracing::trace!(kind = entry.label(), "Already registered, skipping");
                    return self;
                }
            }
            if self.inner.closed.load(Ordering::Acquire) {
                entry
            } else {
                entries.pending.push(entry);
                return self;
            }
        };
        tracing::debug!(kind = late.label(), "Registered after close, closing immediately");
        self.inner.close_one(&mut late);
        self.inner.entries().retired.push(late);
        self
    }

    fn sweep(&self, trigger: &'static str) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(watcher) = self
            .inner
            .watcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            watcher.abort();
        }
        let mut entries = mem::take(&mut self.inner.entries().pending);
        let total = entries.len();
        let failures = entries
            .iter_mut()
            .map(|entry| self.inner.close_one(entry))
            .filter(|ok| !ok)
            .count();
        self.inner.entries().retired.append(&mut entries);
        tracing::debug!(trigger, closed = total, failures, "Closables swept");
        metrics::record_sweep(trigger, total, failures);
    }
}
