//! One-shot timers backed by tokio.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::AbortHandle;

/// A callback scheduled to run once after a delay.
///
/// Cancelling is idempotent and a no-op once the callback has fired.
/// Cloning yields another handle to the same timer.
#[derive(Clone)]
pub struct Timer {
    inner: Arc<TimerInner>,
}

struct TimerInner {
    abort: AbortHandle,
    fired: Arc<AtomicBool>,
    cancelled: AtomicBool,
}

impl Timer {
    /// Schedule `f` to run after `delay`. Must be called inside a tokio runtime.
    pub fn after<F>(delay: Duration, f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let fired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&fired);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            flag.store(true, Ordering::SeqCst);
            f();
        });
        Self {
            inner: Arc::new(TimerInner {
                abort: handle.abort_handle(),
                fired,
                cancelled: AtomicBool::new(false),
            }),
        }
    }

    /// Stop the timer. Returns `true` if this call prevented the callback.
    pub fn cancel(&self) -> bool {
        if self.inner.cancelled.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.inner.abort.abort();
        !self.inner.fired.load(Ordering::SeqCst)
    }

    pub fn has_fired(&self) -> bool {
        self.inner.fired.load(Ordering::SeqCst)
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Identity shared by every clone of this timer.
    pub(crate) fn key(&self) -> usize {
        Arc::as_ptr(&self.inner) as usize
    }
}

impl fmt::Debug for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timer")
            .field("fired", &self.has_fired())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
