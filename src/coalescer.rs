//! Coalescing (debounce) primitive
//!
//! Bursts of high-frequency calls collapse into one invocation after a quiet
//! period, carrying the arguments of the last call in the burst.
//!
//! Two renditions share those semantics:
//! - [`CoalescingWindow`]: a clock-agnostic state machine driven by explicit
//!   millisecond timestamps (trace replay, FFI hosts that own the clock).
//! - [`Coalescer`]: a live wrapper backed by a Tokio timer task.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Default quiet period for scroll sampling
pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_millis(100);

fn duration_to_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// A single pending call keyed by its deadline
#[derive(Debug, Clone)]
pub struct CoalescingWindow<A> {
    quiet_ms: u64,
    pending: Option<(u64, A)>,
}

impl<A> CoalescingWindow<A> {
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet_ms: duration_to_ms(quiet),
            pending: None,
        }
    }

    pub fn quiet_period(&self) -> Duration {
        Duration::from_millis(self.quiet_ms)
    }

    /// Replace any pending call; the new deadline is `now_ms + quiet`.
    pub fn schedule(&mut self, now_ms: u64, args: A) {
        self.pending = Some((now_ms.saturating_add(self.quiet_ms), args));
    }

    /// Take the pending arguments if their deadline has been reached.
    pub fn take_due(&mut self, now_ms: u64) -> Option<A> {
        match self.pending {
            Some((deadline, _)) if now_ms >= deadline => self.pending.take().map(|(_, args)| args),
            _ => None,
        }
    }

    /// Take the pending arguments regardless of the deadline (end of stream).
    pub fn flush(&mut self) -> Option<A> {
        self.pending.take().map(|(_, args)| args)
    }

    pub fn deadline(&self) -> Option<u64> {
        self.pending.as_ref().map(|(deadline, _)| *deadline)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Discard the pending call. Returns whether one was discarded.
    pub fn cancel(&mut self) -> bool {
        self.pending.take().is_some()
    }
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

type BoxedHandler<A> = Box<dyn FnMut(A) + Send>;

struct Shared<A> {
    handler: Mutex<BoxedHandler<A>>,
    generation: AtomicU64,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl<A> Shared<A> {
    fn fire(&self, generation: u64, args: A) {
        // Checked under the handler lock so a call that lands while an
        // earlier invocation runs still supersedes these args.
        let mut handler = lock(&self.handler);
        if self.generation.load(Ordering::SeqCst) != generation {
            return;
        }
        (handler)(args);
    }

    fn replace_pending(&self, next: Option<JoinHandle<()>>) -> Option<JoinHandle<()>> {
        std::mem::replace(&mut *lock(&self.pending), next)
    }
}

/// Live debounced wrapper around a handler.
///
/// Every [`call`](Coalescer::call) cancels the pending timer and schedules a
/// new one `quiet` after the latest call. Dropping the coalescer discards any
/// pending call, so nothing fires into a torn-down scope.
pub struct Coalescer<A> {
    quiet: Duration,
    runtime: Handle,
    shared: Arc<Shared<A>>,
}

impl<A: Send + 'static> Coalescer<A> {
    /// Wrap `handler` on the current Tokio runtime.
    ///
    /// # Panics
    /// Panics when called outside of a Tokio runtime context.
    pub fn new<F>(quiet: Duration, handler: F) -> Self
    where
        F: FnMut(A) + Send + 'static,
    {
        Self::with_handle(Handle::current(), quiet, handler)
    }

    /// Wrap `handler`, spawning timers on `runtime`.
    pub fn with_handle<F>(runtime: Handle, quiet: Duration, handler: F) -> Self
    where
        F: FnMut(A) + Send + 'static,
    {
        Self {
            quiet,
            runtime,
            shared: Arc::new(Shared {
                handler: Mutex::new(Box::new(handler)),
                generation: AtomicU64::new(0),
                pending: Mutex::new(None),
            }),
        }
    }

    pub fn quiet_period(&self) -> Duration {
        self.quiet
    }

    /// Schedule `handler(args)`, superseding any pending call.
    pub fn call(&self, args: A) {
        let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let deadline = Instant::now() + self.quiet;
        let shared = Arc::clone(&self.shared);

        let task = self.runtime.spawn(async move {
            tokio::time::sleep_until(deadline).await;
            shared.fire(generation, args);
        });

        if let Some(previous) = self.shared.replace_pending(Some(task)) {
            previous.abort();
        }
    }

    /// Discard the pending call, if any.
    pub fn cancel(&self) {
        self.shared.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(previous) = self.shared.replace_pending(None) {
            previous.abort();
        }
    }

    pub fn is_pending(&self) -> bool {
        lock(&self.shared.pending)
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }
}

impl<A> Drop for Coalescer<A> {
    fn drop(&mut self) {
        self.shared.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(task) = self.shared.replace_pending(None) {
            task.abort();
        }
    }
}
