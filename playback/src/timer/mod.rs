//! Timer abstraction for playback.
//!
//! Countdown and video gating never read the wall clock or spawn tasks
//! directly; they go through an injected [`Timer`]:
//!
//! - [`Clock`] gives a monotonic "now"
//! - [`Scheduler`] runs one-shot or repeating callbacks on the event loop
//!
//! Every scheduled callback returns a [`TimerHandle`]. Cancelling is idempotent
//! and dropping the handle cancels, so tearing down a session can never leave
//! a callback firing afterwards.

pub mod manual;
pub mod runtime;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub use manual::ManualTimer;
pub use runtime::TokioTimer;

/// What a repeating callback wants next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerControl {
    Continue,
    Stop,
}

/// Monotonic time source.
pub trait Clock: Send + Sync {
    /// Time elapsed since an arbitrary fixed origin.
    fn now(&self) -> Duration;
}

/// Callback scheduler bound to a single event loop.
pub trait Scheduler: Send + Sync {
    /// Run `task` once after `delay`.
    fn schedule_once(&self, delay: Duration, task: Box<dyn FnOnce() + Send>) -> TimerHandle;

    /// Run `task` every `period` until it returns [`TimerControl::Stop`] or the
    /// handle is cancelled. The first call happens one period from now.
    fn schedule_repeating(
        &self,
        period: Duration,
        task: Box<dyn FnMut() -> TimerControl + Send>,
    ) -> TimerHandle;
}

/// Clock plus scheduler, as injected into sessions.
pub trait Timer: Clock + Scheduler {}

impl<T: Clock + Scheduler> Timer for T {}

/// Cancels a scheduled callback. Dropping the handle cancels it.
#[derive(Debug)]
pub struct TimerHandle {
    cancelled: Arc<AtomicBool>,
    abort: Option<tokio::task::AbortHandle>,
}

impl TimerHandle {
    /// Handle guarded only by the shared cancel flag.
    pub fn new(cancelled: Arc<AtomicBool>) -> Self {
        Self {
            cancelled,
            abort: None,
        }
    }

    /// Handle that also aborts a spawned task.
    pub fn with_abort(cancelled: Arc<AtomicBool>, abort: tokio::task::AbortHandle) -> Self {
        Self {
            cancelled,
            abort: Some(abort),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        if let Some(abort) = &self.abort {
            abort.abort();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Whole seconds between two clock readings.
pub(crate) fn whole_seconds(from: Duration, to: Duration) -> u64 {
    to.saturating_sub(from).as_secs()
}
