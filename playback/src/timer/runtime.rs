//! Timer backed by the tokio runtime.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::{Handle, TryCurrentError};
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};
use tracing::trace;

use super::{Clock, Scheduler, TimerControl, TimerHandle};

/// Schedules callbacks as tasks on a tokio runtime.
///
/// Time is read through `tokio::time`, so paused test runtimes drive it too.
#[derive(Debug, Clone)]
pub struct TokioTimer {
    handle: Handle,
    origin: Instant,
}

impl TokioTimer {
    /// Create a timer that spawns onto `handle`.
    pub fn new(handle: Handle) -> Self {
        Self {
            handle,
            origin: Instant::now(),
        }
    }

    /// Create a timer for the runtime this is called from.
    pub fn try_current() -> Result<Self, TryCurrentError> {
        Handle::try_current().map(Self::new)
    }
}

impl Clock for TokioTimer {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

impl Scheduler for TokioTimer {
    fn schedule_once(&self, delay: Duration, task: Box<dyn FnOnce() + Send>) -> TimerHandle {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = cancelled.clone();

        let join = self.handle.spawn(async move {
            sleep(delay).await;
            if !flag.load(Ordering::SeqCst) {
                task();
            }
        });

        TimerHandle::with_abort(cancelled, join.abort_handle())
    }

    fn schedule_repeating(
        &self,
        period: Duration,
        mut task: Box<dyn FnMut() -> TimerControl + Send>,
    ) -> TimerHandle {
        let period = period.max(Duration::from_millis(1));
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = cancelled.clone();

        let join = self.handle.spawn(async move {
            let mut ticks = interval_at(Instant::now() + period, period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticks.tick().await;
                if flag.load(Ordering::SeqCst) {
                    break;
                }
                if task() == TimerControl::Stop {
                    trace!("Repeating timer stopped by callback");
                    break;
                }
            }
        });

        TimerHandle::with_abort(cancelled, join.abort_handle())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    #[tokio::test(start_paused = true)]
    async fn test_once_fires_after_delay() {
        let timer = TokioTimer::try_current().unwrap();
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();
        let _handle = timer.schedule_once(
            Duration::from_secs(3),
            Box::new(move || flag.store(true, Ordering::SeqCst)),
        );

        sleep(Duration::from_millis(2900)).await;
        assert!(!fired.load(Ordering::SeqCst));
        sleep(Duration::from_millis(200)).await;
        assert!(fired.load(Ordering::SeqCst));
        assert!(timer.now() >= Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeating_stops_on_cancel() {
        let timer = TokioTimer::try_current().unwrap();
        let count = Arc::new(AtomicU32::new(0));
        let counter = count.clone();
        let handle = timer.schedule_repeating(
            Duration::from_secs(1),
            Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                TimerControl::Continue
            }),
        );

        sleep(Duration::from_millis(3500)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);

        handle.cancel();
        sleep(Duration::from_secs(5)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }
}
