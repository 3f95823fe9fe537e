//! Deterministic timer driven by explicit `advance` calls.
//!
//! Used by tests and by headless drivers that replay a session without a
//! runtime. Callbacks run on the caller's thread, in due-time order, with the
//! clock set to each callback's due time while it runs.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::trace;

use super::{Clock, Scheduler, TimerControl, TimerHandle};

enum Task {
    Once(Box<dyn FnOnce() + Send>),
    Repeating {
        period: Duration,
        task: Box<dyn FnMut() -> TimerControl + Send>,
    },
}

struct Entry {
    seq: u64,
    due: Duration,
    cancelled: Arc<AtomicBool>,
    task: Task,
}

#[derive(Default)]
struct State {
    now: Duration,
    next_seq: u64,
    entries: Vec<Entry>,
}

impl State {
    fn push(&mut self, due: Duration, cancelled: Arc<AtomicBool>, task: Task) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.push(Entry {
            seq,
            due,
            cancelled,
            task,
        });
    }

    /// Remove and return the earliest entry due at or before `limit`.
    fn pop_due(&mut self, limit: Duration) -> Option<Entry> {
        self.entries.retain(|e| !e.cancelled.load(Ordering::SeqCst));
        let idx = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.due <= limit)
            .min_by_key(|(_, e)| (e.due, e.seq))
            .map(|(i, _)| i)?;
        Some(self.entries.remove(idx))
    }
}

/// Manually advanced clock and scheduler.
#[derive(Default)]
pub struct ManualTimer {
    state: Mutex<State>,
}

impl ManualTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move time forward by `by`, firing every callback that falls due.
    pub fn advance(&self, by: Duration) {
        let target = self.state().now + by;

        loop {
            let entry = {
                let mut state = self.state();
                match state.pop_due(target) {
                    Some(entry) => {
                        state.now = entry.due;
                        entry
                    }
                    None => break,
                }
            };

            trace!(due_ms = entry.due.as_millis() as u64, "Firing manual timer");
            // The lock is released while callbacks run; they may schedule more work.
            match entry.task {
                Task::Once(task) => task(),
                Task::Repeating { period, mut task } => {
                    if task() == TimerControl::Continue && !entry.cancelled.load(Ordering::SeqCst) {
                        self.state().push(
                            entry.due + period,
                            entry.cancelled,
                            Task::Repeating { period, task },
                        );
                    }
                }
            }
        }

        let mut state = self.state();
        if state.now < target {
            state.now = target;
        }
    }

    /// Convenience for `advance(Duration::from_secs(secs))`.
    pub fn advance_secs(&self, secs: u64) {
        self.advance(Duration::from_secs(secs));
    }

    /// Number of callbacks still scheduled.
    pub fn pending(&self) -> usize {
        self.state()
            .entries
            .iter()
            .filter(|e| !e.cancelled.load(Ordering::SeqCst))
            .count()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Clock for ManualTimer {
    fn now(&self) -> Duration {
        self.state().now
    }
}

impl Scheduler for ManualTimer {
    fn schedule_once(&self, delay: Duration, task: Box<dyn FnOnce() + Send>) -> TimerHandle {
        let cancelled = Arc::new(AtomicBool::new(false));
        let mut state = self.state();
        let due = state.now + delay;
        state.push(due, cancelled.clone(), Task::Once(task));
        TimerHandle::new(cancelled)
    }

    fn schedule_repeating(
        &self,
        period: Duration,
        task: Box<dyn FnMut() -> TimerControl + Send>,
    ) -> TimerHandle {
        let period = period.max(Duration::from_millis(1));
        let cancelled = Arc::new(AtomicBool::new(false));
        let mut state = self.state();
        let due = state.now + period;
        state.push(due, cancelled.clone(), Task::Repeating { period, task });
        TimerHandle::new(cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    #[test]
    fn test_once_fires_at_due_time() {
        let timer = ManualTimer::new();
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();
        let _handle = timer.schedule_once(
            Duration::from_secs(3),
            Box::new(move || flag.store(true, Ordering::SeqCst)),
        );

        timer.advance(Duration::from_millis(2999));
        assert!(!fired.load(Ordering::SeqCst));
        timer.advance(Duration::from_millis(1));
        assert!(fired.load(Ordering::SeqCst));
        assert_eq!(timer.now(), Duration::from_secs(3));
        assert_eq!(timer.pending(), 0);
    }

    #[test]
    fn test_repeating_until_stop() {
        let timer = ManualTimer::new();
        let count = Arc::new(AtomicU32::new(0));
        let counter = count.clone();
        let _handle = timer.schedule_repeating(
            Duration::from_secs(1),
            Box::new(move || {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                if n == 3 {
                    TimerControl::Stop
                } else {
                    TimerControl::Continue
                }
            }),
        );

        timer.advance_secs(10);
        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert_eq!(timer.pending(), 0);
    }

    #[test]
    fn test_cancel_and_drop() {
        let timer = ManualTimer::new();
        let count = Arc::new(AtomicU32::new(0));

        let c = count.clone();
        let handle = timer.schedule_once(
            Duration::from_secs(1),
            Box::new(move || {
                c.fetch_add(1, Ordering::SeqCst);
            }),
        );
        handle.cancel();
        handle.cancel();

        let c = count.clone();
        drop(timer.schedule_repeating(
            Duration::from_secs(1),
            Box::new(move || {
                c.fetch_add(1, Ordering::SeqCst);
                TimerControl::Continue
            }),
        ));

        timer.advance_secs(5);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_callbacks_run_in_due_order() {
        let timer = ManualTimer::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let l = log.clone();
        let _a = timer.schedule_once(Duration::from_secs(2), Box::new(move || l.lock().unwrap().push("two")));
        let l = log.clone();
        let _b = timer.schedule_once(Duration::from_secs(1), Box::new(move || l.lock().unwrap().push("one")));

        timer.advance_secs(2);
        assert_eq!(*log.lock().unwrap(), vec!["one", "two"]);
    }
}
