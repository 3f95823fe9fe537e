//! Countdown-driven assessment sessions.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tracing::debug;

use flowpath::AssessmentItem;

use super::score::{ReviewItem, ScoreResult};
use super::session::{AssessmentError, AssessmentSession, Navigation, SessionOptions};
use crate::timer::{Timer, TimerControl, TimerHandle};

/// Default length of a standalone quiz.
pub const DEFAULT_QUIZ_SECONDS: u32 = 30 * 60;

/// An [`AssessmentSession`] whose countdown runs on a scheduled one-second
/// timer. Reaching zero finishes the session with whatever was answered.
///
/// The result, however it was reached, is published on a watch channel.
/// Dropping the session cancels the countdown.
pub struct TimedSession {
    session: Arc<Mutex<AssessmentSession>>,
    results: Arc<watch::Sender<Option<ScoreResult>>>,
    countdown: TimerHandle,
}

impl TimedSession {
    /// Start a timed session of `seconds`.
    pub fn start(
        items: Vec<AssessmentItem>,
        seconds: u32,
        allow_backtrack: bool,
        timer: Arc<dyn Timer>,
    ) -> Result<Self, AssessmentError> {
        let session = AssessmentSession::new(
            items,
            SessionOptions::timed(seconds, allow_backtrack),
            timer.clone(),
        )?;
        let session = Arc::new(Mutex::new(session));
        let (tx, _rx) = watch::channel(None);
        let results = Arc::new(tx);

        let tick_session = session.clone();
        let tick_results = results.clone();
        let countdown = timer.schedule_repeating(
            Duration::from_secs(1),
            Box::new(move || {
                let mut session = lock(&tick_session);
                if let Some(result) = session.tick() {
                    tick_results.send_replace(Some(result));
                    return TimerControl::Stop;
                }
                if session.is_finished() {
                    TimerControl::Stop
                } else {
                    TimerControl::Continue
                }
            }),
        );

        Ok(Self {
            session,
            results,
            countdown,
        })
    }

    /// Watch for the result. Holds `Some` once the session finishes.
    pub fn subscribe(&self) -> watch::Receiver<Option<ScoreResult>> {
        self.results.subscribe()
    }

    pub fn select_answer(&self, index: usize, option: usize) -> Result<(), AssessmentError> {
        lock(&self.session).select_answer(index, option)
    }

    pub fn go_next(&self) -> Navigation {
        let navigation = lock(&self.session).go_next();
        if let Navigation::Finished(result) = &navigation {
            self.settle(result.clone());
        }
        navigation
    }

    pub fn go_previous(&self) -> Result<usize, AssessmentError> {
        lock(&self.session).go_previous()
    }

    /// Finish now. Idempotent, and safe to race with the countdown.
    pub fn finish(&self) -> ScoreResult {
        let result = lock(&self.session).finish();
        self.settle(result.clone());
        result
    }

    pub fn result(&self) -> Option<ScoreResult> {
        lock(&self.session).result().cloned()
    }

    pub fn is_finished(&self) -> bool {
        lock(&self.session).is_finished()
    }

    pub fn time_remaining(&self) -> Option<u32> {
        lock(&self.session).time_remaining()
    }

    pub fn current_index(&self) -> usize {
        lock(&self.session).current_index()
    }

    pub fn current_answer(&self) -> Option<usize> {
        lock(&self.session).current_answer()
    }

    pub fn review(&self) -> Result<Vec<ReviewItem>, AssessmentError> {
        lock(&self.session).review()
    }

    /// Read access to the underlying session.
    pub fn with_session<R>(&self, f: impl FnOnce(&AssessmentSession) -> R) -> R {
        f(&lock(&self.session))
    }

    fn settle(&self, result: ScoreResult) {
        if !self.countdown.is_cancelled() {
            debug!("Stopping assessment countdown");
            self.countdown.cancel();
        }
        self.results.send_replace(Some(result));
    }
}

fn lock(session: &Mutex<AssessmentSession>) -> MutexGuard<'_, AssessmentSession> {
    session.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::{ManualTimer, TokioTimer};

    fn items(n: usize) -> Vec<AssessmentItem> {
        (0..n)
            .map(|i| AssessmentItem::new(format!("Q{}", i), vec!["a".into(), "b".into()], 0))
            .collect()
    }

    #[test]
    fn test_times_out_without_interaction() {
        let timer = Arc::new(ManualTimer::new());
        let session = TimedSession::start(items(3), 2, true, timer.clone()).unwrap();
        let rx = session.subscribe();

        timer.advance_secs(1);
        assert!(rx.borrow().is_none());
        assert_eq!(session.time_remaining(), Some(1));

        timer.advance_secs(1);
        let result = rx.borrow().clone().expect("countdown should publish a result");
        assert!(result.timed_out);
        assert_eq!(result.score_percent, 0);
        assert_eq!(result.incorrect_count, 3);
        assert!(session.is_finished());
        assert_eq!(timer.pending(), 0);
    }

    #[test]
    fn test_manual_finish_stops_countdown() {
        let timer = Arc::new(ManualTimer::new());
        let session = TimedSession::start(items(2), 60, true, timer.clone()).unwrap();
        session.select_answer(0, 0).unwrap();
        timer.advance_secs(5);

        let first = session.finish();
        assert_eq!(first.time_taken_seconds, 5);
        assert_eq!(timer.pending(), 0);

        timer.advance_secs(120);
        assert_eq!(session.time_remaining(), Some(55));
        assert_eq!(session.finish(), first);
        assert!(!first.timed_out);
    }

    #[test]
    fn test_timeout_mid_navigation() {
        let timer = Arc::new(ManualTimer::new());
        let session = TimedSession::start(items(3), 1, true, timer.clone()).unwrap();
        session.select_answer(0, 0).unwrap();
        timer.advance_secs(1);

        match session.go_next() {
            Navigation::Finished(result) => assert_eq!(result.correct_count, 1),
            other => panic!("expected finished, got {:?}", other),
        }
        assert_eq!(session.go_previous().unwrap_err(), AssessmentError::Finished);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_countdown() {
        let timer = Arc::new(TokioTimer::try_current().unwrap());
        let session = TimedSession::start(items(2), 2, false, timer).unwrap();
        let mut rx = session.subscribe();

        rx.changed().await.unwrap();
        let result = rx.borrow().clone().unwrap();
        assert!(result.timed_out);
        assert_eq!(result.time_taken_seconds, 2);
    }
}
