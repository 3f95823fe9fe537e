//! Standalone timed quizzes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{info, warn};

use flowpath::AssessmentItem;
use playback::{ReviewItem, ScoreResult, TimedSession, Timer};

use crate::config::QuizConfig;
use crate::error::Result;
use crate::events::{EventBus, JourneyEvent};
use crate::store::{AssessmentAttempt, ProgressStore};

/// A running quiz.
pub struct QuizSession {
    quiz_id: String,
    session: TimedSession,
    recorded: AtomicBool,
}

impl QuizSession {
    pub fn quiz_id(&self) -> &str {
        &self.quiz_id
    }

    /// The underlying timed session, for answering and navigation.
    pub fn session(&self) -> &TimedSession {
        &self.session
    }
}

/// Final outcome shown to the learner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizOutcome {
    pub result: ScoreResult,
    pub review: Vec<ReviewItem>,
    pub passed: bool,
    /// Whether the attempt reached the store. Never blocks the result.
    pub recorded: bool,
}

/// Starts quizzes and records their attempts.
pub struct QuizRunner {
    store: Arc<dyn ProgressStore>,
    timer: Arc<dyn Timer>,
    events: Arc<EventBus>,
    config: QuizConfig,
    user_id: String,
}

impl QuizRunner {
    pub fn new(
        store: Arc<dyn ProgressStore>,
        timer: Arc<dyn Timer>,
        events: Arc<EventBus>,
        config: QuizConfig,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            store,
            timer,
            events,
            config,
            user_id: user_id.into(),
        }
    }

    /// Start a quiz. `time_limit_secs` falls back to the configured default.
    pub fn start(
        &self,
        quiz_id: impl Into<String>,
        items: Vec<AssessmentItem>,
        time_limit_secs: Option<u32>,
    ) -> Result<QuizSession> {
        let quiz_id = quiz_id.into();
        let seconds = time_limit_secs.unwrap_or(self.config.default_time_limit_secs);
        let session = TimedSession::start(items, seconds, self.config.allow_backtrack, self.timer.clone())?;
        info!(quiz_id = %quiz_id, seconds, "Quiz started");

        Ok(QuizSession {
            quiz_id,
            session,
            recorded: AtomicBool::new(false),
        })
    }

    /// Finish now and record the attempt.
    pub async fn finish(&self, quiz: &QuizSession) -> QuizOutcome {
        let result = quiz.session.finish();
        self.settle(quiz, result).await
    }

    /// Wait for the quiz to finish, by the learner or by the countdown, then
    /// record the attempt.
    pub async fn settled(&self, quiz: &QuizSession) -> QuizOutcome {
        let mut rx = quiz.session.subscribe();
        let result = match rx.wait_for(Option::is_some).await {
            Ok(result) => result.clone(),
            Err(_) => None,
        };
        // the sender lives as long as the session, so this only covers a
        // closed channel
        let result = result.unwrap_or_else(|| quiz.session.finish());
        self.settle(quiz, result).await
    }

    async fn settle(&self, quiz: &QuizSession, result: ScoreResult) -> QuizOutcome {
        let review = quiz.session.review().unwrap_or_default();
        let passed = result.passed(self.config.pass_threshold_percent);
        let answered = quiz.session.with_session(|s| s.answered_count());
        info!(
            quiz_id = %quiz.quiz_id,
            answered,
            score_percent = result.score_percent,
            passed,
            timed_out = result.timed_out,
            "Quiz settled"
        );

        let recorded = if quiz.recorded.swap(true, Ordering::SeqCst) {
            true
        } else {
            self.record(quiz, &result).await
        };

        QuizOutcome {
            result,
            review,
            passed,
            recorded,
        }
    }

    async fn record(&self, quiz: &QuizSession, result: &ScoreResult) -> bool {
        let attempt = AssessmentAttempt::from_result(
            self.user_id.clone(),
            quiz.quiz_id.clone(),
            result,
            self.config.pass_threshold_percent,
        );
        match self.store.record_assessment_attempt(attempt).await {
            Ok(()) => {
                self.events.emit(JourneyEvent::AssessmentRecorded {
                    quiz_id: quiz.quiz_id.clone(),
                    score_percent: result.score_percent,
                });
                true
            }
            Err(e) => {
                warn!(quiz_id = %quiz.quiz_id, error = %e, "Failed to record quiz attempt");
                self.events.emit(JourneyEvent::AssessmentRecordFailed {
                    quiz_id: quiz.quiz_id.clone(),
                    error: e.to_string(),
                });
                // allow a later retry
                quiz.recorded.store(false, Ordering::SeqCst);
                false
            }
        }
    }
}
