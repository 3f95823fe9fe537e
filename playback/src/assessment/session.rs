//! Assessment sessions: answer recording, navigation and finishing.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use flowpath::AssessmentItem;

use super::score::{grade, review_items, ReviewItem, ScoreResult};
use crate::timer::{whole_seconds, Timer};

/// Errors from assessment operations. None of these end the session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AssessmentError {
    /// Answers are frozen once a result exists
    #[error("Session already finished")]
    Finished,

    /// Review is only available after finishing
    #[error("Session not finished yet")]
    NotFinished,

    #[error("Item index {index} out of range ({len} items)")]
    InvalidItem { index: usize, len: usize },

    #[error("Option {option} out of range for item {index} ({options} options)")]
    InvalidOption {
        index: usize,
        option: usize,
        options: usize,
    },

    /// Item is missing options or has an out-of-range correct answer
    #[error("Item {0} is malformed")]
    MalformedItem(usize),

    #[error("Backtracking is disabled for this session")]
    BacktrackDisabled,
}

/// How a session was created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssessmentMode {
    UntimedSingle,
    UntimedPack,
    TimedPack,
}

/// Options for [`AssessmentSession::new`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionOptions {
    /// Countdown length; `None` for untimed
    pub timed_seconds: Option<u32>,
    /// Allow `go_previous`
    pub allow_backtrack: bool,
}

impl SessionOptions {
    pub fn untimed(allow_backtrack: bool) -> Self {
        Self {
            timed_seconds: None,
            allow_backtrack,
        }
    }

    pub fn timed(seconds: u32, allow_backtrack: bool) -> Self {
        Self {
            timed_seconds: Some(seconds),
            allow_backtrack,
        }
    }
}

/// Result of a forward navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    /// Now showing this item
    Moved(usize),
    /// Moved past the last item, or the session had already finished
    Finished(ScoreResult),
}

/// One playthrough of a set of assessment items.
///
/// Ephemeral: discarded when the learner exits. Finishing is the only way to
/// a result and is idempotent.
pub struct AssessmentSession {
    id: String,
    items: Vec<AssessmentItem>,
    answers: BTreeMap<usize, usize>,
    current_index: usize,
    options: SessionOptions,
    mode: AssessmentMode,
    time_remaining: Option<u32>,
    started_at: std::time::Duration,
    timer: Arc<dyn Timer>,
    result: Option<ScoreResult>,
}

impl fmt::Debug for AssessmentSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssessmentSession")
            .field("id", &self.id)
            .field("items", &self.items.len())
            .field("answers", &self.answers)
            .field("current_index", &self.current_index)
            .field("mode", &self.mode)
            .field("time_remaining", &self.time_remaining)
            .field("finished", &self.result.is_some())
            .finish()
    }
}

impl AssessmentSession {
    /// Create a session over `items`.
    pub fn new(
        items: Vec<AssessmentItem>,
        options: SessionOptions,
        timer: Arc<dyn Timer>,
    ) -> Result<Self, AssessmentError> {
        if let Some(index) = items.iter().position(|item| !item.is_well_formed()) {
            return Err(AssessmentError::MalformedItem(index));
        }

        let mode = match (options.timed_seconds, items.len()) {
            (Some(_), _) => AssessmentMode::TimedPack,
            (None, 1) if !options.allow_backtrack => AssessmentMode::UntimedSingle,
            (None, _) => AssessmentMode::UntimedPack,
        };

        let session = Self {
            id: uuid::Uuid::new_v4().to_string(),
            answers: BTreeMap::new(),
            current_index: 0,
            time_remaining: options.timed_seconds,
            started_at: timer.now(),
            timer,
            result: None,
            items,
            options,
            mode,
        };

        debug!(
            session_id = %session.id,
            items = session.items.len(),
            mode = ?session.mode,
            "Assessment session created"
        );
        Ok(session)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn mode(&self) -> AssessmentMode {
        self.mode
    }

    pub fn items(&self) -> &[AssessmentItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn current_item(&self) -> Option<&AssessmentItem> {
        self.items.get(self.current_index)
    }

    /// Selected option for the item being shown.
    pub fn current_answer(&self) -> Option<usize> {
        self.answers.get(&self.current_index).copied()
    }

    pub fn answer(&self, index: usize) -> Option<usize> {
        self.answers.get(&index).copied()
    }

    pub fn answered_count(&self) -> usize {
        self.answers.len()
    }

    pub fn time_remaining(&self) -> Option<u32> {
        self.time_remaining
    }

    pub fn is_finished(&self) -> bool {
        self.result.is_some()
    }

    pub fn result(&self) -> Option<&ScoreResult> {
        self.result.as_ref()
    }

    /// Record `option` as the answer to item `index`, replacing any earlier one.
    pub fn select_answer(&mut self, index: usize, option: usize) -> Result<(), AssessmentError> {
        if self.is_finished() {
            return Err(AssessmentError::Finished);
        }
        let item = self.items.get(index).ok_or(AssessmentError::InvalidItem {
            index,
            len: self.items.len(),
        })?;
        if option >= item.options.len() {
            return Err(AssessmentError::InvalidOption {
                index,
                option,
                options: item.options.len(),
            });
        }

        self.answers.insert(index, option);
        Ok(())
    }

    /// Forget the answer to item `index`.
    pub fn clear_answer(&mut self, index: usize) -> Result<(), AssessmentError> {
        if self.is_finished() {
            return Err(AssessmentError::Finished);
        }
        self.answers.remove(&index);
        Ok(())
    }

    /// Show the next item; past the last item this finishes the session.
    pub fn go_next(&mut self) -> Navigation {
        if let Some(result) = &self.result {
            return Navigation::Finished(result.clone());
        }
        if self.current_index + 1 >= self.items.len() {
            return Navigation::Finished(self.finish());
        }
        self.current_index += 1;
        Navigation::Moved(self.current_index)
    }

    /// Show the previous item. Its recorded answer is kept.
    pub fn go_previous(&mut self) -> Result<usize, AssessmentError> {
        if !self.options.allow_backtrack {
            return Err(AssessmentError::BacktrackDisabled);
        }
        if self.is_finished() {
            return Err(AssessmentError::Finished);
        }
        self.current_index = self.current_index.saturating_sub(1);
        Ok(self.current_index)
    }

    /// Score the session. Later calls return the stored result unchanged.
    pub fn finish(&mut self) -> ScoreResult {
        self.finish_with(false)
    }

    /// Advance the countdown by one second.
    ///
    /// Returns the result when this tick finished the session. Untimed and
    /// finished sessions ignore ticks.
    pub fn tick(&mut self) -> Option<ScoreResult> {
        if self.is_finished() {
            return None;
        }
        let remaining = self.time_remaining.as_mut()?;
        *remaining = remaining.saturating_sub(1);
        if *remaining == 0 {
            info!(session_id = %self.id, answered = self.answers.len(), "Assessment timed out");
            return Some(self.finish_with(true));
        }
        None
    }

    /// Item-by-item review. Only available after finishing.
    pub fn review(&self) -> Result<Vec<ReviewItem>, AssessmentError> {
        if !self.is_finished() {
            return Err(AssessmentError::NotFinished);
        }
        Ok(review_items(&self.items, &self.answers))
    }

    fn finish_with(&mut self, timed_out: bool) -> ScoreResult {
        if let Some(result) = &self.result {
            return result.clone();
        }

        let mut elapsed = whole_seconds(self.started_at, self.timer.now());
        if let Some(limit) = self.options.timed_seconds {
            elapsed = elapsed.min(u64::from(limit));
        }

        let result = grade(&self.items, &self.answers, elapsed, timed_out);
        info!(
            session_id = %self.id,
            score_percent = result.score_percent,
            correct = result.correct_count,
            total = result.total_items,
            time_taken = result.time_taken_seconds,
            timed_out,
            "Assessment finished"
        );
        self.result = Some(result.clone());
        result
    }
}
