//! Per-block playback state and the gating rules for each block type.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use flowpath::content::PollContent;
use flowpath::{AssessmentItem, BlockContent};

use crate::assessment::{AssessmentError, AssessmentSession, SessionOptions};
use crate::timer::{Timer, TimerHandle};

use super::PlaybackError;

/// Feedback shown after an MCQ submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McqFeedback {
    pub correct: bool,
    pub selected: usize,
    pub correct_answer_index: usize,
    pub explanation: Option<String>,
}

/// Tallies shown after a poll submission. Cosmetic only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollResult {
    pub selected: Vec<usize>,
    pub counts: Vec<u32>,
    pub total_votes: u32,
}

impl PollResult {
    /// Share of votes for `option`, 0-100.
    pub fn percent(&self, option: usize) -> u8 {
        match (self.counts.get(option), self.total_votes) {
            (Some(&count), total) if total > 0 => ((count as f64 * 100.0) / total as f64).round() as u8,
            _ => 0,
        }
    }
}

/// Video gate: satisfied once the minimum viewing time has passed since load.
pub(crate) struct VideoGate {
    loaded_at: Duration,
    threshold: Duration,
    ready: Arc<AtomicBool>,
    _timer: TimerHandle,
}

impl VideoGate {
    pub(crate) fn arm(timer: &Arc<dyn Timer>, threshold: Duration) -> Self {
        let ready = Arc::new(AtomicBool::new(threshold.is_zero()));
        let flag = ready.clone();
        let handle = timer.schedule_once(
            threshold,
            Box::new(move || {
                flag.store(true, Ordering::SeqCst);
            }),
        );
        Self {
            loaded_at: timer.now(),
            threshold,
            ready,
            _timer: handle,
        }
    }

    pub(crate) fn is_ready(&self, now: Duration) -> bool {
        self.ready.load(Ordering::SeqCst) || now.saturating_sub(self.loaded_at) >= self.threshold
    }

    pub(crate) fn remaining(&self, now: Duration) -> Duration {
        self.threshold.saturating_sub(now.saturating_sub(self.loaded_at))
    }
}

/// A single MCQ, graded as an untimed single-item assessment.
///
/// Each submission finishes one attempt session; a wrong answer opens a fresh
/// one so the learner can retry.
pub(crate) struct McqState {
    pub(crate) session: AssessmentSession,
    pub(crate) feedback: Option<McqFeedback>,
    pub(crate) satisfied: bool,
    attempts: u32,
    timer: Arc<dyn Timer>,
}

impl McqState {
    pub(crate) fn start(item: AssessmentItem, timer: Arc<dyn Timer>) -> Result<Self, PlaybackError> {
        let session = AssessmentSession::new(vec![item], SessionOptions::untimed(false), timer.clone())?;
        Ok(Self {
            session,
            feedback: None,
            satisfied: false,
            attempts: 0,
            timer,
        })
    }

    pub(crate) fn selected(&self) -> Option<usize> {
        self.session.answer(0)
    }

    pub(crate) fn select(&mut self, option: usize) -> Result<(), PlaybackError> {
        match self.session.select_answer(0, option) {
            Ok(()) => Ok(()),
            Err(AssessmentError::InvalidOption { option, options, .. }) => {
                Err(PlaybackError::InvalidOption { option, options })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Drop the current selection without submitting.
    pub(crate) fn clear(&mut self) -> Result<(), PlaybackError> {
        Ok(self.session.clear_answer(0)?)
    }

    /// Grade the current selection. A wrong answer clears the selection but
    /// keeps the feedback on screen.
    pub(crate) fn submit(&mut self, require_correct: bool) -> Result<McqFeedback, PlaybackError> {
        let selected = self.selected().ok_or(PlaybackError::NoSelection)?;
        let result = self.session.finish();
        let review = self.session.review()?;
        let item = review.first().ok_or(AssessmentError::InvalidItem { index: 0, len: 0 })?;
        let correct = result.correct_count == result.total_items;
        let feedback = McqFeedback {
            correct,
            selected,
            correct_answer_index: item.correct_answer_index,
            explanation: item.explanation.clone(),
        };
        self.attempts += 1;

        if correct {
            self.satisfied = true;
        } else {
            self.session = AssessmentSession::new(
                self.session.items().to_vec(),
                SessionOptions::untimed(false),
                self.timer.clone(),
            )?;
            if !require_correct {
                self.satisfied = true;
            }
        }
        debug!(selected, correct, attempts = self.attempts, "MCQ submitted");
        self.feedback = Some(feedback.clone());
        Ok(feedback)
    }
}

pub(crate) struct PollState {
    pub(crate) poll: PollContent,
    pub(crate) selected: BTreeSet<usize>,
    pub(crate) result: Option<PollResult>,
}

impl PollState {
    pub(crate) fn toggle(&mut self, option: usize) -> Result<(), PlaybackError> {
        if self.result.is_some() {
            return Err(PlaybackError::AlreadySubmitted);
        }
        if option >= self.poll.options.len() {
            return Err(PlaybackError::InvalidOption {
                option,
                options: self.poll.options.len(),
            });
        }
        if self.poll.allow_multiple {
            if !self.selected.remove(&option) {
                self.selected.insert(option);
            }
        } else {
            self.selected.clear();
            self.selected.insert(option);
        }
        Ok(())
    }

    pub(crate) fn submit(&mut self) -> Result<PollResult, PlaybackError> {
        if let Some(result) = &self.result {
            return Ok(result.clone());
        }
        if self.selected.is_empty() {
            return Err(PlaybackError::NoSelection);
        }

        let mut counts: Vec<u32> = (0..self.poll.options.len())
            .map(|i| self.poll.votes.get(i).copied().unwrap_or(0))
            .collect();
        for &option in &self.selected {
            if let Some(count) = counts.get_mut(option) {
                *count = count.saturating_add(1);
            }
        }

        let result = PollResult {
            selected: self.selected.iter().copied().collect(),
            total_votes: counts.iter().fold(0u32, |total, &c| total.saturating_add(c)),
            counts,
        };
        self.result = Some(result.clone());
        Ok(result)
    }
}

/// State of the block currently on screen.
pub(crate) enum ActiveState {
    /// Text, note, image, meme, code and unsupported fallbacks
    Passive,
    Video(VideoGate),
    Mcq(McqState),
    Pack(AssessmentSession),
    Poll(PollState),
}

impl ActiveState {
    pub(crate) fn for_content(
        content: &BlockContent,
        timer: &Arc<dyn Timer>,
        video_threshold: Duration,
    ) -> Result<Self, PlaybackError> {
        Ok(match content {
            BlockContent::Video(_) => Self::Video(VideoGate::arm(timer, video_threshold)),
            BlockContent::Mcq(item) => Self::Mcq(McqState::start(item.clone(), timer.clone())?),
            BlockContent::McqPack(pack) => Self::Pack(AssessmentSession::new(
                pack.questions.clone(),
                SessionOptions::untimed(true),
                timer.clone(),
            )?),
            BlockContent::Poll(poll) => Self::Poll(PollState {
                poll: poll.clone(),
                selected: BTreeSet::new(),
                result: None,
            }),
            _ => Self::Passive,
        })
    }

    pub(crate) fn name(&self) -> &'static str {
        match self {
            Self::Passive => "passive",
            Self::Video(_) => "video",
            Self::Mcq(_) => "mcq",
            Self::Pack(_) => "mcq_pack",
            Self::Poll(_) => "poll",
        }
    }

    /// Whether the block's gate is met. Passive blocks need nothing beyond
    /// being shown; video readiness depends on the clock and is checked by
    /// the caller.
    pub(crate) fn is_satisfied(&self) -> bool {
        match self {
            Self::Passive => true,
            Self::Video(_) => false,
            Self::Mcq(mcq) => mcq.satisfied,
            Self::Pack(session) => session.is_finished(),
            Self::Poll(poll) => poll.result.is_some(),
        }
    }
}
