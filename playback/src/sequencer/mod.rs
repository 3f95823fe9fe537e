//! Content block sequencer.
//!
//! Plays a node's blocks strictly in `order`, one at a time. Each block type
//! has its own gate that must be satisfied before playback moves on:
//!
//! | block                          | satisfied by                                   |
//! |--------------------------------|------------------------------------------------|
//! | text, note, image, meme, code  | explicit acknowledgement                       |
//! | video                          | acknowledgement after the minimum viewing time |
//! | mcq                            | a correct submission (retry is unlimited)      |
//! | mcq_pack                       | finishing the pack, whatever the score         |
//! | poll                           | submitting any selection                       |
//!
//! Passing the last block produces a single [`NodeCompletion`]. Blocks are
//! never replayed once passed, and leaving early ([`Playback::exit`]) reports
//! nothing.

mod state;

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use flowpath::{BlockContent, ContentBlock, NodeId};

#[cfg(feature = "typescript")]
use ts_rs::TS;

use crate::assessment::{AssessmentError, AssessmentSession, Navigation, ScoreResult};
use crate::timer::{whole_seconds, Timer};

pub use state::{McqFeedback, PollResult};
use state::ActiveState;

/// Playback tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// A wrong MCQ answer keeps the learner on the block. When false, any
    /// submission satisfies it and `advance` may move on.
    pub require_correct_to_advance: bool,
    /// Minimum seconds a video must be on screen before it can be acknowledged
    pub video_min_watch_secs: u64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            require_correct_to_advance: true,
            video_min_watch_secs: 3,
        }
    }
}

/// Sequencer errors. None of these change playback state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlaybackError {
    #[error("Playback already complete")]
    Complete,

    #[error("Block {block_id} is not satisfied yet")]
    NotSatisfied { block_id: String },

    #[error("Video needs {remaining_ms}ms more viewing")]
    VideoNotReady { remaining_ms: u64 },

    #[error("{action} does not apply to a {block_type} block")]
    WrongBlock {
        action: &'static str,
        block_type: &'static str,
    },

    #[error("No option selected")]
    NoSelection,

    #[error("Option {option} out of range ({options} options)")]
    InvalidOption { option: usize, options: usize },

    #[error("Poll already submitted")]
    AlreadySubmitted,

    #[error(transparent)]
    Assessment(#[from] AssessmentError),
}

/// Reported once, when the last block is passed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct NodeCompletion {
    pub node_id: NodeId,
    pub time_spent_seconds: u64,
    pub blocks_completed: usize,
}

/// What an action did to the sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Still on the same block
    Stay,
    /// Now showing block `index`
    Advanced { index: usize },
    /// Last block passed
    NodeComplete(NodeCompletion),
}

impl Step {
    pub fn completion(&self) -> Option<&NodeCompletion> {
        match self {
            Step::NodeComplete(completion) => Some(completion),
            _ => None,
        }
    }
}

/// Outcome of an MCQ submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct McqSubmission {
    pub feedback: McqFeedback,
    pub step: Step,
}

/// Position within the node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    pub current_index: usize,
    pub total_blocks: usize,
    /// 0.0 to 1.0
    pub ratio: f64,
}

/// Returned by [`Playback::exit`]. Nothing was persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Abandoned {
    pub node_id: NodeId,
    pub blocks_passed: usize,
    pub total_blocks: usize,
}

/// The block on screen.
#[derive(Debug, Clone, Copy)]
pub struct CurrentBlock<'a> {
    pub index: usize,
    pub block: &'a ContentBlock,
    pub content: &'a BlockContent,
}

/// Playback of one node's content blocks.
pub struct Playback {
    node_id: NodeId,
    blocks: Vec<ContentBlock>,
    contents: Vec<BlockContent>,
    index: usize,
    active: Option<ActiveState>,
    config: PlaybackConfig,
    timer: Arc<dyn Timer>,
    started_at: Duration,
    completion: Option<NodeCompletion>,
}

impl std::fmt::Debug for Playback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Playback")
            .field("node_id", &self.node_id)
            .field("blocks", &self.blocks.len())
            .field("index", &self.index)
            .field("active", &self.active.as_ref().map(ActiveState::name))
            .field("completion", &self.completion)
            .finish()
    }
}

impl Playback {
    /// Start playback at the first block.
    ///
    /// Blocks are sorted by `order`. A node without blocks has nothing to
    /// gate and is complete immediately.
    pub fn start(
        node_id: impl Into<NodeId>,
        mut blocks: Vec<ContentBlock>,
        config: PlaybackConfig,
        timer: Arc<dyn Timer>,
    ) -> Result<Self, PlaybackError> {
        let node_id = node_id.into();
        blocks.sort_by_key(|b| b.order);
        if blocks.windows(2).any(|w| w[0].order == w[1].order) {
            warn!(node_id = %node_id, "Duplicate block order values, keeping input order for ties");
        }
        let contents: Vec<BlockContent> = blocks.iter().map(BlockContent::parse).collect();

        let mut playback = Self {
            node_id,
            blocks,
            contents,
            index: 0,
            active: None,
            config,
            started_at: timer.now(),
            timer,
            completion: None,
        };

        if playback.blocks.is_empty() {
            info!(node_id = %playback.node_id, "Node has no content blocks");
            playback.complete();
        } else {
            playback.activate()?;
        }

        info!(
            node_id = %playback.node_id,
            blocks = playback.blocks.len(),
            "Node playback started"
        );
        Ok(playback)
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn config(&self) -> &PlaybackConfig {
        &self.config
    }

    pub fn current(&self) -> Option<CurrentBlock<'_>> {
        self.active.as_ref()?;
        Some(CurrentBlock {
            index: self.index,
            block: self.blocks.get(self.index)?,
            content: self.contents.get(self.index)?,
        })
    }

    pub fn progress(&self) -> Progress {
        let total_blocks = self.blocks.len();
        let ratio = if self.is_complete() {
            1.0
        } else {
            self.index as f64 / total_blocks as f64
        };
        Progress {
            current_index: self.index.min(total_blocks),
            total_blocks,
            ratio,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.completion.is_some()
    }

    pub fn completion(&self) -> Option<&NodeCompletion> {
        self.completion.as_ref()
    }

    /// Whether the current block's gate is met right now. Always true for
    /// passive blocks, which a single acknowledgement passes.
    pub fn is_satisfied(&self) -> bool {
        match &self.active {
            Some(ActiveState::Video(gate)) => gate.is_ready(self.timer.now()),
            Some(state) => state.is_satisfied(),
            None => false,
        }
    }

    /// `Some(ready)` while a video block is showing.
    pub fn video_ready(&self) -> Option<bool> {
        match &self.active {
            Some(ActiveState::Video(gate)) => Some(gate.is_ready(self.timer.now())),
            _ => None,
        }
    }

    pub fn mcq_selection(&self) -> Option<usize> {
        match &self.active {
            Some(ActiveState::Mcq(mcq)) => mcq.selected(),
            _ => None,
        }
    }

    /// Feedback from the latest MCQ submission on this block.
    pub fn mcq_feedback(&self) -> Option<&McqFeedback> {
        match &self.active {
            Some(ActiveState::Mcq(mcq)) => mcq.feedback.as_ref(),
            _ => None,
        }
    }

    pub fn pack(&self) -> Option<&AssessmentSession> {
        match &self.active {
            Some(ActiveState::Pack(session)) => Some(session),
            _ => None,
        }
    }

    pub fn poll_selection(&self) -> Option<Vec<usize>> {
        match &self.active {
            Some(ActiveState::Poll(poll)) => Some(poll.selected.iter().copied().collect()),
            _ => None,
        }
    }

    pub fn poll_result(&self) -> Option<&PollResult> {
        match &self.active {
            Some(ActiveState::Poll(poll)) => poll.result.as_ref(),
            _ => None,
        }
    }

    /// Acknowledge a passive or video block and move on.
    pub fn acknowledge(&mut self) -> Result<Step, PlaybackError> {
        let now = self.timer.now();
        match self.active_mut("acknowledge")? {
            ActiveState::Passive => {}
            ActiveState::Video(gate) => {
                if !gate.is_ready(now) {
                    return Err(PlaybackError::VideoNotReady {
                        remaining_ms: gate.remaining(now).as_millis() as u64,
                    });
                }
            }
            other => {
                return Err(PlaybackError::WrongBlock {
                    action: "acknowledge",
                    block_type: other.name(),
                })
            }
        }
        Ok(self.pass())
    }

    /// Restart the viewing gate when the video element actually finishes
    /// loading.
    pub fn video_loaded(&mut self) -> Result<(), PlaybackError> {
        let timer = self.timer.clone();
        let threshold = Duration::from_secs(self.config.video_min_watch_secs);
        match self.active_mut("video_loaded")? {
            ActiveState::Video(gate) => {
                *gate = state::VideoGate::arm(&timer, threshold);
                Ok(())
            }
            other => Err(PlaybackError::WrongBlock {
                action: "video_loaded",
                block_type: other.name(),
            }),
        }
    }

    /// Select an MCQ option. Replaces any earlier selection.
    pub fn select_option(&mut self, option: usize) -> Result<(), PlaybackError> {
        match self.active_mut("select_option")? {
            ActiveState::Mcq(mcq) => mcq.select(option),
            other => Err(PlaybackError::WrongBlock {
                action: "select_option",
                block_type: other.name(),
            }),
        }
    }

    /// Clear the MCQ selection without submitting.
    pub fn clear_selection(&mut self) -> Result<(), PlaybackError> {
        match self.active_mut("clear_selection")? {
            ActiveState::Mcq(mcq) => mcq.clear(),
            other => Err(PlaybackError::WrongBlock {
                action: "clear_selection",
                block_type: other.name(),
            }),
        }
    }

    /// Submit the selected MCQ option.
    ///
    /// A correct answer passes the block. A wrong one clears the selection
    /// and stays, with the explanation still available.
    pub fn submit_answer(&mut self) -> Result<McqSubmission, PlaybackError> {
        let require_correct = self.config.require_correct_to_advance;
        let feedback = match self.active_mut("submit_answer")? {
            ActiveState::Mcq(mcq) => mcq.submit(require_correct)?,
            other => {
                return Err(PlaybackError::WrongBlock {
                    action: "submit_answer",
                    block_type: other.name(),
                })
            }
        };

        let step = if feedback.correct { self.pass() } else { Step::Stay };
        Ok(McqSubmission { feedback, step })
    }

    /// Record an answer inside an `mcq_pack` block.
    pub fn pack_select(&mut self, item: usize, option: usize) -> Result<(), PlaybackError> {
        Ok(self.pack_mut("pack_select")?.select_answer(item, option)?)
    }

    /// Next pack item; past the last item this finishes the pack.
    pub fn pack_next(&mut self) -> Result<Navigation, PlaybackError> {
        Ok(self.pack_mut("pack_next")?.go_next())
    }

    pub fn pack_previous(&mut self) -> Result<usize, PlaybackError> {
        Ok(self.pack_mut("pack_previous")?.go_previous()?)
    }

    /// Score the pack. The block is satisfied regardless of the score.
    pub fn pack_finish(&mut self) -> Result<ScoreResult, PlaybackError> {
        Ok(self.pack_mut("pack_finish")?.finish())
    }

    pub fn toggle_poll_option(&mut self, option: usize) -> Result<(), PlaybackError> {
        match self.active_mut("toggle_poll_option")? {
            ActiveState::Poll(poll) => poll.toggle(option),
            other => Err(PlaybackError::WrongBlock {
                action: "toggle_poll_option",
                block_type: other.name(),
            }),
        }
    }

    pub fn submit_poll(&mut self) -> Result<PollResult, PlaybackError> {
        match self.active_mut("submit_poll")? {
            ActiveState::Poll(poll) => poll.submit(),
            other => Err(PlaybackError::WrongBlock {
                action: "submit_poll",
                block_type: other.name(),
            }),
        }
    }

    /// Move past the current block.
    ///
    /// Passive and video blocks treat this as acknowledgement. Interactive
    /// blocks must already be satisfied.
    pub fn advance(&mut self) -> Result<Step, PlaybackError> {
        let (gated_by_viewing, satisfied) = match self.active.as_ref().ok_or(PlaybackError::Complete)? {
            ActiveState::Passive | ActiveState::Video(_) => (true, false),
            state => (false, state.is_satisfied()),
        };
        match (gated_by_viewing, satisfied) {
            (true, _) => self.acknowledge(),
            (false, true) => Ok(self.pass()),
            (false, false) => Err(PlaybackError::NotSatisfied {
                block_id: self
                    .blocks
                    .get(self.index)
                    .map(|b| b.id.clone())
                    .unwrap_or_default(),
            }),
        }
    }

    /// Leave the node. Pending timers are cancelled and nothing is reported.
    pub fn exit(self) -> Abandoned {
        info!(
            node_id = %self.node_id,
            block_index = self.index,
            "Exited node before completion, progress won't be saved"
        );
        Abandoned {
            node_id: self.node_id.clone(),
            blocks_passed: self.index.min(self.blocks.len()),
            total_blocks: self.blocks.len(),
        }
    }

    fn active_mut(&mut self, action: &'static str) -> Result<&mut ActiveState, PlaybackError> {
        debug!(node_id = %self.node_id, action, "Playback action");
        self.active.as_mut().ok_or(PlaybackError::Complete)
    }

    fn pack_mut(&mut self, action: &'static str) -> Result<&mut AssessmentSession, PlaybackError> {
        match self.active_mut(action)? {
            ActiveState::Pack(session) => Ok(session),
            other => Err(PlaybackError::WrongBlock {
                action,
                block_type: other.name(),
            }),
        }
    }

    /// Current block is satisfied; show the next one or complete.
    fn pass(&mut self) -> Step {
        // drops the old state, cancelling any video timer
        self.active = None;
        self.index += 1;

        if self.index >= self.blocks.len() {
            return Step::NodeComplete(self.complete());
        }

        match self.activate() {
            Ok(()) => Step::Advanced { index: self.index },
            Err(e) => {
                // parse already validated packs, so this only fires on a bug
                warn!(node_id = %self.node_id, index = self.index, error = %e, "Block could not start, skipping");
                self.pass()
            }
        }
    }

    fn activate(&mut self) -> Result<(), PlaybackError> {
        let threshold = Duration::from_secs(self.config.video_min_watch_secs);
        let Some(content) = self.contents.get(self.index) else {
            return Ok(());
        };
        let state = ActiveState::for_content(content, &self.timer, threshold)?;
        debug!(
            node_id = %self.node_id,
            index = self.index,
            block_type = state.name(),
            "Block active"
        );
        self.active = Some(state);
        Ok(())
    }

    fn complete(&mut self) -> NodeCompletion {
        let completion = NodeCompletion {
            node_id: self.node_id.clone(),
            time_spent_seconds: whole_seconds(self.started_at, self.timer.now()),
            blocks_completed: self.blocks.len(),
        };
        info!(
            node_id = %self.node_id,
            time_spent = completion.time_spent_seconds,
            blocks = completion.blocks_completed,
            "Node playback complete"
        );
        self.completion = Some(completion.clone());
        completion
    }
}
