//! Node playback and assessment.
//!
//! - [`sequencer`]: plays a node's content blocks in order and gates each one
//! - [`assessment`]: answer recording, navigation, scoring and review for
//!   single questions, question packs and timed quizzes
//! - [`timer`]: the injected clock/scheduler both of the above run on
//!
//! Nothing here persists anything. Playback reports a [`NodeCompletion`]
//! once; what happens next is up to the caller.

pub mod assessment;
pub mod sequencer;
pub mod timer;

pub use assessment::{
    AssessmentError, AssessmentMode, AssessmentSession, Navigation, ReviewItem, ScoreResult, SessionOptions,
    TimedSession, DEFAULT_QUIZ_SECONDS,
};
pub use sequencer::{
    Abandoned, CurrentBlock, McqFeedback, McqSubmission, NodeCompletion, Playback, PlaybackConfig, PlaybackError,
    PollResult, Progress, Step,
};
pub use timer::{Clock, ManualTimer, Scheduler, Timer, TimerControl, TimerHandle, TokioTimer};
