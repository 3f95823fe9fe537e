//! Assessment engine - shared scoring and navigation core.
//!
//! Used by single MCQ blocks (via [`grade`] / `AssessmentItem::is_correct`),
//! by `mcq_pack` blocks (untimed [`AssessmentSession`] with backtracking) and
//! by standalone quizzes ([`TimedSession`]).

pub mod score;
pub mod session;
pub mod timed;

pub use score::{grade, ItemOutcome, ReviewItem, ScoreResult};
pub use session::{AssessmentError, AssessmentMode, AssessmentSession, Navigation, SessionOptions};
pub use timed::{TimedSession, DEFAULT_QUIZ_SECONDS};
