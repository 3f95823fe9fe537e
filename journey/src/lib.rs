//! Learning journey - ties flow layout, progression and playback to a store.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              FlowJourney                │
//! │   load / layout / open / complete       │
//! └───────┬──────────────┬──────────────┬───┘
//!         │              │              │
//!         ▼              ▼              ▼
//! ┌─────────────┐ ┌─────────────┐ ┌─────────────┐
//! │ FlowSnapshot│ │  Playback   │ │ProgressStore│
//! │ (flowpath)  │ │ (playback)  │ │  (async)    │
//! └─────────────┘ └─────────────┘ └─────────────┘
//! ```
//!
//! Standalone quizzes run through [`QuizRunner`]. Everything observable is
//! also broadcast on an [`EventBus`].

pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod quiz;
pub mod store;

// Re-export main types for convenience
pub use config::{GeneralConfig, JourneyConfig, QuizConfig};
pub use controller::{CompletionReport, FlowJourney, NodeEntry, XpOutcome};
pub use error::{ConfigError, JourneyError, Result, StoreError};
pub use events::{spawn_logging_listener, EventBus, EventListener, JourneyEvent, LoggingEventListener};
pub use quiz::{QuizOutcome, QuizRunner, QuizSession};
pub use store::{AssessmentAttempt, MockStore, ProgressMetadata, ProgressStore};
