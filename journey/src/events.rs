//! Journey event bus.
//!
//! Lets a UI shell, analytics sink or test observe what the journey did
//! without being wired into the controller:
//! - progress/XP persistence outcomes (including failures to retry)
//! - node status changes
//! - quiz attempts

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, info, trace, warn};

use flowpath::NodeId;

/// Events emitted by the journey controller and quiz runner.
#[derive(Debug, Clone, PartialEq)]
pub enum JourneyEvent {
    FlowLoaded {
        flow_id: String,
        nodes: usize,
    },
    /// A locked node was tapped
    NodeLockedAccess {
        node_id: NodeId,
    },
    PlaybackStarted {
        node_id: NodeId,
        blocks: usize,
    },
    /// Emitted after the progress save was attempted, whatever its outcome
    NodeCompleted {
        node_id: NodeId,
        time_spent_seconds: u64,
        blocks_completed: usize,
        persisted: bool,
    },
    ProgressSaveFailed {
        node_id: NodeId,
        error: String,
    },
    XpAwarded {
        node_id: NodeId,
        amount: u32,
    },
    XpAwardFailed {
        node_id: NodeId,
        amount: u32,
        error: String,
    },
    NodeBecameCurrent {
        node_id: NodeId,
    },
    FlowCompleted {
        flow_id: String,
    },
    AssessmentRecorded {
        quiz_id: String,
        score_percent: u8,
    },
    AssessmentRecordFailed {
        quiz_id: String,
        error: String,
    },
}

/// Trait for event listeners
pub trait EventListener: Send + Sync {
    fn on_event(&self, event: &JourneyEvent);
}

/// Broadcasts journey events to any number of subscribers.
pub struct EventBus {
    sender: broadcast::Sender<JourneyEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Emit an event to all subscribers
    pub fn emit(&self, event: JourneyEvent) {
        trace!(event = ?event, "Emitting journey event");
        // no subscribers is fine
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JourneyEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Logs every event.
pub struct LoggingEventListener;

impl EventListener for LoggingEventListener {
    fn on_event(&self, event: &JourneyEvent) {
        match event {
            JourneyEvent::NodeCompleted {
                node_id, persisted, ..
            } => {
                info!(node_id = %node_id, persisted, "Node completed");
            }
            JourneyEvent::ProgressSaveFailed { node_id, error } => {
                warn!(node_id = %node_id, error = %error, "Progress save failed");
            }
            JourneyEvent::XpAwardFailed { node_id, error, .. } => {
                warn!(node_id = %node_id, error = %error, "XP award failed");
            }
            JourneyEvent::AssessmentRecordFailed { quiz_id, error } => {
                warn!(quiz_id = %quiz_id, error = %error, "Quiz attempt not recorded");
            }
            JourneyEvent::FlowCompleted { flow_id } => {
                info!(flow_id = %flow_id, "Flow completed");
            }
            _ => {
                debug!(event = ?event, "Journey event");
            }
        }
    }
}

/// Spawn a background task that logs all events
pub fn spawn_logging_listener(event_bus: Arc<EventBus>) -> tokio::task::JoinHandle<()> {
    let mut receiver = event_bus.subscribe();
    let listener = LoggingEventListener;

    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(event) => listener.on_event(&event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    debug!(skipped = n, "Event listener lagged, skipped events");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed, stopping listener");
                    break;
                }
            }
        }
    })
}
