//! Flow journey controller.
//!
//! Owns one learner's pass through one flow: the in-memory snapshot, the
//! layout derived from it, node entry, and what happens when playback of a
//! node completes.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use flowpath::{
    layout, FlowError, FlowLayout, FlowProgress, FlowSnapshot, LearningNode, NodeAccess, NodeStatus, Transition,
};
use playback::{NodeCompletion, Playback, PlaybackError, Timer};

use crate::config::JourneyConfig;
use crate::error::{JourneyError, Result, StoreError};
use crate::events::{EventBus, JourneyEvent};
use crate::store::{ProgressMetadata, ProgressStore};

/// Result of trying to enter a node.
#[derive(Debug)]
pub enum NodeEntry {
    /// Playback started at the node's first block
    Ready(Playback),
    /// Not an error: show `message` and stay on the map
    Locked { message: String },
}

/// What happened with XP for a completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XpOutcome {
    Awarded(u32),
    /// Progress was not saved, or the node had been completed before
    Skipped,
    Failed(StoreError),
}

/// Outcome of [`FlowJourney::complete_node`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionReport {
    pub transition: Transition,
    /// Set when the progress save failed; local state moved on anyway
    pub progress_error: Option<StoreError>,
    pub xp: XpOutcome,
}

impl CompletionReport {
    pub fn persisted(&self) -> bool {
        self.progress_error.is_none()
    }
}

/// One learner's session on one flow.
pub struct FlowJourney {
    store: Arc<dyn ProgressStore>,
    timer: Arc<dyn Timer>,
    events: Arc<EventBus>,
    config: JourneyConfig,
    user_id: String,
    flow_id: String,
    snapshot: FlowSnapshot,
}

impl FlowJourney {
    /// Load a flow from the store.
    ///
    /// On failure no journey exists; the error carries a user-facing message.
    pub async fn load(
        store: Arc<dyn ProgressStore>,
        timer: Arc<dyn Timer>,
        config: JourneyConfig,
        user_id: impl Into<String>,
        flow_id: impl Into<String>,
    ) -> Result<Self> {
        let events = Arc::new(EventBus::with_capacity(config.general.event_capacity));
        Self::load_with_events(store, timer, config, events, user_id, flow_id).await
    }

    /// Load a flow, emitting on an existing event bus.
    pub async fn load_with_events(
        store: Arc<dyn ProgressStore>,
        timer: Arc<dyn Timer>,
        config: JourneyConfig,
        events: Arc<EventBus>,
        user_id: impl Into<String>,
        flow_id: impl Into<String>,
    ) -> Result<Self> {
        let user_id = user_id.into();
        let flow_id = flow_id.into();

        let nodes = store.load_nodes_for_flow(&flow_id).await.map_err(|e| {
            warn!(flow_id = %flow_id, error = %e, "Failed to load flow");
            JourneyError::Load(e)
        })?;
        let snapshot = FlowSnapshot::new(nodes)?;

        info!(
            flow_id = %flow_id,
            user_id = %user_id,
            nodes = snapshot.len(),
            current = ?snapshot.current().map(|n| n.id.as_str()),
            "Flow loaded"
        );
        events.emit(JourneyEvent::FlowLoaded {
            flow_id: flow_id.clone(),
            nodes: snapshot.len(),
        });

        Ok(Self {
            store,
            timer,
            events,
            config,
            user_id,
            flow_id,
            snapshot,
        })
    }

    pub fn flow_id(&self) -> &str {
        &self.flow_id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn config(&self) -> &JourneyConfig {
        &self.config
    }

    pub fn events(&self) -> Arc<EventBus> {
        self.events.clone()
    }

    pub fn snapshot(&self) -> &FlowSnapshot {
        &self.snapshot
    }

    pub fn nodes(&self) -> &[LearningNode] {
        self.snapshot.nodes()
    }

    pub fn progress(&self) -> FlowProgress {
        self.snapshot.summary()
    }

    /// Layout of the flow in its current state.
    pub fn layout(&self) -> FlowLayout {
        layout(self.snapshot.nodes(), &self.config.layout)
    }

    /// Try to enter a node.
    pub fn open_node(&self, node_id: &str) -> Result<NodeEntry> {
        match self.snapshot.open(node_id)? {
            NodeAccess::Locked { message } => {
                self.events.emit(JourneyEvent::NodeLockedAccess {
                    node_id: node_id.to_string(),
                });
                Ok(NodeEntry::Locked { message })
            }
            NodeAccess::Enter => {
                let node = self
                    .snapshot
                    .node(node_id)
                    .ok_or_else(|| FlowError::UnknownNode(node_id.to_string()))?;
                let playback = Playback::start(
                    node.id.clone(),
                    node.content_blocks.clone(),
                    self.config.playback.clone(),
                    self.timer.clone(),
                )?;
                self.events.emit(JourneyEvent::PlaybackStarted {
                    node_id: node.id.clone(),
                    blocks: node.content_blocks.len(),
                });
                Ok(NodeEntry::Ready(playback))
            }
        }
    }

    /// Handle a finished playback.
    ///
    /// Progress is saved once. XP is awarded only after a successful save of
    /// a first completion. The local transition is applied whatever the store
    /// says, and after a successful save the snapshot is reconciled with a
    /// fresh load.
    pub async fn complete_node(&mut self, completion: &NodeCompletion) -> Result<CompletionReport> {
        let node_id = completion.node_id.as_str();
        let node = self
            .snapshot
            .node(node_id)
            .ok_or_else(|| FlowError::UnknownNode(node_id.to_string()))?;
        if node.status == NodeStatus::Locked {
            return Err(FlowError::NodeLocked(node_id.to_string()).into());
        }
        let first_completion = node.status != NodeStatus::Completed;
        let xp_reward = node.xp_reward;

        let metadata = ProgressMetadata {
            time_spent_seconds: completion.time_spent_seconds,
            blocks_completed: completion.blocks_completed,
            completed_at: Utc::now(),
        };
        let saved = self
            .store
            .update_node_progress(&self.user_id, node_id, NodeStatus::Completed, metadata)
            .await;

        let progress_error = match saved {
            Ok(()) => None,
            Err(e) => {
                warn!(node_id = %node_id, error = %e, "Progress save failed, keeping local completion");
                self.events.emit(JourneyEvent::ProgressSaveFailed {
                    node_id: node_id.to_string(),
                    error: e.to_string(),
                });
                Some(e)
            }
        };

        let xp = if progress_error.is_none() && first_completion {
            self.award_xp(node_id, xp_reward).await
        } else {
            XpOutcome::Skipped
        };

        let transition = self.snapshot.complete(node_id)?;
        if progress_error.is_none() {
            self.refresh().await;
        }

        self.events.emit(JourneyEvent::NodeCompleted {
            node_id: node_id.to_string(),
            time_spent_seconds: completion.time_spent_seconds,
            blocks_completed: completion.blocks_completed,
            persisted: progress_error.is_none(),
        });
        if let Some(current) = self.snapshot.current() {
            if transition.current.as_deref() == Some(current.id.as_str()) {
                self.events.emit(JourneyEvent::NodeBecameCurrent {
                    node_id: current.id.clone(),
                });
            }
        }
        if transition.flow_complete {
            self.events.emit(JourneyEvent::FlowCompleted {
                flow_id: self.flow_id.clone(),
            });
        }

        Ok(CompletionReport {
            transition,
            progress_error,
            xp,
        })
    }

    /// Complete the node a finished playback belongs to.
    pub async fn finish_playback(&mut self, playback: &Playback) -> Result<CompletionReport> {
        let completion = playback.completion().cloned().ok_or_else(|| {
            JourneyError::Playback(PlaybackError::NotSatisfied {
                block_id: playback
                    .current()
                    .map(|c| c.block.id.clone())
                    .unwrap_or_default(),
            })
        })?;
        self.complete_node(&completion).await
    }

    async fn award_xp(&self, node_id: &str, amount: u32) -> XpOutcome {
        match self.store.award_xp(&self.user_id, amount).await {
            Ok(()) => {
                debug!(node_id = %node_id, amount, "XP awarded");
                self.events.emit(JourneyEvent::XpAwarded {
                    node_id: node_id.to_string(),
                    amount,
                });
                XpOutcome::Awarded(amount)
            }
            Err(e) => {
                warn!(node_id = %node_id, amount, error = %e, "XP award failed");
                self.events.emit(JourneyEvent::XpAwardFailed {
                    node_id: node_id.to_string(),
                    amount,
                    error: e.to_string(),
                });
                XpOutcome::Failed(e)
            }
        }
    }

    /// Merge the store's view back in. A failed reload keeps local state.
    async fn refresh(&mut self) {
        match self.store.load_nodes_for_flow(&self.flow_id).await {
            Ok(remote) => self.snapshot.reconcile(&remote),
            Err(e) => warn!(flow_id = %self.flow_id, error = %e, "Reload after save failed, keeping local state"),
        }
    }
}
