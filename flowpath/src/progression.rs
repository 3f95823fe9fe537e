//! Node progression state machine.
//!
//! A [`FlowSnapshot`] is the in-memory arena of one flow's nodes for the
//! lifetime of a screen session. It owns node status and the explicit
//! `current` pointer, and applies the completion rule:
//!
//! 1. The completed node becomes `completed`.
//! 2. The first node (ascending `orderIndex`) that is `locked` or `available`
//!    becomes `current`; any other node that was `current` drops to `available`.
//! 3. When every node is `completed` there is no `current` node.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

#[cfg(feature = "typescript")]
use ts_rs::TS;

use crate::types::{FlowError, LearningNode, NodeId, NodeStatus, Result};

/// Shown when a learner taps a locked node.
pub const LOCKED_MESSAGE: &str = "Complete previous lessons to unlock this one";

/// Outcome of trying to open a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeAccess {
    /// Playback may start
    Enter,
    /// Informational - the node cannot be entered yet
    Locked { message: String },
}

/// Status changes produced by one completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct Transition {
    /// Node that was completed
    pub completed: NodeId,
    /// False when the node had already been completed before
    pub newly_completed: bool,
    /// Node promoted to `current`, if any
    pub current: Option<NodeId>,
    /// Previously current node demoted to `available`, if any
    pub demoted: Option<NodeId>,
    /// Every node is now completed
    pub flow_complete: bool,
}

/// Aggregate progress through a flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct FlowProgress {
    pub completed: usize,
    pub total: usize,
    /// Sum of `xpReward` over completed nodes
    pub xp_earned: u32,
    /// Rounded completion percentage
    pub percent: u8,
}

/// In-memory arena of a flow's nodes, ordered by `orderIndex`.
#[derive(Debug, Clone)]
pub struct FlowSnapshot {
    nodes: Vec<LearningNode>,
    by_id: HashMap<NodeId, usize>,
    current: Option<usize>,
}

impl FlowSnapshot {
    /// Build a snapshot from nodes as loaded from the store.
    ///
    /// Nodes are sorted by `orderIndex`; duplicate ids or order indices are
    /// rejected. Statuses are then normalized (see [`FlowSnapshot::reconcile`]).
    pub fn new(mut nodes: Vec<LearningNode>) -> Result<Self> {
        nodes.sort_by_key(|n| n.order_index);

        for pair in nodes.windows(2) {
            if pair[0].order_index == pair[1].order_index {
                return Err(FlowError::DuplicateOrderIndex {
                    order_index: pair[0].order_index,
                    first: pair[0].id.clone(),
                    second: pair[1].id.clone(),
                });
            }
        }

        let mut by_id = HashMap::with_capacity(nodes.len());
        for (i, node) in nodes.iter().enumerate() {
            if by_id.insert(node.id.clone(), i).is_some() {
                return Err(FlowError::DuplicateNodeId(node.id.clone()));
            }
        }

        let mut snapshot = Self {
            nodes,
            by_id,
            current: None,
        };
        snapshot.normalize();
        Ok(snapshot)
    }

    /// Nodes in flow order.
    pub fn nodes(&self) -> &[LearningNode] {
        &self.nodes
    }

    pub fn node(&self, id: &str) -> Option<&LearningNode> {
        self.by_id.get(id).map(|&i| &self.nodes[i])
    }

    pub fn status(&self, id: &str) -> Option<NodeStatus> {
        self.node(id).map(|n| n.status)
    }

    /// The node the learner should do next.
    pub fn current(&self) -> Option<&LearningNode> {
        self.current.map(|i| &self.nodes[i])
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn is_complete(&self) -> bool {
        !self.nodes.is_empty() && self.nodes.iter().all(|n| n.status == NodeStatus::Completed)
    }

    /// Check whether a node may be entered.
    pub fn open(&self, id: &str) -> Result<NodeAccess> {
        let node = self
            .node(id)
            .ok_or_else(|| FlowError::UnknownNode(id.to_string()))?;

        if node.status.is_enterable() {
            Ok(NodeAccess::Enter)
        } else {
            debug!(node_id = %id, "Locked node tapped");
            Ok(NodeAccess::Locked {
                message: LOCKED_MESSAGE.to_string(),
            })
        }
    }

    /// Apply a `NodeCompleted` event.
    pub fn complete(&mut self, id: &str) -> Result<Transition> {
        let idx = *self
            .by_id
            .get(id)
            .ok_or_else(|| FlowError::UnknownNode(id.to_string()))?;

        if self.nodes[idx].status == NodeStatus::Locked {
            return Err(FlowError::NodeLocked(id.to_string()));
        }

        if self.nodes[idx].status == NodeStatus::Completed {
            debug!(node_id = %id, "Node already completed");
            return Ok(Transition {
                completed: id.to_string(),
                newly_completed: false,
                current: self.current().map(|n| n.id.clone()),
                demoted: None,
                flow_complete: self.is_complete(),
            });
        }

        self.nodes[idx].status = NodeStatus::Completed;
        if self.current == Some(idx) {
            self.current = None;
        }

        let next = self.nodes.iter().position(|n| {
            matches!(n.status, NodeStatus::Locked | NodeStatus::Available)
        });

        let mut promoted = None;
        let mut demoted = None;
        if let Some(next) = next {
            if let Some(previous) = self.current.take() {
                self.nodes[previous].status = NodeStatus::Available;
                demoted = Some(self.nodes[previous].id.clone());
            }
            self.nodes[next].status = NodeStatus::Current;
            self.current = Some(next);
            promoted = Some(self.nodes[next].id.clone());
        }

        let flow_complete = self.is_complete();

        info!(
            node_id = %id,
            current = ?promoted,
            demoted = ?demoted,
            flow_complete,
            "Node completed"
        );

        Ok(Transition {
            completed: id.to_string(),
            newly_completed: true,
            current: promoted,
            demoted,
            flow_complete,
        })
    }

    /// Merge statuses reloaded from the store.
    ///
    /// Locally completed nodes stay completed even if the store disagrees (a
    /// failed save must not re-block the learner). Unknown remote nodes are
    /// ignored.
    pub fn reconcile(&mut self, remote: &[LearningNode]) {
        for remote_node in remote {
            match self.by_id.get(&remote_node.id) {
                Some(&i) => {
                    if self.nodes[i].status != NodeStatus::Completed {
                        self.nodes[i].status = remote_node.status;
                    }
                }
                None => debug!(node_id = %remote_node.id, "Ignoring unknown node during reconcile"),
            }
        }
        self.current = None;
        self.normalize();
    }

    /// Aggregate completion and XP.
    pub fn summary(&self) -> FlowProgress {
        let completed: Vec<&LearningNode> = self
            .nodes
            .iter()
            .filter(|n| n.status == NodeStatus::Completed)
            .collect();
        let total = self.nodes.len();
        let percent = if total == 0 {
            0
        } else {
            ((completed.len() as f64 * 100.0) / total as f64).round() as u8
        };

        FlowProgress {
            completed: completed.len(),
            total,
            xp_earned: completed.iter().fold(0u32, |xp, n| xp.saturating_add(n.xp_reward)),
            percent,
        }
    }

    /// Enforce the status invariants on freshly loaded or merged data.
    fn normalize(&mut self) {
        // Nothing past a locked node may be reachable
        let mut seen_locked = false;
        for node in &mut self.nodes {
            match node.status {
                NodeStatus::Locked => seen_locked = true,
                NodeStatus::Available | NodeStatus::Current if seen_locked => {
                    warn!(node_id = %node.id, status = node.status.as_str(), "Relocking node downstream of a locked node");
                    node.status = NodeStatus::Locked;
                }
                _ => {}
            }
        }

        // At most one current; the first wins
        self.current = None;
        for (i, node) in self.nodes.iter_mut().enumerate() {
            if node.status == NodeStatus::Current {
                if self.current.is_none() {
                    self.current = Some(i);
                } else {
                    warn!(node_id = %node.id, "Demoting extra current node");
                    node.status = NodeStatus::Available;
                }
            }
        }

        if self.current.is_none() {
            self.current = self.resolve_current();
            if let Some(i) = self.current {
                self.nodes[i].status = NodeStatus::Current;
            }
        }
    }

    /// First available node; failing that, a locked node whose predecessors
    /// are all completed (an unlock the store missed).
    fn resolve_current(&self) -> Option<usize> {
        if let Some(i) = self.nodes.iter().position(|n| n.status == NodeStatus::Available) {
            return Some(i);
        }
        let first_open = self
            .nodes
            .iter()
            .position(|n| n.status != NodeStatus::Completed)?;
        (first_open > 0 && self.nodes[first_open].status == NodeStatus::Locked).then_some(first_open)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flow(statuses: &[NodeStatus]) -> FlowSnapshot {
        let nodes = statuses
            .iter()
            .enumerate()
            .map(|(i, s)| {
                LearningNode::new(format!("n{}", i), format!("Node {}", i), i as u32)
                    .with_status(*s)
                    .with_xp(10)
            })
            .collect();
        FlowSnapshot::new(nodes).unwrap()
    }

    fn statuses(snapshot: &FlowSnapshot) -> Vec<NodeStatus> {
        snapshot.nodes().iter().map(|n| n.status).collect()
    }

    fn assert_invariants(snapshot: &FlowSnapshot) {
        let current_count = snapshot
            .nodes()
            .iter()
            .filter(|n| n.status == NodeStatus::Current)
            .count();
        assert!(current_count <= 1, "more than one current: {:?}", statuses(snapshot));

        let mut seen_locked = false;
        for node in snapshot.nodes() {
            if seen_locked {
                assert!(
                    !matches!(node.status, NodeStatus::Available | NodeStatus::Current),
                    "reachable node after a locked one: {:?}",
                    statuses(snapshot)
                );
            }
            if node.status == NodeStatus::Locked {
                seen_locked = true;
            }
        }
    }

    use NodeStatus::*;

    #[test]
    fn test_sorts_by_order_index() {
        let nodes = vec![
            LearningNode::new("b", "B", 2),
            LearningNode::new("a", "A", 1).with_status(Available),
        ];
        let snapshot = FlowSnapshot::new(nodes).unwrap();
        assert_eq!(snapshot.nodes()[0].id, "a");
        assert_eq!(snapshot.current().unwrap().id, "a");
    }

    #[test]
    fn test_rejects_duplicates() {
        let dup_order = vec![LearningNode::new("a", "A", 1), LearningNode::new("b", "B", 1)];
        assert!(matches!(
            FlowSnapshot::new(dup_order),
            Err(FlowError::DuplicateOrderIndex { order_index: 1, .. })
        ));

        let dup_id = vec![LearningNode::new("a", "A", 1), LearningNode::new("a", "B", 2)];
        assert_eq!(
            FlowSnapshot::new(dup_id).unwrap_err(),
            FlowError::DuplicateNodeId("a".into())
        );
    }

    #[test]
    fn test_complete_unlocks_next() {
        let mut snapshot = flow(&[Current, Locked, Locked]);
        let transition = snapshot.complete("n0").unwrap();

        assert_eq!(statuses(&snapshot), vec![Completed, Current, Locked]);
        assert_eq!(transition.current.as_deref(), Some("n1"));
        assert_eq!(transition.demoted, None);
        assert!(transition.newly_completed);
        assert!(!transition.flow_complete);
    }

    #[test]
    fn test_completing_non_current_demotes_previous_current() {
        let mut snapshot = flow(&[Available, Current, Locked]);
        let transition = snapshot.complete("n0").unwrap();

        assert_eq!(statuses(&snapshot), vec![Completed, Available, Current]);
        assert_eq!(transition.demoted.as_deref(), Some("n1"));
        assert_invariants(&snapshot);
    }

    #[test]
    fn test_terminal_state_has_no_current() {
        let mut snapshot = flow(&[Current, Locked]);
        snapshot.complete("n0").unwrap();
        let transition = snapshot.complete("n1").unwrap();

        assert!(transition.flow_complete);
        assert!(transition.current.is_none());
        assert!(snapshot.current().is_none());
        assert!(snapshot.is_complete());
    }

    #[test]
    fn test_recompleting_is_harmless() {
        let mut snapshot = flow(&[Completed, Current, Locked]);
        let transition = snapshot.complete("n0").unwrap();

        assert!(!transition.newly_completed);
        assert_eq!(statuses(&snapshot), vec![Completed, Current, Locked]);
    }

    #[test]
    fn test_locked_node_cannot_be_opened_or_completed() {
        let mut snapshot = flow(&[Current, Locked]);

        assert_eq!(
            snapshot.open("n1").unwrap(),
            NodeAccess::Locked {
                message: LOCKED_MESSAGE.to_string()
            }
        );
        assert_eq!(snapshot.open("n0").unwrap(), NodeAccess::Enter);
        assert_eq!(snapshot.complete("n1").unwrap_err(), FlowError::NodeLocked("n1".into()));
        assert_eq!(
            snapshot.open("missing").unwrap_err(),
            FlowError::UnknownNode("missing".into())
        );
    }

    #[test]
    fn test_normalize_on_load() {
        // two currents, nothing reachable after a lock
        let snapshot = flow(&[Current, Current, Locked, Available]);
        assert_eq!(statuses(&snapshot), vec![Current, Available, Locked, Locked]);

        // first available is promoted
        let snapshot = flow(&[Completed, Available, Locked]);
        assert_eq!(statuses(&snapshot), vec![Completed, Current, Locked]);

        // missed unlock is healed
        let snapshot = flow(&[Completed, Locked, Locked]);
        assert_eq!(statuses(&snapshot), vec![Completed, Current, Locked]);

        // a fully locked flow stays locked
        let snapshot = flow(&[Locked, Locked]);
        assert_eq!(statuses(&snapshot), vec![Locked, Locked]);
        assert!(snapshot.current().is_none());
    }

    #[test]
    fn test_invariants_hold_over_any_completion_order() {
        let mut snapshot = flow(&[Current, Available, Locked, Locked, Locked, Locked]);
        let order = ["n1", "n0", "n2", "n3", "n3", "n5", "n4"];
        for id in order {
            // locked nodes are refused; everything else must keep invariants
            let _ = snapshot.complete(id);
            assert_invariants(&snapshot);
        }
        assert!(snapshot.is_complete());
    }

    #[test]
    fn test_reconcile_keeps_local_completion() {
        let mut snapshot = flow(&[Current, Locked, Locked]);
        snapshot.complete("n0").unwrap();

        // store never saw the completion
        let remote = vec![
            LearningNode::new("n0", "Node 0", 0).with_status(Current),
            LearningNode::new("n1", "Node 1", 1).with_status(Locked),
            LearningNode::new("n2", "Node 2", 2).with_status(Locked),
        ];
        snapshot.reconcile(&remote);

        assert_eq!(statuses(&snapshot), vec![Completed, Current, Locked]);
        assert_eq!(snapshot.current().unwrap().id, "n1");
    }

    #[test]
    fn test_reconcile_adopts_remote_unlocks() {
        let mut snapshot = flow(&[Current, Locked, Locked]);
        let remote = vec![
            LearningNode::new("n0", "Node 0", 0).with_status(Completed),
            LearningNode::new("n1", "Node 1", 1).with_status(Available),
            LearningNode::new("ghost", "Ghost", 9).with_status(Available),
        ];
        snapshot.reconcile(&remote);

        assert_eq!(statuses(&snapshot), vec![Completed, Current, Locked]);
    }

    #[test]
    fn test_summary() {
        let mut snapshot = flow(&[Current, Locked, Locked]);
        assert_eq!(snapshot.summary().percent, 0);

        snapshot.complete("n0").unwrap();
        let summary = snapshot.summary();
        assert_eq!(summary.completed, 1);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.xp_earned, 10);
        assert_eq!(summary.percent, 33);
    }

    #[test]
    fn test_summary_xp_saturates() {
        let nodes = vec![
            LearningNode::new("a", "A", 0).with_status(Completed).with_xp(u32::MAX),
            LearningNode::new("b", "B", 1).with_status(Completed).with_xp(5),
        ];
        let snapshot = FlowSnapshot::new(nodes).unwrap();
        assert_eq!(snapshot.summary().xp_earned, u32::MAX);
    }
}
