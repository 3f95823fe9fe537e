//! In-memory store for tests and headless runs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use flowpath::{LearningNode, NodeStatus};

use super::{AssessmentAttempt, ProgressMetadata, ProgressStore, StoreError};

/// One recorded `update_node_progress` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressUpdate {
    pub user_id: String,
    pub node_id: String,
    pub status: NodeStatus,
    pub metadata: ProgressMetadata,
}

#[derive(Default)]
struct Recorded {
    flows: HashMap<String, Vec<LearningNode>>,
    progress: Vec<ProgressUpdate>,
    xp: Vec<(String, u32)>,
    attempts: Vec<AssessmentAttempt>,
}

/// Mock store.
///
/// Holds flows in memory, records every write, and can be told to fail
/// individual operations.
pub struct MockStore {
    state: Mutex<Recorded>,
    fail_load: AtomicBool,
    fail_progress: AtomicBool,
    fail_xp: AtomicBool,
    fail_attempts: AtomicBool,
    load_calls: AtomicU32,
    progress_calls: AtomicU32,
    xp_calls: AtomicU32,
    attempt_calls: AtomicU32,
}

impl MockStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(Recorded::default()),
            fail_load: AtomicBool::new(false),
            fail_progress: AtomicBool::new(false),
            fail_xp: AtomicBool::new(false),
            fail_attempts: AtomicBool::new(false),
            load_calls: AtomicU32::new(0),
            progress_calls: AtomicU32::new(0),
            xp_calls: AtomicU32::new(0),
            attempt_calls: AtomicU32::new(0),
        }
    }

    /// Seed a flow.
    pub fn with_flow(mut self, flow_id: impl Into<String>, nodes: Vec<LearningNode>) -> Self {
        self.state.get_mut().flows.insert(flow_id.into(), nodes);
        self
    }

    pub fn with_failing_load(self, fail: bool) -> Self {
        self.set_fail_load(fail);
        self
    }

    pub fn with_failing_progress(self, fail: bool) -> Self {
        self.set_fail_progress(fail);
        self
    }

    pub fn with_failing_xp(self, fail: bool) -> Self {
        self.set_fail_xp(fail);
        self
    }

    pub fn with_failing_attempts(self, fail: bool) -> Self {
        self.set_fail_attempts(fail);
        self
    }

    pub fn set_fail_load(&self, fail: bool) {
        self.fail_load.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_progress(&self, fail: bool) {
        self.fail_progress.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_xp(&self, fail: bool) {
        self.fail_xp.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_attempts(&self, fail: bool) {
        self.fail_attempts.store(fail, Ordering::SeqCst);
    }

    pub fn load_calls(&self) -> u32 {
        self.load_calls.load(Ordering::SeqCst)
    }

    pub fn progress_calls(&self) -> u32 {
        self.progress_calls.load(Ordering::SeqCst)
    }

    pub fn xp_calls(&self) -> u32 {
        self.xp_calls.load(Ordering::SeqCst)
    }

    pub fn attempt_calls(&self) -> u32 {
        self.attempt_calls.load(Ordering::SeqCst)
    }

    /// Successful progress writes, in call order.
    pub async fn progress_updates(&self) -> Vec<ProgressUpdate> {
        self.state.lock().await.progress.clone()
    }

    /// Successful XP awards, in call order.
    pub async fn xp_awards(&self) -> Vec<(String, u32)> {
        self.state.lock().await.xp.clone()
    }

    pub async fn attempts(&self) -> Vec<AssessmentAttempt> {
        self.state.lock().await.attempts.clone()
    }

    /// Replace a stored node's status, as another device might.
    pub async fn set_status(&self, flow_id: &str, node_id: &str, status: NodeStatus) {
        let mut state = self.state.lock().await;
        if let Some(node) = state
            .flows
            .get_mut(flow_id)
            .and_then(|nodes| nodes.iter_mut().find(|n| n.id == node_id))
        {
            node.status = status;
        }
    }
}

impl Default for MockStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProgressStore for MockStore {
    async fn load_nodes_for_flow(&self, flow_id: &str) -> Result<Vec<LearningNode>, StoreError> {
        self.load_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_load.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("Mock load disabled".to_string()));
        }

        let state = self.state.lock().await;
        let mut nodes = state
            .flows
            .get(flow_id)
            .cloned()
            .ok_or_else(|| StoreError::FlowNotFound(flow_id.to_string()))?;
        nodes.sort_by_key(|n| n.order_index);
        Ok(nodes)
    }

    async fn update_node_progress(
        &self,
        user_id: &str,
        node_id: &str,
        status: NodeStatus,
        metadata: ProgressMetadata,
    ) -> Result<(), StoreError> {
        self.progress_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_progress.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("Mock progress disabled".to_string()));
        }

        let mut state = self.state.lock().await;
        for node in state.flows.values_mut().flat_map(|nodes| nodes.iter_mut()) {
            if node.id == node_id {
                node.status = status;
            }
        }
        state.progress.push(ProgressUpdate {
            user_id: user_id.to_string(),
            node_id: node_id.to_string(),
            status,
            metadata,
        });
        Ok(())
    }

    async fn award_xp(&self, user_id: &str, amount: u32) -> Result<(), StoreError> {
        self.xp_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_xp.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("Mock XP disabled".to_string()));
        }
        self.state.lock().await.xp.push((user_id.to_string(), amount));
        Ok(())
    }

    async fn record_assessment_attempt(&self, attempt: AssessmentAttempt) -> Result<(), StoreError> {
        self.attempt_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_attempts.load(Ordering::SeqCst) {
            return Err(StoreError::Rejected("Mock attempts disabled".to_string()));
        }
        self.state.lock().await.attempts.push(attempt);
        Ok(())
    }
}
