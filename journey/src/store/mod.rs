//! Persistence seam.
//!
//! The journey never talks to a database or HTTP API directly. Everything
//! that leaves the process goes through a [`ProgressStore`]:
//! - loading a flow's nodes with their last known status
//! - recording a node completion (exactly once per completion)
//! - awarding XP (only after the completion was recorded)
//! - recording standalone quiz attempts (best-effort)

pub mod mock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use flowpath::{LearningNode, NodeStatus};
use playback::assessment::ItemOutcome;
use playback::ScoreResult;

#[cfg(feature = "typescript")]
use ts_rs::TS;

pub use crate::error::StoreError;
pub use mock::MockStore;

/// Metadata saved with a node completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct ProgressMetadata {
    #[serde(rename = "timeSpent")]
    pub time_spent_seconds: u64,
    pub blocks_completed: usize,
    #[cfg_attr(feature = "typescript", ts(type = "string"))]
    pub completed_at: DateTime<Utc>,
}

/// A finished standalone quiz.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct AssessmentAttempt {
    #[cfg_attr(feature = "typescript", ts(type = "string"))]
    pub id: Uuid,
    pub user_id: String,
    pub quiz_id: String,
    pub score_percent: u8,
    pub correct_count: usize,
    pub total_items: usize,
    pub time_taken_seconds: u64,
    pub timed_out: bool,
    pub passed: bool,
    pub answers: Vec<ItemOutcome>,
    #[cfg_attr(feature = "typescript", ts(type = "string"))]
    pub completed_at: DateTime<Utc>,
}

impl AssessmentAttempt {
    /// Build an attempt record from a score.
    pub fn from_result(
        user_id: impl Into<String>,
        quiz_id: impl Into<String>,
        result: &ScoreResult,
        pass_threshold_percent: u8,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            quiz_id: quiz_id.into(),
            score_percent: result.score_percent,
            correct_count: result.correct_count,
            total_items: result.total_items,
            time_taken_seconds: result.time_taken_seconds,
            timed_out: result.timed_out,
            passed: result.passed(pass_threshold_percent),
            answers: result.items.clone(),
            completed_at: Utc::now(),
        }
    }
}

/// Backing store for flows and learner progress.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Nodes of a flow, ascending by `orderIndex`, with last known status.
    async fn load_nodes_for_flow(&self, flow_id: &str) -> Result<Vec<LearningNode>, StoreError>;

    /// Record a node status change. Called once per completion.
    async fn update_node_progress(
        &self,
        user_id: &str,
        node_id: &str,
        status: NodeStatus,
        metadata: ProgressMetadata,
    ) -> Result<(), StoreError>;

    /// Credit XP to a learner.
    async fn award_xp(&self, user_id: &str, amount: u32) -> Result<(), StoreError>;

    /// Record a finished quiz.
    async fn record_assessment_attempt(&self, attempt: AssessmentAttempt) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_metadata_wire_names() {
        let metadata = ProgressMetadata {
            time_spent_seconds: 42,
            blocks_completed: 3,
            completed_at: DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
        };
        let json = serde_json::to_value(&metadata).unwrap();
        assert_eq!(json["timeSpent"], 42);
        assert_eq!(json["blocksCompleted"], 3);
        assert_eq!(json["completedAt"], "2024-05-01T12:00:00Z");
    }

    #[test]
    fn test_attempt_from_result() {
        let result = ScoreResult {
            total_items: 4,
            correct_count: 3,
            incorrect_count: 1,
            unanswered_count: 0,
            score_percent: 75,
            time_taken_seconds: 90,
            timed_out: false,
            items: vec![],
        };
        let attempt = AssessmentAttempt::from_result("u1", "quiz-1", &result, 70);
        assert!(attempt.passed);
        assert_eq!(attempt.score_percent, 75);
        assert!(!AssessmentAttempt::from_result("u1", "quiz-1", &result, 80).passed);
    }
}
