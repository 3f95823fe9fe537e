//! Core types for learning flows.
//!
//! These mirror the records served by the persistence layer. Field names are
//! camelCase on the wire so payloads from the app backend deserialize as-is.
//!
//! With the `typescript` feature enabled, these types can be exported to TypeScript
//! using ts-rs for consistency with the mobile frontend.

use serde::{Deserialize, Serialize};

#[cfg(feature = "typescript")]
use ts_rs::TS;

/// Opaque node key, stable across layout runs.
pub type NodeId = String;

/// What a node teaches or asks of the learner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Lesson,
    Quiz,
    Project,
    Milestone,
}

impl Default for NodeKind {
    fn default() -> Self {
        Self::Lesson
    }
}

/// Progression status of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    /// Not yet reachable - cannot be entered
    Locked,
    /// Reachable but not the learner's focus
    Available,
    /// The single node the learner should do next
    Current,
    /// Finished
    Completed,
}

impl NodeStatus {
    /// Get string representation for logs and persistence
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Locked => "locked",
            Self::Available => "available",
            Self::Current => "current",
            Self::Completed => "completed",
        }
    }

    /// Whether a learner may start playback of a node in this status.
    pub fn is_enterable(&self) -> bool {
        !matches!(self, Self::Locked)
    }
}

impl Default for NodeStatus {
    fn default() -> Self {
        Self::Locked
    }
}

/// Difficulty label shown on a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Default for Difficulty {
    fn default() -> Self {
        Self::Easy
    }
}

/// One unit of a learning path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct LearningNode {
    /// Unique node ID
    pub id: NodeId,
    /// Display title
    pub title: String,
    /// Node kind
    #[serde(default)]
    pub kind: NodeKind,
    /// Last known progression status
    #[serde(default)]
    pub status: NodeStatus,
    /// Difficulty label
    #[serde(default)]
    pub difficulty: Difficulty,
    /// XP awarded on completion
    #[serde(default)]
    pub xp_reward: u32,
    /// Position in the flow; defines layout column and unlock order
    pub order_index: u32,
    /// Playable content, ascending by `order`
    #[serde(default)]
    pub content_blocks: Vec<ContentBlock>,
}

impl LearningNode {
    /// Create a lesson node with no content.
    pub fn new(id: impl Into<String>, title: impl Into<String>, order_index: u32) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            kind: NodeKind::default(),
            status: NodeStatus::default(),
            difficulty: Difficulty::default(),
            xp_reward: 0,
            order_index,
            content_blocks: Vec::new(),
        }
    }

    /// Set the status.
    pub fn with_status(mut self, status: NodeStatus) -> Self {
        self.status = status;
        self
    }

    /// Set the node kind.
    pub fn with_kind(mut self, kind: NodeKind) -> Self {
        self.kind = kind;
        self
    }

    /// Set the XP reward.
    pub fn with_xp(mut self, xp_reward: u32) -> Self {
        self.xp_reward = xp_reward;
        self
    }

    /// Append a content block.
    pub fn with_block(mut self, block: ContentBlock) -> Self {
        self.content_blocks.push(block);
        self
    }
}

/// Kind of playable content inside a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum BlockType {
    Text,
    Note,
    Mcq,
    McqPack,
    Poll,
    Video,
    Image,
    Meme,
    Code,
    /// Any type string this engine does not know
    #[serde(other)]
    Unsupported,
}

impl BlockType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Note => "note",
            Self::Mcq => "mcq",
            Self::McqPack => "mcq_pack",
            Self::Poll => "poll",
            Self::Video => "video",
            Self::Image => "image",
            Self::Meme => "meme",
            Self::Code => "code",
            Self::Unsupported => "unsupported",
        }
    }
}

/// One atomic piece of playable content.
///
/// `data` is kept loosely typed; see [`crate::content::BlockContent`] for the
/// typed view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct ContentBlock {
    pub id: String,
    pub order: u32,
    #[serde(rename = "type")]
    pub block_type: BlockType,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl ContentBlock {
    pub fn new(id: impl Into<String>, order: u32, block_type: BlockType, data: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            order,
            block_type,
            data,
        }
    }
}

/// A single multiple-choice question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct AssessmentItem {
    pub question: String,
    pub options: Vec<String>,
    #[serde(alias = "correctAnswer")]
    pub correct_answer_index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

impl AssessmentItem {
    pub fn new(question: impl Into<String>, options: Vec<String>, correct_answer_index: usize) -> Self {
        Self {
            question: question.into(),
            options,
            correct_answer_index,
            explanation: None,
        }
    }

    pub fn with_explanation(mut self, explanation: impl Into<String>) -> Self {
        self.explanation = Some(explanation.into());
        self
    }

    /// Whether `option` is the correct answer.
    pub fn is_correct(&self, option: usize) -> bool {
        option == self.correct_answer_index
    }

    /// At least two options and an in-range correct index.
    pub fn is_well_formed(&self) -> bool {
        self.options.len() >= 2 && self.correct_answer_index < self.options.len()
    }
}

/// A point on the flow canvas.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Errors from flow construction and progression.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FlowError {
    /// Two nodes share an id
    #[error("Duplicate node id: {0}")]
    DuplicateNodeId(NodeId),

    /// Two nodes share an order index
    #[error("Duplicate order index {order_index} (nodes {first} and {second})")]
    DuplicateOrderIndex {
        order_index: u32,
        first: NodeId,
        second: NodeId,
    },

    /// Node is not part of this flow
    #[error("Unknown node: {0}")]
    UnknownNode(NodeId),

    /// Node cannot be entered yet
    #[error("Node is locked: {0}")]
    NodeLocked(NodeId),
}

pub type Result<T> = std::result::Result<T, FlowError>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_node_deserializes_camel_case() {
        let node: LearningNode = serde_json::from_value(json!({
            "id": "n1",
            "title": "Variables",
            "kind": "quiz",
            "status": "available",
            "difficulty": "hard",
            "xpReward": 50,
            "orderIndex": 3,
            "contentBlocks": [
                { "id": "b1", "order": 1, "type": "text", "data": { "content": "hi" } }
            ]
        }))
        .unwrap();

        assert_eq!(node.kind, NodeKind::Quiz);
        assert_eq!(node.status, NodeStatus::Available);
        assert_eq!(node.xp_reward, 50);
        assert_eq!(node.order_index, 3);
        assert_eq!(node.content_blocks[0].block_type, BlockType::Text);
    }

    #[test]
    fn test_unknown_block_type_is_unsupported() {
        let block: ContentBlock = serde_json::from_value(json!({
            "id": "b1", "order": 1, "type": "hologram"
        }))
        .unwrap();
        assert_eq!(block.block_type, BlockType::Unsupported);
        assert!(block.data.is_null());
    }

    #[test]
    fn test_item_accepts_correct_answer_alias() {
        let item: AssessmentItem = serde_json::from_value(json!({
            "question": "2 + 2?",
            "options": ["3", "4"],
            "correctAnswer": 1
        }))
        .unwrap();
        assert!(item.is_correct(1));
        assert!(!item.is_correct(0));
        assert!(item.is_well_formed());
    }

    #[test]
    fn test_locked_is_not_enterable() {
        assert!(!NodeStatus::Locked.is_enterable());
        assert!(NodeStatus::Available.is_enterable());
        assert!(NodeStatus::Completed.is_enterable());
    }
}
