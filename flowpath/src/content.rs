//! Typed view over the loosely typed `ContentBlock.data` payload.
//!
//! Parsing never fails: unknown block types and payloads missing required
//! fields become [`BlockContent::Unsupported`], which playback renders as a
//! skippable "unsupported content" card.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::types::{AssessmentItem, BlockType, ContentBlock};

/// Text or note body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextContent {
    pub content: String,
    #[serde(default)]
    pub title: Option<String>,
}

/// A set of questions scored together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackContent {
    pub questions: Vec<AssessmentItem>,
    #[serde(default)]
    pub title: Option<String>,
}

/// An opinion poll. Counts are cosmetic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollContent {
    pub question: String,
    pub options: Vec<String>,
    #[serde(default)]
    pub allow_multiple: bool,
    /// Prior vote tallies, one per option
    #[serde(default)]
    pub votes: Vec<u32>,
}

/// A video to watch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoContent {
    #[serde(alias = "videoUrl")]
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub duration_seconds: Option<u32>,
}

/// An image or meme.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageContent {
    #[serde(alias = "imageUrl")]
    pub url: String,
    #[serde(default)]
    pub caption: Option<String>,
}

/// A code listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeContent {
    pub code: String,
    #[serde(default)]
    pub language: Option<String>,
}

/// Parsed block payload.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockContent {
    Text(TextContent),
    Note(TextContent),
    Mcq(AssessmentItem),
    McqPack(PackContent),
    Poll(PollContent),
    Video(VideoContent),
    Image(ImageContent),
    Meme(ImageContent),
    Code(CodeContent),
    /// Fallback for unknown types and malformed payloads
    Unsupported { block_type: BlockType, reason: String },
}

impl BlockContent {
    /// Parse a block's payload according to its type.
    pub fn parse(block: &ContentBlock) -> Self {
        let parsed = match block.block_type {
            BlockType::Text => decode(block).map(Self::Text),
            BlockType::Note => decode(block).map(Self::Note),
            BlockType::Mcq => decode::<AssessmentItem>(block).and_then(|item| {
                if item.is_well_formed() {
                    Ok(Self::Mcq(item))
                } else {
                    Err("mcq needs at least two options and an in-range correct answer".to_string())
                }
            }),
            BlockType::McqPack => decode::<PackContent>(block).and_then(|pack| {
                if pack.questions.is_empty() {
                    Err("mcq_pack has no questions".to_string())
                } else if let Some(i) = pack.questions.iter().position(|q| !q.is_well_formed()) {
                    Err(format!("mcq_pack question {} is malformed", i))
                } else {
                    Ok(Self::McqPack(pack))
                }
            }),
            BlockType::Poll => decode::<PollContent>(block).and_then(|poll| {
                if poll.options.len() < 2 {
                    Err("poll needs at least two options".to_string())
                } else {
                    Ok(Self::Poll(poll))
                }
            }),
            BlockType::Video => decode(block).map(Self::Video),
            BlockType::Image => decode(block).map(Self::Image),
            BlockType::Meme => decode(block).map(Self::Meme),
            BlockType::Code => decode(block).map(Self::Code),
            BlockType::Unsupported => Err("unknown block type".to_string()),
        };

        parsed.unwrap_or_else(|reason| {
            warn!(
                block_id = %block.id,
                block_type = block.block_type.as_str(),
                reason = %reason,
                "Falling back to unsupported content"
            );
            Self::Unsupported {
                block_type: block.block_type,
                reason,
            }
        })
    }

    /// Blocks cleared by a plain "continue" tap.
    pub fn is_passive(&self) -> bool {
        matches!(
            self,
            Self::Text(_)
                | Self::Note(_)
                | Self::Image(_)
                | Self::Meme(_)
                | Self::Code(_)
                | Self::Unsupported { .. }
        )
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported { .. })
    }
}

fn decode<T: for<'de> Deserialize<'de>>(block: &ContentBlock) -> Result<T, String> {
    serde_json::from_value(block.data.clone()).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn block(block_type: BlockType, data: serde_json::Value) -> ContentBlock {
        ContentBlock::new("b", 1, block_type, data)
    }

    #[test]
    fn test_parse_text() {
        let content = BlockContent::parse(&block(BlockType::Text, json!({ "content": "Hello" })));
        assert_eq!(
            content,
            BlockContent::Text(TextContent {
                content: "Hello".into(),
                title: None
            })
        );
        assert!(content.is_passive());
    }

    #[test]
    fn test_parse_mcq() {
        let content = BlockContent::parse(&block(
            BlockType::Mcq,
            json!({ "question": "Q", "options": ["a", "b", "c"], "correctAnswer": 2, "explanation": "c" }),
        ));
        match content {
            BlockContent::Mcq(item) => {
                assert_eq!(item.correct_answer_index, 2);
                assert_eq!(item.explanation.as_deref(), Some("c"));
            }
            other => panic!("expected mcq, got {:?}", other),
        }
    }

    #[test]
    fn test_mcq_with_out_of_range_answer_is_unsupported() {
        let content = BlockContent::parse(&block(
            BlockType::Mcq,
            json!({ "question": "Q", "options": ["a", "b"], "correctAnswer": 5 }),
        ));
        assert!(content.is_unsupported());
        assert!(content.is_passive());
    }

    #[test]
    fn test_missing_fields_fall_back() {
        assert!(BlockContent::parse(&block(BlockType::Video, json!({}))).is_unsupported());
        assert!(BlockContent::parse(&block(BlockType::Code, json!(null))).is_unsupported());
        assert!(BlockContent::parse(&block(BlockType::McqPack, json!({ "questions": [] }))).is_unsupported());
        assert!(BlockContent::parse(&block(BlockType::Poll, json!({ "question": "?", "options": ["only"] })))
            .is_unsupported());
    }

    #[test]
    fn test_unknown_type_is_unsupported() {
        let content = BlockContent::parse(&block(BlockType::Unsupported, json!({ "content": "x" })));
        assert!(matches!(
            content,
            BlockContent::Unsupported {
                block_type: BlockType::Unsupported,
                ..
            }
        ));
    }

    #[test]
    fn test_poll_defaults() {
        let content = BlockContent::parse(&block(
            BlockType::Poll,
            json!({ "question": "Favourite?", "options": ["x", "y"] }),
        ));
        match content {
            BlockContent::Poll(poll) => {
                assert!(!poll.allow_multiple);
                assert!(poll.votes.is_empty());
            }
            other => panic!("expected poll, got {:?}", other),
        }
    }

    #[test]
    fn test_image_url_alias() {
        let content = BlockContent::parse(&block(BlockType::Meme, json!({ "imageUrl": "https://x/y.png" })));
        assert!(matches!(content, BlockContent::Meme(ImageContent { ref url, .. }) if url == "https://x/y.png"));
    }
}
