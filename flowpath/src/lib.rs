//! Learning flow model, canvas layout and node progression.
//!
//! A flow is an ordered list of learning nodes drawn as a winding path on a
//! scrollable canvas. This crate holds everything about a flow that does not
//! depend on a playback session:
//!
//! - **Model**: nodes, content blocks and assessment items as served by the store
//! - **Content**: typed parsing of loosely typed block payloads, with fallback
//! - **Layout**: column assignment, node positions and routed connector paths
//! - **Progression**: node status and the completion/unlock rule
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐      ┌──────────────────┐
//! │  Vec<Learning-   │─────▶│  layout()        │──▶ positions + SVG paths
//! │  Node> (store)   │      └──────────────────┘
//! │                  │      ┌──────────────────┐
//! │                  │─────▶│  FlowSnapshot    │──▶ open / complete / reconcile
//! └──────────────────┘      └──────────────────┘
//! ```

pub mod content;
pub mod layout;
pub mod progression;
pub mod types;

// Re-export main types
pub use content::BlockContent;
pub use layout::{layout, Column, Connector, FlowLayout, LayoutConfig, PositionedNode};
pub use progression::{FlowProgress, FlowSnapshot, NodeAccess, Transition, LOCKED_MESSAGE};
pub use types::*;
