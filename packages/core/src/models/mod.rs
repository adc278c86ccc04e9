//! Data Models
//!
//! This module contains the core data structures used throughout Stowage:
//!
//! - `Node` - a vertex of the location tree with its materialized path
//! - `NewNode` / `NodeUpdate` - creation and partial-update shapes
//! - `NodeFilter` - enumerated query predicate
//! - `MovePosition` / `SiblingOrder` / `TreeConfig` - structural policy types
//! - `Attachment` - owned per-node attachment metadata

mod attachment;
mod node;

pub use attachment::{Attachment, NewAttachment};
pub use node::{
    MovePosition, NewNode, Node, NodeFilter, NodeType, NodeUpdate, ParsePositionError,
    SiblingOrder, TreeConfig, ValidationError, DEFAULT_CLEANED_INTERVAL_DAYS,
};
