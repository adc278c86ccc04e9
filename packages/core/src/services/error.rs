//! Service Layer Error Types
//!
//! This module defines the typed error kinds for tree operations. Every
//! structural-invariant violation is detected before any mutation is
//! applied and reported through one of these variants, never partially
//! applied, never silently corrected.

use thiserror::Error;

use crate::db::{PathError, StoreError};
use crate::models::ValidationError;

/// Tree operation errors.
#[derive(Error, Debug)]
pub enum TreeServiceError {
    /// Node not found by id
    #[error("node not found: {id}")]
    NotFound { id: String },

    /// Create-child target does not exist
    #[error("parent not found: {id}")]
    ParentNotFound { id: String },

    /// Attempted child attach under a non-container
    #[error("cannot add children to non-container node '{id}'")]
    NonContainerParent { id: String },

    /// Attempted move under a non-container
    #[error("cannot move under non-container node '{id}'")]
    NonContainerTarget { id: String },

    /// is_container → false while the node still has children
    #[error("cannot make node '{id}' a non-container: it has {numchild} children")]
    ContainerDemotionBlocked { id: String, numchild: u32 },

    /// Delete attempted on a non-leaf
    #[error("cannot delete node '{id}': it has {numchild} children")]
    HasChildren { id: String, numchild: u32 },

    /// A node cannot be moved relative to itself
    #[error("cannot move node '{id}' relative to itself")]
    MoveToSelf { id: String },

    /// Cycle prevention: the destination lies inside the moved subtree
    #[error("cannot move node '{id}' into its own descendant '{target}'")]
    MoveToDescendant { id: String, target: String },

    /// Unusable move position (unknown token, or a sibling position with no
    /// reference node)
    #[error("invalid move position: {reason}")]
    InvalidPosition { reason: String },

    /// Attachment not found by id
    #[error("attachment not found: {id}")]
    AttachmentNotFound { id: String },

    /// Field validation failed
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Path codec failure; malformed stored segments are corruption and
    /// fatal to the operation
    #[error("path error: {0}")]
    Path(#[from] PathError),

    /// Store failure
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl TreeServiceError {
    /// Create a not-found error.
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    /// Create a parent-not-found error.
    pub fn parent_not_found(id: impl Into<String>) -> Self {
        Self::ParentNotFound { id: id.into() }
    }

    /// Create a non-container-parent error.
    pub fn non_container_parent(id: impl Into<String>) -> Self {
        Self::NonContainerParent { id: id.into() }
    }

    /// Create a non-container-target error.
    pub fn non_container_target(id: impl Into<String>) -> Self {
        Self::NonContainerTarget { id: id.into() }
    }

    /// Create a container-demotion-blocked error.
    pub fn container_demotion_blocked(id: impl Into<String>, numchild: u32) -> Self {
        Self::ContainerDemotionBlocked {
            id: id.into(),
            numchild,
        }
    }

    /// Create a has-children error.
    pub fn has_children(id: impl Into<String>, numchild: u32) -> Self {
        Self::HasChildren {
            id: id.into(),
            numchild,
        }
    }

    /// Create a move-to-self error.
    pub fn move_to_self(id: impl Into<String>) -> Self {
        Self::MoveToSelf { id: id.into() }
    }

    /// Create a move-to-descendant error.
    pub fn move_to_descendant(id: impl Into<String>, target: impl Into<String>) -> Self {
        Self::MoveToDescendant {
            id: id.into(),
            target: target.into(),
        }
    }

    /// Create an invalid-position error.
    pub fn invalid_position(reason: impl Into<String>) -> Self {
        Self::InvalidPosition {
            reason: reason.into(),
        }
    }

    /// Create an attachment-not-found error.
    pub fn attachment_not_found(id: impl Into<String>) -> Self {
        Self::AttachmentNotFound { id: id.into() }
    }
}
