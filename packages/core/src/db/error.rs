//! Store Error Types
//!
//! This module defines error types for the node store layer: index
//! integrity violations surfaced by mutation batches, corruption detected
//! while reading paths, and snapshot persistence failures.

use thiserror::Error;

use super::path_codec::PathError;

/// Node store operation errors.
///
/// Integrity variants (`DuplicateId`, `PathOccupied`, `RecordMissing`) are
/// raised by batch validation before anything is mutated, so a failed
/// mutation always leaves the store unchanged.
#[derive(Error, Debug)]
pub enum StoreError {
    /// A node with this id already exists
    #[error("node id '{id}' already exists")]
    DuplicateId { id: String },

    /// The target path is already taken by another node
    #[error("path '{path}' is already occupied")]
    PathOccupied { path: String },

    /// A mutation referenced a node id that is not in the store
    #[error("record '{id}' does not exist")]
    RecordMissing { id: String },

    /// An attachment id that is not in the store
    #[error("attachment '{id}' does not exist")]
    AttachmentMissing { id: String },

    /// The id and path indexes disagree; the store is corrupt
    #[error("path index corrupt: {detail}")]
    IndexCorrupt { detail: String },

    /// Path segment decode failure (stored-path corruption)
    #[error(transparent)]
    Path(#[from] PathError),

    /// Snapshot file I/O failure
    #[error("snapshot I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot encode/decode failure
    #[error("snapshot serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Create a duplicate-id error.
    pub fn duplicate_id(id: impl Into<String>) -> Self {
        Self::DuplicateId { id: id.into() }
    }

    /// Create a path-occupied error.
    pub fn path_occupied(path: impl Into<String>) -> Self {
        Self::PathOccupied { path: path.into() }
    }

    /// Create a record-missing error.
    pub fn record_missing(id: impl Into<String>) -> Self {
        Self::RecordMissing { id: id.into() }
    }

    /// Create an attachment-missing error.
    pub fn attachment_missing(id: impl Into<String>) -> Self {
        Self::AttachmentMissing { id: id.into() }
    }

    /// Create an index-corrupt error.
    pub fn index_corrupt(detail: impl Into<String>) -> Self {
        Self::IndexCorrupt {
            detail: detail.into(),
        }
    }
}
