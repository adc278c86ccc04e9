//! NodeStore Trait - Storage Abstraction Layer
//!
//! This module defines the `NodeStore` trait that abstracts node persistence
//! for the tree engine. The trait enables multiple backends (in-memory,
//! JSON-snapshot file) without changing the business logic in the tree and
//! query services.
//!
//! # Architecture
//!
//! - **Two indexes, one truth**: every implementation maintains an id→record
//!   map and a path-ordered index over the same records; no observer ever
//!   sees them disagree
//! - **Batch mutations**: structural changes arrive as a [`TreeMutation`]
//!   and are applied atomically: validation happens before any write, so a
//!   rejected batch leaves the store untouched
//! - **Prefix scans**: descendant and child queries are served by
//!   lexicographic range scans over the path index, never by walking
//!   parent pointers
//! - **Snapshot reads**: readers see the state before or after a batch,
//!   never an intermediate one
//!
//! Callers serialize structural mutations (the tree service holds a single
//! mutation lock); implementations only guarantee per-call atomicity.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{Attachment, Node};

use super::error::StoreError;

/// A path substitution for one node, produced by move planning.
///
/// `new_path` must be segment-aligned; depth is re-derived from it by the
/// store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathRewrite {
    /// Node to rewrite
    pub id: String,
    /// Its complete new path
    pub new_path: String,
}

impl PathRewrite {
    /// Create a rewrite entry.
    pub fn new(id: impl Into<String>, new_path: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            new_path: new_path.into(),
        }
    }
}

/// An atomic batch of structural changes.
///
/// Application order is removes → rewrites → updates → inserts, but the
/// order is an implementation detail: validation considers the batch as a
/// whole, and either every change lands or none does.
///
/// `updates` replace a record's descriptive fields only; the stored path
/// and depth always win, so tree positions change exclusively through
/// `rewrites`.
#[derive(Debug, Default)]
pub struct TreeMutation {
    /// Brand-new records (id and path must both be free)
    pub inserts: Vec<Node>,
    /// Field replacements for existing records
    pub updates: Vec<Node>,
    /// Records to delete (their attachments go with them)
    pub removes: Vec<String>,
    /// Subtree/sibling path substitutions
    pub rewrites: Vec<PathRewrite>,
}

impl TreeMutation {
    /// An empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an insert.
    pub fn insert(mut self, node: Node) -> Self {
        self.inserts.push(node);
        self
    }

    /// Add a field update.
    pub fn update(mut self, node: Node) -> Self {
        self.updates.push(node);
        self
    }

    /// Add a removal.
    pub fn remove(mut self, id: impl Into<String>) -> Self {
        self.removes.push(id.into());
        self
    }

    /// Add a path rewrite.
    pub fn rewrite(mut self, rewrite: PathRewrite) -> Self {
        self.rewrites.push(rewrite);
        self
    }

    /// Add many path rewrites.
    pub fn rewrites(mut self, rewrites: impl IntoIterator<Item = PathRewrite>) -> Self {
        self.rewrites.extend(rewrites);
        self
    }

    /// Whether the batch contains no changes.
    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty()
            && self.updates.is_empty()
            && self.removes.is_empty()
            && self.rewrites.is_empty()
    }
}

/// Abstraction over node persistence.
///
/// Implementations must be `Send + Sync`; all methods are async so that a
/// future network- or disk-backed store fits the same seam as the embedded
/// one.
#[async_trait]
pub trait NodeStore: Send + Sync {
    /// Apply a batch of structural changes atomically.
    ///
    /// # Errors
    ///
    /// - [`StoreError::DuplicateId`] / [`StoreError::PathOccupied`] when an
    ///   insert or rewrite would violate uniqueness
    /// - [`StoreError::RecordMissing`] when an update, remove, or rewrite
    ///   references an unknown id
    ///
    /// On any error the store is left exactly as it was.
    async fn commit(&self, mutation: TreeMutation) -> Result<(), StoreError>;

    /// Get a node by id.
    async fn get(&self, id: &str) -> Result<Option<Node>, StoreError>;

    /// Get a node by its exact path.
    async fn get_by_path(&self, path: &str) -> Result<Option<Node>, StoreError>;

    /// All nodes whose path starts with `prefix`, in path (pre-order)
    /// order. An empty prefix scans the whole tree.
    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<Node>, StoreError>;

    /// Every node in path order.
    async fn scan_all(&self) -> Result<Vec<Node>, StoreError>;

    /// Total number of nodes.
    async fn count(&self) -> Result<usize, StoreError>;

    /// Nodes whose derived due instant lies strictly before `cutoff`,
    /// served from the maintained due index (not a full-table predicate
    /// sweep), ordered by due instant.
    async fn due_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Node>, StoreError>;

    /// Attach a record to its owning node.
    ///
    /// # Errors
    ///
    /// [`StoreError::RecordMissing`] if the owner does not exist.
    async fn add_attachment(&self, attachment: Attachment) -> Result<(), StoreError>;

    /// Attachments of a node, primary-first then oldest-first.
    async fn attachments_for(&self, node_id: &str) -> Result<Vec<Attachment>, StoreError>;

    /// Remove a single attachment, returning it.
    ///
    /// # Errors
    ///
    /// [`StoreError::AttachmentMissing`] if unknown.
    async fn remove_attachment(&self, attachment_id: &str) -> Result<Attachment, StoreError>;

    /// Distinct ids of nodes that own at least one attachment.
    async fn attachment_owners(&self) -> Result<Vec<String>, StoreError>;
}
