//! Stowage Core Tree Engine
//!
//! This crate provides the materialized-path tree engine and inventory
//! logic for the Stowage storage-location system: houses, rooms, shelves,
//! boxes, and items arranged as a tree.
//!
//! # Architecture
//!
//! - **Materialized Paths**: every node's position is a string of
//!   fixed-width base-36 segments; lexicographic order is pre-order
//!   traversal order, and prefix relations encode ancestry
//! - **Explicit Path Index**: id→record and path→id indexes kept atomically
//!   in sync, with prefix-range scans serving all hierarchy queries
//! - **Serialized Mutations**: structural changes hold a single mutation
//!   lock and commit as all-or-nothing batches; reads are lock-free
//!   snapshot reads
//! - **Derived Due Index**: cleaning schedules maintain a `next_due_at`
//!   field indexed by the store, keeping due-queries sublinear
//!
//! # Modules
//!
//! - [`models`] - data structures (Node, Attachment, filters, positions)
//! - [`db`] - path codec and node store backends
//! - [`services`] - tree mutations and path-derived queries

pub mod db;
pub mod models;
pub mod services;

// Re-export commonly used types
pub use db::{FileStore, MemoryStore, NodeStore, PathCodec, PathError, StoreError};
pub use models::{
    Attachment, MovePosition, NewAttachment, NewNode, Node, NodeFilter, NodeType, NodeUpdate,
    SiblingOrder, TreeConfig,
};
pub use services::{
    BulkOutcome, InventoryExport, InventoryStats, NodeTree, QueryService, TreeService,
    TreeServiceError,
};
