//! Business Services
//!
//! This module contains the tree engine's service layer:
//!
//! - `TreeService` - structural mutations (create, update, delete, move)
//!   and the per-id bulk variants
//! - `QueryService` - path-derived reads (ancestors, descendants, children,
//!   breadcrumbs, filters, statistics, export)
//! - `container_policy` - containment invariants checked before every
//!   structural mutation
//! - `cleaning` - pure cleaning-due computation with injected time
//!
//! Services coordinate between the store layer and the operation contracts,
//! enforcing the tree invariants and serializing mutations.

pub mod cleaning;
pub mod container_policy;
pub mod error;
pub mod query_service;
pub mod tree_service;

pub use error::TreeServiceError;
pub use query_service::{InventoryExport, InventoryStats, NodeTree, QueryService};
pub use tree_service::{BulkFailure, BulkOutcome, TreeService};
