//! Node Data Structures
//!
//! This module defines the core `Node` struct and related types for the
//! Stowage location tree.
//!
//! # Architecture
//!
//! - **Universal Node**: a single struct represents every location kind, from
//!   house down to individual item
//! - **Materialized Path**: each node carries its full tree position as a
//!   string of fixed-width segments (`path`), with `depth` and `numchild`
//!   maintained alongside
//! - **Container Flag**: `is_container` governs whether children may attach;
//!   item attributes (`barcode`, `quantity`, `value`) are optional and not
//!   type-enforced
//!
//! # Examples
//!
//! ```rust
//! use stowage_core::models::{NewNode, NodeType};
//!
//! // A root container
//! let house = NewNode::new("Home", NodeType::House);
//!
//! // A leaf item with barcode and value
//! let drill = NewNode::new("Cordless drill", NodeType::Item)
//!     .leaf()
//!     .with_barcode("4006381333931")
//!     .with_value(129.99);
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use crate::services::cleaning;

/// Default cleaning interval in days.
pub const DEFAULT_CLEANED_INTERVAL_DAYS: u32 = 30;

/// Validation errors for Node operations
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid field value for {field}: {reason}")]
    InvalidField { field: String, reason: String },
}

/// The kind of physical location a node represents.
///
/// The kind is descriptive metadata only: whether a node may hold children is
/// governed by `is_container`, never by its type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    House,
    Room,
    Storage,
    Shelf,
    Container,
    Box,
    Item,
    Other,
}

impl NodeType {
    /// All known node types, in display order.
    pub const ALL: [NodeType; 8] = [
        NodeType::House,
        NodeType::Room,
        NodeType::Storage,
        NodeType::Shelf,
        NodeType::Container,
        NodeType::Box,
        NodeType::Item,
        NodeType::Other,
    ];

    /// Stable lowercase token used in serialized form and filters.
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::House => "house",
            NodeType::Room => "room",
            NodeType::Storage => "storage",
            NodeType::Shelf => "shelf",
            NodeType::Container => "container",
            NodeType::Box => "box",
            NodeType::Item => "item",
            NodeType::Other => "other",
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "house" => Ok(NodeType::House),
            "room" => Ok(NodeType::Room),
            "storage" => Ok(NodeType::Storage),
            "shelf" => Ok(NodeType::Shelf),
            "container" => Ok(NodeType::Container),
            "box" => Ok(NodeType::Box),
            "item" => Ok(NodeType::Item),
            "other" => Ok(NodeType::Other),
            other => Err(ValidationError::InvalidField {
                field: "node_type".to_string(),
                reason: format!("unknown node type '{}'", other),
            }),
        }
    }
}

/// A vertex of the location tree.
///
/// # Fields
///
/// - `id`: unique identifier (UUID v4), immutable after creation
/// - `name`: display name, required
/// - `node_type`: descriptive kind (house, room, ..., item)
/// - `is_container`: whether children may be attached
/// - `path`: materialized path: one fixed-width segment per ancestor level
///   including self; lexicographic order over paths is pre-order traversal
///   order
/// - `depth`: number of segments in `path` (roots are depth 1)
/// - `numchild`: count of direct children, maintained incrementally
/// - `barcode`, `quantity`, `value`: optional item attributes
/// - `cleaned_at` / `cleaned_interval_days`: cleaning schedule inputs
/// - `next_due_at`: derived due instant, kept in sync with the two fields
///   above so due-queries never have to evaluate every record
///
/// # Invariants
///
/// `path` is unique across the tree; a node's `path` is a prefix of all and
/// only its descendants' paths; `depth` equals the segment count of `path`;
/// non-containers always have `numchild == 0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Unique identifier (UUID v4)
    pub id: String,

    /// Display name
    pub name: String,

    /// Location kind
    pub node_type: NodeType,

    /// Free-form description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Whether this node may contain children
    pub is_container: bool,

    /// Materialized path (fixed-width segments, root → self)
    pub path: String,

    /// Tree depth, equals the segment count of `path`
    pub depth: u32,

    /// Number of direct children
    pub numchild: u32,

    /// Optional barcode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub barcode: Option<String>,

    /// Item quantity
    pub quantity: u32,

    /// Estimated value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,

    /// When this location was last cleaned
    pub cleaned_at: DateTime<Utc>,

    /// Cleaning cadence in days
    pub cleaned_interval_days: u32,

    /// Derived: `cleaned_at + cleaned_interval_days`
    pub next_due_at: DateTime<Utc>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last modification timestamp
    pub updated_at: DateTime<Utc>,
}

impl Node {
    /// Materialize a node from creation fields at an assigned tree position.
    ///
    /// The caller (the tree service) owns path assignment; this constructor
    /// only derives the bookkeeping fields and stamps timestamps.
    pub fn from_spec(spec: NewNode, path: String, depth: u32, now: DateTime<Utc>) -> Self {
        let next_due_at = cleaning::next_due(now, spec.cleaned_interval_days);
        Self {
            id: Uuid::new_v4().to_string(),
            name: spec.name,
            node_type: spec.node_type,
            description: spec.description,
            is_container: spec.is_container,
            path,
            depth,
            numchild: 0,
            barcode: spec.barcode,
            quantity: spec.quantity,
            value: spec.value,
            cleaned_at: now,
            cleaned_interval_days: spec.cleaned_interval_days,
            next_due_at,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether this node sits at the root level.
    pub fn is_root(&self) -> bool {
        self.depth == 1
    }

    /// Whether this node is overdue for cleaning at `now`.
    ///
    /// Strict: a node whose due instant equals `now` exactly is not yet due.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        cleaning::is_due(self, now)
    }

    /// Record a cleaning at `now`: resets `cleaned_at`, recomputes the
    /// derived due instant, and nothing else.
    pub fn mark_cleaned(&mut self, now: DateTime<Utc>) {
        self.cleaned_at = now;
        self.next_due_at = cleaning::next_due(now, self.cleaned_interval_days);
        self.updated_at = now;
    }

    /// Refresh `updated_at`.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }

    /// Validate structural fields.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if `name` is empty.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::MissingField("name".to_string()));
        }
        Ok(())
    }
}

/// Creation fields for a new node.
///
/// Path, depth and child count are assigned by the tree service at insert
/// time; this struct carries only caller-provided attributes.
///
/// # Examples
///
/// ```rust
/// # use stowage_core::models::{NewNode, NodeType};
/// let shelf = NewNode::new("Garage shelf", NodeType::Shelf);
/// assert!(shelf.is_container);
/// assert_eq!(shelf.quantity, 1);
/// assert_eq!(shelf.cleaned_interval_days, 30);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewNode {
    /// Display name (required, non-empty)
    pub name: String,

    /// Location kind
    pub node_type: NodeType,

    /// Free-form description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Whether the node may contain children (defaults to true)
    pub is_container: bool,

    /// Optional barcode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub barcode: Option<String>,

    /// Item quantity (defaults to 1)
    pub quantity: u32,

    /// Estimated value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,

    /// Cleaning cadence in days (defaults to 30)
    pub cleaned_interval_days: u32,
}

impl NewNode {
    /// Create a spec with the inventory model's field defaults: container,
    /// quantity 1, 30-day cleaning interval.
    pub fn new(name: impl Into<String>, node_type: NodeType) -> Self {
        Self {
            name: name.into(),
            node_type,
            description: None,
            is_container: true,
            barcode: None,
            quantity: 1,
            value: None,
            cleaned_interval_days: DEFAULT_CLEANED_INTERVAL_DAYS,
        }
    }

    /// Mark the node as a leaf (non-container).
    pub fn leaf(mut self) -> Self {
        self.is_container = false;
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the barcode.
    pub fn with_barcode(mut self, barcode: impl Into<String>) -> Self {
        self.barcode = Some(barcode.into());
        self
    }

    /// Set the quantity.
    pub fn with_quantity(mut self, quantity: u32) -> Self {
        self.quantity = quantity;
        self
    }

    /// Set the estimated value.
    pub fn with_value(mut self, value: f64) -> Self {
        self.value = Some(value);
        self
    }

    /// Set the cleaning cadence in days.
    pub fn with_cleaned_interval_days(mut self, days: u32) -> Self {
        self.cleaned_interval_days = days;
        self
    }
}

/// Custom deserializer for optional fields that accepts both plain values
/// and nulls.
///
/// Maps three input formats to the double-Option pattern:
/// - Missing field → None (don't update)
/// - null → Some(None) (clear the field)
/// - value → Some(Some(value)) (set the field)
fn deserialize_optional_field<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    // Missing field is handled by #[serde(default)] on the struct field
    Ok(Some(Option::<T>::deserialize(deserializer)?))
}

/// Partial node update for PATCH-style operations.
///
/// All fields are optional; only provided fields are applied. Nullable
/// fields (`description`, `barcode`, `value`) use a double-`Option`:
///
/// - `None`: don't change this field
/// - `Some(None)`: clear the field
/// - `Some(Some(v))`: set the field to `v`
///
/// Structural fields (`path`, `depth`, `numchild`) are never updatable here;
/// tree position changes only through move operations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeUpdate {
    /// Update the display name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Update the location kind
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_type: Option<NodeType>,

    /// Update or clear the description
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_optional_field"
    )]
    pub description: Option<Option<String>>,

    /// Toggle the container flag. Demoting a node that still has children
    /// is rejected by the tree service.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_container: Option<bool>,

    /// Update or clear the barcode
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_optional_field"
    )]
    pub barcode: Option<Option<String>>,

    /// Update the quantity
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<u32>,

    /// Update or clear the estimated value
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_optional_field"
    )]
    pub value: Option<Option<f64>>,

    /// Update the cleaning cadence; the derived due instant is recomputed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cleaned_interval_days: Option<u32>,
}

impl NodeUpdate {
    /// Create an empty update.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a new name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set a new node type.
    pub fn with_node_type(mut self, node_type: NodeType) -> Self {
        self.node_type = Some(node_type);
        self
    }

    /// Set or clear the description.
    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = Some(description);
        self
    }

    /// Toggle the container flag.
    pub fn with_is_container(mut self, is_container: bool) -> Self {
        self.is_container = Some(is_container);
        self
    }

    /// Set or clear the barcode.
    pub fn with_barcode(mut self, barcode: Option<String>) -> Self {
        self.barcode = Some(barcode);
        self
    }

    /// Set the quantity.
    pub fn with_quantity(mut self, quantity: u32) -> Self {
        self.quantity = Some(quantity);
        self
    }

    /// Set or clear the estimated value.
    pub fn with_value(mut self, value: Option<f64>) -> Self {
        self.value = Some(value);
        self
    }

    /// Set the cleaning cadence.
    pub fn with_cleaned_interval_days(mut self, days: u32) -> Self {
        self.cleaned_interval_days = Some(days);
        self
    }

    /// Whether the update contains no changes.
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.node_type.is_none()
            && self.description.is_none()
            && self.is_container.is_none()
            && self.barcode.is_none()
            && self.quantity.is_none()
            && self.value.is_none()
            && self.cleaned_interval_days.is_none()
    }
}

/// Where a moved node lands relative to its target.
///
/// Child positions (`FirstChild`, `LastChild`, `SortedChild`) interpret the
/// move target as the new parent; sibling positions (`Left`, `Right`,
/// `SortedSibling`) interpret it as a reference sibling whose parent becomes
/// the destination. A `None` target addresses the root level, which only the
/// child positions can do, since there is no reference sibling to be left or
/// right of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MovePosition {
    FirstChild,
    LastChild,
    SortedChild,
    Left,
    Right,
    SortedSibling,
}

/// Error for unrecognized move position tokens.
#[derive(Error, Debug)]
#[error("unrecognized move position '{token}'")]
pub struct ParsePositionError {
    pub token: String,
}

impl MovePosition {
    /// Stable kebab-case token.
    pub fn as_str(&self) -> &'static str {
        match self {
            MovePosition::FirstChild => "first-child",
            MovePosition::LastChild => "last-child",
            MovePosition::SortedChild => "sorted-child",
            MovePosition::Left => "left",
            MovePosition::Right => "right",
            MovePosition::SortedSibling => "sorted-sibling",
        }
    }

    /// Whether the target is interpreted as a reference sibling rather than
    /// the new parent.
    pub fn is_sibling_position(&self) -> bool {
        matches!(
            self,
            MovePosition::Left | MovePosition::Right | MovePosition::SortedSibling
        )
    }
}

impl fmt::Display for MovePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MovePosition {
    type Err = ParsePositionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "first-child" => Ok(MovePosition::FirstChild),
            "last-child" => Ok(MovePosition::LastChild),
            "sorted-child" => Ok(MovePosition::SortedChild),
            "left" => Ok(MovePosition::Left),
            "right" => Ok(MovePosition::Right),
            "sorted-sibling" => Ok(MovePosition::SortedSibling),
            other => Err(ParsePositionError {
                token: other.to_string(),
            }),
        }
    }
}

/// How new siblings are ordered under a parent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SiblingOrder {
    /// Insert at the alphabetic position of the node's name.
    #[default]
    ByName,
    /// Append after the last existing sibling.
    Insertion,
}

/// Tree-wide configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeConfig {
    /// Ordering policy applied by add-root, add-child, and the sorted move
    /// positions.
    pub sibling_order: SiblingOrder,
}

/// Enumerated filter specification for node queries.
///
/// Replaces request-scoped queryset chaining with an explicit predicate
/// struct: all criteria are combined with AND, `None` fields are ignored,
/// and evaluation is a pure function of the node, its breadcrumb, and an
/// injected `now`.
///
/// # Examples
///
/// ```rust
/// # use stowage_core::models::{NodeFilter, NodeType};
/// // Boxes in the garage subtree that are overdue for cleaning
/// let filter = NodeFilter::new()
///     .with_node_type(NodeType::Box)
///     .with_under("garage-node-id")
///     .with_needs_cleaning(true);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeFilter {
    /// Case-insensitive substring match against name, description, barcode,
    /// and breadcrumb
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Filter by location kind
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_type: Option<NodeType>,

    /// Filter by container flag
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_container: Option<bool>,

    /// Filter for presence/absence of a non-empty barcode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_barcode: Option<bool>,

    /// Filter by cleaning-due status, evaluated against the injected `now`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub needs_cleaning: Option<bool>,

    /// Restrict to descendants of this node id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub under: Option<String>,

    /// Limit number of results
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,

    /// Offset into the result sequence
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<usize>,
}

impl NodeFilter {
    /// Create an empty filter (matches everything).
    pub fn new() -> Self {
        Self::default()
    }

    /// Substring search over name, description, barcode, and breadcrumb.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Filter by location kind.
    pub fn with_node_type(mut self, node_type: NodeType) -> Self {
        self.node_type = Some(node_type);
        self
    }

    /// Filter by container flag.
    pub fn with_is_container(mut self, is_container: bool) -> Self {
        self.is_container = Some(is_container);
        self
    }

    /// Filter for presence/absence of a barcode.
    pub fn with_has_barcode(mut self, has_barcode: bool) -> Self {
        self.has_barcode = Some(has_barcode);
        self
    }

    /// Filter by cleaning-due status.
    pub fn with_needs_cleaning(mut self, needs_cleaning: bool) -> Self {
        self.needs_cleaning = Some(needs_cleaning);
        self
    }

    /// Restrict to descendants of the given node.
    pub fn with_under(mut self, node_id: impl Into<String>) -> Self {
        self.under = Some(node_id.into());
        self
    }

    /// Limit the number of results.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skip the first `offset` results.
    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Evaluate the predicate against a single node.
    ///
    /// `breadcrumb` is the node's ancestor-name chain (used by the text
    /// criterion); `now` anchors the cleaning-due criterion. The `under`
    /// restriction and limit/offset are positional and applied by the query
    /// engine, not here.
    pub fn matches(&self, node: &Node, breadcrumb: &str, now: DateTime<Utc>) -> bool {
        if let Some(text) = &self.text {
            let needle = text.to_lowercase();
            let in_name = node.name.to_lowercase().contains(&needle);
            let in_description = node
                .description
                .as_deref()
                .is_some_and(|d| d.to_lowercase().contains(&needle));
            let in_barcode = node
                .barcode
                .as_deref()
                .is_some_and(|b| b.to_lowercase().contains(&needle));
            let in_breadcrumb = breadcrumb.to_lowercase().contains(&needle);
            if !(in_name || in_description || in_barcode || in_breadcrumb) {
                return false;
            }
        }

        if let Some(node_type) = self.node_type {
            if node.node_type != node_type {
                return false;
            }
        }

        if let Some(is_container) = self.is_container {
            if node.is_container != is_container {
                return false;
            }
        }

        if let Some(has_barcode) = self.has_barcode {
            let present = node.barcode.as_deref().is_some_and(|b| !b.is_empty());
            if present != has_barcode {
                return false;
            }
        }

        if let Some(needs_cleaning) = self.needs_cleaning {
            if node.is_due(now) != needs_cleaning {
                return false;
            }
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample_node(name: &str) -> Node {
        let now = Utc::now();
        Node::from_spec(
            NewNode::new(name, NodeType::Box),
            "0000".to_string(),
            1,
            now,
        )
    }

    #[test]
    fn test_from_spec_defaults() {
        let node = sample_node("Winter clothes");

        assert!(!node.id.is_empty());
        assert_eq!(node.name, "Winter clothes");
        assert_eq!(node.node_type, NodeType::Box);
        assert!(node.is_container);
        assert_eq!(node.depth, 1);
        assert_eq!(node.numchild, 0);
        assert_eq!(node.quantity, 1);
        assert_eq!(node.cleaned_interval_days, DEFAULT_CLEANED_INTERVAL_DAYS);
        assert!(node.is_root());
    }

    #[test]
    fn test_next_due_derivation() {
        let node = sample_node("Pantry");
        assert_eq!(
            node.next_due_at,
            node.cleaned_at + Duration::days(i64::from(node.cleaned_interval_days))
        );
    }

    #[test]
    fn test_mark_cleaned_resets_due() {
        let mut node = sample_node("Pantry");
        let later = node.cleaned_at + Duration::days(45);
        assert!(node.is_due(later));

        node.mark_cleaned(later);
        assert_eq!(node.cleaned_at, later);
        assert!(!node.is_due(later));
        assert_eq!(node.next_due_at, later + Duration::days(30));
    }

    #[test]
    fn test_validate_rejects_empty_name() {
        let mut node = sample_node("ok");
        node.name = "   ".to_string();
        assert!(matches!(
            node.validate(),
            Err(ValidationError::MissingField(_))
        ));
    }

    #[test]
    fn test_new_node_builder() {
        let spec = NewNode::new("Drill", NodeType::Item)
            .leaf()
            .with_barcode("12345")
            .with_quantity(2)
            .with_value(99.5)
            .with_description("18V, two batteries")
            .with_cleaned_interval_days(90);

        assert!(!spec.is_container);
        assert_eq!(spec.barcode.as_deref(), Some("12345"));
        assert_eq!(spec.quantity, 2);
        assert_eq!(spec.value, Some(99.5));
        assert_eq!(spec.cleaned_interval_days, 90);
    }

    #[test]
    fn test_node_update_is_empty() {
        assert!(NodeUpdate::new().is_empty());
        assert!(!NodeUpdate::new().with_name("renamed").is_empty());
        assert!(!NodeUpdate::new().with_barcode(None).is_empty());
    }

    #[test]
    fn test_node_update_double_option_deserialization() {
        // Missing field: don't touch
        let update: NodeUpdate = serde_json::from_str(r#"{"name":"x"}"#).unwrap();
        assert!(update.barcode.is_none());

        // Explicit null: clear
        let update: NodeUpdate = serde_json::from_str(r#"{"barcode":null}"#).unwrap();
        assert_eq!(update.barcode, Some(None));

        // Value: set
        let update: NodeUpdate = serde_json::from_str(r#"{"barcode":"b-1"}"#).unwrap();
        assert_eq!(update.barcode, Some(Some("b-1".to_string())));
    }

    #[test]
    fn test_move_position_parse() {
        assert_eq!(
            "sorted-child".parse::<MovePosition>().unwrap(),
            MovePosition::SortedChild
        );
        assert_eq!("left".parse::<MovePosition>().unwrap(), MovePosition::Left);
        assert!("upside-down".parse::<MovePosition>().is_err());
    }

    #[test]
    fn test_node_type_round_trip() {
        for node_type in NodeType::ALL {
            assert_eq!(node_type.as_str().parse::<NodeType>().unwrap(), node_type);
        }
        let json = serde_json::to_string(&NodeType::Shelf).unwrap();
        assert_eq!(json, r#""shelf""#);
    }

    #[test]
    fn test_filter_text_matches_breadcrumb() {
        let node = sample_node("Toolbox");
        let filter = NodeFilter::new().with_text("garage");

        assert!(filter.matches(&node, "Home > Garage > Toolbox", Utc::now()));
        assert!(!filter.matches(&node, "Home > Attic > Toolbox", Utc::now()));
    }

    #[test]
    fn test_filter_has_barcode_treats_empty_as_absent() {
        let mut node = sample_node("Jar");
        node.barcode = Some(String::new());
        let filter = NodeFilter::new().with_has_barcode(true);
        assert!(!filter.matches(&node, "", Utc::now()));

        node.barcode = Some("777".to_string());
        assert!(filter.matches(&node, "", Utc::now()));
    }

    #[test]
    fn test_filter_needs_cleaning_uses_injected_now() {
        let node = sample_node("Fridge");
        let overdue = node.next_due_at + Duration::seconds(1);
        let fresh = node.cleaned_at;

        let filter = NodeFilter::new().with_needs_cleaning(true);
        assert!(filter.matches(&node, "", overdue));
        assert!(!filter.matches(&node, "", fresh));
    }

    #[test]
    fn test_node_serialization_round_trip() {
        let node = sample_node("Bookshelf");
        let json = serde_json::to_string(&node).unwrap();
        let back: Node = serde_json::from_str(&json).unwrap();
        assert_eq!(node, back);
    }
}
