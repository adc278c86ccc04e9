//! Query Service - Tree Reads
//!
//! Every read is derived from path prefix relations over a consistent store
//! snapshot: ancestors come from decoding a path into its prefix sequence,
//! descendants and children from prefix range scans, breadcrumbs from the
//! ancestor chain. No query takes the mutation lock; concurrent readers see
//! the state before or after a mutation, never an interleaved one.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::db::{NodeStore, PathCodec, StoreError};
use crate::models::{Attachment, Node, NodeFilter, NodeType};

use super::error::TreeServiceError;

/// A node with its nested descendants, built from one prefix scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeTree {
    pub node: Node,
    pub children: Vec<NodeTree>,
}

/// Inventory-wide counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryStats {
    /// Total nodes
    pub total: usize,
    /// Nodes with `is_container == true`
    pub containers: usize,
    /// Leaf records (`is_container == false`)
    pub items: usize,
    /// Nodes overdue for cleaning at the supplied instant
    pub needing_cleaning: usize,
    /// Nodes carrying a non-empty barcode
    pub with_barcode: usize,
    /// Nodes owning at least one attachment
    pub with_attachments: usize,
    /// Node counts keyed by type token
    pub by_type: std::collections::BTreeMap<String, usize>,
}

/// Full path-ordered dump of the tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryExport {
    /// Number of exported records
    pub count: usize,
    /// Export instant supplied by the caller
    pub exported_at: DateTime<Utc>,
    /// Every node, in path (pre-order) order
    pub records: Vec<Node>,
}

/// Read-only query engine over a [`NodeStore`].
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use stowage_core::db::MemoryStore;
/// use stowage_core::services::QueryService;
///
/// # async fn example() -> Result<(), stowage_core::services::TreeServiceError> {
/// let store = Arc::new(MemoryStore::new());
/// let queries = QueryService::new(store);
/// let roots = queries.roots().await?;
/// # Ok(())
/// # }
/// ```
pub struct QueryService {
    store: Arc<dyn NodeStore>,
}

impl QueryService {
    /// Create a query engine over a store.
    pub fn new(store: Arc<dyn NodeStore>) -> Self {
        Self { store }
    }

    /// Get a node by id.
    pub async fn get(&self, id: &str) -> Result<Node, TreeServiceError> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| TreeServiceError::not_found(id))
    }

    /// Root-level nodes in path order.
    pub async fn roots(&self) -> Result<Vec<Node>, TreeServiceError> {
        Ok(self
            .store
            .scan_all()
            .await?
            .into_iter()
            .filter(Node::is_root)
            .collect())
    }

    /// Direct children of a node, or the roots for `None`, in sibling
    /// order.
    pub async fn children(&self, parent_id: Option<&str>) -> Result<Vec<Node>, TreeServiceError> {
        let (prefix, child_depth) = match parent_id {
            Some(id) => {
                let parent = self.get(id).await?;
                (parent.path.clone(), parent.depth + 1)
            }
            None => (String::new(), 1),
        };
        Ok(self
            .store
            .scan_prefix(&prefix)
            .await?
            .into_iter()
            .filter(|node| node.depth == child_depth)
            .collect())
    }

    /// A node's descendants in pre-order, optionally including itself.
    pub async fn descendants(
        &self,
        id: &str,
        include_self: bool,
    ) -> Result<Vec<Node>, TreeServiceError> {
        let node = self.get(id).await?;
        let mut members = self.store.scan_prefix(&node.path).await?;
        if !include_self {
            members.retain(|member| member.id != node.id);
        }
        Ok(members)
    }

    /// A node's ancestor chain, root first, optionally ending with the
    /// node itself.
    ///
    /// Derived purely from the path: each prefix is decoded and looked up
    /// exactly. A missing prefix means the indexes disagree and surfaces as
    /// store corruption.
    pub async fn ancestors(
        &self,
        id: &str,
        include_self: bool,
    ) -> Result<Vec<Node>, TreeServiceError> {
        let node = self.get(id).await?;
        let mut chain = Vec::new();
        for prefix in PathCodec::ancestors(&node.path) {
            let ancestor = self.store.get_by_path(prefix).await?.ok_or_else(|| {
                StoreError::index_corrupt(format!("missing ancestor at path '{}'", prefix))
            })?;
            chain.push(ancestor);
        }
        if include_self {
            chain.push(node);
        }
        Ok(chain)
    }

    /// The " > "-joined ancestor names, root through the node itself.
    pub async fn breadcrumb(&self, id: &str) -> Result<String, TreeServiceError> {
        let chain = self.ancestors(id, true).await?;
        Ok(chain
            .iter()
            .map(|node| node.name.as_str())
            .collect::<Vec<_>>()
            .join(" > "))
    }

    /// Whether `id` lies strictly inside `ancestor_id`'s subtree.
    pub async fn is_descendant_of(
        &self,
        id: &str,
        ancestor_id: &str,
    ) -> Result<bool, TreeServiceError> {
        let node = self.get(id).await?;
        let ancestor = self.get(ancestor_id).await?;
        Ok(PathCodec::is_ancestor(&ancestor.path, &node.path))
    }

    /// A node and its descendants as a nested tree, from one prefix scan.
    pub async fn subtree(&self, id: &str) -> Result<NodeTree, TreeServiceError> {
        let node = self.get(id).await?;
        let members = self.store.scan_prefix(&node.path).await?;
        build_tree(members)
    }

    /// Evaluate an enumerated filter and return matching node ids in path
    /// order.
    ///
    /// The predicate itself is pure ([`NodeFilter::matches`]); this method
    /// only supplies the candidate sequence (the whole tree, or one subtree
    /// for `under`), the breadcrumbs for the text criterion, and the
    /// positional offset/limit.
    pub async fn find(
        &self,
        filter: &NodeFilter,
        now: DateTime<Utc>,
    ) -> Result<Vec<String>, TreeServiceError> {
        let candidates = match &filter.under {
            Some(anchor_id) => {
                let anchor = self.get(anchor_id).await?;
                let mut members = self.store.scan_prefix(&anchor.path).await?;
                members.retain(|member| member.id != anchor.id);
                members
            }
            None => self.store.scan_all().await?,
        };

        // Breadcrumbs are only assembled when the text criterion needs
        // them; one scan covers every candidate's ancestor chain.
        let names: HashMap<String, String> = if filter.text.is_some() {
            self.store
                .scan_all()
                .await?
                .into_iter()
                .map(|node| (node.path, node.name))
                .collect()
        } else {
            HashMap::new()
        };

        let mut ids = Vec::new();
        for node in &candidates {
            let breadcrumb = if filter.text.is_some() {
                breadcrumb_from(&names, &node.path)
            } else {
                String::new()
            };
            if filter.matches(node, &breadcrumb, now) {
                ids.push(node.id.clone());
            }
        }

        let offset = filter.offset.unwrap_or(0);
        let limited: Vec<String> = match filter.limit {
            Some(limit) => ids.into_iter().skip(offset).take(limit).collect(),
            None => ids.into_iter().skip(offset).collect(),
        };
        debug!(matched = limited.len(), "evaluated node filter");
        Ok(limited)
    }

    /// Whether a node is overdue for cleaning at `now`.
    pub async fn is_due_for_cleaning(
        &self,
        id: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, TreeServiceError> {
        Ok(self.get(id).await?.is_due(now))
    }

    /// Nodes overdue for cleaning at `now`, served from the store's due
    /// index rather than a full-table predicate sweep.
    pub async fn needs_cleaning(&self, now: DateTime<Utc>) -> Result<Vec<Node>, TreeServiceError> {
        Ok(self.store.due_before(now).await?)
    }

    /// Inventory-wide counts; the due count is anchored at `now`.
    pub async fn statistics(&self, now: DateTime<Utc>) -> Result<InventoryStats, TreeServiceError> {
        let nodes = self.store.scan_all().await?;
        let mut by_type = std::collections::BTreeMap::new();
        for node_type in NodeType::ALL {
            by_type.insert(node_type.as_str().to_string(), 0);
        }

        let mut containers = 0;
        let mut needing_cleaning = 0;
        let mut with_barcode = 0;
        for node in &nodes {
            if node.is_container {
                containers += 1;
            }
            if node.is_due(now) {
                needing_cleaning += 1;
            }
            if node.barcode.as_deref().is_some_and(|b| !b.is_empty()) {
                with_barcode += 1;
            }
            *by_type.entry(node.node_type.as_str().to_string()).or_insert(0) += 1;
        }

        Ok(InventoryStats {
            total: nodes.len(),
            containers,
            items: nodes.len() - containers,
            needing_cleaning,
            with_barcode,
            with_attachments: self.store.attachment_owners().await?.len(),
            by_type,
        })
    }

    /// Every record in path order, stamped with the supplied export
    /// instant.
    pub async fn export(&self, now: DateTime<Utc>) -> Result<InventoryExport, TreeServiceError> {
        let records = self.store.scan_all().await?;
        Ok(InventoryExport {
            count: records.len(),
            exported_at: now,
            records,
        })
    }

    /// A node's attachments, primary-first then oldest-first.
    pub async fn list_attachments(
        &self,
        node_id: &str,
    ) -> Result<Vec<Attachment>, TreeServiceError> {
        self.get(node_id).await?;
        Ok(self.store.attachments_for(node_id).await?)
    }
}

/// Assemble a pre-order member list into a nested tree.
fn build_tree(members: Vec<Node>) -> Result<NodeTree, TreeServiceError> {
    let mut iter = members.into_iter();
    let root = iter
        .next()
        .ok_or_else(|| StoreError::index_corrupt("subtree scan returned no members"))?;

    let mut stack: Vec<NodeTree> = vec![NodeTree {
        node: root,
        children: Vec::new(),
    }];

    for node in iter {
        // Close finished branches until the top of the stack is this
        // node's ancestor.
        loop {
            let is_child = stack
                .last()
                .is_some_and(|top| PathCodec::is_ancestor(&top.node.path, &node.path));
            if is_child {
                break;
            }
            let finished = stack
                .pop()
                .ok_or_else(|| StoreError::index_corrupt("subtree member outside scanned root"))?;
            match stack.last_mut() {
                Some(parent) => parent.children.push(finished),
                None => {
                    return Err(StoreError::index_corrupt("subtree member outside scanned root")
                        .into())
                }
            }
        }
        stack.push(NodeTree {
            node,
            children: Vec::new(),
        });
    }

    while stack.len() > 1 {
        if let Some(finished) = stack.pop() {
            if let Some(parent) = stack.last_mut() {
                parent.children.push(finished);
            }
        }
    }
    stack
        .pop()
        .ok_or_else(|| StoreError::index_corrupt("subtree assembly emptied the stack").into())
}

/// Join the names along a path's prefix chain, including the node itself.
fn breadcrumb_from(names: &HashMap<String, String>, path: &str) -> String {
    let mut crumbs: Vec<&str> = Vec::new();
    for prefix in PathCodec::ancestors(path) {
        if let Some(name) = names.get(prefix) {
            crumbs.push(name);
        }
    }
    if let Some(name) = names.get(path) {
        crumbs.push(name);
    }
    crumbs.join(" > ")
}

#[cfg(test)]
#[path = "query_service_test.rs"]
mod query_service_test;
