//! Tree Service - Structural Mutations
//!
//! This module is the mutation side of the tree engine: root and child
//! creation, leaf deletion, field updates, reparenting, cleaning resets,
//! attachments, and the per-id bulk variants.
//!
//! # Concurrency
//!
//! Every structural mutation runs a read-compute-apply sequence over the
//! path index (scan the affected range, plan path rewrites, commit a
//! batch). Two overlapping sequences could corrupt path uniqueness, so the
//! whole index is treated as one mutually-exclusive resource: a single
//! `tokio::sync::Mutex` is held for the duration of each mutation. Reads go
//! through [`QueryService`](super::query_service::QueryService) and never
//! take this lock; the store's own snapshot semantics guarantee they see
//! pre- or post-mutation state.
//!
//! # Sibling ordinals
//!
//! Ordinals are not compacted when a node leaves its parent; gaps persist.
//! Inserting at a taken position shifts every following sibling (and its
//! subtree) up by one ordinal, in the same atomic batch as the insert or
//! move itself.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::db::{NodeStore, PathCodec, PathRewrite, StoreError, TreeMutation};
use crate::models::{
    Attachment, MovePosition, NewAttachment, NewNode, Node, NodeUpdate, SiblingOrder, TreeConfig,
};

use super::cleaning;
use super::container_policy;
use super::error::TreeServiceError;

/// Per-id outcome of a bulk operation.
#[derive(Debug)]
pub struct BulkFailure {
    /// The id that failed
    pub id: String,
    /// Why it failed
    pub error: TreeServiceError,
}

/// Result of a bulk operation: one entry per requested id, failures
/// isolated from successes.
#[derive(Debug, Default)]
pub struct BulkOutcome {
    /// Number of ids requested
    pub total_requested: usize,
    /// Ids processed successfully, in request order
    pub processed: Vec<String>,
    /// Ids that failed, with their typed errors
    pub failed: Vec<BulkFailure>,
}

impl BulkOutcome {
    fn with_capacity(total_requested: usize) -> Self {
        Self {
            total_requested,
            processed: Vec::new(),
            failed: Vec::new(),
        }
    }

    fn record(&mut self, id: &str, result: Result<(), TreeServiceError>) {
        match result {
            Ok(()) => self.processed.push(id.to_string()),
            Err(error) => self.failed.push(BulkFailure {
                id: id.to_string(),
                error,
            }),
        }
    }

    /// Whether every requested id was processed.
    pub fn succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Index of the first existing child whose name sorts after `name`;
/// equal names insert after their last occurrence.
fn sorted_index(children: &[Node], name: &str) -> usize {
    children
        .iter()
        .position(|child| child.name.as_str() > name)
        .unwrap_or(children.len())
}

/// Structural mutation service over a [`NodeStore`].
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use stowage_core::db::MemoryStore;
/// use stowage_core::models::{NewNode, NodeType, TreeConfig};
/// use stowage_core::services::TreeService;
///
/// # async fn example() -> Result<(), stowage_core::services::TreeServiceError> {
/// let store = Arc::new(MemoryStore::new());
/// let tree = TreeService::new(store, TreeConfig::default());
///
/// let house = tree.create_root(NewNode::new("Home", NodeType::House)).await?;
/// let garage = tree
///     .create_child(&house.id, NewNode::new("Garage", NodeType::Room))
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct TreeService {
    store: Arc<dyn NodeStore>,
    config: TreeConfig,
    /// Serializes all structural mutations (see Concurrency above).
    mutation_lock: Mutex<()>,
}

impl TreeService {
    /// Create a service over a store with the given configuration.
    pub fn new(store: Arc<dyn NodeStore>, config: TreeConfig) -> Self {
        Self {
            store,
            config,
            mutation_lock: Mutex::new(()),
        }
    }

    /// The active tree configuration.
    pub fn config(&self) -> TreeConfig {
        self.config
    }

    /// Get a node by id.
    pub async fn get(&self, id: &str) -> Result<Node, TreeServiceError> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| TreeServiceError::not_found(id))
    }

    /// Create a root-level node.
    pub async fn create_root(&self, spec: NewNode) -> Result<Node, TreeServiceError> {
        let _guard = self.mutation_lock.lock().await;
        let node = self.insert_node(None, spec).await?;
        info!(id = %node.id, name = %node.name, "created root node");
        Ok(node)
    }

    /// Create a child under `parent_id`.
    ///
    /// # Errors
    ///
    /// - [`TreeServiceError::ParentNotFound`] for an unknown parent
    /// - [`TreeServiceError::NonContainerParent`] when the parent cannot
    ///   hold children
    pub async fn create_child(
        &self,
        parent_id: &str,
        spec: NewNode,
    ) -> Result<Node, TreeServiceError> {
        let _guard = self.mutation_lock.lock().await;
        let parent = self
            .store
            .get(parent_id)
            .await?
            .ok_or_else(|| TreeServiceError::parent_not_found(parent_id))?;
        container_policy::ensure_can_attach(&parent)?;

        let node = self.insert_node(Some(parent), spec).await?;
        info!(id = %node.id, parent = %parent_id, name = %node.name, "created child node");
        Ok(node)
    }

    /// Apply a partial field update.
    ///
    /// # Errors
    ///
    /// [`TreeServiceError::ContainerDemotionBlocked`] when demoting
    /// `is_container` while children exist.
    pub async fn update_fields(
        &self,
        id: &str,
        update: NodeUpdate,
    ) -> Result<Node, TreeServiceError> {
        let _guard = self.mutation_lock.lock().await;
        let mut node = self.get(id).await?;
        if update.is_empty() {
            return Ok(node);
        }

        if update.is_container == Some(false) {
            container_policy::ensure_can_demote(&node)?;
        }

        if let Some(name) = update.name {
            node.name = name;
        }
        if let Some(node_type) = update.node_type {
            node.node_type = node_type;
        }
        if let Some(description) = update.description {
            node.description = description;
        }
        if let Some(is_container) = update.is_container {
            node.is_container = is_container;
        }
        if let Some(barcode) = update.barcode {
            node.barcode = barcode;
        }
        if let Some(quantity) = update.quantity {
            node.quantity = quantity;
        }
        if let Some(value) = update.value {
            node.value = value;
        }
        if let Some(days) = update.cleaned_interval_days {
            node.cleaned_interval_days = days;
            node.next_due_at = cleaning::next_due(node.cleaned_at, days);
        }
        node.validate()?;
        node.touch(Utc::now());

        self.store
            .commit(TreeMutation::new().update(node.clone()))
            .await?;
        debug!(id = %id, "updated node fields");
        Ok(node)
    }

    /// Delete a leaf node. Children are never cascaded; the node's
    /// attachments are removed with it.
    ///
    /// # Errors
    ///
    /// [`TreeServiceError::HasChildren`] when the node is not a leaf.
    pub async fn delete(&self, id: &str) -> Result<(), TreeServiceError> {
        let _guard = self.mutation_lock.lock().await;
        let node = self.get(id).await?;
        container_policy::ensure_deletable(&node)?;

        let mut mutation = TreeMutation::new().remove(&node.id);
        if let Some(parent_path) = PathCodec::parent(&node.path) {
            let mut parent = self.parent_record(parent_path).await?;
            parent.numchild = parent.numchild.saturating_sub(1);
            parent.touch(Utc::now());
            mutation = mutation.update(parent);
        }

        self.store.commit(mutation).await?;
        info!(id = %id, "deleted node");
        Ok(())
    }

    /// Reparent a node and, implicitly, its whole subtree.
    ///
    /// Child positions (`first-child`, `last-child`, `sorted-child`) read
    /// `target` as the new parent; sibling positions (`left`, `right`,
    /// `sorted-sibling`) read it as a reference sibling. `target == None`
    /// addresses the root level.
    ///
    /// The operation is all-or-nothing: the moved node's path, every
    /// descendant path, any displaced sibling subtrees, and both parents'
    /// child counts change in one atomic batch, or nothing changes at all.
    pub async fn move_node(
        &self,
        id: &str,
        target: Option<&str>,
        position: MovePosition,
    ) -> Result<(), TreeServiceError> {
        let _guard = self.mutation_lock.lock().await;
        let now = Utc::now();
        let node = self.get(id).await?;

        // Resolve the destination parent (None = root level) and, for
        // sibling positions, the reference node. Cycle checks happen here,
        // before any planning.
        let (dest_parent, reference) = if position.is_sibling_position() {
            let target_id = target.ok_or_else(|| {
                TreeServiceError::invalid_position(format!(
                    "position '{}' requires a reference node",
                    position
                ))
            })?;
            let reference = self
                .store
                .get(target_id)
                .await?
                .ok_or_else(|| TreeServiceError::not_found(target_id))?;
            if reference.id == node.id {
                return Err(TreeServiceError::move_to_self(id));
            }
            if PathCodec::is_ancestor(&node.path, &reference.path) {
                return Err(TreeServiceError::move_to_descendant(id, target_id));
            }
            let parent = match PathCodec::parent(&reference.path) {
                Some(parent_path) => Some(self.parent_record(parent_path).await?),
                None => None,
            };
            (parent, Some(reference))
        } else {
            match target {
                Some(target_id) => {
                    if target_id == node.id {
                        return Err(TreeServiceError::move_to_self(id));
                    }
                    let parent = self
                        .store
                        .get(target_id)
                        .await?
                        .ok_or_else(|| TreeServiceError::not_found(target_id))?;
                    if PathCodec::is_ancestor(&node.path, &parent.path) {
                        return Err(TreeServiceError::move_to_descendant(id, target_id));
                    }
                    (Some(parent), None)
                }
                None => (None, None),
            }
        };

        if let Some(parent) = &dest_parent {
            container_policy::ensure_move_target(parent)?;
        }

        let dest_parent_path = dest_parent
            .as_ref()
            .map(|p| p.path.clone())
            .unwrap_or_default();

        // Destination children, without the moved node when it already
        // lives there.
        let mut children = self.children_at(&dest_parent_path).await?;
        children.retain(|child| child.id != node.id);

        let index = match (position, &reference) {
            (MovePosition::FirstChild, _) => 0,
            (MovePosition::LastChild, _) => children.len(),
            (MovePosition::SortedChild, _) | (MovePosition::SortedSibling, _) => {
                match self.config.sibling_order {
                    SiblingOrder::ByName => sorted_index(&children, &node.name),
                    SiblingOrder::Insertion => children.len(),
                }
            }
            (MovePosition::Left, Some(reference)) => children
                .iter()
                .position(|child| child.id == reference.id)
                .unwrap_or(children.len()),
            (MovePosition::Right, Some(reference)) => children
                .iter()
                .position(|child| child.id == reference.id)
                .map(|i| i + 1)
                .unwrap_or(children.len()),
            (MovePosition::Left | MovePosition::Right, None) => {
                return Err(TreeServiceError::invalid_position(format!(
                    "position '{}' requires a reference node",
                    position
                )))
            }
        };

        // Sibling shifts at the destination must not touch the moved
        // subtree: it gets its own prefix substitution below.
        let (ordinal, mut rewrites) = self
            .plan_insertion(&children, index, Some(&node.path))
            .await?;
        let new_path = PathCodec::child_path(&dest_parent_path, ordinal)?;

        // Rewrite the moved node and every descendant by substituting the
        // new prefix for the old one; relative order and depth offsets are
        // unchanged.
        let old_prefix = node.path.clone();
        for member in self.store.scan_prefix(&old_prefix).await? {
            let rewritten = PathCodec::reprefix(&member.path, &old_prefix, &new_path)?;
            rewrites.push(PathRewrite::new(&member.id, rewritten));
        }

        let mut mutation = TreeMutation::new().rewrites(rewrites);

        let mut moved = node.clone();
        moved.touch(now);
        mutation = mutation.update(moved);

        let old_parent_path = PathCodec::parent(&node.path).map(str::to_string);
        let new_parent_path = dest_parent.as_ref().map(|p| p.path.clone());
        if old_parent_path != new_parent_path {
            if let Some(parent_path) = &old_parent_path {
                let mut old_parent = self.parent_record(parent_path).await?;
                old_parent.numchild = old_parent.numchild.saturating_sub(1);
                old_parent.touch(now);
                mutation = mutation.update(old_parent);
            }
            if let Some(mut new_parent) = dest_parent {
                new_parent.numchild += 1;
                new_parent.touch(now);
                mutation = mutation.update(new_parent);
            }
        }

        self.store.commit(mutation).await?;
        info!(
            id = %id,
            position = %position,
            new_path = %new_path,
            "moved node"
        );
        Ok(())
    }

    /// Reset a node's cleaning timestamp to `now`.
    pub async fn mark_cleaned(
        &self,
        id: &str,
        now: DateTime<Utc>,
    ) -> Result<Node, TreeServiceError> {
        let _guard = self.mutation_lock.lock().await;
        let mut node = self.get(id).await?;
        node.mark_cleaned(now);
        self.store
            .commit(TreeMutation::new().update(node.clone()))
            .await?;
        debug!(id = %id, "marked node cleaned");
        Ok(node)
    }

    /// Attach a record to a node.
    pub async fn add_attachment(
        &self,
        node_id: &str,
        spec: NewAttachment,
    ) -> Result<Attachment, TreeServiceError> {
        let _guard = self.mutation_lock.lock().await;
        // Surface a service-level NotFound rather than the store's missing
        // record error.
        self.get(node_id).await?;

        let attachment = Attachment::from_spec(spec, node_id.to_string(), Utc::now());
        self.store.add_attachment(attachment.clone()).await?;
        debug!(node = %node_id, attachment = %attachment.id, "added attachment");
        Ok(attachment)
    }

    /// Remove a single attachment.
    pub async fn remove_attachment(
        &self,
        attachment_id: &str,
    ) -> Result<Attachment, TreeServiceError> {
        let _guard = self.mutation_lock.lock().await;
        match self.store.remove_attachment(attachment_id).await {
            Ok(attachment) => Ok(attachment),
            Err(StoreError::AttachmentMissing { id }) => {
                Err(TreeServiceError::attachment_not_found(id))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Mark many nodes cleaned; failures are isolated per id.
    pub async fn mark_cleaned_many(&self, ids: &[String], now: DateTime<Utc>) -> BulkOutcome {
        let mut outcome = BulkOutcome::with_capacity(ids.len());
        for id in ids {
            outcome.record(id, self.mark_cleaned(id, now).await.map(|_| ()));
        }
        outcome
    }

    /// Delete many leaves; failures (non-leaves, unknown ids) are isolated
    /// per id and do not abort the rest.
    pub async fn delete_many(&self, ids: &[String]) -> BulkOutcome {
        let mut outcome = BulkOutcome::with_capacity(ids.len());
        for id in ids {
            outcome.record(id, self.delete(id).await);
        }
        outcome
    }

    /// Move many nodes under one parent at their sorted positions;
    /// failures are isolated per id.
    pub async fn move_many_to_parent(&self, ids: &[String], new_parent_id: &str) -> BulkOutcome {
        let mut outcome = BulkOutcome::with_capacity(ids.len());
        for id in ids {
            outcome.record(
                id,
                self.move_node(id, Some(new_parent_id), MovePosition::SortedChild)
                    .await,
            );
        }
        outcome
    }

    /// Direct children of the node at `parent_path` ("" for roots), in
    /// path order.
    async fn children_at(&self, parent_path: &str) -> Result<Vec<Node>, TreeServiceError> {
        let child_depth = PathCodec::depth(parent_path) + 1;
        Ok(self
            .store
            .scan_prefix(parent_path)
            .await?
            .into_iter()
            .filter(|node| node.depth == child_depth)
            .collect())
    }

    /// Load the parent record at `parent_path`; its absence means the id
    /// and path indexes disagree.
    async fn parent_record(&self, parent_path: &str) -> Result<Node, TreeServiceError> {
        self.store
            .get_by_path(parent_path)
            .await?
            .ok_or_else(|| {
                StoreError::index_corrupt(format!("no record at parent path '{}'", parent_path))
                    .into()
            })
    }

    /// Shared insertion path for create_root and create_child.
    ///
    /// Caller holds the mutation lock and has already run the container
    /// policy.
    async fn insert_node(
        &self,
        parent: Option<Node>,
        spec: NewNode,
    ) -> Result<Node, TreeServiceError> {
        let now = Utc::now();
        let parent_path = parent.as_ref().map(|p| p.path.as_str()).unwrap_or("");

        let children = self.children_at(parent_path).await?;
        let index = match self.config.sibling_order {
            SiblingOrder::ByName => sorted_index(&children, &spec.name),
            SiblingOrder::Insertion => children.len(),
        };
        let (ordinal, rewrites) = self.plan_insertion(&children, index, None).await?;

        let path = PathCodec::child_path(parent_path, ordinal)?;
        let depth = PathCodec::depth(&path);
        let node = Node::from_spec(spec, path, depth, now);
        node.validate()?;

        let mut mutation = TreeMutation::new().insert(node.clone()).rewrites(rewrites);
        if let Some(mut parent) = parent {
            parent.numchild += 1;
            parent.touch(now);
            mutation = mutation.update(parent);
        }
        self.store.commit(mutation).await?;
        Ok(node)
    }

    /// Plan an insertion into `children` at `index`.
    ///
    /// Returns the new node's sibling ordinal plus the rewrites that shift
    /// every following sibling's subtree up by one ordinal. Appending lands
    /// after the last existing ordinal (gaps are kept, never compacted).
    ///
    /// `exclude_prefix` carves the moved subtree out of the shift scans
    /// during a move: its members are re-prefixed separately and must not
    /// be rewritten twice.
    async fn plan_insertion(
        &self,
        children: &[Node],
        index: usize,
        exclude_prefix: Option<&str>,
    ) -> Result<(u32, Vec<PathRewrite>), TreeServiceError> {
        if index >= children.len() {
            let ordinal = match children.last() {
                Some(last) => PathCodec::last_ordinal(&last.path)? + 1,
                None => 0,
            };
            return Ok((ordinal, Vec::new()));
        }

        let ordinal = PathCodec::last_ordinal(&children[index].path)?;
        let mut rewrites = Vec::new();
        for sibling in &children[index..] {
            let old_prefix = sibling.path.as_str();
            let shifted = PathCodec::last_ordinal(old_prefix)? + 1;
            let new_prefix = PathCodec::with_last_ordinal(old_prefix, shifted)?;
            for member in self.store.scan_prefix(old_prefix).await? {
                if exclude_prefix.is_some_and(|p| member.path.starts_with(p)) {
                    continue;
                }
                let rewritten = PathCodec::reprefix(&member.path, old_prefix, &new_prefix)?;
                rewrites.push(PathRewrite::new(&member.id, rewritten));
            }
        }
        Ok((ordinal, rewrites))
    }
}

#[cfg(test)]
#[path = "tree_service_test.rs"]
mod tree_service_test;

#[cfg(test)]
#[path = "tree_service_move_test.rs"]
mod tree_service_move_test;
