//! In-memory node store.
//!
//! The canonical [`TreeIndex`] keeps three structures over the same records:
//! an id→record map, a `BTreeMap` keyed by path (the range-scan index whose
//! iteration order is pre-order traversal), and an ordered due index keyed
//! by each node's derived `next_due_at`. A single `RwLock` guards all three,
//! so readers always observe a consistent snapshot and a mutation batch is
//! either fully visible or not at all.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::models::{Attachment, Node};

use super::error::StoreError;
use super::node_store::{NodeStore, TreeMutation};
use super::path_codec::PathCodec;

/// The three synchronized lookup structures plus attachment ownership.
#[derive(Debug, Default)]
pub(crate) struct TreeIndex {
    /// id → record
    records: HashMap<String, Node>,
    /// path → id, iterated in pre-order
    by_path: BTreeMap<String, String>,
    /// (next_due_at, id), iterated in due order
    due: BTreeSet<(DateTime<Utc>, String)>,
    /// attachment id → record
    attachments: HashMap<String, Attachment>,
    /// node id → owned attachment ids
    owners: HashMap<String, Vec<String>>,
}

impl TreeIndex {
    /// Rebuild an index from snapshot contents, validating every stored
    /// path. A malformed or duplicate path here means the snapshot is
    /// corrupt and the store refuses to open.
    pub(crate) fn from_snapshot(
        nodes: Vec<Node>,
        attachments: Vec<Attachment>,
    ) -> Result<Self, StoreError> {
        let mut index = TreeIndex::default();

        for node in nodes {
            PathCodec::validate(&node.path)?;
            if index.records.contains_key(&node.id) {
                return Err(StoreError::duplicate_id(&node.id));
            }
            if index.by_path.contains_key(&node.path) {
                return Err(StoreError::path_occupied(&node.path));
            }
            if node.depth != PathCodec::depth(&node.path) {
                return Err(StoreError::index_corrupt(format!(
                    "node '{}' has depth {} but path '{}'",
                    node.id, node.depth, node.path
                )));
            }
            index.by_path.insert(node.path.clone(), node.id.clone());
            index.due.insert((node.next_due_at, node.id.clone()));
            index.records.insert(node.id.clone(), node);
        }

        for attachment in attachments {
            if !index.records.contains_key(&attachment.node_id) {
                return Err(StoreError::record_missing(&attachment.node_id));
            }
            index
                .owners
                .entry(attachment.node_id.clone())
                .or_default()
                .push(attachment.id.clone());
            index.attachments.insert(attachment.id.clone(), attachment);
        }

        Ok(index)
    }

    /// Validate a mutation batch against the current state without touching
    /// anything. `apply` relies on this passing, which is what makes a
    /// failed commit side-effect free.
    fn validate(&self, mutation: &TreeMutation) -> Result<(), StoreError> {
        let removed_ids: BTreeSet<&str> = mutation.removes.iter().map(String::as_str).collect();

        for id in &mutation.removes {
            if !self.records.contains_key(id) {
                return Err(StoreError::record_missing(id));
            }
        }

        // Paths freed by this batch: removed nodes and rewritten sources.
        let mut freed: BTreeSet<&str> = BTreeSet::new();
        for id in &removed_ids {
            if let Some(node) = self.records.get(*id) {
                freed.insert(node.path.as_str());
            }
        }
        let mut rewritten_ids: BTreeSet<&str> = BTreeSet::new();
        for rewrite in &mutation.rewrites {
            if removed_ids.contains(rewrite.id.as_str())
                || !rewritten_ids.insert(rewrite.id.as_str())
            {
                return Err(StoreError::index_corrupt(format!(
                    "conflicting batch entries for node '{}'",
                    rewrite.id
                )));
            }
            let node = self
                .records
                .get(&rewrite.id)
                .ok_or_else(|| StoreError::record_missing(&rewrite.id))?;
            PathCodec::validate(&rewrite.new_path)?;
            freed.insert(node.path.as_str());
        }

        for update in &mutation.updates {
            if removed_ids.contains(update.id.as_str()) || !self.records.contains_key(&update.id) {
                return Err(StoreError::record_missing(&update.id));
            }
        }

        // Claimed paths must be unique among themselves and must not hit a
        // surviving occupant.
        let mut claimed: BTreeSet<&str> = BTreeSet::new();
        for rewrite in &mutation.rewrites {
            if !claimed.insert(rewrite.new_path.as_str()) {
                return Err(StoreError::path_occupied(&rewrite.new_path));
            }
        }
        let mut insert_ids: BTreeSet<&str> = BTreeSet::new();
        for node in &mutation.inserts {
            PathCodec::validate(&node.path)?;
            if self.records.contains_key(&node.id) || !insert_ids.insert(node.id.as_str()) {
                return Err(StoreError::duplicate_id(&node.id));
            }
            if !claimed.insert(node.path.as_str()) {
                return Err(StoreError::path_occupied(&node.path));
            }
        }

        for path in &claimed {
            if self.by_path.contains_key(*path) && !freed.contains(*path) {
                return Err(StoreError::path_occupied(*path));
            }
        }

        Ok(())
    }

    /// Apply a pre-validated batch: removes, then rewrites, then field
    /// updates, then inserts.
    pub(crate) fn apply(&mut self, mutation: TreeMutation) -> Result<(), StoreError> {
        self.validate(&mutation)?;

        for id in &mutation.removes {
            if let Some(node) = self.records.remove(id) {
                self.by_path.remove(&node.path);
                self.due.remove(&(node.next_due_at, node.id.clone()));
                for attachment_id in self.owners.remove(id).unwrap_or_default() {
                    self.attachments.remove(&attachment_id);
                }
            }
        }

        // Clear every rewritten source key before inserting targets: within
        // a batch, one node's new path may be another's old path.
        for rewrite in &mutation.rewrites {
            if let Some(node) = self.records.get(&rewrite.id) {
                self.by_path.remove(&node.path);
            }
        }
        for rewrite in &mutation.rewrites {
            if let Some(node) = self.records.get_mut(&rewrite.id) {
                node.path = rewrite.new_path.clone();
                node.depth = PathCodec::depth(&node.path);
                self.by_path.insert(node.path.clone(), node.id.clone());
            }
        }

        for update in mutation.updates {
            if let Some(current) = self.records.get_mut(&update.id) {
                self.due.remove(&(current.next_due_at, current.id.clone()));
                let (path, depth) = (current.path.clone(), current.depth);
                *current = update;
                // Stored position always wins; positions move via rewrites.
                current.path = path;
                current.depth = depth;
                self.due.insert((current.next_due_at, current.id.clone()));
            }
        }

        for node in mutation.inserts {
            self.by_path.insert(node.path.clone(), node.id.clone());
            self.due.insert((node.next_due_at, node.id.clone()));
            self.records.insert(node.id.clone(), node);
        }

        Ok(())
    }

    pub(crate) fn get(&self, id: &str) -> Option<Node> {
        self.records.get(id).cloned()
    }

    pub(crate) fn get_by_path(&self, path: &str) -> Option<Node> {
        self.by_path
            .get(path)
            .and_then(|id| self.records.get(id))
            .cloned()
    }

    pub(crate) fn scan_prefix(&self, prefix: &str) -> Result<Vec<Node>, StoreError> {
        let mut out = Vec::new();
        for (path, id) in self.by_path.range(prefix.to_string()..) {
            if !path.starts_with(prefix) {
                break;
            }
            let node = self
                .records
                .get(id)
                .ok_or_else(|| StoreError::index_corrupt(format!("path '{}' maps to missing record '{}'", path, id)))?;
            out.push(node.clone());
        }
        Ok(out)
    }

    pub(crate) fn count(&self) -> usize {
        self.records.len()
    }

    pub(crate) fn due_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Node>, StoreError> {
        let mut out = Vec::new();
        for (_, id) in self
            .due
            .range(..(cutoff, String::new()))
        {
            let node = self
                .records
                .get(id)
                .ok_or_else(|| StoreError::index_corrupt(format!("due index references missing record '{}'", id)))?;
            out.push(node.clone());
        }
        Ok(out)
    }

    pub(crate) fn add_attachment(&mut self, attachment: Attachment) -> Result<(), StoreError> {
        if !self.records.contains_key(&attachment.node_id) {
            return Err(StoreError::record_missing(&attachment.node_id));
        }
        self.owners
            .entry(attachment.node_id.clone())
            .or_default()
            .push(attachment.id.clone());
        self.attachments.insert(attachment.id.clone(), attachment);
        Ok(())
    }

    pub(crate) fn attachments_for(&self, node_id: &str) -> Vec<Attachment> {
        let mut list: Vec<Attachment> = self
            .owners
            .get(node_id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.attachments.get(id).cloned())
            .collect();
        list.sort_by(|a, b| {
            b.is_primary
                .cmp(&a.is_primary)
                .then_with(|| a.created_at.cmp(&b.created_at))
                .then_with(|| a.id.cmp(&b.id))
        });
        list
    }

    pub(crate) fn remove_attachment(&mut self, attachment_id: &str) -> Result<Attachment, StoreError> {
        let attachment = self
            .attachments
            .remove(attachment_id)
            .ok_or_else(|| StoreError::attachment_missing(attachment_id))?;
        if let Some(ids) = self.owners.get_mut(&attachment.node_id) {
            ids.retain(|id| id != attachment_id);
            if ids.is_empty() {
                self.owners.remove(&attachment.node_id);
            }
        }
        Ok(attachment)
    }

    pub(crate) fn attachment_owners(&self) -> Vec<String> {
        self.owners.keys().cloned().collect()
    }

    pub(crate) fn snapshot_contents(&self) -> (Vec<Node>, Vec<Attachment>) {
        let mut nodes: Vec<Node> = self.records.values().cloned().collect();
        nodes.sort_by(|a, b| a.path.cmp(&b.path));
        let mut attachments: Vec<Attachment> = self.attachments.values().cloned().collect();
        attachments.sort_by(|a, b| a.id.cmp(&b.id));
        (nodes, attachments)
    }
}

/// Embedded, non-durable node store.
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use stowage_core::db::{MemoryStore, NodeStore};
///
/// # async fn example() {
/// let store: Arc<dyn NodeStore> = Arc::new(MemoryStore::new());
/// let total = store.count().await.unwrap();
/// # }
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore {
    index: RwLock<TreeIndex>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store from snapshot contents (used by the file store on
    /// open, and handy for tests).
    pub fn from_contents(
        nodes: Vec<Node>,
        attachments: Vec<Attachment>,
    ) -> Result<Self, StoreError> {
        Ok(Self {
            index: RwLock::new(TreeIndex::from_snapshot(nodes, attachments)?),
        })
    }

    /// Dump every node and attachment, path-ordered, for snapshotting.
    pub async fn snapshot_contents(&self) -> (Vec<Node>, Vec<Attachment>) {
        self.index.read().await.snapshot_contents()
    }
}

#[async_trait]
impl NodeStore for MemoryStore {
    async fn commit(&self, mutation: TreeMutation) -> Result<(), StoreError> {
        self.index.write().await.apply(mutation)
    }

    async fn get(&self, id: &str) -> Result<Option<Node>, StoreError> {
        Ok(self.index.read().await.get(id))
    }

    async fn get_by_path(&self, path: &str) -> Result<Option<Node>, StoreError> {
        Ok(self.index.read().await.get_by_path(path))
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<Node>, StoreError> {
        self.index.read().await.scan_prefix(prefix)
    }

    async fn scan_all(&self) -> Result<Vec<Node>, StoreError> {
        self.index.read().await.scan_prefix("")
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.index.read().await.count())
    }

    async fn due_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Node>, StoreError> {
        self.index.read().await.due_before(cutoff)
    }

    async fn add_attachment(&self, attachment: Attachment) -> Result<(), StoreError> {
        self.index.write().await.add_attachment(attachment)
    }

    async fn attachments_for(&self, node_id: &str) -> Result<Vec<Attachment>, StoreError> {
        Ok(self.index.read().await.attachments_for(node_id))
    }

    async fn remove_attachment(&self, attachment_id: &str) -> Result<Attachment, StoreError> {
        self.index.write().await.remove_attachment(attachment_id)
    }

    async fn attachment_owners(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.index.read().await.attachment_owners())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::node_store::PathRewrite;
    use crate::models::{NewAttachment, NewNode, NodeType};

    fn node_at(name: &str, path: &str) -> Node {
        Node::from_spec(
            NewNode::new(name, NodeType::Storage),
            path.to_string(),
            PathCodec::depth(path),
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn test_commit_insert_and_lookup() {
        let store = MemoryStore::new();
        let node = node_at("Garage", "0000");
        let id = node.id.clone();

        store
            .commit(TreeMutation::new().insert(node))
            .await
            .unwrap();

        assert_eq!(store.get(&id).await.unwrap().unwrap().name, "Garage");
        assert_eq!(
            store.get_by_path("0000").await.unwrap().unwrap().id,
            id
        );
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_commit_rejects_occupied_path() {
        let store = MemoryStore::new();
        store
            .commit(TreeMutation::new().insert(node_at("A", "0000")))
            .await
            .unwrap();

        let result = store
            .commit(TreeMutation::new().insert(node_at("B", "0000")))
            .await;
        assert!(matches!(result, Err(StoreError::PathOccupied { .. })));
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_failed_batch_leaves_store_unchanged() {
        let store = MemoryStore::new();
        let a = node_at("A", "0000");
        let a_id = a.id.clone();
        store.commit(TreeMutation::new().insert(a)).await.unwrap();

        // Batch combines a valid rewrite with a colliding insert; nothing
        // may land.
        let result = store
            .commit(
                TreeMutation::new()
                    .rewrite(PathRewrite::new(&a_id, "0007"))
                    .insert(node_at("B", "0007")),
            )
            .await;
        assert!(matches!(result, Err(StoreError::PathOccupied { .. })));

        let a = store.get(&a_id).await.unwrap().unwrap();
        assert_eq!(a.path, "0000");
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_rewrite_chain_within_one_batch() {
        // Sibling shift: 0001 -> 0002 while 0002 -> 0003. The freed-key
        // bookkeeping has to treat both source paths as available.
        let store = MemoryStore::new();
        let b = node_at("B", "0001");
        let c = node_at("C", "0002");
        let (b_id, c_id) = (b.id.clone(), c.id.clone());
        store
            .commit(TreeMutation::new().insert(b).insert(c))
            .await
            .unwrap();

        store
            .commit(
                TreeMutation::new()
                    .rewrite(PathRewrite::new(&c_id, "0003"))
                    .rewrite(PathRewrite::new(&b_id, "0002")),
            )
            .await
            .unwrap();

        assert_eq!(store.get(&b_id).await.unwrap().unwrap().path, "0002");
        assert_eq!(store.get(&c_id).await.unwrap().unwrap().path, "0003");
    }

    #[tokio::test]
    async fn test_scan_prefix_returns_pre_order() {
        let store = MemoryStore::new();
        for (name, path) in [
            ("root", "0000"),
            ("child-b", "00000001"),
            ("grand", "000000010000"),
            ("child-a", "00000000"),
            ("other-root", "0001"),
        ] {
            store
                .commit(TreeMutation::new().insert(node_at(name, path)))
                .await
                .unwrap();
        }

        let names: Vec<String> = store
            .scan_prefix("0000")
            .await
            .unwrap()
            .into_iter()
            .map(|n| n.name)
            .collect();
        assert_eq!(names, vec!["root", "child-a", "child-b", "grand"]);

        assert_eq!(store.scan_all().await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_update_preserves_stored_position() {
        let store = MemoryStore::new();
        let node = node_at("Attic", "0000");
        let id = node.id.clone();
        store.commit(TreeMutation::new().insert(node)).await.unwrap();

        let mut update = store.get(&id).await.unwrap().unwrap();
        update.name = "Attic (insulated)".to_string();
        update.path = "ZZZZ".to_string(); // must be ignored
        update.depth = 9;
        store.commit(TreeMutation::new().update(update)).await.unwrap();

        let stored = store.get(&id).await.unwrap().unwrap();
        assert_eq!(stored.name, "Attic (insulated)");
        assert_eq!(stored.path, "0000");
        assert_eq!(stored.depth, 1);
    }

    #[tokio::test]
    async fn test_due_index_tracks_updates() {
        let store = MemoryStore::new();
        let node = node_at("Cellar", "0000");
        let id = node.id.clone();
        let due_at = node.next_due_at;
        store.commit(TreeMutation::new().insert(node)).await.unwrap();

        // Before the due instant: nothing due. Strictly after: due.
        assert!(store.due_before(due_at).await.unwrap().is_empty());
        let due = store
            .due_before(due_at + chrono::Duration::seconds(1))
            .await
            .unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, id);

        // Marking cleaned pushes the node out of the due window.
        let mut cleaned = store.get(&id).await.unwrap().unwrap();
        cleaned.mark_cleaned(due_at);
        store
            .commit(TreeMutation::new().update(cleaned))
            .await
            .unwrap();
        assert!(store
            .due_before(due_at + chrono::Duration::seconds(1))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_remove_deletes_attachments() {
        let store = MemoryStore::new();
        let keep = node_at("Keep", "0000");
        let gone = node_at("Gone", "0001");
        let (keep_id, gone_id) = (keep.id.clone(), gone.id.clone());
        store
            .commit(TreeMutation::new().insert(keep).insert(gone))
            .await
            .unwrap();

        let now = Utc::now();
        store
            .add_attachment(Attachment::from_spec(
                NewAttachment::new("keep.jpg"),
                keep_id.clone(),
                now,
            ))
            .await
            .unwrap();
        store
            .add_attachment(Attachment::from_spec(
                NewAttachment::new("gone.jpg"),
                gone_id.clone(),
                now,
            ))
            .await
            .unwrap();

        store
            .commit(TreeMutation::new().remove(&gone_id))
            .await
            .unwrap();

        assert_eq!(store.attachments_for(&gone_id).await.unwrap().len(), 0);
        assert_eq!(store.attachments_for(&keep_id).await.unwrap().len(), 1);
        assert_eq!(store.attachment_owners().await.unwrap(), vec![keep_id]);
    }

    #[tokio::test]
    async fn test_attachment_ordering_primary_first() {
        let store = MemoryStore::new();
        let node = node_at("Shelf", "0000");
        let id = node.id.clone();
        store.commit(TreeMutation::new().insert(node)).await.unwrap();

        let t0 = Utc::now();
        let t1 = t0 + chrono::Duration::seconds(5);
        store
            .add_attachment(Attachment::from_spec(
                NewAttachment::new("second.jpg"),
                id.clone(),
                t0,
            ))
            .await
            .unwrap();
        store
            .add_attachment(Attachment::from_spec(
                NewAttachment::new("cover.jpg").primary(),
                id.clone(),
                t1,
            ))
            .await
            .unwrap();

        let list = store.attachments_for(&id).await.unwrap();
        assert_eq!(list[0].file_name, "cover.jpg");
        assert_eq!(list[1].file_name, "second.jpg");
    }

    #[tokio::test]
    async fn test_from_snapshot_rejects_corruption() {
        let a = node_at("A", "0000");
        let mut b = node_at("B", "0000");
        b.depth = 1;
        assert!(matches!(
            TreeIndex::from_snapshot(vec![a.clone(), b], vec![]),
            Err(StoreError::PathOccupied { .. })
        ));

        let mut bad_depth = node_at("C", "0001");
        bad_depth.depth = 3;
        assert!(matches!(
            TreeIndex::from_snapshot(vec![bad_depth], vec![]),
            Err(StoreError::IndexCorrupt { .. })
        ));
    }
}
