//! Durable node store backed by a JSON snapshot file.
//!
//! `FileStore` keeps the same in-memory index as [`MemoryStore`] and writes
//! the full tree to disk after every mutation. The snapshot is written to a
//! temporary file and renamed into place, so the on-disk state is always a
//! complete, consistent tree: a crash mid-write leaves the previous
//! snapshot intact, and reopening re-validates every stored path before
//! serving anything.
//!
//! Snapshot-per-mutation is the right durability/complexity trade-off for a
//! household inventory; a write-ahead log would only pay off at node counts
//! this system does not target.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::{Attachment, Node};

use super::error::StoreError;
use super::memory_store::MemoryStore;
use super::node_store::{NodeStore, TreeMutation};

/// On-disk snapshot layout: every node in path order plus all attachment
/// records.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snapshot {
    nodes: Vec<Node>,
    #[serde(default)]
    attachments: Vec<Attachment>,
}

/// Durable store: in-memory index plus an atomically replaced JSON
/// snapshot.
///
/// # Examples
///
/// ```rust,no_run
/// use stowage_core::db::FileStore;
///
/// # async fn example() -> Result<(), stowage_core::db::StoreError> {
/// let store = FileStore::open("inventory.json").await?;
/// let total = store.count_nodes().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    inner: MemoryStore,
}

impl FileStore {
    /// Open (or create) a store at `path`.
    ///
    /// # Errors
    ///
    /// Fails on unreadable files, snapshot parse errors, or a snapshot
    /// whose paths violate the tree invariants (malformed segments,
    /// duplicate paths, depth mismatches).
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();

        let inner = match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let snapshot: Snapshot = serde_json::from_slice(&bytes)?;
                debug!(
                    nodes = snapshot.nodes.len(),
                    attachments = snapshot.attachments.len(),
                    "loaded inventory snapshot"
                );
                MemoryStore::from_contents(snapshot.nodes, snapshot.attachments)?
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => MemoryStore::new(),
            Err(err) => return Err(err.into()),
        };

        Ok(Self { path, inner })
    }

    /// Convenience read used by doc examples and callers that only need the
    /// node count without going through the trait object.
    pub async fn count_nodes(&self) -> Result<usize, StoreError> {
        self.inner.count().await
    }

    /// Serialize the current tree and atomically replace the snapshot file.
    async fn persist(&self) -> Result<(), StoreError> {
        let (nodes, attachments) = self.inner.snapshot_contents().await;
        let snapshot = Snapshot { nodes, attachments };
        let bytes = serde_json::to_vec_pretty(&snapshot)?;

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!(
            path = %self.path.display(),
            bytes = bytes.len(),
            "persisted inventory snapshot"
        );
        Ok(())
    }
}

#[async_trait]
impl NodeStore for FileStore {
    async fn commit(&self, mutation: TreeMutation) -> Result<(), StoreError> {
        self.inner.commit(mutation).await?;
        self.persist().await
    }

    async fn get(&self, id: &str) -> Result<Option<Node>, StoreError> {
        self.inner.get(id).await
    }

    async fn get_by_path(&self, path: &str) -> Result<Option<Node>, StoreError> {
        self.inner.get_by_path(path).await
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<Node>, StoreError> {
        self.inner.scan_prefix(prefix).await
    }

    async fn scan_all(&self) -> Result<Vec<Node>, StoreError> {
        self.inner.scan_all().await
    }

    async fn count(&self) -> Result<usize, StoreError> {
        self.inner.count().await
    }

    async fn due_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Node>, StoreError> {
        self.inner.due_before(cutoff).await
    }

    async fn add_attachment(&self, attachment: Attachment) -> Result<(), StoreError> {
        self.inner.add_attachment(attachment).await?;
        self.persist().await
    }

    async fn attachments_for(&self, node_id: &str) -> Result<Vec<Attachment>, StoreError> {
        self.inner.attachments_for(node_id).await
    }

    async fn remove_attachment(&self, attachment_id: &str) -> Result<Attachment, StoreError> {
        let removed = self.inner.remove_attachment(attachment_id).await?;
        self.persist().await?;
        Ok(removed)
    }

    async fn attachment_owners(&self) -> Result<Vec<String>, StoreError> {
        self.inner.attachment_owners().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewNode, NodeType};
    use tempfile::TempDir;

    fn node_at(name: &str, path: &str) -> Node {
        Node::from_spec(
            NewNode::new(name, NodeType::Room),
            path.to_string(),
            super::super::path_codec::PathCodec::depth(path),
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn test_open_missing_file_starts_empty() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path().join("inventory.json"))
            .await
            .unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_snapshot_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("inventory.json");

        let node = node_at("Hallway", "0000");
        let id = node.id.clone();
        {
            let store = FileStore::open(&path).await.unwrap();
            store
                .commit(TreeMutation::new().insert(node))
                .await
                .unwrap();
        }

        let reopened = FileStore::open(&path).await.unwrap();
        let restored = reopened.get(&id).await.unwrap().unwrap();
        assert_eq!(restored.name, "Hallway");
        assert_eq!(restored.path, "0000");
        assert_eq!(reopened.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_open_rejects_corrupt_snapshot() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("inventory.json");
        tokio::fs::write(&path, b"{ not json").await.unwrap();

        assert!(matches!(
            FileStore::open(&path).await,
            Err(StoreError::Serialization(_))
        ));
    }

    #[tokio::test]
    async fn test_open_rejects_malformed_paths() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("inventory.json");

        let mut node = node_at("Bad", "0000");
        node.path = "00!0".to_string();
        let snapshot = Snapshot {
            nodes: vec![node],
            attachments: vec![],
        };
        tokio::fs::write(&path, serde_json::to_vec(&snapshot).unwrap())
            .await
            .unwrap();

        assert!(matches!(
            FileStore::open(&path).await,
            Err(StoreError::Path(_))
        ));
    }
}
