//! Durable-store integration: the tree survives restarts with every
//! structural invariant and the pre-order enumeration intact.

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use stowage_core::db::{FileStore, PathCodec};
use stowage_core::models::{MovePosition, NewAttachment, NewNode, NodeType, TreeConfig};
use stowage_core::services::{QueryService, TreeService};
use tempfile::TempDir;

async fn build_services(path: &std::path::Path) -> Result<(TreeService, QueryService)> {
    let store = Arc::new(FileStore::open(path).await?);
    Ok((
        TreeService::new(store.clone(), TreeConfig::default()),
        QueryService::new(store),
    ))
}

#[tokio::test]
async fn test_tree_survives_restart() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("inventory.json");

    let (house_id, toolbox_id, pre_order_before) = {
        let (tree, queries) = build_services(&path).await?;

        let house = tree.create_root(NewNode::new("Home", NodeType::House)).await?;
        let garage = tree
            .create_child(&house.id, NewNode::new("Garage", NodeType::Room))
            .await?;
        let toolbox = tree
            .create_child(
                &garage.id,
                NewNode::new("Toolbox", NodeType::Container).with_barcode("tb-01"),
            )
            .await?;
        tree.create_child(&toolbox.id, NewNode::new("Hammer", NodeType::Item).leaf())
            .await?;
        tree.add_attachment(&toolbox.id, NewAttachment::new("toolbox.jpg").primary())
            .await?;

        // A structural shuffle before shutdown, so the snapshot holds
        // rewritten paths rather than only fresh inserts.
        tree.move_node(&toolbox.id, Some(&house.id), MovePosition::SortedChild)
            .await?;

        let pre_order: Vec<String> = queries
            .export(Utc::now())
            .await?
            .records
            .into_iter()
            .map(|n| n.id)
            .collect();
        (house.id.clone(), toolbox.id.clone(), pre_order)
    };

    // Reopen from disk.
    let (tree, queries) = build_services(&path).await?;

    let pre_order_after: Vec<String> = queries
        .export(Utc::now())
        .await?
        .records
        .into_iter()
        .map(|n| n.id)
        .collect();
    assert_eq!(pre_order_before, pre_order_after);

    // Invariants hold on the reloaded tree.
    for node in queries.descendants(&house_id, true).await? {
        assert_eq!(node.depth, PathCodec::depth(&node.path));
        let ancestors = queries.ancestors(&node.id, false).await?;
        assert_eq!(ancestors.len() as u32, node.depth - 1);
        assert_eq!(
            node.numchild as usize,
            queries.children(Some(&node.id)).await?.len()
        );
    }

    assert_eq!(
        queries.breadcrumb(&toolbox_id).await?,
        "Home > Toolbox"
    );
    let attachments = queries.list_attachments(&toolbox_id).await?;
    assert_eq!(attachments.len(), 1);
    assert_eq!(attachments[0].file_name, "toolbox.jpg");

    // The reopened store keeps serving mutations.
    let shed = tree.create_root(NewNode::new("Shed", NodeType::Storage)).await?;
    let (_, queries) = build_services(&path).await?;
    assert!(queries.get(&shed.id).await.is_ok());

    Ok(())
}

#[tokio::test]
async fn test_failed_mutation_never_reaches_disk() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("inventory.json");

    let (tree, _) = build_services(&path).await?;
    let a = tree.create_root(NewNode::new("A", NodeType::House)).await?;
    let b = tree.create_child(&a.id, NewNode::new("B", NodeType::Room)).await?;

    // Cycle: rejected before any write.
    assert!(tree
        .move_node(&a.id, Some(&b.id), MovePosition::LastChild)
        .await
        .is_err());

    let (_, queries) = build_services(&path).await?;
    let export = queries.export(Utc::now()).await?;
    assert_eq!(export.count, 2);
    let a_reloaded = queries.get(&a.id).await?;
    assert!(a_reloaded.is_root());
    assert_eq!(queries.breadcrumb(&b.id).await?, "A > B");

    Ok(())
}
