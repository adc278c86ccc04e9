//! Containment invariants.
//!
//! Checked before every structural mutation: child attachment requires the
//! target to be a container, and a container cannot be demoted while it has
//! children. Violations fail with a named error, never a silent coercion.

use crate::models::Node;

use super::error::TreeServiceError;

/// A child may only be created under a container.
pub fn ensure_can_attach(parent: &Node) -> Result<(), TreeServiceError> {
    if !parent.is_container {
        return Err(TreeServiceError::non_container_parent(&parent.id));
    }
    Ok(())
}

/// A node may only be moved under a container.
pub fn ensure_move_target(parent: &Node) -> Result<(), TreeServiceError> {
    if !parent.is_container {
        return Err(TreeServiceError::non_container_target(&parent.id));
    }
    Ok(())
}

/// A container may only become a non-container once it has no children.
pub fn ensure_can_demote(node: &Node) -> Result<(), TreeServiceError> {
    if node.numchild > 0 {
        return Err(TreeServiceError::container_demotion_blocked(
            &node.id,
            node.numchild,
        ));
    }
    Ok(())
}

/// Only leaves may be deleted; children are never cascaded.
pub fn ensure_deletable(node: &Node) -> Result<(), TreeServiceError> {
    if node.numchild > 0 {
        return Err(TreeServiceError::has_children(&node.id, node.numchild));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewNode, NodeType};
    use chrono::Utc;

    fn node(is_container: bool, numchild: u32) -> Node {
        let spec = NewNode::new("Bin", NodeType::Container);
        let spec = if is_container { spec } else { spec.leaf() };
        let mut node = Node::from_spec(spec, "0000".to_string(), 1, Utc::now());
        node.numchild = numchild;
        node
    }

    #[test]
    fn test_attach_requires_container() {
        assert!(ensure_can_attach(&node(true, 0)).is_ok());
        assert!(matches!(
            ensure_can_attach(&node(false, 0)),
            Err(TreeServiceError::NonContainerParent { .. })
        ));
    }

    #[test]
    fn test_move_target_requires_container() {
        assert!(ensure_move_target(&node(true, 2)).is_ok());
        assert!(matches!(
            ensure_move_target(&node(false, 0)),
            Err(TreeServiceError::NonContainerTarget { .. })
        ));
    }

    #[test]
    fn test_demotion_blocked_with_children() {
        assert!(ensure_can_demote(&node(true, 0)).is_ok());
        assert!(matches!(
            ensure_can_demote(&node(true, 1)),
            Err(TreeServiceError::ContainerDemotionBlocked { numchild: 1, .. })
        ));
    }

    #[test]
    fn test_delete_requires_leaf() {
        assert!(ensure_deletable(&node(false, 0)).is_ok());
        assert!(matches!(
            ensure_deletable(&node(true, 4)),
            Err(TreeServiceError::HasChildren { numchild: 4, .. })
        ));
    }
}
