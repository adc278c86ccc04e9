//! Attachment records owned by nodes.
//!
//! Attachments are the explicit "owned collection keyed by node id" relation:
//! each record belongs to exactly one node and is deleted with it. Only the
//! metadata lives here; image bytes and upload storage are outside the core.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Metadata record for an image or document attached to a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    /// Unique identifier (UUID v4)
    pub id: String,

    /// Owning node id
    pub node_id: String,

    /// Stored file name
    pub file_name: String,

    /// Optional caption
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Whether this is the node's primary attachment; primary attachments
    /// sort before the rest
    pub is_primary: bool,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Attachment {
    /// Create an attachment for `node_id` from caller-provided fields.
    pub fn from_spec(spec: NewAttachment, node_id: String, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            node_id,
            file_name: spec.file_name,
            description: spec.description,
            is_primary: spec.is_primary,
            created_at: now,
        }
    }
}

/// Creation fields for a new attachment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAttachment {
    /// Stored file name
    pub file_name: String,

    /// Optional caption
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Whether this is the node's primary attachment
    #[serde(default)]
    pub is_primary: bool,
}

impl NewAttachment {
    /// Create a non-primary attachment spec.
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            description: None,
            is_primary: false,
        }
    }

    /// Set the caption.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Mark as the primary attachment.
    pub fn primary(mut self) -> Self {
        self.is_primary = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_spec() {
        let now = Utc::now();
        let spec = NewAttachment::new("front.jpg")
            .with_description("Front view")
            .primary();
        let attachment = Attachment::from_spec(spec, "node-1".to_string(), now);

        assert!(!attachment.id.is_empty());
        assert_eq!(attachment.node_id, "node-1");
        assert_eq!(attachment.file_name, "front.jpg");
        assert_eq!(attachment.description.as_deref(), Some("Front view"));
        assert!(attachment.is_primary);
        assert_eq!(attachment.created_at, now);
    }
}
