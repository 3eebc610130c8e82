//! Remote store boundary.
//!
//! Every write an import performs, and every read an export performs,
//! goes through [`RemoteStore`]. The transport behind it (REST client,
//! local cache, test double) is not this crate's concern.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::resources::EncryptedSecret;
use super::types::InterchangeResult;

// ── Folders ─────────────────────────────────────────────────────────

/// Payload for creating a folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderCreateRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folder_parent_id: Option<String>,
}

/// A folder as returned by the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFolder {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folder_parent_id: Option<String>,
}

// ── Resources ───────────────────────────────────────────────────────

/// Payload for creating a resource.
///
/// v4 deployments carry the metadata in clear (`name`, `username`, ...);
/// v5 deployments carry an armored `metadata` message instead.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResourceCreateRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Armored metadata message (v5).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<String>,
    /// `user_key` or `shared_key` (v5).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata_key_type: Option<String>,
    pub resource_type_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folder_parent_id: Option<String>,
    /// RFC 3339 expiry timestamp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expired: Option<String>,
    pub secrets: Vec<EncryptedSecret>,
}

/// One encrypted secret attached to a remote resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteSecret {
    pub user_id: String,
    pub resource_id: String,
    pub data: String,
}

/// A resource as returned by the remote store, with the current user's
/// secret when it was requested.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RemoteResource {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata_key_type: Option<String>,
    pub resource_type_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folder_parent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expired: Option<String>,
    #[serde(default)]
    pub secrets: Vec<RemoteSecret>,
}

// ── Resource types ──────────────────────────────────────────────────

/// A catalogue entry as published by the remote store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteResourceType {
    pub id: String,
    pub slug: String,
    pub name: String,
    /// JSON schema with `resource` and `secret` sections.
    #[serde(default)]
    pub definition: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted: Option<String>,
}

// ── Tags ────────────────────────────────────────────────────────────

/// A tag to attach to a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagEntry {
    pub slug: String,
    pub is_shared: bool,
}

impl TagEntry {
    pub fn personal(slug: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            is_shared: false,
        }
    }
}

/// A tag as returned by the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteTag {
    pub id: String,
    pub slug: String,
    #[serde(default)]
    pub is_shared: bool,
}

// ── Store ───────────────────────────────────────────────────────────

/// The remote persistence boundary.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn create_folder(&self, request: FolderCreateRequest) -> InterchangeResult<RemoteFolder>;

    async fn create_resource(
        &self,
        request: ResourceCreateRequest,
    ) -> InterchangeResult<RemoteResource>;

    /// Attach `tags` to a resource, replacing its personal tags.
    async fn add_tags_to_resource(
        &self,
        resource_id: &str,
        tags: Vec<TagEntry>,
    ) -> InterchangeResult<Vec<RemoteTag>>;

    /// Resources with the current user's secret included.
    async fn find_resources_by_ids(&self, ids: &[String]) -> InterchangeResult<Vec<RemoteResource>>;

    async fn find_folders_by_ids(&self, ids: &[String]) -> InterchangeResult<Vec<RemoteFolder>>;

    async fn find_resource_types(&self) -> InterchangeResult<Vec<RemoteResourceType>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_request_skips_empty_fields() {
        let req = ResourceCreateRequest {
            name: Some("n".into()),
            resource_type_id: "t".into(),
            ..Default::default()
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["name"], "n");
        assert!(json.get("metadata").is_none());
        assert!(json.get("folder_parent_id").is_none());
        assert_eq!(json["secrets"], serde_json::json!([]));
    }

    #[test]
    fn test_remote_resource_defaults_secrets() {
        let res: RemoteResource =
            serde_json::from_str(r#"{"id":"r1","resource_type_id":"t"}"#).unwrap();
        assert!(res.secrets.is_empty());
        assert!(res.name.is_none());
    }

    #[test]
    fn test_tag_entry_personal() {
        let tag = TagEntry::personal("import-1");
        let json = serde_json::to_value(&tag).unwrap();
        assert_eq!(json["slug"], "import-1");
        assert_eq!(json["is_shared"], false);
    }

    #[test]
    fn test_resource_type_deserialize() {
        let rt: RemoteResourceType = serde_json::from_str(
            r#"{"id":"1","slug":"totp","name":"TOTP","definition":{"secret":{"type":"object"}}}"#,
        )
        .unwrap();
        assert!(rt.deleted.is_none());
        assert_eq!(rt.definition["secret"]["type"], "object");
    }
}
