//! External resources and their collection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::Zeroizing;

use super::folders::ExternalFolder;
use super::path;
use super::resource_types::CapabilitySet;
use super::totp::ExternalTotp;
use super::types::{limits, InterchangeError, InterchangeResult};

/// Name given to records that arrive without one.
pub const UNNAMED_RESOURCE: &str = "(no name)";

/// Icon set used for KeePass-style icon ids.
pub const KEEPASS_ICON_SET: &str = "keepass-icon-set";

// ── Secret ──────────────────────────────────────────────────────────

/// One armored secret, encrypted for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedSecret {
    pub user_id: String,
    pub data: String,
}

/// A resource secret is either still in clear (between parsing and
/// encryption, or after decryption on export) or already encrypted.
#[derive(Clone, PartialEq, Eq)]
pub enum ResourceSecret {
    Clear(Zeroizing<String>),
    Encrypted(Vec<EncryptedSecret>),
}

impl Default for ResourceSecret {
    fn default() -> Self {
        Self::Clear(Zeroizing::new(String::new()))
    }
}

impl fmt::Debug for ResourceSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Clear(_) => write!(f, "Clear(***)"),
            Self::Encrypted(secrets) => write!(f, "Encrypted({} secrets)", secrets.len()),
        }
    }
}

// ── Icon ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceIcon {
    #[serde(rename = "type")]
    pub icon_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<u32>,
    /// `#RRGGBB`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
}

impl ResourceIcon {
    pub fn keepass(value: Option<u32>, background_color: Option<String>) -> Option<Self> {
        if value.is_none() && background_color.is_none() {
            return None;
        }
        Some(Self {
            icon_type: KEEPASS_ICON_SET.into(),
            value,
            background_color,
        })
    }
}

// ── ExternalResource ────────────────────────────────────────────────

/// A resource that exists only for the duration of an import or export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalResource {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip)]
    pub secret: ResourceSecret,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_type_id: Option<String>,
    #[serde(skip)]
    pub totp: Option<ExternalTotp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folder_parent_id: Option<String>,
    pub folder_parent_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expired: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<ResourceIcon>,
}

impl ExternalResource {
    pub fn new(name: &str) -> Self {
        let name = name.trim();
        Self {
            id: None,
            name: if name.is_empty() {
                UNNAMED_RESOURCE.to_string()
            } else {
                name.to_string()
            },
            username: None,
            uri: None,
            description: None,
            secret: ResourceSecret::default(),
            resource_type_id: None,
            totp: None,
            folder_parent_id: None,
            folder_parent_path: String::new(),
            expired: None,
            icon: None,
        }
    }

    pub fn with_username(mut self, username: Option<&str>) -> Self {
        self.username = non_empty(username);
        self
    }

    pub fn with_uri(mut self, uri: Option<&str>) -> Self {
        self.uri = non_empty(uri);
        self
    }

    pub fn with_description(mut self, description: Option<&str>) -> Self {
        self.description = description
            .filter(|d| !d.trim().is_empty())
            .map(String::from);
        self
    }

    pub fn with_secret_clear(mut self, secret: &str) -> Self {
        self.secret = ResourceSecret::Clear(Zeroizing::new(secret.to_string()));
        self
    }

    pub fn with_totp(mut self, totp: Option<ExternalTotp>) -> Self {
        self.totp = totp;
        self
    }

    pub fn with_folder_parent_path(mut self, folder_parent_path: &str) -> Self {
        self.folder_parent_path = path::sanitize_path(folder_parent_path);
        self
    }

    pub fn with_expiry(mut self, expired: Option<DateTime<Utc>>) -> Self {
        self.expired = expired;
        self
    }

    pub fn with_icon(mut self, icon: Option<ResourceIcon>) -> Self {
        self.icon = icon;
        self
    }

    /// Check field lengths against the remote schema.
    pub fn validate(&self) -> InterchangeResult<()> {
        check_len("name", Some(&self.name), limits::RESOURCE_NAME_MAX)?;
        check_len("username", self.username.as_ref(), limits::USERNAME_MAX)?;
        check_len("uri", self.uri.as_ref(), limits::URI_MAX)?;
        check_len(
            "description",
            self.description.as_ref(),
            limits::DESCRIPTION_MAX,
        )?;
        if let Some(totp) = &self.totp {
            totp.validate()?;
        }
        Ok(())
    }

    /// Validate and return self, for use at the end of a builder chain.
    pub fn validated(self) -> InterchangeResult<Self> {
        self.validate()?;
        Ok(self)
    }

    /// The clear secret, if the resource has not been encrypted yet.
    pub fn secret_clear(&self) -> Option<&str> {
        match &self.secret {
            ResourceSecret::Clear(s) => Some(s.as_str()),
            ResourceSecret::Encrypted(_) => None,
        }
    }

    pub fn is_encrypted(&self) -> bool {
        matches!(self.secret, ResourceSecret::Encrypted(_))
    }

    pub fn set_encrypted(&mut self, secrets: Vec<EncryptedSecret>) {
        self.secret = ResourceSecret::Encrypted(secrets);
    }

    /// Which secret capabilities this record actually uses.
    pub fn populated_capabilities(&self) -> CapabilitySet {
        CapabilitySet {
            password: self.secret_clear().map_or(false, |s| !s.is_empty()),
            description: self.description.is_some(),
            totp: self.totp.is_some(),
        }
    }

    pub fn change_root_path(&mut self, root_path: &str) {
        self.folder_parent_path = path::prefix_path(root_path, &self.folder_parent_path);
    }

    pub fn move_to_root(&mut self) {
        self.folder_parent_path.clear();
        self.folder_parent_id = None;
    }

    /// Secret-free JSON view, used as the source of item errors.
    pub fn to_source(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

fn check_len(field: &str, value: Option<&String>, max: usize) -> InterchangeResult<()> {
    if let Some(value) = value {
        let len = value.chars().count();
        if len > max {
            return Err(InterchangeError::validation(format!(
                "Resource {} is {} characters long, the maximum is {}",
                field, len, max
            )));
        }
    }
    Ok(())
}

// ── ExternalResourceCollection ──────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExternalResourceCollection {
    items: Vec<ExternalResource>,
}

impl ExternalResourceCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, resource: ExternalResource) {
        self.items.push(resource);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExternalResource> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ExternalResource> {
        self.items.iter_mut()
    }

    pub fn items(&self) -> &[ExternalResource] {
        &self.items
    }

    pub fn get(&self, index: usize) -> Option<&ExternalResource> {
        self.items.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut ExternalResource> {
        self.items.get_mut(index)
    }

    /// Resources filed directly in the folder at `folder_path`.
    pub fn get_by_folder_path(&self, folder_path: &str) -> Vec<&ExternalResource> {
        let wanted = path::sanitize_path(folder_path);
        self.items
            .iter()
            .filter(|r| r.folder_parent_path == wanted)
            .collect()
    }

    /// Resources whose parent is the folder with remote id `folder_id`.
    pub fn get_by_folder_id(&self, folder_id: &str) -> Vec<&ExternalResource> {
        self.items
            .iter()
            .filter(|r| r.folder_parent_id.as_deref() == Some(folder_id))
            .collect()
    }

    /// Hand a freshly created folder's id to the resources filed in it.
    pub fn assign_folder_id(&mut self, folder_path: &str, folder_id: &str) {
        let wanted = path::sanitize_path(folder_path);
        for resource in self.items.iter_mut() {
            if resource.folder_parent_path == wanted {
                resource.folder_parent_id = Some(folder_id.to_string());
            }
        }
    }

    /// Move every resource filed at or below `folder_path` to the root.
    /// Returns how many moved.
    pub fn detach_from_path(&mut self, folder_path: &str) -> usize {
        let mut moved = 0;
        for resource in self.items.iter_mut() {
            if path::is_same_or_descendant(&resource.folder_parent_path, folder_path) {
                resource.move_to_root();
                moved += 1;
            }
        }
        moved
    }

    pub fn move_all_to_root(&mut self) {
        self.items.iter_mut().for_each(ExternalResource::move_to_root);
    }

    /// Re-root every resource below `root`; root-level resources are filed
    /// directly inside it.
    pub fn change_root_path(&mut self, root: &ExternalFolder) {
        let root_path = root.path();
        for resource in self.items.iter_mut() {
            if resource.folder_parent_path.is_empty() {
                resource.folder_parent_id = root.id.clone();
            }
            resource.change_root_path(&root_path);
        }
    }
}

impl IntoIterator for ExternalResourceCollection {
    type Item = ExternalResource;
    type IntoIter = std::vec::IntoIter<ExternalResource>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl FromIterator<ExternalResource> for ExternalResourceCollection {
    fn from_iter<T: IntoIterator<Item = ExternalResource>>(iter: T) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}
