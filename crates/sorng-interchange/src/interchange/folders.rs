//! External folders and their flat, path-addressed collection.
//!
//! A collection is an arena of folder records. The hierarchy is never
//! stored: a folder's depth and ancestry are derived from its
//! `folder_parent_path`, so breadth-first processing only needs
//! [`ExternalFolderCollection::get_by_depth`].

use log::debug;
use serde::{Deserialize, Serialize};

use super::path;
use super::types::{limits, InterchangeError, InterchangeResult};

// ── ExternalFolder ──────────────────────────────────────────────────

/// A folder that exists only for the duration of an import or export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalFolder {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Unescaped display name.
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folder_parent_id: Option<String>,
    /// Sanitized, escaped path of the parent; empty for top-level folders.
    pub folder_parent_path: String,
}

impl ExternalFolder {
    /// Validating constructor.
    pub fn new(name: &str, folder_parent_path: &str) -> InterchangeResult<Self> {
        let name = name.trim();
        validate_name(name)?;
        Ok(Self {
            id: None,
            name: name.to_string(),
            folder_parent_id: None,
            folder_parent_path: path::sanitize_path(folder_parent_path),
        })
    }

    /// Build a folder from its full (escaped) path.
    pub fn from_path(full_path: &str) -> InterchangeResult<Self> {
        let (parent, escaped_name) = path::split_parent(full_path)
            .ok_or_else(|| InterchangeError::validation("Folder path is empty"))?;
        Self::new(&path::resolve_escaped_name(&escaped_name), &parent)
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_parent_id(mut self, parent_id: Option<String>) -> Self {
        self.folder_parent_id = parent_id;
        self
    }

    /// Full escaped path of this folder.
    pub fn path(&self) -> String {
        path::child_path(&self.folder_parent_path, &self.name)
    }

    /// Number of ancestors.
    pub fn depth(&self) -> usize {
        path::depth(&self.folder_parent_path)
    }

    /// Re-parent this folder below `root_path`.
    pub fn change_root_path(&mut self, root_path: &str) {
        self.folder_parent_path = path::prefix_path(root_path, &self.folder_parent_path);
    }

    pub fn to_source(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

pub fn validate_name(name: &str) -> InterchangeResult<()> {
    if name.is_empty() {
        return Err(InterchangeError::validation("Folder name is empty"));
    }
    let len = name.chars().count();
    if len > limits::FOLDER_NAME_MAX {
        return Err(InterchangeError::validation(format!(
            "Folder name is {} characters long, the maximum is {}",
            len,
            limits::FOLDER_NAME_MAX
        )));
    }
    Ok(())
}

// ── ExternalFolderCollection ────────────────────────────────────────

/// Folders keyed by their full path. Insertion order is preserved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExternalFolderCollection {
    items: Vec<ExternalFolder>,
}

impl ExternalFolderCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExternalFolder> {
        self.items.iter()
    }

    pub fn items(&self) -> &[ExternalFolder] {
        &self.items
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Insert a folder unless one already lives at the same path.
    ///
    /// Returns `true` when the folder was inserted.
    pub fn push(&mut self, folder: ExternalFolder) -> bool {
        let folder_path = folder.path();
        if self.get_by_path(&folder_path).is_some() {
            debug!("Folder path {} already present, folded", folder_path);
            return false;
        }
        self.items.push(folder);
        true
    }

    /// Materialise every missing prefix of `full_path`.
    ///
    /// Every segment is validated before anything is inserted, so a bad
    /// segment leaves the collection untouched.
    pub fn push_from_path(&mut self, full_path: &str) -> InterchangeResult<()> {
        let segments = path::split_folder_path(full_path);
        let mut pending = Vec::with_capacity(segments.len());
        let mut parent = String::new();
        for segment in &segments {
            let folder = ExternalFolder::new(&path::resolve_escaped_name(segment), &parent)?;
            parent = folder.path();
            pending.push(folder);
        }
        for folder in pending {
            let folder_path = folder.path();
            if self.push(folder) {
                debug!("Registered folder at path {}", folder_path);
            }
        }
        Ok(())
    }

    pub fn get_by_path(&self, full_path: &str) -> Option<&ExternalFolder> {
        let wanted = path::sanitize_path(full_path);
        self.items.iter().find(|f| f.path() == wanted)
    }

    pub fn get_by_id(&self, id: &str) -> Option<&ExternalFolder> {
        self.items.iter().find(|f| f.id.as_deref() == Some(id))
    }

    /// Folders whose parent path has exactly `depth` segments.
    pub fn get_by_depth(&self, depth: usize) -> Vec<&ExternalFolder> {
        self.items.iter().filter(|f| f.depth() == depth).collect()
    }

    /// Paths of the folders at `depth`, in insertion order.
    pub fn paths_at_depth(&self, depth: usize) -> Vec<String> {
        self.get_by_depth(depth).iter().map(|f| f.path()).collect()
    }

    pub fn max_depth(&self) -> Option<usize> {
        self.items.iter().map(ExternalFolder::depth).max()
    }

    /// Record the remote id assigned to the folder at `full_path` and
    /// hand it to every direct child folder.
    pub fn assign_id(&mut self, full_path: &str, id: &str) {
        let wanted = path::sanitize_path(full_path);
        for folder in self.items.iter_mut() {
            if folder.path() == wanted {
                folder.id = Some(id.to_string());
            } else if folder.folder_parent_path == wanted {
                folder.folder_parent_id = Some(id.to_string());
            }
        }
    }

    /// Remove the folder at `full_path` and all of its descendants.
    pub fn remove_by_path(&mut self, full_path: &str) -> Vec<ExternalFolder> {
        let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.items)
            .into_iter()
            .partition(|f| path::is_same_or_descendant(&f.path(), full_path));
        self.items = kept;
        removed
    }

    /// Re-root the whole collection below `root`, which becomes the single
    /// depth-0 folder. Existing top-level folders get `root`'s id as parent.
    pub fn change_root_path(&mut self, root: &ExternalFolder) {
        let root_path = root.path();
        for folder in self.items.iter_mut() {
            if folder.depth() == 0 {
                folder.folder_parent_id = root.id.clone();
            }
            folder.change_root_path(&root_path);
        }
        self.items.insert(0, root.clone());
    }
}

impl IntoIterator for ExternalFolderCollection {
    type Item = ExternalFolder;
    type IntoIter = std::vec::IntoIter<ExternalFolder>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl FromIterator<ExternalFolder> for ExternalFolderCollection {
    fn from_iter<T: IntoIterator<Item = ExternalFolder>>(iter: T) -> Self {
        let mut collection = Self::new();
        for folder in iter {
            collection.push(folder);
        }
        collection
    }
}
