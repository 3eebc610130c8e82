//! Export pipeline.
//!
//! Resolves the selected folders and resources from the remote store,
//! decrypts them with the user's key and hands the clear collections to
//! the CSV or KDBX writer. Folder paths are relative to the selection: a
//! parent outside of it counts as the root.

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use serde_json::json;
use std::collections::{HashMap, HashSet};

use crate::interchange::crypto::{
    description_in_secret, parse_secret_plaintext, DecryptedPrivateKey, ResourceMetadata,
    UserContext,
};
use crate::interchange::csv::write_csv;
use crate::interchange::folders::{ExternalFolder, ExternalFolderCollection};
use crate::interchange::kdbx::{write_kdbx, KdbxCredentials};
use crate::interchange::progress::ProgressReporter;
use crate::interchange::remote::{RemoteFolder, RemoteResource};
use crate::interchange::resource_types::ResourceTypeCatalogue;
use crate::interchange::resources::{ExternalResource, ExternalResourceCollection, ResourceIcon};
use crate::interchange::service::InterchangeService;
use crate::interchange::types::*;

/// Caller input for one export run.
#[derive(Debug)]
pub struct ExportRequest {
    pub format: ExportFormat,
    pub resource_ids: Vec<String>,
    pub folder_ids: Vec<String>,
    /// Credential protecting the written container, KDBX only.
    pub credentials: KdbxCredentials,
}

impl ExportRequest {
    pub fn new(format: ExportFormat) -> Self {
        Self {
            format,
            resource_ids: Vec::new(),
            folder_ids: Vec::new(),
            credentials: KdbxCredentials::none(),
        }
    }

    pub fn with_resources(mut self, ids: Vec<String>) -> Self {
        self.resource_ids = ids;
        self
    }

    pub fn with_folders(mut self, ids: Vec<String>) -> Self {
        self.folder_ids = ids;
        self
    }

    pub fn with_credentials(mut self, credentials: KdbxCredentials) -> Self {
        self.credentials = credentials;
        self
    }
}

/// State of one export run.
#[derive(Debug)]
pub struct ExportRun {
    pub format: ExportFormat,
    pub folders: ExternalFolderCollection,
    pub resources: ExternalResourceCollection,
    pub errors: Vec<ItemError>,
    /// Where the children of each selected folder land: `(path, id)`.
    placements: HashMap<String, (String, Option<String>)>,
}

impl ExportRun {
    pub fn new(format: ExportFormat) -> Self {
        Self {
            format,
            folders: ExternalFolderCollection::new(),
            resources: ExternalResourceCollection::new(),
            errors: Vec::new(),
            placements: HashMap::new(),
        }
    }

    /// Build the folder collection, parents before children. Folders
    /// whose parent is not selected become top-level folders.
    pub fn place_folders(&mut self, remote: &[RemoteFolder]) {
        let selected: HashSet<&str> = remote.iter().map(|f| f.id.as_str()).collect();
        let mut pending: Vec<&RemoteFolder> = remote.iter().collect();

        while !pending.is_empty() {
            let (ready, waiting): (Vec<_>, Vec<_>) = pending.into_iter().partition(|f| {
                match f.folder_parent_id.as_deref() {
                    Some(parent) if selected.contains(parent) => {
                        self.placements.contains_key(parent)
                    }
                    _ => true,
                }
            });
            pending = waiting;
            if ready.is_empty() {
                // A parent cycle; break it at the first folder.
                debug!("Folder parent cycle detected, promoting {}", pending[0].id);
                let first = pending.remove(0);
                self.place_folder(first, None);
                continue;
            }
            for folder in ready {
                let parent = folder
                    .folder_parent_id
                    .as_deref()
                    .and_then(|p| self.placements.get(p))
                    .cloned();
                self.place_folder(folder, parent);
            }
        }
    }

    fn place_folder(&mut self, remote: &RemoteFolder, parent: Option<(String, Option<String>)>) {
        let (parent_path, parent_id) = parent.unwrap_or_default();
        match ExternalFolder::new(&remote.name, &parent_path) {
            Ok(folder) => {
                let folder = folder
                    .with_id(remote.id.clone())
                    .with_parent_id(parent_id);
                let folder_path = folder.path();
                self.placements
                    .insert(remote.id.clone(), (folder_path.clone(), folder.id.clone()));
                if !self.folders.push(folder) {
                    warn!(
                        "Folder {} shares the path {} with a sibling, merging their resources",
                        remote.id, folder_path
                    );
                }
            }
            Err(e) => {
                warn!("Folder {} cannot be exported: {}", remote.id, e.message);
                self.errors.push(ItemError::new(
                    "Folder could not be exported",
                    json!({ "id": remote.id, "name": remote.name }),
                    e,
                ));
                // Its children move up to its parent.
                self.placements
                    .insert(remote.id.clone(), (parent_path, parent_id));
            }
        }
    }

    /// Placement of a resource filed in `folder_id`.
    fn placement_of(&self, folder_id: Option<&str>) -> (String, Option<String>) {
        folder_id
            .and_then(|id| self.placements.get(id))
            .cloned()
            .unwrap_or_default()
    }

    pub fn to_result(&self, file_name: String, data: Vec<u8>) -> ExportResult {
        ExportResult {
            format: self.format,
            file_name,
            data,
            exported_folders_count: self.folders.len(),
            exported_resources_count: self.resources.len(),
            errors: self.errors.clone(),
        }
    }
}

/// `export-YYYYMMDDHHMMSS.<ext>`
pub fn export_file_name(format: ExportFormat) -> String {
    format!(
        "export-{}.{}",
        Utc::now().format("%Y%m%d%H%M%S"),
        format.extension()
    )
}

impl InterchangeService {
    /// Export the selected resources and folders for `user`.
    pub async fn export_file(
        &self,
        user: &UserContext,
        request: ExportRequest,
        progress: &dyn ProgressReporter,
    ) -> InterchangeResult<ExportResult> {
        progress.start(1, "Initializing export");
        let outcome = self.execute_export(user, request, progress).await;
        progress.close();
        match &outcome {
            Ok(result) => info!(
                "Export {} complete: {} folders, {} resources, {} errors",
                result.file_name,
                result.exported_folders_count,
                result.exported_resources_count,
                result.errors.len()
            ),
            Err(e) => error!("Export failed: {}", e),
        }
        outcome
    }

    async fn execute_export(
        &self,
        user: &UserContext,
        request: ExportRequest,
        progress: &dyn ProgressReporter,
    ) -> InterchangeResult<ExportResult> {
        let remote_folders = if request.folder_ids.is_empty() {
            Vec::new()
        } else {
            self.remote().find_folders_by_ids(&request.folder_ids).await?
        };
        let remote_resources = if request.resource_ids.is_empty() {
            Vec::new()
        } else {
            self.remote()
                .find_resources_by_ids(&request.resource_ids)
                .await?
        };
        progress.update_goals(2 + remote_resources.len());
        progress.finish_step(Some("Selection loaded"), false);

        let catalogue = self.load_catalogue().await?;
        let key = self.unlock_user_key(user).await?;

        let mut run = ExportRun::new(request.format);
        run.place_folders(&remote_folders);

        for remote in &remote_resources {
            let outcome = self
                .decrypt_resource(&run, remote, &catalogue, user, &key)
                .await;
            progress.finish_step(Some("Decrypting resources"), false);
            match outcome {
                Ok(resource) => run.resources.push(resource),
                Err(e) => {
                    warn!("Resource {} cannot be exported: {}", remote.id, e.message);
                    run.errors.push(ItemError::new(
                        "Resource could not be decrypted",
                        json!({ "id": remote.id, "resource_type_id": remote.resource_type_id }),
                        e,
                    ));
                }
            }
        }

        let file_name = export_file_name(request.format);
        let data = match request.format {
            ExportFormat::Csv(dialect) => write_csv(dialect, &run.resources)?.into_bytes(),
            ExportFormat::Kdbx => {
                let root_name = file_name.trim_end_matches(".kdbx");
                write_kdbx(
                    &run.folders,
                    &run.resources,
                    &request.credentials,
                    &self.config().kdbx_kdf,
                    root_name,
                )?
            }
        };
        progress.finish_step(Some("File written"), false);
        Ok(run.to_result(file_name, data))
    }

    /// Decrypt one remote resource into its clear external form.
    async fn decrypt_resource(
        &self,
        run: &ExportRun,
        remote: &RemoteResource,
        catalogue: &ResourceTypeCatalogue,
        user: &UserContext,
        key: &DecryptedPrivateKey,
    ) -> InterchangeResult<ExternalResource> {
        let resource_type = catalogue.get_by_id(&remote.resource_type_id);

        let (name, username, uri, mut description, icon) = match &remote.metadata {
            Some(armored) => {
                let clear = self.crypto().decrypt(armored, key).await?;
                let metadata = ResourceMetadata::parse(&clear)?;
                (
                    metadata.name,
                    metadata.username,
                    metadata.uris.into_iter().next(),
                    metadata.description,
                    metadata.icon,
                )
            }
            None => (
                remote.name.clone().unwrap_or_default(),
                remote.username.clone(),
                remote.uri.clone(),
                remote.description.clone(),
                None::<ResourceIcon>,
            ),
        };

        let secret = remote
            .secrets
            .iter()
            .find(|s| s.user_id == user.user_id)
            .or_else(|| remote.secrets.first())
            .ok_or_else(|| {
                InterchangeError::crypto(format!("Resource {} carries no secret", remote.id))
            })?;
        let clear = self.crypto().decrypt(&secret.data, key).await?;
        let payload = parse_secret_plaintext(&clear, resource_type);
        if resource_type.map_or(payload.description.is_some(), description_in_secret) {
            description = payload.description.clone();
        }

        let (folder_parent_path, folder_parent_id) =
            run.placement_of(remote.folder_parent_id.as_deref());
        let expired = remote
            .expired
            .as_deref()
            .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
            .map(|t| t.with_timezone(&Utc));

        let mut resource = ExternalResource::new(&name)
            .with_username(username.as_deref())
            .with_uri(uri.as_deref())
            .with_description(description.as_deref())
            .with_secret_clear(payload.password.as_deref().unwrap_or_default())
            .with_totp(payload.totp.clone())
            .with_folder_parent_path(&folder_parent_path)
            .with_expiry(expired)
            .with_icon(icon);
        resource.id = Some(remote.id.clone());
        resource.resource_type_id = Some(remote.resource_type_id.clone());
        resource.folder_parent_id = folder_parent_id;
        Ok(resource)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn folder(id: &str, name: &str, parent: Option<&str>) -> RemoteFolder {
        RemoteFolder {
            id: id.into(),
            name: name.into(),
            folder_parent_id: parent.map(String::from),
        }
    }

    #[test]
    fn test_paths_relative_to_selection() {
        let mut run = ExportRun::new(ExportFormat::Kdbx);
        // Children listed before their parents on purpose.
        run.place_folders(&[
            folder("c", "C", Some("b")),
            folder("b", "B", Some("a")),
            folder("a", "A", Some("outside")),
        ]);
        assert_eq!(run.folders.len(), 3);
        let a = run.folders.get_by_path("A").unwrap();
        assert_eq!(a.folder_parent_id, None);
        let c = run.folders.get_by_path("A/B/C").unwrap();
        assert_eq!(c.folder_parent_id.as_deref(), Some("b"));
        assert_eq!(run.placement_of(Some("c")).0, "A/B/C");
        assert_eq!(run.placement_of(Some("outside")), (String::new(), None));
        assert_eq!(run.placement_of(None), (String::new(), None));
    }

    #[test]
    fn test_slash_in_folder_name_is_escaped() {
        let mut run = ExportRun::new(ExportFormat::Kdbx);
        run.place_folders(&[folder("a", "Clients/Partners", None)]);
        assert!(run.folders.get_by_path("Clients / Partners").is_some());
    }

    #[test]
    fn test_invalid_folder_children_move_up() {
        let mut run = ExportRun::new(ExportFormat::Kdbx);
        run.place_folders(&[
            folder("a", "A", None),
            folder("bad", "   ", Some("a")),
            folder("c", "C", Some("bad")),
        ]);
        assert_eq!(run.errors.len(), 1);
        assert!(run.folders.get_by_path("A/C").is_some());
    }

    #[test]
    fn test_parent_cycle_terminates() {
        let mut run = ExportRun::new(ExportFormat::Kdbx);
        run.place_folders(&[folder("a", "A", Some("b")), folder("b", "B", Some("a"))]);
        assert_eq!(run.folders.len(), 2);
        assert!(run.folders.get_by_path("A/B").is_some());
    }

    #[test]
    fn test_file_name() {
        let name = export_file_name(ExportFormat::Csv(CsvDialect::Bitwarden));
        assert!(name.starts_with("export-"));
        assert!(name.ends_with(".csv"));
        assert!(export_file_name(ExportFormat::Kdbx).ends_with(".kdbx"));
    }
}
