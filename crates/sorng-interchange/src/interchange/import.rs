//! Import pipeline.
//!
//! A run moves through
//! `Initialize → Parse → DecryptUserKey → EncryptSecrets → [CreateFolders]
//! → CreateResources → [Tag] → Complete`. Only a rejected file, an
//! unopenable container, a missing catalogue or a locked user key stop
//! the run; everything after that is recorded per item on [`ImportRun`].

use chrono::Utc;
use log::{debug, error, info, warn};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::interchange::bulk::BulkRunner;
use crate::interchange::crypto::{
    build_secret_plaintext, description_in_secret, DecryptedPrivateKey, ResourceMetadata,
    UserContext, METADATA_KEY_TYPE_USER,
};
use crate::interchange::csv::parse_csv;
use crate::interchange::folders::{ExternalFolder, ExternalFolderCollection};
use crate::interchange::kdbx::{read_kdbx, KdbxCredentials};
use crate::interchange::payload;
use crate::interchange::progress::ProgressReporter;
use crate::interchange::remote::{
    FolderCreateRequest, RemoteResource, RemoteTag, ResourceCreateRequest, TagEntry,
};
use crate::interchange::resource_types::{ResourceTypeCatalogue, ResourceTypeDefinition};
use crate::interchange::resources::{
    EncryptedSecret, ExternalResource, ExternalResourceCollection, ResourceSecret,
};
use crate::interchange::service::InterchangeService;
use crate::interchange::types::*;

lazy_static::lazy_static! {
    static ref REFERENCE_PATTERN: Regex =
        Regex::new(r"^[A-Za-z0-9_-]*$").expect("reference pattern is a valid regex");
}

/// Whether `reference` may name a run (letters, digits, `_` and `-`).
pub fn is_valid_reference(reference: &str) -> bool {
    REFERENCE_PATTERN.is_match(reference)
}

/// `<prefix>-YYYYMMDDHHMMSS-xxxxxxxx`
pub fn generate_reference(prefix: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "{}-{}-{}",
        prefix,
        Utc::now().format("%Y%m%d%H%M%S"),
        &suffix[..8]
    )
}

// ── Request & stages ────────────────────────────────────────────────

/// Caller input for one import run.
#[derive(Debug)]
pub struct ImportRequest {
    pub file_type: ImportFileType,
    /// Base64 of the file bytes.
    pub payload: String,
    pub options: ImportOptions,
    /// Container credential, KDBX only.
    pub credentials: KdbxCredentials,
    /// Run reference; generated when absent or empty.
    pub reference: Option<String>,
}

impl ImportRequest {
    pub fn new(file_type: ImportFileType, payload: impl Into<String>) -> Self {
        Self {
            file_type,
            payload: payload.into(),
            options: ImportOptions::default(),
            credentials: KdbxCredentials::none(),
            reference: None,
        }
    }

    pub fn with_options(mut self, options: ImportOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_credentials(mut self, credentials: KdbxCredentials) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportStage {
    Initialize,
    Parse,
    DecryptUserKey,
    EncryptSecrets,
    CreateFolders,
    CreateResources,
    Tag,
    Complete,
    Failed,
}

// ── Run state ───────────────────────────────────────────────────────

/// State of one import run.
#[derive(Debug)]
pub struct ImportRun {
    pub reference: String,
    pub file_type: ImportFileType,
    pub options: ImportOptions,
    pub stage: ImportStage,
    pub folders: ExternalFolderCollection,
    pub resources: ExternalResourceCollection,
    pub folder_errors: Vec<ItemError>,
    pub resource_errors: Vec<ItemError>,
    pub root_folder: Option<CreatedRef>,
    pub tag: Option<CreatedRef>,
    pub created_folders_count: usize,
    /// Ids of created resources, in input order.
    pub created_resource_ids: Vec<String>,
}

impl ImportRun {
    pub fn new(reference: String, file_type: ImportFileType, options: ImportOptions) -> Self {
        Self {
            reference,
            file_type,
            options,
            stage: ImportStage::Initialize,
            folders: ExternalFolderCollection::new(),
            resources: ExternalResourceCollection::new(),
            folder_errors: Vec::new(),
            resource_errors: Vec::new(),
            root_folder: None,
            tag: None,
            created_folders_count: 0,
            created_resource_ids: Vec::new(),
        }
    }

    fn enter(&mut self, stage: ImportStage) {
        info!("Import {}: {:?} -> {:?}", self.reference, self.stage, stage);
        self.stage = stage;
    }

    /// Take over the collections and per-item errors of a parsed file.
    pub fn absorb(&mut self, parsed: ParsedFile) {
        self.folders = parsed.folders;
        self.resources = parsed.resources;
        self.folder_errors.extend(parsed.folder_errors);
        self.resource_errors.extend(parsed.resource_errors);
    }

    /// Assign a resource type to every resource. Resources no type can
    /// hold are dropped with an error.
    pub fn classify_resources(
        &mut self,
        catalogue: &ResourceTypeCatalogue,
        version: MetadataVersion,
        default_slug: &str,
    ) {
        let mut kept = ExternalResourceCollection::new();
        for mut resource in std::mem::take(&mut self.resources) {
            match catalogue.classify(resource.populated_capabilities(), version, default_slug) {
                Ok(def) => {
                    resource.resource_type_id = Some(def.id.clone());
                    kept.push(resource);
                }
                Err(e) => {
                    warn!("Resource {} has no matching type: {}", resource.name, e.message);
                    self.resource_errors.push(ItemError::new(
                        "No resource type can hold this resource",
                        resource.to_source(),
                        e,
                    ));
                }
            }
        }
        self.resources = kept;
    }

    /// Apply the folder option: either file everything below a root folder
    /// named after the run, or drop the folders and send every resource to
    /// the root.
    pub fn place_in_root_folder(&mut self) -> InterchangeResult<()> {
        if !self.options.import_folders {
            debug!("Folder import disabled, filing every resource at the root");
            self.folders.clear();
            self.resources.move_all_to_root();
            return Ok(());
        }
        let root = ExternalFolder::new(&self.reference, "")?;
        self.folders.change_root_path(&root);
        self.resources.change_root_path(&root);
        Ok(())
    }

    fn root_path(&self) -> Option<String> {
        self.options
            .import_folders
            .then(|| crate::interchange::path::escape_name(&self.reference))
    }

    /// Record a created folder and hand its id to its children.
    pub fn folder_created(&mut self, folder: &ExternalFolder, id: &str) {
        let folder_path = folder.path();
        self.folders.assign_id(&folder_path, id);
        self.resources.assign_folder_id(&folder_path, id);
        self.created_folders_count += 1;
        if self.root_path().as_deref() == Some(folder_path.as_str()) {
            self.root_folder = Some(CreatedRef {
                id: id.to_string(),
                name: folder.name.clone(),
            });
        }
    }

    /// Record a failed folder once, drop its subtree and send the
    /// resources filed in it to the root.
    pub fn folder_failed(&mut self, folder: &ExternalFolder, cause: InterchangeError) {
        let folder_path = folder.path();
        let removed = self.folders.remove_by_path(&folder_path);
        let moved = self.resources.detach_from_path(&folder_path);
        warn!(
            "Folder {} could not be created ({}); dropped {} folders, moved {} resources to the root",
            folder_path,
            cause.message,
            removed.len(),
            moved
        );
        self.folder_errors.push(ItemError::new(
            "Folder could not be created",
            folder.to_source(),
            cause,
        ));
    }

    pub fn to_result(&self) -> ImportResult {
        ImportResult {
            reference: self.reference.clone(),
            created_folders_count: self.created_folders_count,
            created_resources_count: self.created_resource_ids.len(),
            folder_errors: self.folder_errors.clone(),
            resource_errors: self.resource_errors.clone(),
            root_folder: self.root_folder.clone(),
            tag: self.tag.clone(),
        }
    }
}

// ── Pipeline ────────────────────────────────────────────────────────

impl InterchangeService {
    /// Import a file for `user`.
    ///
    /// Fatal errors close `progress` and are returned; per-item failures
    /// are part of the [`ImportResult`].
    pub async fn import_file(
        &self,
        user: &UserContext,
        request: ImportRequest,
        progress: &dyn ProgressReporter,
    ) -> InterchangeResult<ImportResult> {
        let reference = match request.reference.as_deref() {
            Some(r) if !r.is_empty() => {
                if !is_valid_reference(r) {
                    return Err(InterchangeError::validation(format!(
                        "Invalid import reference: {}",
                        r
                    )));
                }
                r.to_string()
            }
            _ => generate_reference(&self.config().import_ref_prefix),
        };

        let mut run = ImportRun::new(reference, request.file_type, request.options.clone());
        progress.start(1, "Initializing import");

        match self.execute_import(&mut run, user, request, progress).await {
            Ok(()) => {
                run.enter(ImportStage::Complete);
                progress.close();
                let result = run.to_result();
                info!(
                    "Import {} complete: {} folders, {} resources, {} folder errors, {} resource errors",
                    result.reference,
                    result.created_folders_count,
                    result.created_resources_count,
                    result.folder_errors.len(),
                    result.resource_errors.len()
                );
                Ok(result)
            }
            Err(e) => {
                run.enter(ImportStage::Failed);
                progress.close();
                error!("Import {} failed: {}", run.reference, e);
                Err(e)
            }
        }
    }

    async fn execute_import(
        &self,
        run: &mut ImportRun,
        user: &UserContext,
        request: ImportRequest,
        progress: &dyn ProgressReporter,
    ) -> InterchangeResult<()> {
        run.enter(ImportStage::Parse);
        let parsed = parse_payload(request.file_type, &request.payload, &request.credentials)?;
        progress.finish_step(Some("File parsed"), false);
        run.absorb(parsed);

        let catalogue = self.load_catalogue().await?;
        let config = self.config();
        run.classify_resources(
            &catalogue,
            config.metadata_version,
            config.default_resource_type_slug(),
        );
        run.place_in_root_folder()?;

        let tag_steps = if run.options.import_tags {
            run.resources.len()
        } else {
            0
        };
        progress.update_goals(
            1 + run.resources.len() * 2 + run.folders.len() + tag_steps,
        );

        run.enter(ImportStage::DecryptUserKey);
        let key = self.unlock_user_key(user).await?;

        run.enter(ImportStage::EncryptSecrets);
        self.encrypt_secrets(run, &catalogue, user, &key, progress)
            .await;

        if !run.folders.is_empty() {
            run.enter(ImportStage::CreateFolders);
            self.create_folders(run, progress).await;
        }

        run.enter(ImportStage::CreateResources);
        self.create_resources(run, &catalogue, user, &key, progress)
            .await;

        if run.options.import_tags && !run.created_resource_ids.is_empty() {
            run.enter(ImportStage::Tag);
            self.tag_resources(run, progress).await;
        }
        Ok(())
    }

    /// Encrypt every clear secret for the current user, one at a time.
    async fn encrypt_secrets(
        &self,
        run: &mut ImportRun,
        catalogue: &ResourceTypeCatalogue,
        user: &UserContext,
        key: &DecryptedPrivateKey,
        progress: &dyn ProgressReporter,
    ) {
        let max_length = self.config().secret_max_length;
        let mut kept = ExternalResourceCollection::new();

        for mut resource in std::mem::take(&mut run.resources) {
            let outcome = match resource_type_of(&resource, catalogue) {
                Ok(def) => self.encrypt_secret(&resource, def, user, key, max_length).await,
                Err(e) => Err(e),
            };
            progress.finish_step(Some("Encrypting secrets"), false);
            match outcome {
                Ok(secret) => {
                    resource.set_encrypted(vec![secret]);
                    kept.push(resource);
                }
                Err(e) => {
                    warn!("Secret of resource {} could not be encrypted", resource.name);
                    run.resource_errors.push(ItemError::new(
                        "Secret could not be encrypted",
                        resource.to_source(),
                        e,
                    ));
                }
            }
        }
        run.resources = kept;
    }

    async fn encrypt_secret(
        &self,
        resource: &ExternalResource,
        resource_type: &ResourceTypeDefinition,
        user: &UserContext,
        key: &DecryptedPrivateKey,
        max_length: usize,
    ) -> InterchangeResult<EncryptedSecret> {
        let plaintext = build_secret_plaintext(resource, resource_type, max_length)?;
        let data = self
            .crypto()
            .encrypt_and_sign(&plaintext, &user.armored_public_key, key)
            .await?;
        Ok(EncryptedSecret {
            user_id: user.user_id.clone(),
            data,
        })
    }

    /// Create folders one depth at a time. A depth starts only once the
    /// previous one has fully settled, so every folder knows its parent's id.
    async fn create_folders(&self, run: &mut ImportRun, progress: &dyn ProgressReporter) {
        let runner = BulkRunner::new(self.config().bulk_chunk_size, progress);
        let remote = self.remote();
        let mut depth = 0;

        loop {
            let batch: Vec<ExternalFolder> =
                run.folders.get_by_depth(depth).into_iter().cloned().collect();
            if batch.is_empty() {
                break;
            }
            debug!("Creating {} folders at depth {}", batch.len(), depth);

            let outcomes = runner
                .run(batch.clone(), "Creating folders", |_, folder| async move {
                    remote
                        .create_folder(FolderCreateRequest {
                            name: folder.name,
                            folder_parent_id: folder.folder_parent_id,
                        })
                        .await
                })
                .await;

            for (folder, outcome) in batch.iter().zip(outcomes) {
                match outcome {
                    Ok(created) => run.folder_created(folder, &created.id),
                    Err(e) => run.folder_failed(folder, e),
                }
            }
            depth += 1;
        }
    }

    async fn create_resources(
        &self,
        run: &mut ImportRun,
        catalogue: &ResourceTypeCatalogue,
        user: &UserContext,
        key: &DecryptedPrivateKey,
        progress: &dyn ProgressReporter,
    ) {
        let runner = BulkRunner::new(self.config().bulk_chunk_size, progress);
        let items = run.resources.items().to_vec();

        let outcomes = runner
            .run(items, "Creating resources", |_, resource| async move {
                let request = self
                    .resource_create_request(&resource, catalogue, user, key)
                    .await?;
                self.remote().create_resource(request).await
            })
            .await;

        for (resource, outcome) in run.resources.items().iter().zip(outcomes) {
            match outcome {
                Ok(RemoteResource { id, .. }) => run.created_resource_ids.push(id),
                Err(e) => {
                    warn!("Resource {} could not be created: {}", resource.name, e.message);
                    run.resource_errors.push(ItemError::new(
                        "Resource could not be created",
                        resource.to_source(),
                        e,
                    ));
                }
            }
        }
    }

    /// Build the create payload. v4 carries the metadata in clear, v5
    /// encrypts it for the current user.
    async fn resource_create_request(
        &self,
        resource: &ExternalResource,
        catalogue: &ResourceTypeCatalogue,
        user: &UserContext,
        key: &DecryptedPrivateKey,
    ) -> InterchangeResult<ResourceCreateRequest> {
        let resource_type = resource_type_of(resource, catalogue)?;
        let secrets = match &resource.secret {
            ResourceSecret::Encrypted(secrets) => secrets.clone(),
            ResourceSecret::Clear(_) => {
                return Err(InterchangeError::crypto(format!(
                    "Secret of resource {} was never encrypted",
                    resource.name
                )))
            }
        };

        let mut request = ResourceCreateRequest {
            resource_type_id: resource_type.id.clone(),
            folder_parent_id: resource.folder_parent_id.clone(),
            expired: resource.expired.map(|t| t.to_rfc3339()),
            secrets,
            ..Default::default()
        };

        match resource_type.version {
            MetadataVersion::V4 => {
                request.name = Some(resource.name.clone());
                request.username = resource.username.clone();
                request.uri = resource.uri.clone();
                if !description_in_secret(resource_type) {
                    request.description = resource.description.clone();
                }
            }
            MetadataVersion::V5 => {
                let metadata = ResourceMetadata::from_resource(resource, resource_type);
                let plaintext = serde_json::to_string(&metadata)?;
                let armored = self
                    .crypto()
                    .encrypt_and_sign(&plaintext, &user.armored_public_key, key)
                    .await?;
                request.metadata = Some(armored);
                request.metadata_key_type = Some(METADATA_KEY_TYPE_USER.to_string());
            }
        }
        Ok(request)
    }

    /// Tag every created resource with the run reference. The first
    /// resource is tagged on its own so the tag exists before the
    /// concurrent bulk pass.
    async fn tag_resources(&self, run: &mut ImportRun, progress: &dyn ProgressReporter) {
        let tags = vec![TagEntry::personal(run.reference.clone())];
        let remote = self.remote();
        let mut ids = run.created_resource_ids.clone().into_iter();
        let Some(first) = ids.next() else {
            return;
        };

        let first_outcome = remote.add_tags_to_resource(&first, tags.clone()).await;
        progress.finish_step(Some("Tagging resources"), false);
        record_tag_outcome(run, &first, first_outcome);

        let rest: Vec<String> = ids.collect();
        if rest.is_empty() {
            return;
        }
        let runner = BulkRunner::new(self.config().bulk_chunk_size, progress);
        let outcomes = runner
            .run(rest.clone(), "Tagging resources", |_, id| {
                let tags = tags.clone();
                async move { remote.add_tags_to_resource(&id, tags).await }
            })
            .await;
        for (id, outcome) in rest.iter().zip(outcomes) {
            record_tag_outcome(run, id, outcome);
        }
    }
}

fn record_tag_outcome(
    run: &mut ImportRun,
    resource_id: &str,
    outcome: InterchangeResult<Vec<RemoteTag>>,
) {
    match outcome {
        Ok(tags) => {
            if run.tag.is_none() {
                run.tag = tags
                    .into_iter()
                    .find(|t| t.slug == run.reference)
                    .map(|t| CreatedRef {
                        id: t.id,
                        name: t.slug,
                    });
            }
        }
        Err(e) => {
            warn!("Resource {} could not be tagged: {}", resource_id, e.message);
            run.resource_errors.push(ItemError::new(
                "Resource could not be tagged",
                json!({ "id": resource_id, "tag": run.reference }),
                e,
            ));
        }
    }
}

fn resource_type_of<'c>(
    resource: &ExternalResource,
    catalogue: &'c ResourceTypeCatalogue,
) -> InterchangeResult<&'c ResourceTypeDefinition> {
    resource
        .resource_type_id
        .as_deref()
        .and_then(|id| catalogue.get_by_id(id))
        .ok_or_else(|| {
            InterchangeError::no_matching_type(format!(
                "Resource {} has no known resource type",
                resource.name
            ))
        })
}

/// Decode and parse the transported file.
fn parse_payload(
    file_type: ImportFileType,
    encoded: &str,
    credentials: &KdbxCredentials,
) -> InterchangeResult<ParsedFile> {
    let bytes = payload::decode_base64(encoded)?;
    match file_type {
        ImportFileType::Csv => parse_csv(&payload::decode_text(&bytes)?),
        ImportFileType::Kdbx => read_kdbx(&bytes, credentials),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interchange::remote::RemoteResourceType;

    fn catalogue() -> ResourceTypeCatalogue {
        let remote = |id: &str, slug: &str| RemoteResourceType {
            id: id.into(),
            slug: slug.into(),
            name: slug.into(),
            definition: json!({}),
            deleted: None,
        };
        ResourceTypeCatalogue::from_remote(&[
            remote("t-desc", "password-and-description"),
            remote("t-totp-desc", "password-description-totp"),
            remote("t-totp", "totp"),
        ])
        .unwrap()
    }

    fn run_with(paths: &[&str], resources: &[(&str, &str)]) -> ImportRun {
        let mut run = ImportRun::new(
            "import-test".into(),
            ImportFileType::Csv,
            ImportOptions::default(),
        );
        for path in paths {
            run.folders.push_from_path(path).unwrap();
        }
        for (name, folder) in resources {
            run.resources.push(
                ExternalResource::new(name)
                    .with_secret_clear("pw")
                    .with_folder_parent_path(folder),
            );
        }
        run
    }

    #[test]
    fn test_reference_validation() {
        assert!(is_valid_reference("import-20240101-abc_DEF"));
        assert!(is_valid_reference(""));
        assert!(!is_valid_reference("bad ref"));
        assert!(!is_valid_reference("a/b"));
    }

    #[test]
    fn test_generated_reference_shape() {
        let reference = generate_reference("import");
        let parts: Vec<&str> = reference.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "import");
        assert_eq!(parts[1].len(), 14);
        assert!(parts[1].chars().all(|c| c.is_ascii_digit()));
        assert_eq!(parts[2].len(), 8);
        assert!(is_valid_reference(&reference));
        assert_ne!(reference, generate_reference("import"));
    }

    #[test]
    fn test_place_in_root_folder() {
        let mut run = run_with(&["A/B"], &[("top", ""), ("deep", "A/B")]);
        run.place_in_root_folder().unwrap();
        assert_eq!(run.folders.len(), 3);
        assert_eq!(run.folders.get_by_depth(0).len(), 1);
        assert!(run.folders.get_by_path("import-test/A/B").is_some());
        assert_eq!(run.resources.get(0).unwrap().folder_parent_path, "import-test");
        assert_eq!(run.resources.get(1).unwrap().folder_parent_path, "import-test/A/B");
    }

    #[test]
    fn test_folder_import_disabled() {
        let mut run = run_with(&["A/B"], &[("deep", "A/B")]);
        run.options.import_folders = false;
        run.place_in_root_folder().unwrap();
        assert!(run.folders.is_empty());
        assert_eq!(run.resources.get(0).unwrap().folder_parent_path, "");
    }

    #[test]
    fn test_folder_created_propagates_id() {
        let mut run = run_with(&["A/B"], &[("in-a", "A")]);
        let a = run.folders.get_by_path("A").unwrap().clone();
        run.folder_created(&a, "id-a");
        assert_eq!(
            run.folders.get_by_path("A/B").unwrap().folder_parent_id.as_deref(),
            Some("id-a")
        );
        assert_eq!(
            run.resources.get(0).unwrap().folder_parent_id.as_deref(),
            Some("id-a")
        );
        assert_eq!(run.created_folders_count, 1);
    }

    #[test]
    fn test_root_folder_recorded() {
        let mut run = run_with(&[], &[]);
        run.place_in_root_folder().unwrap();
        let root = run.folders.get_by_path("import-test").unwrap().clone();
        run.folder_created(&root, "root-id");
        assert_eq!(
            run.root_folder,
            Some(CreatedRef {
                id: "root-id".into(),
                name: "import-test".into()
            })
        );
    }

    #[test]
    fn test_folder_failure_cascades() {
        let mut run = run_with(
            &["A/B/C", "D"],
            &[("r1", "A/B"), ("r2", "A/B/C"), ("r3", "D")],
        );
        let a = run.folders.get_by_path("A").unwrap().clone();
        run.folder_failed(&a, InterchangeError::remote("boom"));

        assert_eq!(run.folder_errors.len(), 1);
        assert_eq!(run.folders.len(), 1);
        assert!(run.folders.get_by_path("D").is_some());
        let paths: Vec<&str> = run
            .resources
            .iter()
            .map(|r| r.folder_parent_path.as_str())
            .collect();
        assert_eq!(paths, vec!["", "", "D"]);
    }

    #[test]
    fn test_classify_assigns_types() {
        let mut run = run_with(&[], &[("r1", "")]);
        run.resources.push(
            ExternalResource::new("r2")
                .with_secret_clear("pw")
                .with_description(Some("d")),
        );
        run.classify_resources(&catalogue(), MetadataVersion::V4, "password-and-description");
        assert!(run.resource_errors.is_empty());
        assert!(run
            .resources
            .iter()
            .all(|r| r.resource_type_id.as_deref() == Some("t-desc")));
    }

    #[test]
    fn test_classify_without_v5_types_fails_per_item() {
        let mut run = run_with(&[], &[("r1", "")]);
        run.classify_resources(&catalogue(), MetadataVersion::V5, "v5-default");
        assert!(run.resources.is_empty());
        assert_eq!(run.resource_errors.len(), 1);
        assert_eq!(
            run.resource_errors[0].cause.kind,
            InterchangeErrorKind::NoMatchingResourceType
        );
    }

    #[test]
    fn test_parse_payload_rejects_bad_base64() {
        let err = parse_payload(ImportFileType::Csv, "***", &KdbxCredentials::none()).unwrap_err();
        assert_eq!(err.kind, InterchangeErrorKind::InvalidPayload);
        assert!(err.is_fatal());
    }

    #[test]
    fn test_result_serialises() {
        let run = run_with(&[], &[]);
        let json = serde_json::to_value(run.to_result()).unwrap();
        assert_eq!(json["reference"], "import-test");
        assert_eq!(json["created_resources_count"], 0);
        assert!(json.get("root_folder").is_none());
    }
}
