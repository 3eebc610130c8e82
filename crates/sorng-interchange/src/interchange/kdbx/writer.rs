//! KDBX 4 writer.

use keepass::config::{DatabaseConfig, KdfConfig};
use keepass::db::{Color, Entry, Group, Node, Value};
use keepass::Database;
use log::{debug, info};

use super::{KdbxCredentials, FIELD_NOTES, FIELD_PASSWORD, FIELD_TITLE, FIELD_URL, FIELD_USERNAME};
use crate::interchange::folders::{ExternalFolder, ExternalFolderCollection};
use crate::interchange::resources::{ExternalResource, ExternalResourceCollection};
use crate::interchange::totp::KEEPASSXC_OTP;
use crate::interchange::types::{InterchangeError, InterchangeResult, KdbxKdfSettings};

/// Serialise the collections into a KDBX 4 container.
///
/// Folders nest by parent id, falling back to parent path. Resources
/// whose folder is not part of the export land in the root group.
pub fn write_kdbx(
    folders: &ExternalFolderCollection,
    resources: &ExternalResourceCollection,
    credentials: &KdbxCredentials,
    kdf: &KdbxKdfSettings,
    root_name: &str,
) -> InterchangeResult<Vec<u8>> {
    let mut config = DatabaseConfig::default();
    config.kdf_config = argon2id(kdf, &config.kdf_config)?;

    let mut db = Database::new(config);
    db.root = build_tree(folders, resources, root_name);

    let key = credentials.to_database_key()?;
    let mut out = Vec::new();
    db.save(&mut out, key)
        .map_err(|e| InterchangeError::serialization(format!("Cannot write container: {}", e)))?;

    info!(
        "Wrote KDBX container: {} folders, {} resources, {} bytes",
        folders.len(),
        resources.len(),
        out.len()
    );
    Ok(out)
}

/// Argon2id with the configured cost, keeping the crate's Argon2 version.
fn argon2id(settings: &KdbxKdfSettings, default: &KdfConfig) -> InterchangeResult<KdfConfig> {
    let version = match default {
        KdfConfig::Argon2 { version, .. } | KdfConfig::Argon2id { version, .. } => *version,
        _ => {
            return Err(InterchangeError::invalid_config(
                "The container library offers no Argon2 default",
            ))
        }
    };
    Ok(KdfConfig::Argon2id {
        iterations: settings.iterations,
        memory: settings.memory_bytes,
        parallelism: settings.parallelism,
        version,
    })
}

// ── Tree building ───────────────────────────────────────────────────

struct TreeIndex<'a> {
    folders: &'a [ExternalFolder],
    /// Parent folder index of each folder.
    folder_parent: Vec<Option<usize>>,
    /// Folder index of each resource.
    resource_home: Vec<Option<usize>>,
}

impl<'a> TreeIndex<'a> {
    fn new(folders: &'a [ExternalFolder], resources: &[ExternalResource]) -> Self {
        let folder_parent = folders
            .iter()
            .map(|f| locate(folders, f.folder_parent_id.as_deref(), &f.folder_parent_path))
            .collect();
        let resource_home = resources
            .iter()
            .map(|r| locate(folders, r.folder_parent_id.as_deref(), &r.folder_parent_path))
            .collect();
        Self {
            folders,
            folder_parent,
            resource_home,
        }
    }
}

/// Index of the folder with `id`, or else at `path`.
fn locate(folders: &[ExternalFolder], id: Option<&str>, path: &str) -> Option<usize> {
    if let Some(id) = id {
        if let Some(i) = folders.iter().position(|f| f.id.as_deref() == Some(id)) {
            return Some(i);
        }
    }
    if path.is_empty() {
        return None;
    }
    folders.iter().position(|f| f.path() == path)
}

fn build_tree(
    folders: &ExternalFolderCollection,
    resources: &ExternalResourceCollection,
    root_name: &str,
) -> Group {
    let index = TreeIndex::new(folders.items(), resources.items());
    let mut placed = vec![false; folders.len()];
    let mut root = Group::new(root_name);

    for (i, resource) in resources.iter().enumerate() {
        if index.resource_home[i].is_none() {
            root.children.push(Node::Entry(resource_to_entry(resource)));
        }
    }
    for i in 0..folders.len() {
        if index.folder_parent[i].is_none() {
            root.children
                .push(Node::Group(build_group(i, &index, resources, &mut placed)));
        }
    }
    // Folders caught in a parent cycle are never reached from the root.
    for i in 0..folders.len() {
        if !placed[i] {
            debug!("Folder {} has an unreachable parent, exporting at root", index.folders[i].name);
            root.children
                .push(Node::Group(build_group(i, &index, resources, &mut placed)));
        }
    }
    root
}

fn build_group(
    folder: usize,
    index: &TreeIndex<'_>,
    resources: &ExternalResourceCollection,
    placed: &mut [bool],
) -> Group {
    placed[folder] = true;
    let mut group = Group::new(&index.folders[folder].name);

    for (i, resource) in resources.iter().enumerate() {
        if index.resource_home[i] == Some(folder) {
            group.children.push(Node::Entry(resource_to_entry(resource)));
        }
    }
    for child in 0..index.folders.len() {
        if index.folder_parent[child] == Some(folder) && !placed[child] {
            let sub = build_group(child, index, resources, placed);
            group.children.push(Node::Group(sub));
        }
    }
    group
}

fn resource_to_entry(resource: &ExternalResource) -> Entry {
    let mut entry = Entry::new();
    let mut set = |key: &str, value: Value| {
        entry.fields.insert(key.to_string(), value);
    };

    set(FIELD_TITLE, Value::Unprotected(resource.name.clone()));
    set(
        FIELD_USERNAME,
        Value::Unprotected(resource.username.clone().unwrap_or_default()),
    );
    set(
        FIELD_URL,
        Value::Unprotected(resource.uri.clone().unwrap_or_default()),
    );
    set(
        FIELD_NOTES,
        Value::Unprotected(resource.description.clone().unwrap_or_default()),
    );
    set(
        FIELD_PASSWORD,
        Value::Protected(
            resource
                .secret_clear()
                .unwrap_or_default()
                .as_bytes()
                .to_vec()
                .into(),
        ),
    );
    if let Some(totp) = &resource.totp {
        let uri = totp.to_otpauth_url(&resource.name, None);
        set(KEEPASSXC_OTP, Value::Protected(uri.into_bytes().into()));
    }

    if let Some(expired) = resource.expired {
        entry.times.set_expiry(expired.naive_utc());
        entry.times.expires = true;
    }
    if let Some(icon) = &resource.icon {
        entry.icon_id = icon.value.map(|v| v as usize);
        entry.background_color = icon.background_color.as_deref().and_then(parse_color);
    }
    entry
}

/// Parse `#RRGGBB`.
fn parse_color(hex: &str) -> Option<Color> {
    let hex = hex.strip_prefix('#')?;
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    Some(Color {
        r: channel(0)?,
        g: channel(2)?,
        b: channel(4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interchange::kdbx::read_kdbx;
    use crate::interchange::resources::ResourceIcon;
    use crate::interchange::totp::ExternalTotp;
    use chrono::{TimeZone, Utc};
    use secrecy::SecretString;

    fn collections() -> (ExternalFolderCollection, ExternalResourceCollection) {
        let mut folders = ExternalFolderCollection::new();
        folders.push_from_path("Work/Mail").unwrap();
        folders.push_from_path("Clients / Partners").unwrap();
        let mut resources = ExternalResourceCollection::new();
        resources.push(
            ExternalResource::new("Pwd")
                .with_username(Some("u"))
                .with_uri(Some("https://x.com"))
                .with_description(Some("d"))
                .with_secret_clear("s"),
        );
        resources.push(
            ExternalResource::new("Inbox")
                .with_secret_clear("mail-pw")
                .with_totp(Some(ExternalTotp::from_secret("JBSWY3DPEHPK3PXP").unwrap()))
                .with_expiry(Some(Utc.with_ymd_and_hms(2030, 1, 2, 3, 4, 5).unwrap()))
                .with_icon(ResourceIcon::keepass(Some(12), Some("#FF8000".into())))
                .with_folder_parent_path("Work/Mail"),
        );
        resources.push(
            ExternalResource::new("Partner")
                .with_secret_clear("p")
                .with_folder_parent_path("Clients / Partners"),
        );
        (folders, resources)
    }

    #[test]
    fn test_parse_color() {
        let c = parse_color("#FF8000").unwrap();
        assert_eq!((c.r, c.g, c.b), (255, 128, 0));
        assert!(parse_color("FF8000").is_none());
        assert!(parse_color("#GG0000").is_none());
    }

    #[test]
    fn test_roundtrip_without_credential() {
        let (folders, resources) = collections();
        let data = write_kdbx(
            &folders,
            &resources,
            &KdbxCredentials::none(),
            &KdbxKdfSettings::default(),
            "export",
        )
        .unwrap();

        let parsed = read_kdbx(&data, &KdbxCredentials::none()).unwrap();
        assert_eq!(parsed.folders.len(), 3);
        assert!(parsed.folders.get_by_path("Work/Mail").is_some());
        let partners = parsed.folders.get_by_path("Clients / Partners").unwrap();
        assert_eq!(partners.name, "Clients/Partners");

        let pwd = parsed.resources.iter().find(|r| r.name == "Pwd").unwrap();
        assert_eq!(pwd.username.as_deref(), Some("u"));
        assert_eq!(pwd.uri.as_deref(), Some("https://x.com"));
        assert_eq!(pwd.description.as_deref(), Some("d"));
        assert_eq!(pwd.secret_clear(), Some("s"));
        assert_eq!(pwd.folder_parent_path, "");

        let inbox = parsed.resources.iter().find(|r| r.name == "Inbox").unwrap();
        assert_eq!(inbox.folder_parent_path, "Work/Mail");
        assert_eq!(
            inbox.totp.as_ref().unwrap().secret_key,
            "JBSWY3DPEHPK3PXP"
        );
        assert_eq!(
            inbox.expired,
            Some(Utc.with_ymd_and_hms(2030, 1, 2, 3, 4, 5).unwrap())
        );
        let icon = inbox.icon.as_ref().unwrap();
        assert_eq!(icon.value, Some(12));
        assert_eq!(icon.background_color.as_deref(), Some("#FF8000"));
    }

    #[test]
    fn test_roundtrip_with_password_and_wrong_password() {
        let (folders, resources) = collections();
        let creds = KdbxCredentials::none().with_password(SecretString::new("correct".into()));
        let data = write_kdbx(
            &folders,
            &resources,
            &creds,
            &KdbxKdfSettings::default(),
            "export",
        )
        .unwrap();

        let ok = KdbxCredentials::none().with_password(SecretString::new("correct".into()));
        assert_eq!(read_kdbx(&data, &ok).unwrap().resources.len(), 3);

        let bad = KdbxCredentials::none().with_password(SecretString::new("wrong".into()));
        let err = read_kdbx(&data, &bad).unwrap_err();
        assert_eq!(
            err.kind,
            crate::interchange::types::InterchangeErrorKind::AuthFailed
        );
    }

    #[test]
    fn test_keyless_container_is_empty_password() {
        let (folders, resources) = collections();
        let data = write_kdbx(
            &folders,
            &resources,
            &KdbxCredentials::none(),
            &KdbxKdfSettings::default(),
            "export",
        )
        .unwrap();

        let empty = KdbxCredentials::none().with_password(SecretString::new(String::new()));
        assert_eq!(read_kdbx(&data, &empty).unwrap().resources.len(), 3);

        let other = KdbxCredentials::none().with_password(SecretString::new("pw".into()));
        let err = read_kdbx(&data, &other).unwrap_err();
        assert_eq!(
            err.kind,
            crate::interchange::types::InterchangeErrorKind::AuthFailed
        );
    }

    #[test]
    fn test_orphan_resource_goes_to_root() {
        let folders = ExternalFolderCollection::new();
        let mut resources = ExternalResourceCollection::new();
        let mut r = ExternalResource::new("Lost").with_secret_clear("x");
        r.folder_parent_id = Some("missing".into());
        r.folder_parent_path = "Gone".into();
        resources.push(r);
        let tree = build_tree(&folders, &resources, "export");
        assert_eq!(tree.children.len(), 1);
        assert!(matches!(tree.children[0], Node::Entry(_)));
    }

    #[test]
    fn test_tree_nests_by_id() {
        let mut folders = ExternalFolderCollection::new();
        folders.push(ExternalFolder::new("A", "").unwrap().with_id("a"));
        folders.push(
            ExternalFolder::new("B", "A")
                .unwrap()
                .with_id("b")
                .with_parent_id(Some("a".into())),
        );
        let tree = build_tree(&folders, &ExternalResourceCollection::new(), "export");
        assert_eq!(tree.children.len(), 1);
        match &tree.children[0] {
            Node::Group(a) => {
                assert_eq!(a.name, "A");
                assert_eq!(a.children.len(), 1);
            }
            Node::Entry(_) => panic!("expected group"),
        }
    }
}
