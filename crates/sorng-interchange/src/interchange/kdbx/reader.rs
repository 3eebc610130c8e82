//! KDBX reader.

use chrono::{TimeZone, Utc};
use keepass::db::{Entry, Group, Node};
use keepass::error::DatabaseOpenError;
use keepass::Database;
use log::{info, warn};
use serde_json::json;

use super::{KdbxCredentials, FIELD_NOTES, FIELD_PASSWORD, FIELD_TITLE, FIELD_URL, FIELD_USERNAME};
use crate::interchange::folders::ExternalFolder;
use crate::interchange::resources::{ExternalResource, ResourceIcon};
use crate::interchange::totp::ExternalTotp;
use crate::interchange::types::{InterchangeError, InterchangeResult, ItemError, ParsedFile};

/// Open a container and turn its tree into external collections.
///
/// Groups below the root group become folders; the root group itself
/// is not a folder. A bad credential is `AuthFailed`, any other open
/// failure is `CorruptContainer`.
pub fn read_kdbx(data: &[u8], credentials: &KdbxCredentials) -> InterchangeResult<ParsedFile> {
    let key = credentials.to_database_key()?;
    let mut source = data;
    let db = Database::open(&mut source, key).map_err(open_error)?;

    let mut parsed = ParsedFile::default();
    walk_group(&db.root, "", &mut parsed);

    info!(
        "Read KDBX container: {} folders, {} resources ({} folder errors, {} resource errors)",
        parsed.folders.len(),
        parsed.resources.len(),
        parsed.folder_errors.len(),
        parsed.resource_errors.len()
    );
    Ok(parsed)
}

fn open_error(e: DatabaseOpenError) -> InterchangeError {
    match e {
        DatabaseOpenError::Key(e) => {
            InterchangeError::auth_failed(format!("Wrong container credential: {}", e))
        }
        other => InterchangeError::corrupt_container(format!("Cannot open container: {}", other)),
    }
}

fn walk_group(group: &Group, parent_path: &str, parsed: &mut ParsedFile) {
    for node in &group.children {
        match node {
            Node::Group(child) => match ExternalFolder::new(&child.name, parent_path) {
                Ok(folder) => {
                    let child_path = folder.path();
                    if !parsed.folders.push(folder) {
                        warn!("Sibling groups share the path {}, merging their entries", child_path);
                    }
                    walk_group(child, &child_path, parsed);
                }
                Err(e) => {
                    warn!("Group {:?} rejected: {}", child.name, e.message);
                    parsed.folder_errors.push(ItemError::new(
                        "Group is not a valid folder",
                        json!({ "name": child.name, "folder_parent_path": parent_path }),
                        e,
                    ));
                    // The subtree continues at the root.
                    walk_group(child, "", parsed);
                }
            },
            Node::Entry(entry) => match entry_to_resource(entry, parent_path) {
                Ok(resource) => parsed.resources.push(resource),
                Err(e) => {
                    warn!("Entry rejected: {}", e.message);
                    parsed.resource_errors.push(ItemError::new(
                        "Entry is not a valid resource",
                        entry_source(entry, parent_path),
                        e,
                    ));
                }
            },
        }
    }
}

fn entry_to_resource(entry: &Entry, parent_path: &str) -> InterchangeResult<ExternalResource> {
    let totp = ExternalTotp::from_keepass_fields(|k| entry.get(k))?;

    let expired = if entry.times.expires {
        entry.times.get_expiry().map(|t| Utc.from_utc_datetime(t))
    } else {
        None
    };

    let icon_value = entry.icon_id.filter(|id| *id != 0).map(|id| id as u32);
    let background = entry
        .background_color
        .as_ref()
        .map(|c| format!("#{:02X}{:02X}{:02X}", c.r, c.g, c.b));

    ExternalResource::new(entry.get(FIELD_TITLE).unwrap_or_default())
        .with_username(entry.get(FIELD_USERNAME))
        .with_uri(entry.get(FIELD_URL))
        .with_description(entry.get(FIELD_NOTES))
        .with_secret_clear(entry.get(FIELD_PASSWORD).unwrap_or_default())
        .with_totp(totp)
        .with_expiry(expired)
        .with_icon(ResourceIcon::keepass(icon_value, background))
        .with_folder_parent_path(parent_path)
        .validated()
}

/// Secret-free view of an entry.
fn entry_source(entry: &Entry, parent_path: &str) -> serde_json::Value {
    json!({
        "title": entry.get(FIELD_TITLE),
        "username": entry.get(FIELD_USERNAME),
        "url": entry.get(FIELD_URL),
        "folder_parent_path": parent_path,
    })
}
