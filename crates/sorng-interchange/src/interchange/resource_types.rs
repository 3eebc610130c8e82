//! Resource-type catalogue and classifier.
//!
//! Each catalogued type declares the secret capabilities it can store
//! (password, description, TOTP) and the metadata generation it belongs
//! to. The classifier picks the type that fits a parsed record:
//!
//! 1. only types of the active metadata version are considered;
//! 2. an exact capability match wins, structured secrets before plain
//!    strings, then catalogue order;
//! 3. otherwise the best partial match: fewest populated capabilities
//!    discarded, then fewest unused capabilities, then catalogue order;
//!    a type sharing nothing with the record is never a partial match;
//! 4. otherwise the configured default type for the version;
//! 5. otherwise `NoMatchingResourceType`.

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::remote::RemoteResourceType;
use super::types::{InterchangeError, InterchangeResult, MetadataVersion};

// ── Capabilities ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Password,
    Description,
    Totp,
}

/// Set of secret capabilities.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CapabilitySet {
    pub password: bool,
    pub description: bool,
    pub totp: bool,
}

impl CapabilitySet {
    pub const fn new(password: bool, description: bool, totp: bool) -> Self {
        Self {
            password,
            description,
            totp,
        }
    }

    pub fn contains(&self, capability: Capability) -> bool {
        match capability {
            Capability::Password => self.password,
            Capability::Description => self.description,
            Capability::Totp => self.totp,
        }
    }

    pub fn insert(&mut self, capability: Capability) {
        match capability {
            Capability::Password => self.password = true,
            Capability::Description => self.description = true,
            Capability::Totp => self.totp = true,
        }
    }

    pub fn len(&self) -> usize {
        [self.password, self.description, self.totp]
            .iter()
            .filter(|b| **b)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn intersection(&self, other: &Self) -> Self {
        Self::new(
            self.password && other.password,
            self.description && other.description,
            self.totp && other.totp,
        )
    }

    /// Capabilities in `self` that `other` lacks.
    pub fn difference(&self, other: &Self) -> Self {
        Self::new(
            self.password && !other.password,
            self.description && !other.description,
            self.totp && !other.totp,
        )
    }
}

// ── Definitions ─────────────────────────────────────────────────────

/// How a type's secret is serialised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecretFormat {
    /// The secret is the bare password string.
    PlainString,
    /// The secret is a JSON object.
    Structured,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceTypeDefinition {
    pub id: String,
    pub slug: String,
    pub name: String,
    pub version: MetadataVersion,
    pub capabilities: CapabilitySet,
    pub secret_format: SecretFormat,
}

impl ResourceTypeDefinition {
    /// Derive a definition from a remote catalogue entry.
    ///
    /// Capabilities come from the `secret` JSON schema when present and
    /// from the well-known slugs otherwise.
    pub fn from_remote(remote: &RemoteResourceType) -> InterchangeResult<Self> {
        let version = if remote.slug.starts_with("v5-") {
            MetadataVersion::V5
        } else {
            MetadataVersion::V4
        };

        let (capabilities, secret_format) = match remote.definition.get("secret") {
            Some(secret) => capabilities_from_schema(secret),
            None => capabilities_from_slug(&remote.slug).ok_or_else(|| {
                InterchangeError::validation(format!(
                    "Resource type {} has no secret definition",
                    remote.slug
                ))
            })?,
        };

        Ok(Self {
            id: remote.id.clone(),
            slug: remote.slug.clone(),
            name: remote.name.clone(),
            version,
            capabilities,
            secret_format,
        })
    }

    pub fn is_plain_string(&self) -> bool {
        self.secret_format == SecretFormat::PlainString
    }
}

fn capabilities_from_schema(secret: &serde_json::Value) -> (CapabilitySet, SecretFormat) {
    if secret.get("type").and_then(|t| t.as_str()) == Some("string") {
        return (
            CapabilitySet::new(true, false, false),
            SecretFormat::PlainString,
        );
    }
    let mut caps = CapabilitySet::default();
    if let Some(props) = secret.get("properties").and_then(|p| p.as_object()) {
        caps.password = props.contains_key("password");
        caps.description = props.contains_key("description");
        caps.totp = props.contains_key("totp");
    }
    (caps, SecretFormat::Structured)
}

fn capabilities_from_slug(slug: &str) -> Option<(CapabilitySet, SecretFormat)> {
    let found = match slug {
        "password-string" | "v5-password-string" => (
            CapabilitySet::new(true, false, false),
            SecretFormat::PlainString,
        ),
        "password-and-description" | "v5-default" => (
            CapabilitySet::new(true, true, false),
            SecretFormat::Structured,
        ),
        "password-description-totp" | "v5-default-with-totp" => (
            CapabilitySet::new(true, true, true),
            SecretFormat::Structured,
        ),
        "totp" | "v5-totp-standalone" => (
            CapabilitySet::new(false, false, true),
            SecretFormat::Structured,
        ),
        _ => return None,
    };
    Some(found)
}

// ── Catalogue ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceTypeCatalogue {
    types: Vec<ResourceTypeDefinition>,
}

impl ResourceTypeCatalogue {
    /// A catalogue must hold at least one type.
    pub fn new(types: Vec<ResourceTypeDefinition>) -> InterchangeResult<Self> {
        if types.is_empty() {
            return Err(InterchangeError::missing_catalogue(
                "The resource type catalogue is empty",
            ));
        }
        Ok(Self { types })
    }

    /// Build from remote entries. Deleted and unrecognised types are skipped.
    pub fn from_remote(remote: &[RemoteResourceType]) -> InterchangeResult<Self> {
        let types = remote
            .iter()
            .filter(|t| t.deleted.is_none())
            .filter_map(|t| match ResourceTypeDefinition::from_remote(t) {
                Ok(def) => Some(def),
                Err(e) => {
                    warn!("Skipping resource type {}: {}", t.slug, e.message);
                    None
                }
            })
            .collect();
        Self::new(types)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResourceTypeDefinition> {
        self.types.iter()
    }

    pub fn get_by_id(&self, id: &str) -> Option<&ResourceTypeDefinition> {
        self.types.iter().find(|t| t.id == id)
    }

    pub fn get_by_slug(&self, slug: &str) -> Option<&ResourceTypeDefinition> {
        self.types.iter().find(|t| t.slug == slug)
    }

    /// Pick the type for a record populating `populated`.
    pub fn classify(
        &self,
        populated: CapabilitySet,
        version: MetadataVersion,
        default_slug: &str,
    ) -> InterchangeResult<&ResourceTypeDefinition> {
        let candidates: Vec<&ResourceTypeDefinition> =
            self.types.iter().filter(|t| t.version == version).collect();

        let exact = candidates
            .iter()
            .filter(|t| t.capabilities == populated)
            .min_by_key(|t| t.is_plain_string())
            .copied();
        if let Some(found) = exact {
            return Ok(found);
        }

        let partial = candidates
            .iter()
            .filter(|t| !t.capabilities.intersection(&populated).is_empty())
            .min_by_key(|t| {
                (
                    populated.difference(&t.capabilities).len(),
                    t.capabilities.difference(&populated).len(),
                    t.is_plain_string(),
                )
            })
            .copied();
        if let Some(found) = partial {
            debug!(
                "No exact resource type for {:?}, using partial match {}",
                populated, found.slug
            );
            return Ok(found);
        }

        candidates
            .into_iter()
            .find(|t| t.slug == default_slug)
            .ok_or_else(|| {
                InterchangeError::no_matching_type(format!(
                    "No resource type can hold {:?} and the default type '{}' is not available",
                    populated, default_slug
                ))
            })
    }
}
