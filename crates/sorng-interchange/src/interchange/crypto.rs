//! Encryption boundary and secret/metadata serialisation.
//!
//! The OpenPGP machinery itself lives behind [`CryptoService`]. This
//! module owns what gets encrypted: the secret document of each resource
//! type and, on v5 deployments, the resource metadata document.

use async_trait::async_trait;
use log::warn;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::Zeroizing;

use super::resource_types::ResourceTypeDefinition;
use super::resources::{ExternalResource, ResourceIcon};
use super::totp::ExternalTotp;
use super::types::{InterchangeError, InterchangeResult, MetadataVersion};

pub const SECRET_OBJECT_TYPE: &str = "PASSBOLT_SECRET_DATA";
pub const METADATA_OBJECT_TYPE: &str = "PASSBOLT_RESOURCE_METADATA";
/// Metadata encrypted with the owner's personal key.
pub const METADATA_KEY_TYPE_USER: &str = "user_key";

// ── User context ────────────────────────────────────────────────────

/// Key material of the user a run acts for.
#[derive(Debug)]
pub struct UserContext {
    pub user_id: String,
    pub armored_private_key: String,
    pub passphrase: SecretString,
    pub armored_public_key: String,
}

impl UserContext {
    pub fn new(
        user_id: impl Into<String>,
        armored_private_key: impl Into<String>,
        passphrase: SecretString,
        armored_public_key: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            armored_private_key: armored_private_key.into(),
            passphrase,
            armored_public_key: armored_public_key.into(),
        }
    }
}

/// An unlocked private key handle, produced by [`CryptoService`].
pub struct DecryptedPrivateKey {
    material: Zeroizing<Vec<u8>>,
    fingerprint: String,
}

impl DecryptedPrivateKey {
    pub fn new(material: Vec<u8>, fingerprint: impl Into<String>) -> Self {
        Self {
            material: Zeroizing::new(material),
            fingerprint: fingerprint.into(),
        }
    }

    pub fn material(&self) -> &[u8] {
        &self.material
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

impl fmt::Debug for DecryptedPrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecryptedPrivateKey")
            .field("fingerprint", &self.fingerprint)
            .finish_non_exhaustive()
    }
}

// ── Service ─────────────────────────────────────────────────────────

/// OpenPGP operations used by the pipelines.
#[async_trait]
pub trait CryptoService: Send + Sync {
    /// Unlock an armored private key. A wrong passphrase must fail.
    async fn decrypt_private_key(
        &self,
        armored_key: &str,
        passphrase: &SecretString,
    ) -> InterchangeResult<DecryptedPrivateKey>;

    /// Encrypt `plaintext` for `recipient_public_key` and sign it.
    async fn encrypt_and_sign(
        &self,
        plaintext: &str,
        recipient_public_key: &str,
        signing_key: &DecryptedPrivateKey,
    ) -> InterchangeResult<String>;

    async fn decrypt(
        &self,
        armored_message: &str,
        key: &DecryptedPrivateKey,
    ) -> InterchangeResult<Zeroizing<String>>;
}

// ── Secret documents ────────────────────────────────────────────────

/// Clear content of a structured secret.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SecretPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_type_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub totp: Option<ExternalTotp>,
}

impl fmt::Debug for SecretPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretPayload")
            .field("object_type", &self.object_type)
            .field("resource_type_id", &self.resource_type_id)
            .field("has_password", &self.password.is_some())
            .field("has_description", &self.description.is_some())
            .field("has_totp", &self.totp.is_some())
            .finish()
    }
}

/// Serialise a resource's clear secret for its resource type.
///
/// Plain-string types get the bare password, cut to `max_length`
/// characters.
pub fn build_secret_plaintext(
    resource: &ExternalResource,
    resource_type: &ResourceTypeDefinition,
    max_length: usize,
) -> InterchangeResult<Zeroizing<String>> {
    let clear = resource.secret_clear().ok_or_else(|| {
        InterchangeError::crypto(format!("Resource {} is already encrypted", resource.name))
    })?;

    if resource_type.is_plain_string() {
        if clear.chars().count() > max_length {
            warn!(
                "Secret of resource {} exceeds {} characters and was truncated",
                resource.name, max_length
            );
            return Ok(Zeroizing::new(clear.chars().take(max_length).collect()));
        }
        return Ok(Zeroizing::new(clear.to_string()));
    }

    let caps = resource_type.capabilities;
    let v5 = resource_type.version == MetadataVersion::V5;
    let payload = SecretPayload {
        object_type: v5.then(|| SECRET_OBJECT_TYPE.to_string()),
        resource_type_id: v5.then(|| resource_type.id.clone()),
        password: caps.password.then(|| clear.to_string()),
        description: if caps.description {
            resource.description.clone()
        } else {
            None
        },
        totp: if caps.totp { resource.totp.clone() } else { None },
    };
    let json = serde_json::to_string(&payload)?;
    Ok(Zeroizing::new(json))
}

/// Parse a decrypted secret. Non-JSON content, or any content of a
/// plain-string type, is the bare password.
pub fn parse_secret_plaintext(
    plaintext: &str,
    resource_type: Option<&ResourceTypeDefinition>,
) -> SecretPayload {
    let plain = resource_type.map_or(false, ResourceTypeDefinition::is_plain_string);
    if !plain {
        if let Ok(parsed) = serde_json::from_str::<SecretPayload>(plaintext) {
            return parsed;
        }
    }
    SecretPayload {
        password: Some(plaintext.to_string()),
        ..Default::default()
    }
}

/// Whether the description travels inside the encrypted secret.
pub fn description_in_secret(resource_type: &ResourceTypeDefinition) -> bool {
    !resource_type.is_plain_string() && resource_type.capabilities.description
}

// ── v5 metadata ─────────────────────────────────────────────────────

/// Clear content of the v5 resource metadata document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceMetadata {
    pub object_type: String,
    pub resource_type_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default)]
    pub uris: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<ResourceIcon>,
}

impl ResourceMetadata {
    pub fn from_resource(resource: &ExternalResource, resource_type: &ResourceTypeDefinition) -> Self {
        Self {
            object_type: METADATA_OBJECT_TYPE.into(),
            resource_type_id: resource_type.id.clone(),
            name: resource.name.clone(),
            username: resource.username.clone(),
            uris: resource.uri.iter().cloned().collect(),
            description: if description_in_secret(resource_type) {
                None
            } else {
                resource.description.clone()
            },
            icon: resource.icon.clone(),
        }
    }

    pub fn parse(plaintext: &str) -> InterchangeResult<Self> {
        let metadata: Self = serde_json::from_str(plaintext)?;
        if metadata.object_type != METADATA_OBJECT_TYPE {
            return Err(InterchangeError::serialization(format!(
                "Unexpected metadata object type: {}",
                metadata.object_type
            )));
        }
        Ok(metadata)
    }
}
