//! Core types for the interchange pipelines.
//!
//! Defines the error model, the run configuration, file/format
//! enumerations, per-item error records, and the result shapes reported
//! back to callers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use super::folders::ExternalFolderCollection;
use super::resources::ExternalResourceCollection;

// ── Error types ─────────────────────────────────────────────────────

/// Interchange error kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InterchangeErrorKind {
    /// File type or CSV dialect is not recognised.
    UnsupportedFormat,
    /// Payload could not be decoded (base64, text encoding).
    InvalidPayload,
    /// KDBX container is unreadable or damaged.
    CorruptContainer,
    /// Wrong password and/or key file for the container.
    AuthFailed,
    /// The user's private key could not be decrypted.
    UserKeyDecryption,
    /// The resource-type catalogue is empty or unavailable.
    MissingCatalogue,
    /// No catalogued resource type can hold a record.
    NoMatchingResourceType,
    /// A record failed schema validation.
    Validation,
    /// Encryption, decryption or signing failure.
    Crypto,
    /// The remote store rejected or failed an operation.
    Remote,
    /// JSON or CSV (de)serialisation failure.
    Serialization,
    /// Invalid configuration or arguments.
    InvalidConfig,
    /// Local I/O failure.
    Io,
}

/// An interchange error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{kind:?}: {message}")]
pub struct InterchangeError {
    pub kind: InterchangeErrorKind,
    pub message: String,
}

pub type InterchangeResult<T> = Result<T, InterchangeError>;

impl From<InterchangeError> for String {
    fn from(e: InterchangeError) -> String {
        e.message
    }
}

impl InterchangeError {
    pub fn new(kind: InterchangeErrorKind, msg: impl Into<String>) -> Self {
        Self {
            kind,
            message: msg.into(),
        }
    }

    pub fn unsupported_format(msg: impl Into<String>) -> Self {
        Self::new(InterchangeErrorKind::UnsupportedFormat, msg)
    }
    pub fn invalid_payload(msg: impl Into<String>) -> Self {
        Self::new(InterchangeErrorKind::InvalidPayload, msg)
    }
    pub fn corrupt_container(msg: impl Into<String>) -> Self {
        Self::new(InterchangeErrorKind::CorruptContainer, msg)
    }
    pub fn auth_failed(msg: impl Into<String>) -> Self {
        Self::new(InterchangeErrorKind::AuthFailed, msg)
    }
    pub fn user_key(msg: impl Into<String>) -> Self {
        Self::new(InterchangeErrorKind::UserKeyDecryption, msg)
    }
    pub fn missing_catalogue(msg: impl Into<String>) -> Self {
        Self::new(InterchangeErrorKind::MissingCatalogue, msg)
    }
    pub fn no_matching_type(msg: impl Into<String>) -> Self {
        Self::new(InterchangeErrorKind::NoMatchingResourceType, msg)
    }
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::new(InterchangeErrorKind::Validation, msg)
    }
    pub fn crypto(msg: impl Into<String>) -> Self {
        Self::new(InterchangeErrorKind::Crypto, msg)
    }
    pub fn remote(msg: impl Into<String>) -> Self {
        Self::new(InterchangeErrorKind::Remote, msg)
    }
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::new(InterchangeErrorKind::Serialization, msg)
    }
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::new(InterchangeErrorKind::InvalidConfig, msg)
    }
    pub fn io(msg: impl Into<String>) -> Self {
        Self::new(InterchangeErrorKind::Io, msg)
    }

    /// Whether this error aborts a whole run rather than a single item.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.kind,
            InterchangeErrorKind::UnsupportedFormat
                | InterchangeErrorKind::InvalidPayload
                | InterchangeErrorKind::CorruptContainer
                | InterchangeErrorKind::AuthFailed
                | InterchangeErrorKind::UserKeyDecryption
                | InterchangeErrorKind::MissingCatalogue
        )
    }
}

impl From<serde_json::Error> for InterchangeError {
    fn from(e: serde_json::Error) -> Self {
        Self::serialization(format!("JSON error: {}", e))
    }
}

impl From<csv::Error> for InterchangeError {
    fn from(e: csv::Error) -> Self {
        Self::serialization(format!("CSV error: {}", e))
    }
}

impl From<std::io::Error> for InterchangeError {
    fn from(e: std::io::Error) -> Self {
        Self::io(e.to_string())
    }
}

// ── Field limits ────────────────────────────────────────────────────

/// Maximum field lengths, in characters, enforced on external entities.
pub mod limits {
    pub const RESOURCE_NAME_MAX: usize = 255;
    pub const USERNAME_MAX: usize = 255;
    pub const URI_MAX: usize = 1024;
    pub const DESCRIPTION_MAX: usize = 10_000;
    pub const FOLDER_NAME_MAX: usize = 256;
    pub const TOTP_SECRET_MAX: usize = 1024;
}

// ── Configuration ───────────────────────────────────────────────────

/// Metadata schema generation of the target deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetadataVersion {
    V4,
    V5,
}

impl Default for MetadataVersion {
    fn default() -> Self {
        Self::V4
    }
}

impl fmt::Display for MetadataVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::V4 => write!(f, "v4"),
            Self::V5 => write!(f, "v5"),
        }
    }
}

/// Key-derivation parameters for KDBX containers written on export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KdbxKdfSettings {
    /// Argon2id memory cost in bytes.
    pub memory_bytes: u64,
    /// Argon2id iteration count.
    pub iterations: u64,
    /// Argon2id lanes.
    pub parallelism: u32,
}

/// Lowest memory cost accepted for the container KDF (15 MiB).
pub const KDBX_MIN_MEMORY_BYTES: u64 = 15 * 1024 * 1024;

impl Default for KdbxKdfSettings {
    fn default() -> Self {
        Self {
            memory_bytes: KDBX_MIN_MEMORY_BYTES,
            iterations: 2,
            parallelism: 1,
        }
    }
}

/// Interchange configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterchangeConfig {
    /// Items per chunk in bulk remote operations.
    pub bulk_chunk_size: usize,
    /// Metadata generation new resources are created with.
    pub metadata_version: MetadataVersion,
    /// Fallback resource type slug for v4 deployments.
    pub default_resource_type_v4: String,
    /// Fallback resource type slug for v5 deployments.
    pub default_resource_type_v5: String,
    /// Maximum length of a bare (typeless) secret string.
    pub secret_max_length: usize,
    /// KDF parameters for exported containers.
    pub kdbx_kdf: KdbxKdfSettings,
    /// Prefix of generated import references.
    pub import_ref_prefix: String,
}

impl Default for InterchangeConfig {
    fn default() -> Self {
        Self {
            bulk_chunk_size: 5,
            metadata_version: MetadataVersion::V4,
            default_resource_type_v4: "password-and-description".into(),
            default_resource_type_v5: "v5-default".into(),
            secret_max_length: 4096,
            kdbx_kdf: KdbxKdfSettings::default(),
            import_ref_prefix: "import".into(),
        }
    }
}

impl InterchangeConfig {
    /// Parse and validate a JSON configuration document.
    pub fn from_json(json: &str) -> InterchangeResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| InterchangeError::invalid_config(format!("Invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> InterchangeResult<Self> {
        let raw = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            InterchangeError::io(format!(
                "Cannot read config {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::from_json(&raw)
    }

    pub fn validate(&self) -> InterchangeResult<()> {
        if self.bulk_chunk_size == 0 {
            return Err(InterchangeError::invalid_config(
                "bulk_chunk_size must be at least 1",
            ));
        }
        if self.secret_max_length == 0 {
            return Err(InterchangeError::invalid_config(
                "secret_max_length must be at least 1",
            ));
        }
        if self.kdbx_kdf.memory_bytes < KDBX_MIN_MEMORY_BYTES {
            return Err(InterchangeError::invalid_config(format!(
                "kdbx_kdf.memory_bytes must be at least {} bytes",
                KDBX_MIN_MEMORY_BYTES
            )));
        }
        if self.kdbx_kdf.iterations == 0 || self.kdbx_kdf.parallelism == 0 {
            return Err(InterchangeError::invalid_config(
                "kdbx_kdf.iterations and kdbx_kdf.parallelism must be positive",
            ));
        }
        if !crate::interchange::import::is_valid_reference(&self.import_ref_prefix) {
            return Err(InterchangeError::invalid_config(
                "import_ref_prefix may only contain letters, digits, '_' and '-'",
            ));
        }
        Ok(())
    }

    /// Default resource type slug for the active metadata version.
    pub fn default_resource_type_slug(&self) -> &str {
        match self.metadata_version {
            MetadataVersion::V4 => &self.default_resource_type_v4,
            MetadataVersion::V5 => &self.default_resource_type_v5,
        }
    }
}

// ── File types & formats ────────────────────────────────────────────

/// Type of an imported file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportFileType {
    Csv,
    Kdbx,
}

impl FromStr for ImportFileType {
    type Err = InterchangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "kdbx" => Ok(Self::Kdbx),
            other => Err(InterchangeError::unsupported_format(format!(
                "Unsupported file type: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for ImportFileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Csv => write!(f, "csv"),
            Self::Kdbx => write!(f, "kdbx"),
        }
    }
}

/// CSV dialects known to the registry, in registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CsvDialect {
    Kdbx,
    KeepassXc,
    LastPass,
    OnePassword,
    Chromium,
    Bitwarden,
    Mozilla,
    Safari,
    Dashlane,
    NordPass,
    LogMeOnce,
}

impl CsvDialect {
    pub const ALL: [CsvDialect; 11] = [
        CsvDialect::Kdbx,
        CsvDialect::KeepassXc,
        CsvDialect::LastPass,
        CsvDialect::OnePassword,
        CsvDialect::Chromium,
        CsvDialect::Bitwarden,
        CsvDialect::Mozilla,
        CsvDialect::Safari,
        CsvDialect::Dashlane,
        CsvDialect::NordPass,
        CsvDialect::LogMeOnce,
    ];

    /// Stable identifier used in export format names (`csv-<slug>`).
    pub fn slug(&self) -> &'static str {
        match self {
            Self::Kdbx => "kdbx",
            Self::KeepassXc => "keepassxc",
            Self::LastPass => "lastpass",
            Self::OnePassword => "1password",
            Self::Chromium => "chromium",
            Self::Bitwarden => "bitwarden",
            Self::Mozilla => "mozilla",
            Self::Safari => "safari",
            Self::Dashlane => "dashlane",
            Self::NordPass => "nordpass",
            Self::LogMeOnce => "logmeonce",
        }
    }

    pub fn from_slug(slug: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|d| d.slug() == slug)
    }
}

impl fmt::Display for CsvDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.slug())
    }
}

/// Output format of an export run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ExportFormat {
    Kdbx,
    Csv(CsvDialect),
}

impl ExportFormat {
    /// File extension of the produced document.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Kdbx => "kdbx",
            Self::Csv(_) => "csv",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = InterchangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        if s == "kdbx" {
            return Ok(Self::Kdbx);
        }
        s.strip_prefix("csv-")
            .and_then(CsvDialect::from_slug)
            .map(Self::Csv)
            .ok_or_else(|| {
                InterchangeError::unsupported_format(format!("Unsupported export format: {}", s))
            })
    }
}

impl TryFrom<String> for ExportFormat {
    type Error = InterchangeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ExportFormat> for String {
    fn from(value: ExportFormat) -> String {
        value.to_string()
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Kdbx => write!(f, "kdbx"),
            Self::Csv(dialect) => write!(f, "csv-{}", dialect.slug()),
        }
    }
}

// ── Per-item errors ─────────────────────────────────────────────────

/// A non-fatal failure attached to one folder or resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemError {
    pub message: String,
    /// The offending source record (CSV row, KDBX node, external entity).
    pub source: serde_json::Value,
    pub cause: InterchangeError,
}

impl ItemError {
    pub fn new(
        message: impl Into<String>,
        source: serde_json::Value,
        cause: InterchangeError,
    ) -> Self {
        Self {
            message: message.into(),
            source,
            cause,
        }
    }
}

// ── Parsed files ────────────────────────────────────────────────────

/// Collections and per-item errors produced by a file reader.
#[derive(Debug, Default)]
pub struct ParsedFile {
    /// Detected dialect, for CSV input.
    pub dialect: Option<CsvDialect>,
    pub folders: ExternalFolderCollection,
    pub resources: ExternalResourceCollection,
    pub folder_errors: Vec<ItemError>,
    pub resource_errors: Vec<ItemError>,
}

// ── Options & results ───────────────────────────────────────────────

/// Caller-selected import behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportOptions {
    /// Recreate the source folder tree under the run's root folder.
    pub import_folders: bool,
    /// Tag every created resource with the run reference.
    pub import_tags: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            import_folders: true,
            import_tags: false,
        }
    }
}

/// Reference to a remote entity created for a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedRef {
    pub id: String,
    pub name: String,
}

/// Outcome of an import run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportResult {
    pub reference: String,
    pub created_folders_count: usize,
    pub created_resources_count: usize,
    pub folder_errors: Vec<ItemError>,
    pub resource_errors: Vec<ItemError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_folder: Option<CreatedRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<CreatedRef>,
}

/// Outcome of an export run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportResult {
    pub format: ExportFormat,
    pub file_name: String,
    #[serde(skip)]
    pub data: Vec<u8>,
    pub exported_folders_count: usize,
    pub exported_resources_count: usize,
    pub errors: Vec<ItemError>,
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = InterchangeError::auth_failed("wrong key");
        assert_eq!(format!("{}", err), "AuthFailed: wrong key");
    }

    #[test]
    fn test_error_into_string() {
        let err = InterchangeError::validation("too long");
        let s: String = err.into();
        assert_eq!(s, "too long");
    }

    #[test]
    fn test_fatal_classification() {
        assert!(InterchangeError::unsupported_format("x").is_fatal());
        assert!(InterchangeError::corrupt_container("x").is_fatal());
        assert!(InterchangeError::auth_failed("x").is_fatal());
        assert!(InterchangeError::user_key("x").is_fatal());
        assert!(InterchangeError::missing_catalogue("x").is_fatal());
        assert!(!InterchangeError::validation("x").is_fatal());
        assert!(!InterchangeError::remote("x").is_fatal());
        assert!(!InterchangeError::no_matching_type("x").is_fatal());
    }

    #[test]
    fn test_default_config() {
        let cfg = InterchangeConfig::default();
        assert_eq!(cfg.bulk_chunk_size, 5);
        assert_eq!(cfg.metadata_version, MetadataVersion::V4);
        assert_eq!(cfg.kdbx_kdf.iterations, 2);
        assert_eq!(cfg.kdbx_kdf.parallelism, 1);
        assert_eq!(cfg.kdbx_kdf.memory_bytes, 15 * 1024 * 1024);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_config_from_partial_json() {
        let cfg = InterchangeConfig::from_json(r#"{"metadata_version":"v5","bulk_chunk_size":10}"#)
            .unwrap();
        assert_eq!(cfg.metadata_version, MetadataVersion::V5);
        assert_eq!(cfg.bulk_chunk_size, 10);
        assert_eq!(cfg.default_resource_type_slug(), "v5-default");
    }

    #[test]
    fn test_config_rejects_weak_kdf() {
        let err = InterchangeConfig::from_json(r#"{"kdbx_kdf":{"memory_bytes":1024}}"#)
            .unwrap_err();
        assert_eq!(err.kind, InterchangeErrorKind::InvalidConfig);
    }

    #[test]
    fn test_config_rejects_zero_chunk() {
        let err = InterchangeConfig::from_json(r#"{"bulk_chunk_size":0}"#).unwrap_err();
        assert_eq!(err.kind, InterchangeErrorKind::InvalidConfig);
    }

    #[test]
    fn test_config_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("interchange.json");
        std::fs::write(&path, r#"{"secret_max_length":128}"#).unwrap();
        let cfg = InterchangeConfig::load(&path).unwrap();
        assert_eq!(cfg.secret_max_length, 128);
    }

    #[test]
    fn test_import_file_type_parse() {
        assert_eq!("CSV".parse::<ImportFileType>().unwrap(), ImportFileType::Csv);
        assert_eq!("kdbx".parse::<ImportFileType>().unwrap(), ImportFileType::Kdbx);
        let err = "xlsx".parse::<ImportFileType>().unwrap_err();
        assert_eq!(err.kind, InterchangeErrorKind::UnsupportedFormat);
    }

    #[test]
    fn test_export_format_roundtrip_strings() {
        for dialect in CsvDialect::ALL {
            let format = ExportFormat::Csv(dialect);
            let parsed: ExportFormat = format.to_string().parse().unwrap();
            assert_eq!(parsed, format);
        }
        assert_eq!("kdbx".parse::<ExportFormat>().unwrap(), ExportFormat::Kdbx);
        assert!("csv-unknown".parse::<ExportFormat>().is_err());
    }

    #[test]
    fn test_export_format_serde() {
        let json = serde_json::to_value(ExportFormat::Csv(CsvDialect::LastPass)).unwrap();
        assert_eq!(json, "csv-lastpass");
        let back: ExportFormat = serde_json::from_value(json).unwrap();
        assert_eq!(back, ExportFormat::Csv(CsvDialect::LastPass));
    }

    #[test]
    fn test_import_options_default() {
        let opts: ImportOptions = serde_json::from_str("{}").unwrap();
        assert!(opts.import_folders);
        assert!(!opts.import_tags);
    }

    #[test]
    fn test_item_error_serialize() {
        let e = ItemError::new(
            "Row 2 is invalid",
            serde_json::json!({"name": "x"}),
            InterchangeError::validation("name too long"),
        );
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["message"], "Row 2 is invalid");
        assert_eq!(json["source"]["name"], "x");
        assert_eq!(json["cause"]["kind"], "Validation");
    }
}
