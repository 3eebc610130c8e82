//! Interchange crate: sub-modules.
//!
//! Leaves first: the path grammar and the external entity model, then the
//! format codecs, then the collaborator seams and the two pipelines that
//! drive them through [`InterchangeService`].

pub mod types;
pub mod path;
pub mod totp;
pub mod folders;
pub mod resources;
pub mod resource_types;
pub mod payload;
pub mod csv;
pub mod kdbx;
pub mod progress;
pub mod crypto;
pub mod remote;
pub mod bulk;
pub mod service;
pub mod import;
pub mod export;

// Re-export top-level items for convenience.
pub use types::*;
pub use folders::{ExternalFolder, ExternalFolderCollection};
pub use resources::{ExternalResource, ExternalResourceCollection};
pub use totp::ExternalTotp;
pub use resource_types::{Capability, CapabilitySet, ResourceTypeCatalogue, ResourceTypeDefinition};
pub use progress::{NoopProgress, ProgressCounter, ProgressReporter};
pub use crypto::{CryptoService, DecryptedPrivateKey, UserContext};
pub use remote::RemoteStore;
pub use service::InterchangeService;
pub use import::ImportRun;
pub use export::ExportRun;
