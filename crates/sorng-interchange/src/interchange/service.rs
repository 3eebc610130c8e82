//! Central interchange service.
//!
//! Owns the configuration and the injected collaborators. The import and
//! export pipelines are `impl InterchangeService` blocks in their own
//! modules.

use log::{info, warn};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::interchange::crypto::{CryptoService, DecryptedPrivateKey, UserContext};
use crate::interchange::remote::RemoteStore;
use crate::interchange::resource_types::ResourceTypeCatalogue;
use crate::interchange::types::{InterchangeConfig, InterchangeError, InterchangeResult};

/// Shared handle for hosts that keep one service per application.
pub type InterchangeServiceState = Arc<Mutex<InterchangeService>>;

pub struct InterchangeService {
    config: InterchangeConfig,
    remote: Arc<dyn RemoteStore>,
    crypto: Arc<dyn CryptoService>,
}

impl InterchangeService {
    pub fn new(remote: Arc<dyn RemoteStore>, crypto: Arc<dyn CryptoService>) -> Self {
        Self {
            config: InterchangeConfig::default(),
            remote,
            crypto,
        }
    }

    /// Create a service with a validated configuration.
    pub fn with_config(
        config: InterchangeConfig,
        remote: Arc<dyn RemoteStore>,
        crypto: Arc<dyn CryptoService>,
    ) -> InterchangeResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            remote,
            crypto,
        })
    }

    pub fn new_state(self) -> InterchangeServiceState {
        Arc::new(Mutex::new(self))
    }

    // ── Configuration ───────────────────────────────────────────────

    pub fn config(&self) -> &InterchangeConfig {
        &self.config
    }

    pub fn update_config(&mut self, config: InterchangeConfig) -> InterchangeResult<()> {
        config.validate()?;
        info!(
            "Interchange config updated (chunk size {}, metadata {})",
            config.bulk_chunk_size, config.metadata_version
        );
        self.config = config;
        Ok(())
    }

    // ── Collaborators ───────────────────────────────────────────────

    pub(crate) fn remote(&self) -> &dyn RemoteStore {
        self.remote.as_ref()
    }

    pub(crate) fn crypto(&self) -> &dyn CryptoService {
        self.crypto.as_ref()
    }

    /// Unlock the user's private key. Any failure is a fatal
    /// `UserKeyDecryption` error.
    pub(crate) async fn unlock_user_key(
        &self,
        user: &UserContext,
    ) -> InterchangeResult<DecryptedPrivateKey> {
        self.crypto
            .decrypt_private_key(&user.armored_private_key, &user.passphrase)
            .await
            .map_err(|e| {
                warn!("Private key of user {} could not be unlocked", user.user_id);
                InterchangeError::user_key(format!("Cannot decrypt the user key: {}", e.message))
            })
    }

    /// Fetch the resource type catalogue. An unreachable or empty
    /// catalogue is a fatal `MissingCatalogue` error.
    pub(crate) async fn load_catalogue(&self) -> InterchangeResult<ResourceTypeCatalogue> {
        let remote_types = self.remote.find_resource_types().await.map_err(|e| {
            InterchangeError::missing_catalogue(format!(
                "Cannot load resource types: {}",
                e.message
            ))
        })?;
        let catalogue = ResourceTypeCatalogue::from_remote(&remote_types)?;
        info!("Loaded {} resource types", catalogue.len());
        Ok(catalogue)
    }
}
