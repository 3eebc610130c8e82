//! KDBX container codec.
//!
//! - **reader** – open a container and walk its group/entry tree
//! - **writer** – build a KDBX 4 container from external collections
//!
//! Both sides use the `keepass` crate for the binary format.

pub mod reader;
pub mod writer;

use keepass::DatabaseKey;
use secrecy::{ExposeSecret, SecretString};
use std::fmt;
use zeroize::Zeroizing;

use crate::interchange::types::{InterchangeError, InterchangeResult};

pub use reader::read_kdbx;
pub use writer::write_kdbx;

// Standard KeePass entry field names.
pub const FIELD_TITLE: &str = "Title";
pub const FIELD_USERNAME: &str = "UserName";
pub const FIELD_PASSWORD: &str = "Password";
pub const FIELD_URL: &str = "URL";
pub const FIELD_NOTES: &str = "Notes";

/// Password and/or key file protecting a container.
#[derive(Default)]
pub struct KdbxCredentials {
    pub password: Option<SecretString>,
    pub key_file: Option<Zeroizing<Vec<u8>>>,
}

impl fmt::Debug for KdbxCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KdbxCredentials")
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("key_file", &self.key_file.as_ref().map(|k| k.len()))
            .finish()
    }
}

impl KdbxCredentials {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_password(mut self, password: SecretString) -> Self {
        self.password = Some(password);
        self
    }

    pub fn with_key_file(mut self, key_file: Vec<u8>) -> Self {
        self.key_file = Some(Zeroizing::new(key_file));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.password.is_none() && self.key_file.is_none()
    }

    /// Composite key for the `keepass` crate.
    ///
    /// With neither element the key is the empty password, which is how
    /// KeePass itself stores a container that opens without a user secret.
    /// A composite with no elements cannot be saved.
    pub(crate) fn to_database_key(&self) -> InterchangeResult<DatabaseKey> {
        if self.is_empty() {
            return Ok(DatabaseKey::new().with_password(""));
        }
        let mut key = DatabaseKey::new();
        if let Some(password) = &self.password {
            key = key.with_password(password.expose_secret());
        }
        if let Some(key_file) = &self.key_file {
            let mut reader: &[u8] = key_file.as_slice();
            key = key
                .with_keyfile(&mut reader)
                .map_err(|e| InterchangeError::auth_failed(format!("Unreadable key file: {}", e)))?;
        }
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_debug_redacted() {
        let creds = KdbxCredentials::none()
            .with_password(SecretString::new("hunter2".into()))
            .with_key_file(vec![1, 2, 3]);
        let dbg = format!("{:?}", creds);
        assert!(!dbg.contains("hunter2"));
        assert!(dbg.contains("3"));
        assert!(!creds.is_empty());
        assert!(KdbxCredentials::none().is_empty());
    }

    #[test]
    fn test_database_key_builds() {
        assert!(KdbxCredentials::none().to_database_key().is_ok());
        let creds = KdbxCredentials::none().with_password(SecretString::new("pw".into()));
        assert!(creds.to_database_key().is_ok());
    }
}
