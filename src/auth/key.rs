//! Private key file SSH authentication.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use russh::{client, keys};
use tracing::debug;

use crate::error::SessionError;
use crate::session::ssh::SshClientHandler;

use super::traits::AuthStrategy;

/// Private key file authentication strategy.
///
/// Encrypted keys are unlocked with the passphrase handed over by the
/// credential source. A key that cannot be decoded with it is reported as a
/// credential failure, not as a server-side rejection.
pub struct KeyAuth {
    key_path: PathBuf,
    passphrase: Option<String>,
}

impl KeyAuth {
    pub fn new(key_path: impl Into<PathBuf>) -> Self {
        Self {
            key_path: key_path.into(),
            passphrase: None,
        }
    }

    pub fn with_passphrase(mut self, passphrase: Option<String>) -> Self {
        self.passphrase = passphrase;
        self
    }
}

#[async_trait]
impl AuthStrategy for KeyAuth {
    async fn authenticate(
        &self,
        handle: &mut client::Handle<SshClientHandler>,
        username: &str,
    ) -> Result<bool, SessionError> {
        let key_pair = keys::load_secret_key(&self.key_path, self.passphrase.as_deref())
            .map_err(|e| {
                SessionError::CredentialDecryption(format!(
                    "failed to load private key from {:?}: {}",
                    self.key_path, e
                ))
            })?;

        // For RSA keys, use the best supported hash algorithm
        let hash_alg = handle
            .best_supported_rsa_hash()
            .await
            .ok()
            .flatten()
            .flatten();
        debug!("Using RSA hash algorithm for key auth: {:?}", hash_alg);

        let key_with_hash = keys::PrivateKeyWithHashAlg::new(Arc::new(key_pair), hash_alg);

        let result = handle
            .authenticate_publickey(username, key_with_hash)
            .await
            .map_err(|e| SessionError::Authentication(format!("key authentication failed: {}", e)))?;

        Ok(result.success())
    }

    fn name(&self) -> &'static str {
        "key"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_auth_name() {
        let auth = KeyAuth::new("/path/to/key");
        assert_eq!(auth.name(), "key");
    }

    #[test]
    fn test_key_auth_passphrase() {
        let auth = KeyAuth::new("/home/user/.ssh/id_ed25519").with_passphrase(Some("pw".into()));
        assert_eq!(auth.key_path, PathBuf::from("/home/user/.ssh/id_ed25519"));
        assert_eq!(auth.passphrase.as_deref(), Some("pw"));
    }
}
