//! Credential sources.
//!
//! Secrets never live in a [`ConnectionConfig`]: they are requested from a
//! [`CredentialSource`] at connect time, already decrypted. Encryption at rest
//! belongs to whoever implements the source. Any failure a source reports is
//! surfaced as [`SessionError::CredentialDecryption`] and never retried.

use std::env;

use async_trait::async_trait;

use crate::config::ConnectionConfig;
use crate::error::SessionError;

/// Environment variable read by [`EnvCredentials`] for the password
pub const PASSWORD_ENV_VAR: &str = "SSH_PASSWORD";

/// Environment variable read by [`EnvCredentials`] for the key passphrase
pub const PASSPHRASE_ENV_VAR: &str = "SSH_KEY_PASSPHRASE";

/// Decrypted secrets for one connection.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub password: Option<String>,
    pub passphrase: Option<String>,
}

impl Credentials {
    pub fn password(password: impl Into<String>) -> Self {
        Self {
            password: Some(password.into()),
            passphrase: None,
        }
    }

    pub fn passphrase(passphrase: impl Into<String>) -> Self {
        Self {
            password: None,
            passphrase: Some(passphrase.into()),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |secret: &Option<String>| secret.as_ref().map(|_| "<redacted>");
        f.debug_struct("Credentials")
            .field("password", &redact(&self.password))
            .field("passphrase", &redact(&self.passphrase))
            .finish()
    }
}

/// Supplies decrypted secrets for a connection.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    async fn credentials(&self, config: &ConnectionConfig) -> Result<Credentials, SessionError>;
}

/// Secrets handed over directly by the caller.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials(pub Credentials);

#[async_trait]
impl CredentialSource for StaticCredentials {
    async fn credentials(&self, _config: &ConnectionConfig) -> Result<Credentials, SessionError> {
        Ok(self.0.clone())
    }
}

/// Secrets read from `SSH_PASSWORD` and `SSH_KEY_PASSPHRASE`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvCredentials;

#[async_trait]
impl CredentialSource for EnvCredentials {
    async fn credentials(&self, _config: &ConnectionConfig) -> Result<Credentials, SessionError> {
        Ok(Credentials {
            password: env::var(PASSWORD_ENV_VAR).ok(),
            passphrase: env::var(PASSPHRASE_ENV_VAR).ok(),
        })
    }
}
