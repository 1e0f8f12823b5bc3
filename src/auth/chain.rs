//! Authentication chain for trying multiple strategies.

use std::path::PathBuf;

use async_trait::async_trait;
use russh::client;
use tracing::debug;

use crate::config::AuthMethod;
use crate::error::SessionError;
use crate::session::ssh::SshClientHandler;

use super::credentials::Credentials;
use super::traits::AuthStrategy;
use super::{AgentAuth, KeyAuth, PasswordAuth};

/// Authentication chain that tries multiple strategies in order.
///
/// The first strategy the server accepts stops the chain.
///
/// # Example
///
/// ```ignore
/// let chain = AuthChain::new()
///     .with_password("secret")
///     .with_key("/path/to/key", None)
///     .with_agent();
///
/// let ok = chain.authenticate(&mut handle, "username").await?;
/// ```
pub struct AuthChain {
    strategies: Vec<Box<dyn AuthStrategy>>,
}

impl AuthChain {
    pub fn new() -> Self {
        Self {
            strategies: Vec::new(),
        }
    }

    /// Build the chain for a configured method and its resolved secrets.
    ///
    /// A password method without a password is a credential failure: the
    /// secret was expected from the credential source and never arrived.
    pub fn for_method(method: &AuthMethod, credentials: Credentials) -> Result<Self, SessionError> {
        let chain = Self::new();
        match method {
            AuthMethod::Password => {
                let password = credentials.password.ok_or_else(|| {
                    SessionError::CredentialDecryption(
                        "password authentication selected but no password was supplied".to_string(),
                    )
                })?;
                Ok(chain.with_password(password))
            }
            AuthMethod::PrivateKey { path } => {
                Ok(chain.with_key(path.clone(), credentials.passphrase))
            }
            AuthMethod::Agent => Ok(chain.with_agent()),
        }
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.strategies.push(Box::new(PasswordAuth::new(password)));
        self
    }

    pub fn with_key(mut self, key_path: impl Into<PathBuf>, passphrase: Option<String>) -> Self {
        self.strategies
            .push(Box::new(KeyAuth::new(key_path).with_passphrase(passphrase)));
        self
    }

    pub fn with_agent(mut self) -> Self {
        self.strategies.push(Box::new(AgentAuth::new()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.strategies.len()
    }
}

impl Default for AuthChain {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuthStrategy for AuthChain {
    async fn authenticate(
        &self,
        handle: &mut client::Handle<SshClientHandler>,
        username: &str,
    ) -> Result<bool, SessionError> {
        if self.strategies.is_empty() {
            return Err(SessionError::Authentication(
                "no authentication strategies configured".to_string(),
            ));
        }

        let mut last_error = None;

        for strategy in &self.strategies {
            debug!("Trying authentication strategy: {}", strategy.name());

            match strategy.authenticate(handle, username).await {
                Ok(true) => {
                    debug!("Authentication succeeded with strategy: {}", strategy.name());
                    return Ok(true);
                }
                Ok(false) => {
                    debug!("Authentication rejected for strategy: {}", strategy.name());
                    last_error = Some(SessionError::Authentication(format!(
                        "{} authentication rejected",
                        strategy.name()
                    )));
                }
                Err(e) => {
                    debug!("Authentication error with strategy {}: {}", strategy.name(), e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            SessionError::Authentication("all authentication methods failed".to_string())
        }))
    }

    fn name(&self) -> &'static str {
        "chain"
    }
}
