//! Password-based SSH authentication.

use async_trait::async_trait;
use russh::client;

use crate::error::SessionError;
use crate::session::ssh::SshClientHandler;

use super::traits::AuthStrategy;

/// Password authentication strategy.
pub struct PasswordAuth {
    password: String,
}

impl PasswordAuth {
    pub fn new(password: impl Into<String>) -> Self {
        Self {
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for PasswordAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordAuth")
            .field("password", &"<redacted>")
            .finish()
    }
}

#[async_trait]
impl AuthStrategy for PasswordAuth {
    async fn authenticate(
        &self,
        handle: &mut client::Handle<SshClientHandler>,
        username: &str,
    ) -> Result<bool, SessionError> {
        let result = handle
            .authenticate_password(username, &self.password)
            .await
            .map_err(|e| {
                SessionError::Authentication(format!("password authentication failed: {}", e))
            })?;

        Ok(result.success())
    }

    fn name(&self) -> &'static str {
        "password"
    }
}
