//! SSH agent authentication.

use async_trait::async_trait;
use russh::{client, keys};
use tracing::{debug, info};

use crate::error::SessionError;
use crate::session::ssh::SshClientHandler;

use super::traits::AuthStrategy;

/// SSH agent authentication strategy.
///
/// Connects to the agent behind `SSH_AUTH_SOCK` and tries each identity until
/// one is accepted.
#[derive(Debug, Default)]
pub struct AgentAuth;

impl AgentAuth {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AuthStrategy for AgentAuth {
    async fn authenticate(
        &self,
        handle: &mut client::Handle<SshClientHandler>,
        username: &str,
    ) -> Result<bool, SessionError> {
        let mut agent = keys::agent::client::AgentClient::connect_env()
            .await
            .map_err(|e| {
                SessionError::CredentialDecryption(format!("failed to connect to SSH agent: {}", e))
            })?;

        let identities = agent.request_identities().await.map_err(|e| {
            SessionError::CredentialDecryption(format!(
                "failed to get identities from SSH agent: {}",
                e
            ))
        })?;

        if identities.is_empty() {
            return Err(SessionError::Authentication(
                "no identities found in SSH agent".to_string(),
            ));
        }

        for identity in identities {
            debug!("Trying SSH agent identity: {:?}", identity.comment());

            let hash_alg = handle
                .best_supported_rsa_hash()
                .await
                .ok()
                .flatten()
                .flatten();

            match handle
                .authenticate_publickey_with(username, identity.clone(), hash_alg, &mut agent)
                .await
            {
                Ok(result) if result.success() => {
                    info!("Successfully authenticated with SSH agent");
                    return Ok(true);
                }
                Ok(_) => {
                    debug!("Agent identity not accepted, trying next...");
                }
                Err(e) => {
                    debug!("Agent authentication error: {}, trying next...", e);
                }
            }
        }

        Ok(false)
    }

    fn name(&self) -> &'static str {
        "agent"
    }
}
