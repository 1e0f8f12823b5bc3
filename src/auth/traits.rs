//! Authentication strategy trait definition.

use async_trait::async_trait;
use russh::client;

use crate::error::SessionError;
use crate::session::ssh::SshClientHandler;

/// Trait for SSH authentication strategies.
///
/// Implementations must be thread-safe (`Send + Sync`) for use across
/// async tasks. Each strategy represents a different authentication
/// method (password, key file, SSH agent).
#[async_trait]
pub trait AuthStrategy: Send + Sync {
    /// Attempt to authenticate with the SSH server.
    ///
    /// * `Ok(true)` - Authentication succeeded
    /// * `Ok(false)` - Credentials rejected by the server
    /// * `Err(_)` - The strategy could not be attempted (unreadable key,
    ///   no agent, transport failure)
    async fn authenticate(
        &self,
        handle: &mut client::Handle<SshClientHandler>,
        username: &str,
    ) -> Result<bool, SessionError>;

    /// Name of this strategy, used for logging.
    fn name(&self) -> &'static str;
}
