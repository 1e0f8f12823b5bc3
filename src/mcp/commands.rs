//! MCP tool implementations.
//!
//! - `ssh_connect`: Connect to an SSH server and register the session
//! - `ssh_execute`: Run a command on a fresh exec channel from the tracked directory
//! - `ssh_shell_open`: Open (or reopen) the marker-framed interactive shell
//! - `ssh_shell_execute`: Run a command on the interactive shell
//! - `ssh_execute_with_recovery`: Run a command through the diagnose-and-retry loop
//! - `ssh_classify_risk`: Classify a command without running it
//! - `ssh_disconnect`: Disconnect and forget a session
//! - `ssh_list_sessions`: List registered sessions
//!
//! Every execute response carries the command's risk tier. The tier is
//! advisory; no tool refuses a command because of it.

use std::path::PathBuf;
use std::sync::Arc;

use poem_mcpserver::{Tools, content::Text, tool::StructuredContent};
use tracing::{error, info, warn};

use crate::auth::{
    CredentialSource, Credentials, EnvCredentials, PASSWORD_ENV_VAR, StaticCredentials,
};
use crate::config::{
    AuthMethod, ConnectionConfig, resolve_command_timeout, resolve_compression,
    resolve_connect_timeout, resolve_max_attempts, resolve_max_retries, resolve_retry_delay,
    resolve_shell_timeout,
};
use crate::error::SessionError;
use crate::recovery::{
    CommandExecutor, DiagnosticOracle, HeuristicOracle, InteractiveExecutor, OneShotExecutor,
    RecoveryController, classify_risk, explain_risk, is_dangerous, requires_confirmation,
};
use crate::session::Session;
use crate::session::ssh::SshConnector;
use crate::session::transport::Connector;

use super::registry::SessionRegistry;
use super::types::{
    SessionListResponse, SshConnectResponse, SshExecuteResponse, SshRecoveryResponse,
    SshRiskResponse, SshShellOpenResponse,
};

/// MCP SSH tools over a shared [`SessionRegistry`].
pub struct McpSSHCommands {
    registry: Arc<SessionRegistry>,
    connector: Arc<dyn Connector>,
    controller: RecoveryController,
}

impl McpSSHCommands {
    /// Tools backed by russh and the rule-based oracle.
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self {
            registry,
            connector: Arc::new(SshConnector),
            controller: RecoveryController::new(HeuristicOracle::default()),
        }
    }

    pub fn with_connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = connector;
        self
    }

    pub fn with_oracle(mut self, oracle: impl DiagnosticOracle + 'static) -> Self {
        self.controller = RecoveryController::new(oracle);
        self
    }
}

/// Pick the auth method from what the caller supplied.
///
/// Key file first, then password (parameter or `SSH_PASSWORD`), then agent.
fn resolve_auth(password: Option<&str>, key_path: Option<&str>) -> AuthMethod {
    if let Some(path) = key_path {
        AuthMethod::PrivateKey {
            path: PathBuf::from(path),
        }
    } else if password.is_some() || std::env::var(PASSWORD_ENV_VAR).is_ok() {
        AuthMethod::Password
    } else {
        AuthMethod::Agent
    }
}

/// Explicit secrets win over the environment.
fn credential_source(
    password: Option<String>,
    passphrase: Option<String>,
) -> Box<dyn CredentialSource> {
    if password.is_none() && passphrase.is_none() {
        Box::new(EnvCredentials)
    } else {
        Box::new(StaticCredentials(Credentials {
            password,
            passphrase,
        }))
    }
}

/// Error text for shell tools, with the partial output of a timed-out command.
fn describe_error(error: SessionError) -> String {
    const HINT: &str = "the shell may still be busy, reopen it with ssh_shell_open if needed";
    match &error {
        SessionError::ShellTimeout { partial_output, .. } if !partial_output.is_empty() => {
            format!("{}; {}\npartial output:\n{}", error, HINT, partial_output)
        }
        SessionError::ShellTimeout { .. } => format!("{}; {}", error, HINT),
        _ => error.to_string(),
    }
}

#[Tools]
impl McpSSHCommands {
    /// Connect to an SSH server and register the session.
    ///
    /// Returns a session_id for subsequent commands. Authentication uses the
    /// key file if given, otherwise a password (parameter or SSH_PASSWORD),
    /// otherwise the SSH agent.
    #[allow(clippy::too_many_arguments)]
    async fn ssh_connect(
        &self,
        /// SSH server address in format "host:port" (e.g., "192.168.1.1:22")
        address: String,
        /// SSH username for authentication
        username: String,
        /// Password for password-based authentication (optional, env: SSH_PASSWORD)
        password: Option<String>,
        /// Path to private key file for key-based authentication (optional)
        key_path: Option<String>,
        /// Passphrase for an encrypted private key (optional, env: SSH_KEY_PASSPHRASE)
        key_passphrase: Option<String>,
        /// Connection timeout in seconds (default: 30, env: SSH_CONNECT_TIMEOUT)
        timeout_secs: Option<u64>,
        /// Retries for transient network failures, never for auth failures (default: 0, env: SSH_MAX_RETRIES)
        max_retries: Option<u32>,
        /// Initial delay between retries in milliseconds, uses exponential backoff (default: 1000, env: SSH_RETRY_DELAY_MS)
        retry_delay_ms: Option<u64>,
        /// Enable zlib compression for the SSH connection (default: true, env: SSH_COMPRESSION)
        compress: Option<bool>,
        /// Optional human-readable name for the session (e.g., "production-db")
        name: Option<String>,
    ) -> Result<StructuredContent<SshConnectResponse>, String> {
        let auth = resolve_auth(password.as_deref(), key_path.as_deref());
        let config = ConnectionConfig::from_address(&address, &username, auth)?
            .with_connect_timeout(std::time::Duration::from_secs(resolve_connect_timeout(
                timeout_secs,
            )))
            .with_compression(resolve_compression(compress))
            .with_connect_retries(
                resolve_max_retries(max_retries),
                resolve_retry_delay(retry_delay_ms),
            );

        info!(
            "Attempting SSH connection to {}@{} with timeout {:?}, retries={}, compress={}, name={:?}",
            config.username,
            config.address(),
            config.connect_timeout,
            config.connect_retries,
            config.compression,
            name
        );

        let credentials = credential_source(password, key_passphrase);
        let session = Session::connect(self.connector.as_ref(), config, credentials.as_ref())
            .await
            .map_err(|e| {
                error!("SSH connection failed: {}", e);
                e.to_string()
            })?;

        let session_id = self.registry.insert(session, name.clone());
        let name_part = name
            .as_ref()
            .map(|n| format!(" (name: '{}')", n))
            .unwrap_or_default();

        Ok(StructuredContent(SshConnectResponse {
            message: format!(
                "Connected to {}@{}{}. Use session_id '{}' with ssh_execute or ssh_shell_open.",
                username, address, name_part, session_id
            ),
            session_id,
            authenticated: true,
        }))
    }

    /// Execute a command on a fresh exec channel.
    ///
    /// The command runs from the session's tracked working directory; a plain
    /// `cd` updates that directory for later calls. A timeout returns partial
    /// output with `timed_out=true`.
    async fn ssh_execute(
        &self,
        /// Session ID returned from ssh_connect
        session_id: String,
        /// Shell command to execute
        command: String,
        /// Command timeout in seconds (default: 180, env: SSH_COMMAND_TIMEOUT)
        timeout_secs: Option<u64>,
    ) -> Result<StructuredContent<SshExecuteResponse>, String> {
        let entry = self.registry.get(&session_id)?;
        let risk = classify_risk(&command);
        if risk.requires_confirmation() {
            warn!("Executing {} risk command on {}: {}", risk, session_id, command);
        }

        let mut session = entry.session.lock().await;
        let result = session
            .execute(&command, resolve_command_timeout(timeout_secs))
            .await
            .map_err(|e| e.to_string())?;

        Ok(StructuredContent(SshExecuteResponse {
            session_id,
            risk,
            result,
        }))
    }

    /// Open the interactive shell for a session, or reopen it.
    ///
    /// Reopening discards the previous shell and its working directory. Use
    /// it after a shell timeout to get a clean channel.
    async fn ssh_shell_open(
        &self,
        /// Session ID returned from ssh_connect
        session_id: String,
        /// Timeout for the shell to become ready, in seconds (default: 60, env: SSH_SHELL_TIMEOUT)
        timeout_secs: Option<u64>,
    ) -> Result<StructuredContent<SshShellOpenResponse>, String> {
        let entry = self.registry.get(&session_id)?;
        let mut session = entry.session.lock().await;
        let reopened = session.has_interactive_channel();

        session
            .initialize_interactive(resolve_shell_timeout(timeout_secs))
            .await
            .map_err(describe_error)?;

        let working_directory = session.working_directory().to_string();
        Ok(StructuredContent(SshShellOpenResponse {
            message: format!(
                "Interactive shell {} in {}. Use ssh_shell_execute with session_id '{}'.",
                if reopened { "reopened" } else { "opened" },
                working_directory,
                session_id
            ),
            session_id,
            working_directory,
        }))
    }

    /// Execute a command on the session's interactive shell.
    ///
    /// Shell state (directory, exported variables) persists between calls.
    /// Requires ssh_shell_open first. On timeout the remote command keeps
    /// running; reopen the shell if later output looks out of place.
    async fn ssh_shell_execute(
        &self,
        /// Session ID returned from ssh_connect
        session_id: String,
        /// Shell command to execute
        command: String,
        /// Command timeout in seconds (default: 60, env: SSH_SHELL_TIMEOUT)
        timeout_secs: Option<u64>,
    ) -> Result<StructuredContent<SshExecuteResponse>, String> {
        let entry = self.registry.get(&session_id)?;
        let risk = classify_risk(&command);
        if risk.requires_confirmation() {
            warn!("Executing {} risk command on {}: {}", risk, session_id, command);
        }

        let mut session = entry.session.lock().await;
        let result = session
            .execute_interactive(&command, resolve_shell_timeout(timeout_secs))
            .await
            .map_err(describe_error)?;

        Ok(StructuredContent(SshExecuteResponse {
            session_id,
            risk,
            result,
        }))
    }

    /// Execute a command and, on failure, retry with diagnosed fixes.
    ///
    /// Each failed attempt is diagnosed; a proposed replacement command is
    /// run next until one succeeds, the attempt budget is spent, or no fix
    /// is available. The full attempt trail is returned.
    async fn ssh_execute_with_recovery(
        &self,
        /// Session ID returned from ssh_connect
        session_id: String,
        /// Shell command to execute
        command: String,
        /// Maximum attempts including the first (default: 3, env: SSH_MAX_ATTEMPTS)
        max_attempts: Option<u32>,
        /// Run on the interactive shell instead of fresh exec channels (default: false)
        interactive: Option<bool>,
        /// Per-attempt timeout in seconds (defaults per mode)
        timeout_secs: Option<u64>,
    ) -> Result<StructuredContent<SshRecoveryResponse>, String> {
        let entry = self.registry.get(&session_id)?;
        let risk = classify_risk(&command);
        let max_attempts = resolve_max_attempts(max_attempts);

        let mut session = entry.session.lock().await;
        let mut executor: Box<dyn CommandExecutor + '_> = if interactive.unwrap_or(false) {
            Box::new(InteractiveExecutor::new(
                &mut session,
                resolve_shell_timeout(timeout_secs),
            ))
        } else {
            Box::new(OneShotExecutor::new(
                &mut session,
                resolve_command_timeout(timeout_secs),
            ))
        };

        let result = self
            .controller
            .execute_with_recovery(executor.as_mut(), &command, max_attempts)
            .await
            .map_err(|e| e.to_string())?;

        let highest_risk = result
            .attempts
            .iter()
            .map(|attempt| classify_risk(&attempt.command))
            .max()
            .unwrap_or(risk);

        Ok(StructuredContent(SshRecoveryResponse {
            session_id,
            risk,
            highest_risk,
            result,
        }))
    }

    /// Classify a command's risk tier without running it.
    ///
    /// Tiers: low, medium (file mutation), high (privilege or service
    /// disruption, confirm first), critical (destructive).
    async fn ssh_classify_risk(
        &self,
        /// Shell command to classify
        command: String,
    ) -> StructuredContent<SshRiskResponse> {
        let (risk, matched_pattern) = explain_risk(&command);
        StructuredContent(SshRiskResponse {
            dangerous: is_dangerous(&command),
            requires_confirmation: requires_confirmation(&command),
            command,
            risk,
            matched_pattern,
        })
    }

    /// Disconnect an SSH session and release its resources.
    async fn ssh_disconnect(
        &self,
        /// Session ID to disconnect
        session_id: String,
    ) -> Result<Text<String>, String> {
        info!("Disconnecting SSH session: {}", session_id);

        let entry = self
            .registry
            .remove(&session_id)
            .ok_or_else(|| format!("No active SSH session with ID: {}", session_id))?;

        let mut session = entry.session.lock().await;
        if let Err(e) = session.disconnect().await {
            warn!("Error during disconnect: {}", e);
        }
        Ok(Text(format!(
            "Session {} disconnected successfully",
            session_id
        )))
    }

    /// List registered SSH sessions with their state and working directory.
    async fn ssh_list_sessions(&self) -> StructuredContent<SessionListResponse> {
        let sessions = self.registry.list();
        StructuredContent(SessionListResponse {
            count: sessions.len(),
            sessions,
        })
    }
}
