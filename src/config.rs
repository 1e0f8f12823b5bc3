//! Connection configuration and value resolution.
//!
//! Tunables use a three-tier priority system:
//!
//! 1. **Parameter** - Explicitly provided function parameter (highest priority)
//! 2. **Environment Variable** - Value from environment variable
//! 3. **Default** - Built-in default value (lowest priority)
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `SSH_CONNECT_TIMEOUT` | 30s | Connection timeout in seconds |
//! | `SSH_COMMAND_TIMEOUT` | 180s | One-shot command timeout in seconds |
//! | `SSH_SHELL_TIMEOUT` | 60s | Interactive command timeout in seconds |
//! | `SSH_MAX_RETRIES` | 0 | Connect retries for transient network errors |
//! | `SSH_RETRY_DELAY_MS` | 1000ms | Initial connect retry delay in milliseconds |
//! | `SSH_COMPRESSION` | true | Enable zlib compression |
//! | `SSH_MAX_ATTEMPTS` | 3 | Attempts allowed in the recovery loop |

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Default SSH connection timeout in seconds
pub(crate) const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default one-shot command timeout in seconds
pub(crate) const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 180;

/// Default interactive command timeout in seconds
pub(crate) const DEFAULT_SHELL_TIMEOUT_SECS: u64 = 60;

/// Connect failures are not retried unless the caller asks for it.
pub(crate) const DEFAULT_MAX_RETRIES: u32 = 0;

/// Default retry delay in milliseconds
pub(crate) const DEFAULT_RETRY_DELAY_MS: u64 = 1000;

/// Default number of attempts in the recovery loop
pub(crate) const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Maximum retry delay cap (10 seconds)
pub(crate) const MAX_RETRY_DELAY: Duration = Duration::from_secs(10);

/// Default SSH port
pub const DEFAULT_SSH_PORT: u16 = 22;

pub(crate) const CONNECT_TIMEOUT_ENV_VAR: &str = "SSH_CONNECT_TIMEOUT";
pub(crate) const COMMAND_TIMEOUT_ENV_VAR: &str = "SSH_COMMAND_TIMEOUT";
pub(crate) const SHELL_TIMEOUT_ENV_VAR: &str = "SSH_SHELL_TIMEOUT";
pub(crate) const MAX_RETRIES_ENV_VAR: &str = "SSH_MAX_RETRIES";
pub(crate) const RETRY_DELAY_MS_ENV_VAR: &str = "SSH_RETRY_DELAY_MS";
pub(crate) const COMPRESSION_ENV_VAR: &str = "SSH_COMPRESSION";
pub(crate) const MAX_ATTEMPTS_ENV_VAR: &str = "SSH_MAX_ATTEMPTS";

/// How the session authenticates. Secrets are supplied separately by a
/// [`CredentialSource`](crate::auth::CredentialSource).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthMethod {
    /// Password authentication
    Password,
    /// Private key file, optionally protected by a passphrase
    PrivateKey { path: PathBuf },
    /// Identities offered by the running SSH agent
    Agent,
}

/// Everything needed to open one SSH connection.
///
/// Immutable once a session has been built from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub auth: AuthMethod,
    pub connect_timeout: Duration,
    pub compression: bool,
    /// Retries for transient network failures (never for auth failures)
    pub connect_retries: u32,
    /// Initial delay between connect retries
    pub retry_delay: Duration,
}

impl ConnectionConfig {
    /// Create a configuration with defaults resolved from the environment.
    pub fn new(host: impl Into<String>, port: u16, username: impl Into<String>, auth: AuthMethod) -> Self {
        Self {
            host: host.into(),
            port,
            username: username.into(),
            auth,
            connect_timeout: Duration::from_secs(resolve_connect_timeout(None)),
            compression: resolve_compression(None),
            connect_retries: resolve_max_retries(None),
            retry_delay: resolve_retry_delay(None),
        }
    }

    /// Parse `host:port` (or bare `host`) and build a configuration.
    pub fn from_address(
        address: &str,
        username: impl Into<String>,
        auth: AuthMethod,
    ) -> Result<Self, String> {
        let (host, port) = parse_address(address)?;
        Ok(Self::new(host, port, username, auth))
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_compression(mut self, compression: bool) -> Self {
        self.compression = compression;
        self
    }

    pub fn with_connect_retries(mut self, retries: u32, delay: Duration) -> Self {
        self.connect_retries = retries;
        self.retry_delay = delay;
        self
    }

    /// `host:port` rendering used in logs and session listings.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Parse address string into host and port components.
///
/// Supports `host:port` and bare `host` (default port 22). Uses `rsplit_once`
/// so bracketed IPv6 addresses such as `[::1]:22` keep their brackets.
pub(crate) fn parse_address(address: &str) -> Result<(String, u16), String> {
    if let Some((host, port_str)) = address.rsplit_once(':') {
        let port = port_str
            .parse::<u16>()
            .map_err(|e| format!("Invalid port number: {}", e))?;
        Ok((host.to_string(), port))
    } else {
        Ok((address.to_string(), DEFAULT_SSH_PORT))
    }
}

fn env_parse<T: std::str::FromStr>(var: &str) -> Option<T> {
    env::var(var).ok().and_then(|value| value.parse::<T>().ok())
}

/// Resolve the connection timeout value with priority: parameter -> env var -> default
pub(crate) fn resolve_connect_timeout(timeout_param: Option<u64>) -> u64 {
    timeout_param
        .or_else(|| env_parse(CONNECT_TIMEOUT_ENV_VAR))
        .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS)
}

/// Resolve the one-shot command timeout with priority: parameter -> env var -> default
pub(crate) fn resolve_command_timeout(timeout_param: Option<u64>) -> Duration {
    Duration::from_secs(
        timeout_param
            .or_else(|| env_parse(COMMAND_TIMEOUT_ENV_VAR))
            .unwrap_or(DEFAULT_COMMAND_TIMEOUT_SECS),
    )
}

/// Resolve the interactive command timeout with priority: parameter -> env var -> default
pub(crate) fn resolve_shell_timeout(timeout_param: Option<u64>) -> Duration {
    Duration::from_secs(
        timeout_param
            .or_else(|| env_parse(SHELL_TIMEOUT_ENV_VAR))
            .unwrap_or(DEFAULT_SHELL_TIMEOUT_SECS),
    )
}

/// Resolve the connect retry count with priority: parameter -> env var -> default
pub(crate) fn resolve_max_retries(max_retries_param: Option<u32>) -> u32 {
    max_retries_param
        .or_else(|| env_parse(MAX_RETRIES_ENV_VAR))
        .unwrap_or(DEFAULT_MAX_RETRIES)
}

/// Resolve the connect retry delay with priority: parameter -> env var -> default
pub(crate) fn resolve_retry_delay(retry_delay_param: Option<u64>) -> Duration {
    Duration::from_millis(
        retry_delay_param
            .or_else(|| env_parse(RETRY_DELAY_MS_ENV_VAR))
            .unwrap_or(DEFAULT_RETRY_DELAY_MS),
    )
}

/// Resolve the compression setting with priority: parameter -> env var -> default (true)
pub(crate) fn resolve_compression(compress_param: Option<bool>) -> bool {
    if let Some(compress) = compress_param {
        return compress;
    }

    if let Ok(env_compress) = env::var(COMPRESSION_ENV_VAR) {
        return env_compress.eq_ignore_ascii_case("true") || env_compress == "1";
    }

    true
}

/// Resolve the recovery attempt budget with priority: parameter -> env var -> default
pub(crate) fn resolve_max_attempts(max_attempts_param: Option<u32>) -> u32 {
    max_attempts_param
        .or_else(|| env_parse(MAX_ATTEMPTS_ENV_VAR))
        .unwrap_or(DEFAULT_MAX_ATTEMPTS)
}
