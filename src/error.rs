//! Session error taxonomy and connect-failure classification.
//!
//! [`SessionError`] covers every failure the session layer can surface:
//!
//! 1. **Connect-time failures**: `Connection`, `Authentication` and
//!    `CredentialDecryption`. These are fatal to the connect attempt. Only
//!    `Connection` may be repeated, and only when the caller opts into connect
//!    retries.
//!
//! 2. **Interactive channel failures**: `ShellTimeout`, `ShellNotInitialized`
//!    and `Cancelled`. A timeout leaves the channel in a suspect state; the
//!    remote command may still be running.
//!
//! 3. **Transport failures**: `Channel`, `Transport` and `NotConnected`. These
//!    move a session to `Failed` (or report that it is no longer usable).
//!
//! Oracle failures and "no fix available" verdicts are deliberately absent:
//! the recovery loop reports them as a failed `RetryResult`, never as an error.
//!
//! # Classification Strategy
//!
//! Connect errors raised by the SSH library arrive as free-form messages.
//! [`is_retryable_error`] sorts them the same way for every caller:
//! authentication keywords first (never retryable), then transient network
//! keywords (retryable), then a conservative default.

use std::time::Duration;

use thiserror::Error;

use crate::session::SessionState;

/// Errors produced by the session layer.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Host unreachable, refused, handshake failure or connect timeout.
    #[error("connection failed: {0}")]
    Connection(String),

    /// The server rejected every configured credential.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// The credential source could not produce a usable secret.
    #[error("credential decryption failed: {0}")]
    CredentialDecryption(String),

    /// The server address could not be parsed.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// The end marker did not arrive before the deadline.
    ///
    /// The remote command is not interrupted and its trailing output may be
    /// observed by the next read on the same channel.
    #[error("shell command timed out after {timeout:?} (idle for {idle_for:?})")]
    ShellTimeout {
        timeout: Duration,
        idle_for: Duration,
        partial_output: String,
    },

    /// An interactive call was made before `initialize_interactive`.
    #[error("interactive shell is not initialized")]
    ShellNotInitialized,

    /// The caller cancelled a pending interactive read.
    #[error("interactive read cancelled")]
    Cancelled,

    /// The session was disconnected or has failed.
    #[error("session is not connected (state: {state})")]
    NotConnected { state: SessionState },

    /// The interactive channel failed or was closed by the remote side.
    #[error("channel error: {0}")]
    Channel(String),

    /// One-shot execution failed at the transport level.
    #[error("transport error: {0}")]
    Transport(String),
}

impl SessionError {
    /// Whether a connect attempt that failed with this error may be repeated.
    pub fn is_retryable(&self) -> bool {
        match self {
            SessionError::Connection(message) => is_retryable_error(message),
            _ => false,
        }
    }

    /// Whether this error means the underlying connection cannot be used again.
    pub fn is_fatal_to_session(&self) -> bool {
        matches!(self, SessionError::Channel(_) | SessionError::Transport(_))
    }
}

/// Authentication error patterns that indicate permanent failures.
///
/// These errors will never succeed by retrying and should fail immediately
/// to avoid wasting time and potentially locking out accounts.
const AUTH_ERRORS: &[&str] = &[
    "authentication failed",
    "password authentication failed",
    "key authentication failed",
    "agent authentication failed",
    "permission denied",
    "publickey",
    "auth fail",
    "no authentication",
    "all authentication methods failed",
];

/// Connection error patterns that indicate transient failures.
const RETRYABLE_ERRORS: &[&str] = &[
    "connection refused",
    "connection reset",
    "connection timed out",
    "timeout",
    "timed out",
    "network is unreachable",
    "no route to host",
    "host is down",
    "temporary failure",
    "resource temporarily unavailable",
    "handshake failed",
    "failed to connect",
    "broken pipe",
    "would block",
];

/// Determines if a connect error message describes a transient failure.
///
/// # Classification Rules
///
/// 1. **Authentication failures are NOT retryable**: checked first, so
///    "timeout during authentication failed" is permanent.
///
/// 2. **Connection errors ARE retryable**: refused, reset, timeouts,
///    unreachable networks.
///
/// 3. **Unknown errors**: retryable unless they look like an SSH protocol
///    error, in which case only timeout/connect wording makes them retryable.
pub(crate) fn is_retryable_error(error: &str) -> bool {
    let error_lower = error.to_lowercase();

    if AUTH_ERRORS.iter().any(|auth_err| error_lower.contains(auth_err)) {
        return false;
    }

    if RETRYABLE_ERRORS
        .iter()
        .any(|retryable_err| error_lower.contains(retryable_err))
    {
        return true;
    }

    !error_lower.contains("ssh") || error_lower.contains("timeout") || error_lower.contains("connect")
}
