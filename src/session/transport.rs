//! Transport boundary consumed by [`Session`](super::Session).
//!
//! The session never touches handshake or channel details directly. It talks
//! to three traits:
//!
//! - [`Connector`]: opens an authenticated [`Transport`] from a config and
//!   resolved credentials.
//! - [`Transport`]: one-shot execution and allocation of a PTY channel.
//! - [`InteractiveChannel`]: the raw duplex byte stream of that PTY.
//!
//! The russh implementation lives in [`super::ssh`]; tests use scripted
//! in-memory implementations.

use std::time::Duration;

use async_trait::async_trait;

use crate::auth::Credentials;
use crate::config::ConnectionConfig;
use crate::error::SessionError;

/// Raw output of a one-shot execution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
    /// -1 when the remote side reported no exit status
    pub exit_code: i32,
    /// Partial output was returned because the timeout elapsed
    pub timed_out: bool,
}

/// Opens authenticated transports.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(
        &self,
        config: &ConnectionConfig,
        credentials: Credentials,
    ) -> Result<Box<dyn Transport>, SessionError>;
}

/// An authenticated connection to one remote host.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Run one command on a fresh exec channel and collect its output.
    ///
    /// A timeout is not an error: partial output comes back with
    /// `timed_out = true`.
    async fn run_once(&self, command: &str, timeout: Duration) -> Result<ExecOutput, SessionError>;

    /// Allocate a pseudo-terminal channel running the remote login shell.
    async fn open_interactive(
        &self,
        term: &str,
        cols: u32,
        rows: u32,
    ) -> Result<Box<dyn InteractiveChannel>, SessionError>;

    /// Close the connection.
    async fn disconnect(&self) -> Result<(), SessionError>;
}

/// Raw duplex byte stream to a remote shell.
#[async_trait]
pub trait InteractiveChannel: Send {
    async fn write(&mut self, data: &[u8]) -> Result<(), SessionError>;

    /// Next chunk of output, `None` once the remote side closed the channel.
    ///
    /// Must be cancel safe: the session races it against deadlines.
    async fn read(&mut self) -> Option<Vec<u8>>;

    async fn close(&mut self) -> Result<(), SessionError>;
}
