//! russh implementation of the transport boundary.
//!
//! ## Connection Lifecycle
//!
//! 1. **Client Configuration**: inactivity timeout, keepalive and compression
//!    preference ([`build_client_config`]).
//!
//! 2. **Connection Establishment**: TCP connect plus SSH handshake, bounded by
//!    the configured connect timeout.
//!
//! 3. **Authentication**: the [`AuthChain`] built from the configured method and
//!    the resolved credentials.
//!
//! ## Retry Strategy
//!
//! Connect retries are opt-in (`connect_retries`, default 0). When enabled they
//! use exponential backoff with jitter via the `backon` crate, capped at
//! [`MAX_RETRY_DELAY`], and only for errors [`SessionError::is_retryable`]
//! accepts. Authentication and credential failures are never retried to avoid
//! account lockouts.
//!
//! ## Host Keys
//!
//! [`SshClientHandler`] accepts all server keys, like
//! `StrictHostKeyChecking=no`.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use russh::{ChannelMsg, Disconnect, client, keys};
use tracing::{debug, error, info, warn};

use crate::auth::{AuthChain, AuthStrategy, Credentials};
use crate::config::{ConnectionConfig, MAX_RETRY_DELAY};
use crate::error::SessionError;

use super::transport::{Connector, ExecOutput, InteractiveChannel, Transport};

/// Client handler for russh that accepts all host keys.
pub struct SshClientHandler;

impl client::Handler for SshClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &keys::PublicKey,
    ) -> Result<bool, Self::Error> {
        // TODO: verify against known_hosts once a host key store is configurable
        Ok(true)
    }
}

/// Build russh client configuration.
///
/// The inactivity timeout is disabled: sessions are long lived and every
/// command carries its own bounded timeout. Keepalives detect dead peers.
pub(crate) fn build_client_config(compress: bool) -> Arc<client::Config> {
    let compression = if compress {
        (&[russh::compression::ZLIB, russh::compression::NONE][..]).into()
    } else {
        (&[russh::compression::NONE][..]).into()
    };

    let preferred = russh::Preferred {
        compression,
        ..Default::default()
    };

    Arc::new(client::Config {
        inactivity_timeout: None,
        keepalive_interval: Some(Duration::from_secs(30)),
        keepalive_max: 3,
        preferred,
        ..Default::default()
    })
}

/// Opens [`SshTransport`]s with russh.
#[derive(Debug, Default, Clone, Copy)]
pub struct SshConnector;

#[async_trait]
impl Connector for SshConnector {
    async fn connect(
        &self,
        config: &ConnectionConfig,
        credentials: Credentials,
    ) -> Result<Box<dyn Transport>, SessionError> {
        let (handle, retry_count) = connect_with_retry(config, credentials).await?;
        if retry_count > 0 {
            info!(
                "SSH connection to {}@{} succeeded after {} retry attempt(s)",
                config.username,
                config.address(),
                retry_count
            );
        }
        Ok(Box::new(SshTransport { handle }))
    }
}

/// Connect with optional retries, returning the handle and the number of
/// retries that were needed.
async fn connect_with_retry(
    config: &ConnectionConfig,
    credentials: Credentials,
) -> Result<(client::Handle<SshClientHandler>, u32), SessionError> {
    let attempt_counter = AtomicU32::new(0);
    let address = config.address();

    let backoff = ExponentialBuilder::default()
        .with_min_delay(config.retry_delay)
        .with_max_delay(MAX_RETRY_DELAY)
        .with_max_times(config.connect_retries as usize)
        .with_jitter();

    let result = (|| async {
        let current_attempt = attempt_counter.fetch_add(1, Ordering::SeqCst);
        if current_attempt > 0 {
            warn!(
                "SSH connection retry attempt {} to {}@{}",
                current_attempt, config.username, address
            );
        }
        connect_once(config, credentials.clone()).await
    })
    .retry(backoff)
    .when(|e: &SessionError| {
        let retryable = e.is_retryable();
        if !retryable {
            warn!(
                "SSH connection to {}@{} failed with non-retryable error: {}",
                config.username, address, e
            );
        }
        retryable
    })
    .notify(|err, dur| {
        warn!("SSH connection failed: {}. Retrying in {:?}", err, dur);
    })
    .await;

    let total_attempts = attempt_counter.load(Ordering::SeqCst);

    match result {
        Ok(handle) => Ok((handle, total_attempts.saturating_sub(1))),
        Err(e) => {
            error!(
                "SSH connection to {}@{} failed after {} attempt(s). Last error: {}",
                config.username, address, total_attempts, e
            );
            Err(e)
        }
    }
}

/// Establish one SSH connection and authenticate.
async fn connect_once(
    config: &ConnectionConfig,
    credentials: Credentials,
) -> Result<client::Handle<SshClientHandler>, SessionError> {
    let chain = AuthChain::for_method(&config.auth, credentials)?;
    let client_config = build_client_config(config.compression);

    let connect_future = client::connect(
        client_config,
        (config.host.as_str(), config.port),
        SshClientHandler,
    );

    let mut handle = tokio::time::timeout(config.connect_timeout, connect_future)
        .await
        .map_err(|_| {
            SessionError::Connection(format!(
                "connection timed out after {:?}",
                config.connect_timeout
            ))
        })?
        .map_err(|e| SessionError::Connection(format!("failed to connect: {}", e)))?;

    if !chain.authenticate(&mut handle, &config.username).await? {
        return Err(SessionError::Authentication(
            "no authentication methods succeeded".to_string(),
        ));
    }

    Ok(handle)
}

/// An authenticated russh connection.
pub struct SshTransport {
    handle: client::Handle<SshClientHandler>,
}

#[async_trait]
impl Transport for SshTransport {
    async fn run_once(&self, command: &str, timeout: Duration) -> Result<ExecOutput, SessionError> {
        let mut channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(|e| SessionError::Transport(format!("failed to open channel: {}", e)))?;

        channel
            .exec(true, command)
            .await
            .map_err(|e| SessionError::Transport(format!("failed to execute command: {}", e)))?;

        let mut stdout = Vec::with_capacity(4096);
        let mut stderr = Vec::with_capacity(1024);
        let mut exit_code: Option<u32> = None;

        let result = tokio::time::timeout(timeout, async {
            loop {
                match channel.wait().await {
                    Some(ChannelMsg::Data { data }) => stdout.extend_from_slice(&data),
                    // ext == 1 is stderr in SSH protocol
                    Some(ChannelMsg::ExtendedData { data, ext: 1 }) => {
                        stderr.extend_from_slice(&data)
                    }
                    Some(ChannelMsg::ExitStatus { exit_status }) => exit_code = Some(exit_status),
                    Some(ChannelMsg::Eof) => {
                        if exit_code.is_some() {
                            break;
                        }
                    }
                    Some(ChannelMsg::Close) | None => break,
                    Some(_) => {}
                }
            }
        })
        .await;

        let timed_out = result.is_err();
        if timed_out {
            warn!(
                "Command timed out after {:?}, returning partial output ({} bytes stdout, {} bytes stderr)",
                timeout,
                stdout.len(),
                stderr.len()
            );
        }

        // Always close the channel gracefully to keep the session alive
        let _ = channel.close().await;

        Ok(ExecOutput {
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
            exit_code: exit_code.map(|c| c as i32).unwrap_or(-1),
            timed_out,
        })
    }

    async fn open_interactive(
        &self,
        term: &str,
        cols: u32,
        rows: u32,
    ) -> Result<Box<dyn InteractiveChannel>, SessionError> {
        let mut channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(|e| SessionError::Channel(format!("failed to open channel: {}", e)))?;

        channel
            .request_pty(false, term, cols, rows, 0, 0, &[])
            .await
            .map_err(|e| SessionError::Channel(format!("failed to request PTY: {}", e)))?;

        channel
            .request_shell(true)
            .await
            .map_err(|e| SessionError::Channel(format!("failed to start shell: {}", e)))?;

        debug!("Opened interactive {} channel ({}x{})", term, cols, rows);
        Ok(Box::new(SshChannel { channel }))
    }

    async fn disconnect(&self) -> Result<(), SessionError> {
        self.handle
            .disconnect(Disconnect::ByApplication, "Session closed by user", "en")
            .await
            .map_err(|e| SessionError::Transport(format!("error during disconnect: {}", e)))
    }
}

/// PTY channel over russh.
pub struct SshChannel {
    channel: russh::Channel<client::Msg>,
}

#[async_trait]
impl InteractiveChannel for SshChannel {
    async fn write(&mut self, data: &[u8]) -> Result<(), SessionError> {
        self.channel
            .data(data)
            .await
            .map_err(|e| SessionError::Channel(format!("failed to write to shell: {}", e)))
    }

    async fn read(&mut self) -> Option<Vec<u8>> {
        loop {
            match self.channel.wait().await {
                Some(ChannelMsg::Data { data }) => return Some(data.to_vec()),
                Some(ChannelMsg::ExtendedData { data, .. }) => return Some(data.to_vec()),
                Some(ChannelMsg::Eof) | Some(ChannelMsg::Close) | None => return None,
                Some(_) => {}
            }
        }
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        self.channel
            .close()
            .await
            .map_err(|e| SessionError::Channel(format!("failed to close shell channel: {}", e)))
    }
}
