//! Session management: connection lifecycle and command framing.
//!
//! A [`Session`] owns one transport connection and at most one interactive PTY
//! channel. It moves through
//!
//! ```text
//! Disconnected <- Connected <-> InteractiveReady
//!                     \              /
//!                      +-> Failed <-+
//! ```
//!
//! only through its own methods. `Failed` is terminal: a fresh
//! [`Session::connect`] is required, there is no automatic reconnection.
//!
//! # Working Directory
//!
//! The session tracks a logical working directory (default `~`).
//!
//! - One-shot execution re-establishes it on every call by prefixing
//!   `cd <dir> &&`, and a bare `cd` updates it from `pwd`.
//! - On the interactive channel the remote shell keeps its own directory; a
//!   bare `cd` is followed by a framed `pwd` to resynchronise the tracked value.
//! - (Re)initializing the interactive channel resets the tracked directory to
//!   whatever the new shell reports. Earlier `cd` state is lost.
//!
//! A one-shot `cd` does not move an already open interactive shell.
//!
//! # Concurrency
//!
//! Every state-changing method takes `&mut self`, so at most one command is in
//! flight per session and the interactive channel has a single reader and
//! writer. The read buffer lives inside the read loop; the only shared value is
//! the [`ActivityClock`], an atomic last-byte timestamp.
//!
//! # Timeouts
//!
//! A timed-out interactive command is not killed. Its trailing output may still
//! arrive. The drain that runs before the next command discards what is already
//! buffered, and every command has its own marker pair, so a late end line
//! cannot complete a later frame. Output that arrives mid-frame without a
//! marker is still best effort. The channel is not reinitialized
//! automatically; callers that need a clean channel call
//! [`Session::initialize_interactive`].

pub(crate) mod compose;
pub mod framing;
pub mod ssh;
pub mod transport;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::auth::CredentialSource;
use crate::config::ConnectionConfig;
use crate::error::SessionError;
use crate::types::CommandResult;

use compose::{compose_one_shot, is_bare_cd, parse_pwd};
use framing::{EndLineWatch, Frame, Markers, PromptWatch, StreamCleaner, extract_frame};
use transport::{Connector, InteractiveChannel, Transport};

/// Terminal type requested for the interactive channel
pub const SHELL_TERM: &str = "dumb";

/// PTY width; wide enough that the echoed command line does not wrap
pub const SHELL_COLS: u32 = 512;

/// PTY height
pub const SHELL_ROWS: u32 = 48;

/// Tracked directory before anything else is known
pub const DEFAULT_DIRECTORY: &str = "~";

/// Quiet period that ends the pre-command drain
const DRAIN_QUIET: Duration = Duration::from_millis(50);

/// Upper bound on the pre-command drain
const DRAIN_MAX: Duration = Duration::from_millis(500);

/// Quiet period that ends the banner/motd drain
const BANNER_QUIET: Duration = Duration::from_millis(300);

/// Upper bound on the banner/motd drain
const BANNER_MAX: Duration = Duration::from_secs(2);

/// Connection state of a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Disconnected,
    Connected,
    InteractiveReady,
    Failed,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Disconnected => write!(f, "disconnected"),
            SessionState::Connected => write!(f, "connected"),
            SessionState::InteractiveReady => write!(f, "interactive_ready"),
            SessionState::Failed => write!(f, "failed"),
        }
    }
}

/// Last-byte-received timestamp shared with timeout checks.
///
/// Cloning shares the underlying atomic.
#[derive(Debug, Clone)]
pub struct ActivityClock {
    epoch: Instant,
    last_ms: Arc<AtomicU64>,
}

impl ActivityClock {
    fn new() -> Self {
        Self {
            epoch: Instant::now(),
            last_ms: Arc::new(AtomicU64::new(0)),
        }
    }

    fn touch(&self) {
        let elapsed = self.epoch.elapsed().as_millis() as u64;
        self.last_ms.fetch_max(elapsed, Ordering::AcqRel);
    }

    /// Time since the last byte arrived on the interactive channel.
    pub fn idle_for(&self) -> Duration {
        let last = Duration::from_millis(self.last_ms.load(Ordering::Acquire));
        self.epoch.elapsed().saturating_sub(last)
    }
}

/// Why a bounded read stopped early.
enum ReadFailure {
    TimedOut(String),
    Cancelled,
    Closed,
}

/// The interactive channel plus the markers installed on it.
struct ShellChannel {
    channel: Box<dyn InteractiveChannel>,
    markers: Markers,
}

fn channel_closed() -> SessionError {
    SessionError::Channel("interactive channel closed by remote".to_string())
}

/// Read until `done` accepts the newest cleaned fragment, the deadline passes
/// or the token is cancelled. Returns everything cleaned so far.
///
/// Each chunk is cleaned once and `done` only sees the new text, so the cost
/// stays linear in the size of the output.
async fn read_until(
    channel: &mut dyn InteractiveChannel,
    deadline: Instant,
    cancel: &CancellationToken,
    activity: &ActivityClock,
    mut done: impl FnMut(&str) -> bool,
) -> Result<String, ReadFailure> {
    let mut cleaner = StreamCleaner::default();
    let mut cleaned = String::with_capacity(4096);

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => return Err(ReadFailure::Cancelled),

            _ = tokio::time::sleep_until(deadline) => {
                cleaned.push_str(&cleaner.finish());
                return Err(ReadFailure::TimedOut(cleaned));
            }

            chunk = channel.read() => match chunk {
                Some(bytes) => {
                    activity.touch();
                    let fresh = cleaner.push(&bytes);
                    cleaned.push_str(&fresh);
                    if !fresh.is_empty() && done(&fresh) {
                        return Ok(cleaned);
                    }
                }
                None => return Err(ReadFailure::Closed),
            },
        }
    }
}

/// Discard whatever is already buffered on the channel.
///
/// Stops after `quiet` without data or `max` in total.
async fn drain(
    channel: &mut dyn InteractiveChannel,
    quiet: Duration,
    max: Duration,
    activity: &ActivityClock,
) -> Result<usize, SessionError> {
    let limit = Instant::now() + max;
    let mut drained = 0;

    loop {
        let now = Instant::now();
        if now >= limit {
            break;
        }
        match tokio::time::timeout(quiet.min(limit - now), channel.read()).await {
            Ok(Some(bytes)) => {
                activity.touch();
                drained += bytes.len();
            }
            Ok(None) => return Err(channel_closed()),
            Err(_) => break,
        }
    }

    if drained > 0 {
        debug!("Drained {} stray byte(s) from interactive channel", drained);
    }
    Ok(drained)
}

impl ShellChannel {
    /// Write one framed command and read until its end marker.
    async fn run_framed(
        &mut self,
        command: &str,
        deadline: Instant,
        cancel: &CancellationToken,
        activity: &ActivityClock,
        timeout: Duration,
    ) -> Result<Frame, SessionError> {
        let ShellChannel { channel, markers } = self;
        let markers = markers.next_frame();

        drain(channel.as_mut(), DRAIN_QUIET, DRAIN_MAX, activity).await?;
        channel.write(markers.wrap(command).as_bytes()).await?;

        let mut watch = EndLineWatch::new(&markers);
        let outcome = read_until(channel.as_mut(), deadline, cancel, activity, |fresh| {
            watch.feed(fresh)
        })
        .await;

        match outcome {
            Ok(cleaned) => {
                let frame = extract_frame(&cleaned, &markers);
                if frame.stale_markers > 0 {
                    warn!(
                        "Discarded {} marker line(s) left by an earlier command before '{}'",
                        frame.stale_markers, command
                    );
                }
                if !frame.saw_start {
                    warn!(
                        "Start marker missing for '{}', captured output from the beginning of the read",
                        command
                    );
                }
                Ok(frame)
            }
            Err(ReadFailure::TimedOut(cleaned)) => Err(SessionError::ShellTimeout {
                timeout,
                idle_for: activity.idle_for(),
                partial_output: extract_frame(&cleaned, &markers).output(),
            }),
            Err(ReadFailure::Cancelled) => Err(SessionError::Cancelled),
            Err(ReadFailure::Closed) => Err(channel_closed()),
        }
    }
}

/// A connection to one remote host.
pub struct Session {
    id: String,
    config: ConnectionConfig,
    state: SessionState,
    transport: Box<dyn Transport>,
    shell: Option<ShellChannel>,
    working_directory: String,
    activity: ActivityClock,
}

impl Session {
    /// Resolve credentials and open the transport.
    ///
    /// Credential source failures surface as
    /// [`SessionError::CredentialDecryption`] before any network activity.
    pub async fn connect(
        connector: &dyn Connector,
        config: ConnectionConfig,
        credentials: &dyn CredentialSource,
    ) -> Result<Self, SessionError> {
        info!(
            "Connecting to {}@{} (auth: {:?})",
            config.username,
            config.address(),
            config.auth
        );

        let secrets = credentials
            .credentials(&config)
            .await
            .map_err(|e| match e {
                SessionError::CredentialDecryption(_) => e,
                other => SessionError::CredentialDecryption(other.to_string()),
            })?;

        let transport = connector.connect(&config, secrets).await?;
        let id = Uuid::new_v4().to_string();
        info!(
            "Session {} connected to {}@{}",
            id,
            config.username,
            config.address()
        );

        Ok(Self::from_transport(id, config, transport))
    }

    pub(crate) fn from_transport(
        id: String,
        config: ConnectionConfig,
        transport: Box<dyn Transport>,
    ) -> Self {
        Self {
            id,
            config,
            state: SessionState::Connected,
            transport,
            shell: None,
            working_directory: DEFAULT_DIRECTORY.to_string(),
            activity: ActivityClock::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn working_directory(&self) -> &str {
        &self.working_directory
    }

    pub fn has_interactive_channel(&self) -> bool {
        self.shell.is_some()
    }

    /// Shared handle on the last-activity timestamp.
    pub fn activity(&self) -> ActivityClock {
        self.activity.clone()
    }

    /// Time since the session last sent or received bytes.
    pub fn idle_for(&self) -> Duration {
        self.activity.idle_for()
    }

    fn ensure_connected(&self) -> Result<(), SessionError> {
        match self.state {
            SessionState::Connected | SessionState::InteractiveReady => Ok(()),
            state => Err(SessionError::NotConnected { state }),
        }
    }

    /// Move to `Failed` when `error` leaves the connection unusable.
    fn record_failure(&mut self, error: SessionError) -> SessionError {
        if error.is_fatal_to_session() {
            warn!("Session {} failed: {}", self.id, error);
            self.state = SessionState::Failed;
            self.shell = None;
        }
        error
    }

    /// Run `command` on a fresh exec channel from the tracked directory.
    ///
    /// A timeout is reported through `CommandResult::timed_out`, not as an
    /// error. The command line actually sent is
    /// `cd <tracked> && <command>` (see [`compose`]).
    pub async fn execute(
        &mut self,
        command: &str,
        timeout: Duration,
    ) -> Result<CommandResult, SessionError> {
        self.ensure_connected()?;

        let composed = compose_one_shot(&self.working_directory, command);
        debug!("Session {} one-shot: {}", self.id, composed);

        let started = std::time::Instant::now();
        let output = match self.transport.run_once(&composed, timeout).await {
            Ok(output) => output,
            Err(e) => return Err(self.record_failure(e)),
        };

        if is_bare_cd(command) && output.exit_code == 0 && !output.timed_out {
            match parse_pwd(&output.stdout) {
                Some(dir) => {
                    debug!("Session {} tracked directory -> {}", self.id, dir);
                    self.working_directory = dir;
                }
                None => warn!("'{}' succeeded but printed no directory", command),
            }
        }

        Ok(CommandResult::new(
            command,
            output.stdout,
            output.stderr,
            output.exit_code,
            started.elapsed().as_millis() as u64,
            self.working_directory.clone(),
            output.timed_out,
        ))
    }

    /// Open (or reopen) the interactive channel and install the sentinels.
    ///
    /// Any previous channel is closed first and the tracked directory resets
    /// to what the new shell reports.
    pub async fn initialize_interactive(&mut self, timeout: Duration) -> Result<(), SessionError> {
        self.ensure_connected()?;

        if let Some(mut previous) = self.shell.take() {
            debug!("Session {} closing previous interactive channel", self.id);
            if let Err(e) = previous.channel.close().await {
                debug!("Error closing previous channel: {}", e);
            }
        }
        self.state = SessionState::Connected;
        self.working_directory = DEFAULT_DIRECTORY.to_string();

        let deadline = Instant::now() + timeout;
        let never = CancellationToken::new();
        let activity = self.activity.clone();

        let channel = match self
            .transport
            .open_interactive(SHELL_TERM, SHELL_COLS, SHELL_ROWS)
            .await
        {
            Ok(channel) => channel,
            Err(e) => return Err(self.record_failure(e)),
        };
        let mut shell = ShellChannel {
            channel,
            markers: Markers::generate(),
        };

        let setup = async {
            drain(shell.channel.as_mut(), BANNER_QUIET, BANNER_MAX, &activity).await?;
            shell
                .channel
                .write(shell.markers.setup_line().as_bytes())
                .await?;

            let mut watch = PromptWatch::new(shell.markers.prompt());
            read_until(shell.channel.as_mut(), deadline, &never, &activity, |fresh| {
                watch.feed(fresh)
            })
            .await
            .map_err(|failure| match failure {
                ReadFailure::TimedOut(partial) => SessionError::ShellTimeout {
                    timeout,
                    idle_for: activity.idle_for(),
                    partial_output: partial,
                },
                ReadFailure::Cancelled => SessionError::Cancelled,
                ReadFailure::Closed => channel_closed(),
            })?;

            shell
                .run_framed("pwd", deadline, &never, &activity, timeout)
                .await
        };

        let frame = match setup.await {
            Ok(frame) => frame,
            Err(e) => return Err(self.record_failure(e)),
        };

        self.working_directory =
            parse_pwd(&frame.output()).unwrap_or_else(|| DEFAULT_DIRECTORY.to_string());
        self.shell = Some(shell);
        self.state = SessionState::InteractiveReady;

        info!(
            "Session {} interactive channel ready in {}",
            self.id, self.working_directory
        );
        Ok(())
    }

    /// Run `command` on the interactive channel.
    pub async fn execute_interactive(
        &mut self,
        command: &str,
        timeout: Duration,
    ) -> Result<CommandResult, SessionError> {
        let never = CancellationToken::new();
        self.execute_interactive_with_cancel(command, timeout, &never)
            .await
    }

    /// Run `command` on the interactive channel, returning
    /// [`SessionError::Cancelled`] as soon as `cancel` fires.
    ///
    /// Cancellation and timeouts only stop the local read; the remote process
    /// keeps running.
    pub async fn execute_interactive_with_cancel(
        &mut self,
        command: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<CommandResult, SessionError> {
        self.ensure_connected()?;
        if self.state != SessionState::InteractiveReady {
            return Err(SessionError::ShellNotInitialized);
        }
        let Some(shell) = self.shell.as_mut() else {
            return Err(SessionError::ShellNotInitialized);
        };

        let started = std::time::Instant::now();
        let deadline = Instant::now() + timeout;
        debug!("Session {} interactive: {}", self.id, command);

        let frame = shell
            .run_framed(command, deadline, cancel, &self.activity, timeout)
            .await;
        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => {
                if let SessionError::ShellTimeout { .. } = e {
                    warn!(
                        "Interactive command '{}' timed out after {:?}; it may still be running remotely",
                        command, timeout
                    );
                }
                return Err(self.record_failure(e));
            }
        };

        let exit_code = frame.exit_code.unwrap_or(-1);
        if exit_code == 0 && is_bare_cd(command) {
            let pwd = shell
                .run_framed("pwd", deadline, cancel, &self.activity, timeout)
                .await;
            match pwd {
                Ok(pwd) => {
                    if let Some(dir) = parse_pwd(&pwd.output()) {
                        debug!("Session {} tracked directory -> {}", self.id, dir);
                        self.working_directory = dir;
                    }
                }
                Err(e) => return Err(self.record_failure(e)),
            }
        }

        Ok(CommandResult::new(
            command,
            frame.output(),
            String::new(),
            exit_code,
            started.elapsed().as_millis() as u64,
            self.working_directory.clone(),
            false,
        ))
    }

    /// Close the interactive channel and the connection.
    ///
    /// Afterwards every operation fails with [`SessionError::NotConnected`].
    pub async fn disconnect(&mut self) -> Result<(), SessionError> {
        if self.state == SessionState::Disconnected {
            return Ok(());
        }

        if let Some(mut shell) = self.shell.take() {
            if let Err(e) = shell.channel.close().await {
                debug!("Error closing interactive channel: {}", e);
            }
        }

        let result = self.transport.disconnect().await;
        self.state = SessionState::Disconnected;
        self.working_directory = DEFAULT_DIRECTORY.to_string();
        info!("Session {} disconnected", self.id);
        result
    }
}
