//! Execution modes the recovery loop can drive.
//!
//! The controller is mode agnostic: it only needs something that turns a
//! command line into a [`CommandResult`]. Both executors borrow the session
//! mutably for their whole lifetime, so nothing else can interleave commands
//! on it while a recovery loop runs.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::SessionError;
use crate::session::Session;
use crate::types::CommandResult;

/// Runs one attempt of a recovery loop.
#[async_trait]
pub trait CommandExecutor: Send {
    /// Run `command` to completion.
    ///
    /// A failing command is an `Ok` result with `success == false`. `Err` is
    /// reserved for failures of the session itself.
    async fn run(&mut self, command: &str) -> Result<CommandResult, SessionError>;
}

/// Runs every attempt on a fresh exec channel.
pub struct OneShotExecutor<'a> {
    session: &'a mut Session,
    timeout: Duration,
}

impl<'a> OneShotExecutor<'a> {
    pub fn new(session: &'a mut Session, timeout: Duration) -> Self {
        Self { session, timeout }
    }
}

#[async_trait]
impl CommandExecutor for OneShotExecutor<'_> {
    async fn run(&mut self, command: &str) -> Result<CommandResult, SessionError> {
        self.session.execute(command, self.timeout).await
    }
}

/// Runs every attempt on the session's interactive channel.
///
/// Timeouts and cancellation become failed results with `timed_out` set, so
/// they go through diagnosis like any other failure.
pub struct InteractiveExecutor<'a> {
    session: &'a mut Session,
    timeout: Duration,
    cancel: CancellationToken,
}

impl<'a> InteractiveExecutor<'a> {
    pub fn new(session: &'a mut Session, timeout: Duration) -> Self {
        Self {
            session,
            timeout,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

#[async_trait]
impl CommandExecutor for InteractiveExecutor<'_> {
    async fn run(&mut self, command: &str) -> Result<CommandResult, SessionError> {
        let started = Instant::now();
        let outcome = self
            .session
            .execute_interactive_with_cancel(command, self.timeout, &self.cancel)
            .await;
        let elapsed = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(result) => Ok(result),
            Err(SessionError::ShellTimeout {
                timeout,
                partial_output,
                ..
            }) => Ok(CommandResult::new(
                command,
                partial_output,
                format!("command timed out after {:?}", timeout),
                -1,
                elapsed,
                self.session.working_directory(),
                true,
            )),
            Err(SessionError::Cancelled) => Ok(CommandResult::protocol_failure(
                command,
                SessionError::Cancelled.to_string(),
                elapsed,
                self.session.working_directory(),
                true,
            )),
            Err(e) => Err(e),
        }
    }
}
