//! Serializable result types shared by the session layer, the recovery loop
//! and the MCP host.
//!
//! All types implement `Serialize`, `Deserialize` and `JsonSchema` so they can
//! be returned from MCP tools unchanged.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Outcome of a single command execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CommandResult {
    /// Command text as submitted by the caller (before directory composition)
    pub command: String,
    pub stdout: String,
    pub stderr: String,
    /// Remote exit code, -1 when none was reported
    pub exit_code: i32,
    /// Wall-clock duration in milliseconds
    #[schemars(schema_with = "crate::mcp::schema::uint")]
    pub duration_ms: u64,
    /// Tracked working directory after the command completed
    pub working_directory: String,
    /// `exit_code == 0` and no protocol-level error or timeout
    pub success: bool,
    /// Whether the command hit its timeout (partial output may be present)
    #[serde(default)]
    pub timed_out: bool,
}

impl CommandResult {
    /// Build a result, deriving `success` from the exit code and timeout flag.
    pub fn new(
        command: impl Into<String>,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
        exit_code: i32,
        duration_ms: u64,
        working_directory: impl Into<String>,
        timed_out: bool,
    ) -> Self {
        Self {
            command: command.into(),
            stdout: stdout.into(),
            stderr: stderr.into(),
            exit_code,
            duration_ms,
            working_directory: working_directory.into(),
            success: exit_code == 0 && !timed_out,
            timed_out,
        }
    }

    /// Result for a command that never produced an exit status because the
    /// channel failed underneath it.
    pub fn protocol_failure(
        command: impl Into<String>,
        error: impl Into<String>,
        duration_ms: u64,
        working_directory: impl Into<String>,
        timed_out: bool,
    ) -> Self {
        Self {
            command: command.into(),
            stdout: String::new(),
            stderr: error.into(),
            exit_code: -1,
            duration_ms,
            working_directory: working_directory.into(),
            success: false,
            timed_out,
        }
    }
}

/// Verdict returned by a diagnostic oracle for a failed command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DiagnosticAnalysis {
    /// Replacement command to try next, if the oracle proposed one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed_command: Option<String>,
    /// Why the command failed
    pub cause: String,
    /// Human-readable description of the fix
    pub solution: String,
    pub fixable: bool,
    /// Something the operator has to do outside the session (install a
    /// package, obtain privileges, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires_action: Option<String>,
    /// False when the oracle itself errored
    pub oracle_success: bool,
}

impl DiagnosticAnalysis {
    /// A fixable verdict with a replacement command.
    pub fn fix(
        fixed_command: impl Into<String>,
        cause: impl Into<String>,
        solution: impl Into<String>,
    ) -> Self {
        Self {
            fixed_command: Some(fixed_command.into()),
            cause: cause.into(),
            solution: solution.into(),
            fixable: true,
            requires_action: None,
            oracle_success: true,
        }
    }

    /// The oracle understood the failure but has no command to offer.
    pub fn unfixable(cause: impl Into<String>, requires_action: Option<String>) -> Self {
        Self {
            fixed_command: None,
            cause: cause.into(),
            solution: String::new(),
            fixable: false,
            requires_action,
            oracle_success: true,
        }
    }

    /// The oracle call itself failed.
    pub fn oracle_failed(error: impl Into<String>) -> Self {
        Self {
            fixed_command: None,
            cause: error.into(),
            solution: String::new(),
            fixable: false,
            requires_action: None,
            oracle_success: false,
        }
    }
}

/// One pass through the recovery loop.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RetryAttempt {
    /// 1-based attempt index
    #[schemars(schema_with = "crate::mcp::schema::uint")]
    pub attempt: u32,
    /// Command text used for this attempt
    pub command: String,
    pub result: CommandResult,
    /// Present only when the attempt failed and was not the last allowed one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<DiagnosticAnalysis>,
}

/// Why the recovery loop stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RetryOutcome {
    /// The last attempt succeeded
    Succeeded,
    /// Every permitted attempt failed
    Exhausted,
    /// The oracle call itself failed
    OracleFailed { error: String },
    /// The oracle declared the failure unfixable
    NotFixable {
        cause: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        requires_action: Option<String>,
    },
    /// The oracle claimed a fix but supplied no command
    NoFixProvided,
}

impl std::fmt::Display for RetryOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RetryOutcome::Succeeded => write!(f, "succeeded"),
            RetryOutcome::Exhausted => write!(f, "attempts exhausted"),
            RetryOutcome::OracleFailed { error } => write!(f, "oracle failed: {}", error),
            RetryOutcome::NotFixable {
                cause,
                requires_action: Some(action),
            } => write!(f, "not fixable: {} (requires: {})", cause, action),
            RetryOutcome::NotFixable { cause, .. } => write!(f, "not fixable: {}", cause),
            RetryOutcome::NoFixProvided => write!(f, "oracle reported a fix without a command"),
        }
    }
}

/// Aggregate result of `execute_with_recovery`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RetryResult {
    pub success: bool,
    /// Result of the last attempt that ran
    pub final_result: CommandResult,
    /// Attempt trail in execution order
    pub attempts: Vec<RetryAttempt>,
    pub outcome: RetryOutcome,
}

impl RetryResult {
    /// Number of attempts that actually ran.
    pub fn total_attempts(&self) -> usize {
        self.attempts.len()
    }
}
