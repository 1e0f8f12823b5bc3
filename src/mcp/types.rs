//! Serializable response types for the MCP tools.
//!
//! All types implement `Serialize`, `Deserialize` and `JsonSchema` for MCP
//! protocol compatibility. Command results are the library's own
//! [`CommandResult`] and [`RetryResult`], wrapped with the advisory risk tier.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::recovery::RiskLevel;
use crate::session::SessionState;
use crate::types::{CommandResult, RetryResult};

/// Session metadata for listings
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SessionInfo {
    pub session_id: String,
    /// Optional human-readable name for the session (useful for LLM identification)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// `host:port`
    pub host: String,
    pub username: String,
    /// RFC3339 timestamp
    pub connected_at: String,
    /// Absent while a command is running on the session
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<SessionState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<String>,
    /// Whether an interactive shell channel is open
    pub interactive: bool,
    /// A command is currently running on this session
    pub busy: bool,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SessionListResponse {
    /// Registered SSH sessions
    pub sessions: Vec<SessionInfo>,
    /// Total number of sessions
    #[schemars(schema_with = "crate::mcp::schema::uint")]
    pub count: usize,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SshConnectResponse {
    pub session_id: String,
    pub message: String,
    pub authenticated: bool,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SshShellOpenResponse {
    pub session_id: String,
    /// Directory the new shell started in
    pub working_directory: String,
    pub message: String,
}

/// Result of one command plus its advisory risk tier
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SshExecuteResponse {
    pub session_id: String,
    pub risk: RiskLevel,
    pub result: CommandResult,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SshRecoveryResponse {
    pub session_id: String,
    /// Risk tier of the initial command
    pub risk: RiskLevel,
    /// Highest risk tier among all commands that actually ran
    pub highest_risk: RiskLevel,
    pub result: RetryResult,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SshRiskResponse {
    pub command: String,
    pub risk: RiskLevel,
    /// The command matches the critical pattern table
    pub dangerous: bool,
    /// The command matches the high pattern table
    pub requires_confirmation: bool,
    /// Pattern that decided the tier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_pattern: Option<String>,
}
