//! MCP host surface over the session and recovery layers.
//!
//! - `types`: Serializable response types for MCP tools
//! - `registry`: Explicitly constructed session registry shared by tools
//! - `schema`: JSON Schema helpers
//! - `commands`: MCP tool implementations

pub mod commands;
pub mod registry;
pub mod schema;
pub mod types;

pub use commands::McpSSHCommands;
pub use registry::SessionRegistry;
