//! SSH command sessions with marker-framed interactive shells and a bounded
//! diagnose-and-retry loop.
//!
//! - [`session`]: connection lifecycle, one-shot execution with directory
//!   tracking, and command framing over a raw PTY byte stream
//! - [`recovery`]: the retry controller, diagnostic oracles and the command
//!   risk classifier
//! - [`auth`]: authentication strategies and credential sources
//! - [`config`]: connection configuration and parameter/env/default resolution
//! - [`mcp`]: MCP tools exposing all of the above
//!
//! Nothing here is global: sessions, controllers and the MCP registry are
//! plain values constructed by the caller.

pub mod auth;
pub mod config;
pub mod error;
pub mod mcp;
pub mod recovery;
pub mod session;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use error::SessionError;
pub use recovery::RecoveryController;
pub use session::{Session, SessionState};
