//! DashMap-based session registry for the MCP host.
//!
//! The registry is constructed by the binary and shared with every MCP
//! connection through an `Arc`. Each session sits behind its own
//! `tokio::sync::Mutex`, so calls on one session run one at a time in arrival
//! order while different sessions proceed independently.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::session::Session;

use super::types::SessionInfo;

/// A session plus the metadata shown in listings.
pub struct RegisteredSession {
    pub name: Option<String>,
    pub host: String,
    pub username: String,
    pub connected_at: String,
    pub session: Mutex<Session>,
}

impl RegisteredSession {
    /// Snapshot for listings. A session that is running a command reports
    /// `busy` instead of waiting for it.
    pub fn info(&self, session_id: &str) -> SessionInfo {
        let mut info = SessionInfo {
            session_id: session_id.to_string(),
            name: self.name.clone(),
            host: self.host.clone(),
            username: self.username.clone(),
            connected_at: self.connected_at.clone(),
            state: None,
            working_directory: None,
            interactive: false,
            busy: true,
        };
        if let Ok(session) = self.session.try_lock() {
            info.state = Some(session.state());
            info.working_directory = Some(session.working_directory().to_string());
            info.interactive = session.has_interactive_channel();
            info.busy = false;
        }
        info
    }
}

/// Sessions by id.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<String, Arc<RegisteredSession>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connected session under its own id.
    pub fn insert(&self, session: Session, name: Option<String>) -> String {
        let session_id = session.id().to_string();
        let entry = RegisteredSession {
            name,
            host: session.config().address(),
            username: session.config().username.clone(),
            connected_at: chrono::Utc::now().to_rfc3339(),
            session: Mutex::new(session),
        };
        self.sessions.insert(session_id.clone(), Arc::new(entry));
        session_id
    }

    pub fn get(&self, session_id: &str) -> Result<Arc<RegisteredSession>, String> {
        self.sessions
            .get(session_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| format!("No active SSH session with ID: {}", session_id))
    }

    pub fn remove(&self, session_id: &str) -> Option<Arc<RegisteredSession>> {
        self.sessions.remove(session_id).map(|(_, entry)| entry)
    }

    pub fn list(&self) -> Vec<SessionInfo> {
        let mut sessions: Vec<SessionInfo> = self
            .sessions
            .iter()
            .map(|entry| entry.value().info(entry.key()))
            .collect();
        sessions.sort_by(|a, b| a.connected_at.cmp(&b.connected_at));
        sessions
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
