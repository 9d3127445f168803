//! Per-client session records created by `initialize`.
//!
//! Sessions are never updated or expired and are not checked by the other
//! methods; they live until the process exits.

use std::collections::HashMap;
use std::fmt;

use parking_lot::RwLock;
use uuid::Uuid;

use crate::mcp::types::{ClientCapabilities, ImplementationInfo};

/// Opaque, server-generated session identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    fn generate() -> Self {
        Self(format!("session-{}", Uuid::new_v4()))
    }

    /// The identifier as sent in the `Mcp-Session-Id` header.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What a client declared when it initialised.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    /// The session's identifier.
    pub id: SessionId,
    /// Capabilities declared by the client.
    pub client_capabilities: ClientCapabilities,
    /// Client name and version, if sent.
    pub client_info: Option<ImplementationInfo>,
    /// Protocol version requested by the client.
    pub protocol_version: String,
}

/// Map from session identifier to session record.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<SessionId, Session>>,
}

impl SessionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a new session and returns its freshly minted identifier.
    pub fn create(
        &self,
        client_capabilities: ClientCapabilities,
        client_info: Option<ImplementationInfo>,
        protocol_version: String,
    ) -> SessionId {
        let id = SessionId::generate();
        let session = Session {
            id: id.clone(),
            client_capabilities,
            client_info,
            protocol_version,
        };

        self.sessions.write().insert(id.clone(), session);
        id
    }

    /// Returns a copy of the session with the given identifier.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Session> {
        self.sessions
            .read()
            .get(&SessionId(id.to_string()))
            .cloned()
    }

    /// Whether a session with this identifier exists.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.sessions.read().contains_key(&SessionId(id.to_string()))
    }

    /// Number of sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    /// Whether the store holds no sessions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}
