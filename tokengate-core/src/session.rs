//! Session collaborator contract.
//!
//! The gate never owns sessions. It only needs to know the current session
//! of a request, whether that session was created during this request cycle,
//! and to be told when sessions come and go.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Opaque session handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Unique session identifier
    pub id: String,
    /// Session creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            created_at: Utc::now(),
        }
    }
}

/// Fault raised by a session lookup.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct SessionLookupError(pub String);

/// Per-request session access.
pub trait SessionLookup {
    /// The session the request belongs to, if any.
    fn current(&self) -> Result<Option<Session>, SessionLookupError>;

    /// Whether the session was created during this request cycle.
    fn is_new(&self, session: &Session) -> bool;
}

/// Receives session lifecycle notifications.
pub trait SessionListener: Send + Sync {
    fn session_created(&self, session: &Session);

    fn session_destroyed(&self, session_id: &str);
}
