//! Session registry for tokengate.
//!
//! Provides the session side of the gate's collaborator contract: an
//! in-memory registry with sliding expiry whose lifecycle events drive the
//! gate's token store, and a per-request [`RequestSessions`] view that
//! implements [`tokengate_core::SessionLookup`].
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use tokengate_core::{GuardConfig, RequestGate, SessionLookup, TokenStore};
//! use tokengate_session::{MemorySessionStore, SessionConfig};
//!
//! let gate = Arc::new(RequestGate::new(GuardConfig::default()).unwrap());
//! let sessions = MemorySessionStore::new(SessionConfig::default())
//!     .unwrap()
//!     .with_listener(gate.clone());
//!
//! // First request without a cookie starts a session
//! let request_sessions = sessions.bind_or_create(None);
//! let session = request_sessions.current().unwrap().unwrap();
//! assert!(request_sessions.is_new(&session));
//! assert_eq!(gate.store().token_count(&session.id), 1);
//!
//! // Logout drops the session's tokens
//! sessions.invalidate(&session.id);
//! assert_eq!(gate.store().token_count(&session.id), 0);
//! ```

pub mod config;
pub mod error;
pub mod store;

pub use config::SessionConfig;
pub use error::{SessionError, SessionResult};
pub use store::{MemorySessionStore, RequestSessions, generate_session_id};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::SessionConfig;
    pub use crate::error::{SessionError, SessionResult};
    pub use crate::store::{MemorySessionStore, RequestSessions, generate_session_id};
}
