//! In-memory session registry.

use crate::config::SessionConfig;
use crate::error::{SessionError, SessionResult};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokengate_core::{Session, SessionListener, SessionLookup, SessionLookupError};
use tracing::{debug, trace};

const MAX_SESSION_ID_LENGTH: usize = 128;

/// Generate a new session ID.
pub fn generate_session_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[derive(Debug, Clone)]
struct SessionRecord {
    session: Session,
    last_accessed_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl SessionRecord {
    fn new(session: Session, config: &SessionConfig) -> Self {
        let now = session.created_at;
        let mut record = Self {
            session,
            last_accessed_at: now,
            expires_at: now,
        };
        record.touch(now, config);
        record
    }

    fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Slide the idle deadline, never past the absolute cap.
    fn touch(&mut self, now: DateTime<Utc>, config: &SessionConfig) {
        let idle = add_ttl(now, config.default_ttl);
        let cap = add_ttl(self.session.created_at, config.max_ttl);
        self.last_accessed_at = now;
        self.expires_at = idle.min(cap);
    }
}

fn add_ttl(instant: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|ttl| instant.checked_add_signed(ttl))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

fn validate_session_id(session_id: &str) -> SessionResult<()> {
    let well_formed = !session_id.is_empty()
        && session_id.len() <= MAX_SESSION_ID_LENGTH
        && session_id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');

    if well_formed {
        Ok(())
    } else {
        Err(SessionError::InvalidSessionId(
            "expected 1-128 characters of [A-Za-z0-9_-]".to_string(),
        ))
    }
}

/// Session registry with sliding expiry and lifecycle listeners.
///
/// Listeners are told about every session that is created and every session
/// that ends, whether by invalidation or by expiry. Registering a
/// [`tokengate_core::RequestGate`] as a listener keeps its token store in
/// step with the registry.
pub struct MemorySessionStore {
    config: SessionConfig,
    sessions: DashMap<String, SessionRecord>,
    listeners: Vec<Arc<dyn SessionListener>>,
}

impl MemorySessionStore {
    pub fn new(config: SessionConfig) -> SessionResult<Self> {
        config.validate()?;
        debug!(
            default_ttl_secs = config.default_ttl.as_secs(),
            max_ttl_secs = config.max_ttl.as_secs(),
            "Creating in-memory session store"
        );

        Ok(Self {
            config,
            sessions: DashMap::new(),
            listeners: Vec::new(),
        })
    }

    /// Register a lifecycle listener.
    pub fn with_listener(mut self, listener: Arc<dyn SessionListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Start a new session.
    pub fn create(&self) -> Session {
        let session = Session::new(generate_session_id());
        self.sessions.insert(
            session.id.clone(),
            SessionRecord::new(session.clone(), &self.config),
        );

        debug!(sessions = self.sessions.len(), "Session created");
        for listener in &self.listeners {
            listener.session_created(&session);
        }
        session
    }

    /// Look up a live session and renew its idle deadline.
    pub fn resume(&self, session_id: &str) -> SessionResult<Session> {
        self.resume_at(session_id, Utc::now())
    }

    /// [`resume`](Self::resume) at an explicit instant.
    pub fn resume_at(&self, session_id: &str, now: DateTime<Utc>) -> SessionResult<Session> {
        validate_session_id(session_id)?;

        match self.sessions.get_mut(session_id) {
            None => return Err(SessionError::NotFound),
            Some(mut record) => {
                if !record.is_expired_at(now) {
                    record.touch(now, &self.config);
                    return Ok(record.session.clone());
                }
            }
        }

        if self
            .sessions
            .remove_if(session_id, |_, record| record.is_expired_at(now))
            .is_some()
        {
            debug!("Session expired on access");
            self.notify_destroyed(session_id);
        }
        Err(SessionError::Expired)
    }

    /// End a session. Returns whether it existed.
    pub fn invalidate(&self, session_id: &str) -> bool {
        if self.sessions.remove(session_id).is_none() {
            trace!("Invalidation requested for unknown session");
            return false;
        }

        debug!(sessions = self.sessions.len(), "Session invalidated");
        self.notify_destroyed(session_id);
        true
    }

    /// Remove every expired session. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Utc::now())
    }

    /// [`purge_expired`](Self::purge_expired) at an explicit instant.
    pub fn purge_expired_at(&self, now: DateTime<Utc>) -> usize {
        let expired: Vec<String> = self
            .sessions
            .iter()
            .filter(|entry| entry.value().is_expired_at(now))
            .map(|entry| entry.key().clone())
            .collect();

        let mut purged = 0;
        for session_id in expired {
            if self
                .sessions
                .remove_if(&session_id, |_, record| record.is_expired_at(now))
                .is_some()
            {
                self.notify_destroyed(&session_id);
                purged += 1;
            }
        }

        if purged > 0 {
            debug!(purged = purged, "Purged expired sessions");
        }
        purged
    }

    /// Last access time of a live session.
    pub fn last_accessed(&self, session_id: &str) -> Option<DateTime<Utc>> {
        self.sessions
            .get(session_id)
            .map(|record| record.last_accessed_at)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Session view for a request carrying `session_id` (usually the value
    /// of the session cookie). Unknown, expired and malformed ids resolve to
    /// no session.
    pub fn bind(&self, session_id: Option<&str>) -> RequestSessions {
        let session = session_id.and_then(|id| match self.resume(id) {
            Ok(session) => Some(session),
            Err(e) => {
                trace!(error = %e, "No live session for request");
                None
            }
        });
        RequestSessions::new(session, false)
    }

    /// Like [`bind`](Self::bind), but starts a session when none is live.
    /// A session started here reports itself as new to the gate.
    pub fn bind_or_create(&self, session_id: Option<&str>) -> RequestSessions {
        let bound = self.bind(session_id);
        if bound.session().is_some() {
            return bound;
        }
        RequestSessions::new(Some(self.create()), true)
    }

    fn notify_destroyed(&self, session_id: &str) {
        for listener in &self.listeners {
            listener.session_destroyed(session_id);
        }
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self {
            config: SessionConfig::default(),
            sessions: DashMap::new(),
            listeners: Vec::new(),
        }
    }
}

/// The session of one request.
#[derive(Debug, Clone)]
pub struct RequestSessions {
    session: Option<Session>,
    created: bool,
}

impl RequestSessions {
    pub fn new(session: Option<Session>, created: bool) -> Self {
        Self { session, created }
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Whether the session was started while handling this request.
    pub fn created(&self) -> bool {
        self.created
    }
}

impl SessionLookup for RequestSessions {
    fn current(&self) -> Result<Option<Session>, SessionLookupError> {
        Ok(self.session.clone())
    }

    fn is_new(&self, session: &Session) -> bool {
        self.created
            && self
                .session
                .as_ref()
                .is_some_and(|current| current.id == session.id)
    }
}
