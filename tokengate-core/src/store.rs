//! Session-scoped token storage
//!
//! The in-memory store uses DashMap so that sessions living in different
//! shards never contend. Every mutation of a session's bag happens under
//! that session's shard entry lock, which makes `issue`, `rotate` and
//! `consume` atomic per `(session, action key)`.

use crate::token::{ActionKey, DEFAULT_TOKEN_LENGTH, TokenEntry};
use dashmap::DashMap;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use tracing::{debug, trace};

/// Token storage keyed by session id and action key.
pub trait TokenStore: Send + Sync {
    /// Current entry, if any.
    fn get(&self, session_id: &str, key: &ActionKey) -> Option<TokenEntry>;

    /// Existing entry, or a freshly created one. The first issuer wins when
    /// several requests race.
    fn issue(&self, session_id: &str, key: &ActionKey) -> TokenEntry;

    /// Replace the entry with a new value that differs from the previous one.
    fn rotate(&self, session_id: &str, key: &ActionKey) -> TokenEntry;

    /// Rotate the entry only if `check` accepts its current value, returning
    /// the replacement. Checking and replacing happen as one step, so a
    /// value passes `check` at most once. `None` when the entry is absent or
    /// the check fails; the entry is left unchanged then.
    fn consume(
        &self,
        session_id: &str,
        key: &ActionKey,
        check: &dyn Fn(&TokenEntry) -> bool,
    ) -> Option<TokenEntry>;

    /// Forget every entry of the session. Unknown sessions are a no-op.
    fn drop_session(&self, session_id: &str);

    /// Number of sessions with at least one entry.
    fn session_count(&self) -> usize;

    /// Number of entries held for a session.
    fn token_count(&self, session_id: &str) -> usize;
}

/// In-memory token store
pub struct MemoryTokenStore {
    sessions: DashMap<String, HashMap<ActionKey, TokenEntry>>,
    token_length: usize,
}

impl MemoryTokenStore {
    pub fn new(token_length: usize) -> Self {
        debug!(token_length = token_length, "Creating in-memory token store");
        Self {
            sessions: DashMap::new(),
            token_length,
        }
    }

    pub fn token_length(&self) -> usize {
        self.token_length
    }
}

impl Default for MemoryTokenStore {
    fn default() -> Self {
        Self::new(DEFAULT_TOKEN_LENGTH)
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self, session_id: &str, key: &ActionKey) -> Option<TokenEntry> {
        self.sessions
            .get(session_id)
            .and_then(|tokens| tokens.get(key).cloned())
    }

    fn issue(&self, session_id: &str, key: &ActionKey) -> TokenEntry {
        let mut tokens = self.sessions.entry(session_id.to_string()).or_default();

        match tokens.entry(key.clone()) {
            Entry::Occupied(existing) => existing.get().clone(),
            Entry::Vacant(slot) => {
                debug!(action_key = %key, "Issuing token");
                slot.insert(TokenEntry::generate(key.clone(), self.token_length))
                    .clone()
            }
        }
    }

    fn rotate(&self, session_id: &str, key: &ActionKey) -> TokenEntry {
        let mut tokens = self.sessions.entry(session_id.to_string()).or_default();

        let mut fresh = TokenEntry::generate(key.clone(), self.token_length);
        if let Some(previous) = tokens.get(key) {
            while fresh.value == previous.value {
                fresh = TokenEntry::generate(key.clone(), self.token_length);
            }
        }

        debug!(action_key = %key, "Rotating token");
        tokens.insert(key.clone(), fresh.clone());
        fresh
    }

    fn consume(
        &self,
        session_id: &str,
        key: &ActionKey,
        check: &dyn Fn(&TokenEntry) -> bool,
    ) -> Option<TokenEntry> {
        let mut tokens = self.sessions.get_mut(session_id)?;

        let previous = match tokens.get(key) {
            Some(current) if check(current) => current.value.clone(),
            Some(_) => {
                trace!(action_key = %key, "Consume check failed");
                return None;
            }
            None => return None,
        };

        let mut fresh = TokenEntry::generate(key.clone(), self.token_length);
        while fresh.value == previous {
            fresh = TokenEntry::generate(key.clone(), self.token_length);
        }

        debug!(action_key = %key, "Consumed token");
        tokens.insert(key.clone(), fresh.clone());
        Some(fresh)
    }

    fn drop_session(&self, session_id: &str) {
        if let Some((_, tokens)) = self.sessions.remove(session_id) {
            debug!(tokens = tokens.len(), "Dropped session tokens");
        } else {
            trace!("Drop requested for unknown session");
        }
    }

    fn session_count(&self) -> usize {
        self.sessions.len()
    }

    fn token_count(&self, session_id: &str) -> usize {
        self.sessions
            .get(session_id)
            .map(|tokens| tokens.len())
            .unwrap_or(0)
    }
}
