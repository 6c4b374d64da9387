//! Session configuration.

use crate::error::{SessionError, SessionResult};
use std::time::Duration;

/// Session configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Idle time after which a session expires; renewed on every resume
    pub default_ttl: Duration,
    /// Absolute lifetime cap counted from creation
    pub max_ttl: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(3600),  // 1 hour
            max_ttl: Duration::from_secs(86400 * 7), // 7 days
        }
    }
}

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the idle TTL.
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Set the absolute lifetime cap.
    pub fn with_max_ttl(mut self, ttl: Duration) -> Self {
        self.max_ttl = ttl;
        self
    }

    pub fn validate(&self) -> SessionResult<()> {
        if self.default_ttl.is_zero() {
            return Err(SessionError::Config("default_ttl must be positive".to_string()));
        }
        if self.max_ttl < self.default_ttl {
            return Err(SessionError::Config(
                "max_ttl must not be shorter than default_ttl".to_string(),
            ));
        }
        Ok(())
    }
}
