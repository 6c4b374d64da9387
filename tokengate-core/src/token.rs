use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Smallest accepted token length in bytes (128 bits of entropy).
pub const MIN_TOKEN_LENGTH: usize = 16;

/// Default token length in bytes.
pub const DEFAULT_TOKEN_LENGTH: usize = 32;

/// The unit of granularity a token protects.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKey {
    /// Single token shared by every protected resource of the session
    Session,
    /// Token bound to one resource path
    Page(String),
}

impl ActionKey {
    /// Build a page key from a request path or redirect target path.
    ///
    /// Query string and fragment are dropped; an empty path maps to `/`.
    pub fn page(path: &str) -> Self {
        let end = path.find(['?', '#']).unwrap_or(path.len());
        let path = &path[..end];

        if path.is_empty() {
            Self::Page("/".to_string())
        } else if path.starts_with('/') {
            Self::Page(path.to_string())
        } else {
            Self::Page(format!("/{}", path))
        }
    }

    pub fn is_page(&self) -> bool {
        matches!(self, Self::Page(_))
    }
}

impl fmt::Display for ActionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Session => write!(f, "<session>"),
            Self::Page(path) => write!(f, "{}", path),
        }
    }
}

/// A live token held for one action key of one session.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenEntry {
    /// What the token protects
    pub action_key: ActionKey,

    /// URL-safe base64 of the random token bytes
    pub value: String,

    /// Token creation timestamp
    pub created_at: DateTime<Utc>,
}

impl TokenEntry {
    /// Generate a fresh entry with `length` random bytes.
    pub fn generate(action_key: ActionKey, length: usize) -> Self {
        Self {
            action_key,
            value: URL_SAFE_NO_PAD.encode(random_bytes(length)),
            created_at: Utc::now(),
        }
    }
}

// Token values stay out of Debug output so they never end up in logs.
impl fmt::Debug for TokenEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenEntry")
            .field("action_key", &self.action_key)
            .field("value", &"[redacted]")
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Where a presented token can be read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenLocation {
    /// Custom request header (see `GuardConfig::header_name`)
    Header,
    /// Query or form parameter (see `GuardConfig::token_name`)
    Parameter,
}

impl TokenLocation {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenLocation::Header => "header",
            TokenLocation::Parameter => "parameter",
        }
    }
}

/// A token value extracted from an inbound request.
#[derive(Clone, PartialEq, Eq)]
pub struct PresentedToken {
    pub value: String,
    pub location: TokenLocation,
}

impl PresentedToken {
    pub fn new(value: impl Into<String>, location: TokenLocation) -> Self {
        Self {
            value: value.into(),
            location,
        }
    }
}

impl fmt::Debug for PresentedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PresentedToken")
            .field("value", &"[redacted]")
            .field("location", &self.location)
            .finish()
    }
}

pub(crate) fn random_bytes(length: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; length];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_generation() {
        let entry = TokenEntry::generate(ActionKey::Session, DEFAULT_TOKEN_LENGTH);
        assert!(!entry.value.is_empty());

        let decoded = URL_SAFE_NO_PAD.decode(&entry.value).unwrap();
        assert_eq!(decoded.len(), DEFAULT_TOKEN_LENGTH);
    }

    #[test]
    fn test_token_is_url_safe() {
        for _ in 0..32 {
            let entry = TokenEntry::generate(ActionKey::Session, MIN_TOKEN_LENGTH);
            assert!(
                entry
                    .value
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
            );
        }
    }

    #[test]
    fn test_tokens_are_unique() {
        let a = TokenEntry::generate(ActionKey::Session, DEFAULT_TOKEN_LENGTH);
        let b = TokenEntry::generate(ActionKey::Session, DEFAULT_TOKEN_LENGTH);
        assert_ne!(a.value, b.value);
    }

    #[test]
    fn test_page_key_normalization() {
        assert_eq!(ActionKey::page("/transfer"), ActionKey::Page("/transfer".into()));
        assert_eq!(ActionKey::page("/transfer?amount=5"), ActionKey::Page("/transfer".into()));
        assert_eq!(ActionKey::page("/docs#top"), ActionKey::Page("/docs".into()));
        assert_eq!(ActionKey::page("account"), ActionKey::Page("/account".into()));
        assert_eq!(ActionKey::page(""), ActionKey::Page("/".into()));
    }

    #[test]
    fn test_debug_redacts_value() {
        let entry = TokenEntry::generate(ActionKey::Session, DEFAULT_TOKEN_LENGTH);
        let debug = format!("{:?}", entry);
        assert!(!debug.contains(&entry.value));
        assert!(debug.contains("[redacted]"));

        let presented = PresentedToken::new(entry.value.clone(), TokenLocation::Header);
        assert!(!format!("{:?}", presented).contains(&entry.value));
    }
}
