use crate::error::{GuardError, Result};
use crate::token::{DEFAULT_TOKEN_LENGTH, MIN_TOKEN_LENGTH, TokenLocation};
use http::Method;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use url::Url;

/// Granularity of issued tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenScope {
    /// One token for the whole session
    Global,
    /// One token per protected page
    PerPage,
}

/// What happens to a token after it has been used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationStrictness {
    /// Rotate after every successfully validated request
    Always,
    /// Keep the token; only issue one when none exists
    IfAbsent,
}

/// Gate configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    /// Master switch; when off every request passes through untouched
    pub enabled: bool,

    /// Reject protected requests that arrive without a session
    pub validate_when_no_session_exists: bool,

    /// Answer the first request of a new session with a landing page
    pub use_new_token_landing_page: bool,

    /// Global or per-page tokens
    pub token_scope: TokenScope,

    /// Rotation after successful validation
    pub rotation_strictness: RotationStrictness,

    /// Rotate the checked token after a rejected request
    pub rotate_on_reject: bool,

    /// Where presented tokens are looked for, in priority order
    pub token_locations: Vec<TokenLocation>,

    /// Absolute origins (`scheme://host[:port]`) redirects may carry tokens to
    pub trusted_redirect_origins: Vec<String>,

    /// Parameter name for tokens in queries and forms
    pub token_name: String,

    /// Header name for tokens
    pub header_name: String,

    /// Random bytes per token
    pub token_length: usize,

    /// Mask tokens per response
    pub masking: bool,

    /// Methods never checked for a token
    pub exempt_methods: Vec<String>,

    /// Patterns of protected pages (empty protects every page)
    pub protected_pages: Vec<String>,

    /// Patterns of pages excluded from protection
    pub unprotected_pages: Vec<String>,

    /// Pages whose tokens are created together with the session (per-page scope)
    pub precreate_pages: Vec<String>,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            validate_when_no_session_exists: true,
            use_new_token_landing_page: false,
            token_scope: TokenScope::Global,
            rotation_strictness: RotationStrictness::IfAbsent,
            rotate_on_reject: false,
            token_locations: vec![TokenLocation::Header, TokenLocation::Parameter],
            trusted_redirect_origins: Vec::new(),
            token_name: "csrf_token".to_string(),
            header_name: "X-CSRF-Token".to_string(),
            token_length: DEFAULT_TOKEN_LENGTH,
            masking: false,
            exempt_methods: vec![
                "GET".to_string(),
                "HEAD".to_string(),
                "OPTIONS".to_string(),
                "TRACE".to_string(),
            ],
            protected_pages: Vec::new(),
            unprotected_pages: Vec::new(),
            precreate_pages: Vec::new(),
        }
    }
}

impl GuardConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check invariants the gate relies on.
    pub fn validate(&self) -> Result<()> {
        if self.token_length < MIN_TOKEN_LENGTH {
            return Err(GuardError::Config(format!(
                "token_length must be at least {} bytes, got {}",
                MIN_TOKEN_LENGTH, self.token_length
            )));
        }

        if self.token_name.trim().is_empty() {
            return Err(GuardError::Config("token_name must not be empty".to_string()));
        }

        if self.header_name.trim().is_empty() {
            return Err(GuardError::Config("header_name must not be empty".to_string()));
        }

        if self.token_locations.is_empty() {
            return Err(GuardError::Config(
                "at least one token location is required".to_string(),
            ));
        }

        self.exempt_methods()?;
        self.trusted_origins()?;

        Ok(())
    }

    /// Exempt methods parsed into [`Method`]s.
    pub fn exempt_methods(&self) -> Result<Vec<Method>> {
        self.exempt_methods
            .iter()
            .map(|m| {
                Method::from_bytes(m.trim().to_ascii_uppercase().as_bytes())
                    .map_err(|_| GuardError::Config(format!("invalid HTTP method: {}", m)))
            })
            .collect()
    }

    /// Trusted origins in their ASCII serialization (`https://app.example`).
    pub fn trusted_origins(&self) -> Result<HashSet<String>> {
        self.trusted_redirect_origins
            .iter()
            .map(|origin| {
                let url = Url::parse(origin).map_err(|e| {
                    GuardError::Config(format!("invalid redirect origin {}: {}", origin, e))
                })?;
                let origin = url.origin();
                if !origin.is_tuple() {
                    return Err(GuardError::Config(format!(
                        "redirect origin {} has no host",
                        url
                    )));
                }
                Ok(origin.ascii_serialization())
            })
            .collect()
    }

    /// Enable or disable the gate
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Set whether protected requests need a session
    pub fn with_validate_when_no_session_exists(mut self, validate: bool) -> Self {
        self.validate_when_no_session_exists = validate;
        self
    }

    /// Set new-session landing page mode
    pub fn with_new_token_landing_page(mut self, enabled: bool) -> Self {
        self.use_new_token_landing_page = enabled;
        self
    }

    /// Set token scope
    pub fn with_token_scope(mut self, scope: TokenScope) -> Self {
        self.token_scope = scope;
        self
    }

    /// Set rotation strictness
    pub fn with_rotation_strictness(mut self, strictness: RotationStrictness) -> Self {
        self.rotation_strictness = strictness;
        self
    }

    /// Rotate tokens after rejected requests
    pub fn with_rotate_on_reject(mut self, rotate: bool) -> Self {
        self.rotate_on_reject = rotate;
        self
    }

    /// Set token lookup order
    pub fn with_token_locations(mut self, locations: Vec<TokenLocation>) -> Self {
        self.token_locations = locations;
        self
    }

    /// Add a trusted redirect origin
    pub fn with_trusted_origin(mut self, origin: impl Into<String>) -> Self {
        self.trusted_redirect_origins.push(origin.into());
        self
    }

    /// Set parameter name
    pub fn with_token_name(mut self, name: impl Into<String>) -> Self {
        self.token_name = name.into();
        self
    }

    /// Set header name
    pub fn with_header_name(mut self, name: impl Into<String>) -> Self {
        self.header_name = name.into();
        self
    }

    /// Set token length in bytes
    pub fn with_token_length(mut self, length: usize) -> Self {
        self.token_length = length;
        self
    }

    /// Enable per-response token masking
    pub fn with_masking(mut self, masking: bool) -> Self {
        self.masking = masking;
        self
    }

    /// Replace exempt methods
    pub fn with_exempt_methods(mut self, methods: Vec<String>) -> Self {
        self.exempt_methods = methods;
        self
    }

    /// Replace protected page patterns
    pub fn with_protected_pages(mut self, pages: Vec<String>) -> Self {
        self.protected_pages = pages;
        self
    }

    /// Replace unprotected page patterns
    pub fn with_unprotected_pages(mut self, pages: Vec<String>) -> Self {
        self.unprotected_pages = pages;
        self
    }

    /// Replace pages precreated at session start
    pub fn with_precreate_pages(mut self, pages: Vec<String>) -> Self {
        self.precreate_pages = pages;
        self
    }
}
