//! Request gatekeeping.
//!
//! [`RequestGate::handle`] runs once per inbound request. It decides whether
//! the request is forwarded, rejected, or answered with the new-token landing
//! page, and keeps the session's tokens current afterwards.

use crate::config::{GuardConfig, TokenScope};
use crate::error::{GuardError, Result};
use crate::exchange::{GateRequest, ResponseSink};
use crate::pattern::PathMatcher;
use crate::redirect::RedirectRewriter;
use crate::rotation::{RequestOutcome, RotationPolicy, TokenAction};
use crate::session::{Session, SessionListener, SessionLookup};
use crate::store::{MemoryTokenStore, TokenStore};
use crate::token::{ActionKey, PresentedToken, TokenLocation};
use crate::validator::TokenValidator;
use http::Method;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Why a request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// No token in any configured location
    MissingToken,
    /// A token was presented but did not match
    TokenMismatch,
    /// Protected request without a session
    SessionRequired,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingToken => "missing_token",
            Self::TokenMismatch => "token_mismatch",
            Self::SessionRequired => "session_required",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of [`RequestGate::handle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Forwarded downstream
    Allow,
    /// Not forwarded; the host renders its rejection
    Reject(RejectReason),
    /// Not forwarded; the landing page was rendered instead
    LandingPage,
}

impl GateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

struct Verification {
    decision: GateDecision,
    outcome: RequestOutcome,
    // Key of the stored entry the request was checked against.
    checked: Option<ActionKey>,
    // The checked entry was already replaced while verifying.
    rotated: bool,
}

impl Verification {
    fn unchecked() -> Self {
        Self {
            decision: GateDecision::Allow,
            outcome: RequestOutcome::Unchecked,
            checked: None,
            rotated: false,
        }
    }

    fn rejected(reason: RejectReason, checked: Option<ActionKey>) -> Self {
        Self {
            decision: GateDecision::Reject(reason),
            outcome: RequestOutcome::Rejected,
            checked,
            rotated: false,
        }
    }
}

/// CSRF gate shared by every request of an application.
#[derive(Clone)]
pub struct RequestGate {
    config: Arc<GuardConfig>,
    store: Arc<dyn TokenStore>,
    validator: TokenValidator,
    matcher: PathMatcher,
    rotation: RotationPolicy,
    exempt_methods: Vec<Method>,
    trusted_origins: HashSet<String>,
}

impl RequestGate {
    /// Build a gate backed by an in-memory token store.
    pub fn new(config: GuardConfig) -> Result<Self> {
        let store = Arc::new(MemoryTokenStore::new(config.token_length));
        Self::with_store(config, store)
    }

    /// Build a gate on top of an existing token store.
    pub fn with_store(config: GuardConfig, store: Arc<dyn TokenStore>) -> Result<Self> {
        config.validate()?;

        let matcher = PathMatcher::new(&config.protected_pages, &config.unprotected_pages)?;
        let exempt_methods = config.exempt_methods()?;
        let trusted_origins = config.trusted_origins()?;

        debug!(
            enabled = config.enabled,
            scope = ?config.token_scope,
            strictness = ?config.rotation_strictness,
            masking = config.masking,
            "CSRF gate configured"
        );

        Ok(Self {
            validator: TokenValidator::new(config.masking),
            rotation: RotationPolicy::from_config(&config),
            config: Arc::new(config),
            store,
            matcher,
            exempt_methods,
            trusted_origins,
        })
    }

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn TokenStore> {
        &self.store
    }

    pub fn validator(&self) -> &TokenValidator {
        &self.validator
    }

    /// Action key requests for `path` are checked against.
    pub fn action_key_for(&self, path: &str) -> ActionKey {
        match self.config.token_scope {
            TokenScope::Global => ActionKey::Session,
            TokenScope::PerPage => ActionKey::page(path),
        }
    }

    pub fn is_protected_page(&self, path: &str) -> bool {
        self.matcher.is_protected(path)
    }

    pub(crate) fn trusts_origin(&self, origin: &str) -> bool {
        self.trusted_origins.contains(origin)
    }

    /// Whether the request must carry a valid token.
    pub fn needs_protection<R: GateRequest + ?Sized>(&self, request: &R) -> bool {
        !self.exempt_methods.contains(request.method()) && self.matcher.is_protected(request.path())
    }

    /// Token to embed in a page targeting `path`, issued if absent.
    ///
    /// With masking enabled every call yields a different rendition of the
    /// same stored token.
    pub fn token_for(&self, session_id: &str, path: &str) -> String {
        let entry = self.store.issue(session_id, &self.action_key_for(path));
        self.validator.render(&entry)
    }

    /// First non-empty token found in the configured locations.
    pub fn extract_token<R: GateRequest + ?Sized>(&self, request: &R) -> Option<PresentedToken> {
        self.config.token_locations.iter().find_map(|location| {
            let value = match location {
                TokenLocation::Header => request.header(&self.config.header_name),
                TokenLocation::Parameter => request.parameter(&self.config.token_name),
            }?
            .trim();

            (!value.is_empty()).then(|| PresentedToken::new(value, *location))
        })
    }

    /// Decide the fate of one request.
    ///
    /// `forward` is the downstream pipeline. It receives a sink that adds
    /// tokens to same-site redirects. `landing` renders the new-token landing
    /// page and receives the token to embed. Neither runs for rejected
    /// requests; the host renders its own rejection from the returned
    /// [`GateDecision`].
    ///
    /// Session lookup faults fail closed: nothing is forwarded and
    /// [`GuardError::SessionLookup`] is returned. Downstream faults are
    /// returned as [`GuardError::Downstream`] after token bookkeeping ran.
    pub fn handle<R, S, W, F, L>(
        &self,
        request: &R,
        sessions: &S,
        response: &mut W,
        forward: F,
        landing: L,
    ) -> Result<GateDecision>
    where
        R: GateRequest,
        S: SessionLookup,
        W: ResponseSink,
        F: FnOnce(&R, &mut RedirectRewriter<'_, W>) -> Result<()>,
        L: FnOnce(&R, &mut W, &str) -> Result<()>,
    {
        let path = request.path();

        if !self.config.enabled {
            trace!(method = %request.method(), path = %path, "CSRF gate disabled");
            self.dispatch(request, response, None, forward)?;
            return Ok(GateDecision::Allow);
        }

        let session = sessions.current().map_err(|e| {
            warn!(
                method = %request.method(),
                path = %path,
                error = %e,
                "Session lookup failed, refusing request"
            );
            GuardError::SessionLookup(e.to_string())
        })?;

        let Some(session) = session else {
            if self.config.validate_when_no_session_exists && self.needs_protection(request) {
                let reason = RejectReason::SessionRequired;
                warn!(method = %request.method(), path = %path, reason = %reason, "CSRF check failed");
                return Ok(GateDecision::Reject(reason));
            }

            trace!(method = %request.method(), path = %path, "No session, passing through");
            self.dispatch(request, response, None, forward)?;
            return Ok(GateDecision::Allow);
        };

        if self
            .rotation
            .should_render_landing_page(sessions.is_new(&session))
        {
            debug!(path = %path, "New session, rendering token landing page");
            let token = self.token_for(&session.id, path);
            let rendered = landing(request, response, &token);
            self.ensure_tokens(&session.id, path);
            rendered.map_err(into_downstream)?;
            return Ok(GateDecision::LandingPage);
        }

        let verification = if self.needs_protection(request) {
            self.verify(&session.id, request)
        } else {
            Verification::unchecked()
        };

        // Rotate before forwarding so pages rendered downstream embed the
        // replacement.
        if !verification.rotated
            && self.rotation.after_request(verification.outcome) == TokenAction::Rotate
        {
            if let Some(key) = &verification.checked {
                self.store.rotate(&session.id, key);
            }
        }

        let forwarded = match verification.decision {
            GateDecision::Allow => self.dispatch(request, response, Some(&session.id), forward),
            GateDecision::Reject(reason) => {
                warn!(method = %request.method(), path = %path, reason = %reason, "CSRF check failed");
                Ok(())
            }
            GateDecision::LandingPage => Ok(()),
        };

        self.ensure_tokens(&session.id, path);
        forwarded?;

        Ok(verification.decision)
    }

    fn verify<R: GateRequest>(&self, session_id: &str, request: &R) -> Verification {
        let key = self.action_key_for(request.path());

        // A page without its own token is checked against the global one.
        let expected = self.store.get(session_id, &key).or_else(|| {
            if key.is_page() {
                self.store.get(session_id, &ActionKey::Session)
            } else {
                None
            }
        });
        let checked = expected.as_ref().map(|entry| entry.action_key.clone());

        let Some(presented) = self.extract_token(request) else {
            return Verification::rejected(RejectReason::MissingToken, checked);
        };

        // Some(rotated) when the token matched.
        let accepted = match expected {
            // Under rotation the check and the replacement are one store step.
            Some(entry)
                if self.rotation.after_request(RequestOutcome::Validated)
                    == TokenAction::Rotate =>
            {
                self.store
                    .consume(session_id, &entry.action_key, &|current| {
                        self.validator.validate(current, &presented)
                    })
                    .map(|_| true)
            }
            Some(entry) => self.validator.validate(&entry, &presented).then_some(false),
            None => None,
        };

        match accepted {
            Some(rotated) => {
                trace!(
                    path = %request.path(),
                    location = presented.location.as_str(),
                    rotated = rotated,
                    "CSRF token accepted"
                );
                Verification {
                    decision: GateDecision::Allow,
                    outcome: RequestOutcome::Validated,
                    checked,
                    rotated,
                }
            }
            None => Verification::rejected(RejectReason::TokenMismatch, checked),
        }
    }

    fn ensure_tokens(&self, session_id: &str, path: &str) {
        self.store.issue(session_id, &ActionKey::Session);

        if self.config.token_scope == TokenScope::PerPage && self.matcher.is_protected(path) {
            self.store.issue(session_id, &ActionKey::page(path));
        }
    }

    fn dispatch<R, W, F>(
        &self,
        request: &R,
        response: &mut W,
        session_id: Option<&str>,
        forward: F,
    ) -> Result<()>
    where
        R: GateRequest,
        W: ResponseSink,
        F: FnOnce(&R, &mut RedirectRewriter<'_, W>) -> Result<()>,
    {
        let mut sink = RedirectRewriter::new(self, response, session_id, request.path());
        forward(request, &mut sink).map_err(|e| {
            warn!(path = %request.path(), error = %e, "Downstream handler failed");
            into_downstream(e)
        })
    }
}

fn into_downstream(error: GuardError) -> GuardError {
    match error {
        GuardError::Downstream(_) => error,
        other => GuardError::Downstream(other.to_string()),
    }
}

impl SessionListener for RequestGate {
    fn session_created(&self, session: &Session) {
        if !self.config.enabled {
            return;
        }

        self.store.issue(&session.id, &ActionKey::Session);

        if self.config.token_scope == TokenScope::PerPage {
            for page in &self.config.precreate_pages {
                self.store.issue(&session.id, &ActionKey::page(page));
            }
        }

        debug!(
            tokens = self.store.token_count(&session.id),
            "Issued tokens for new session"
        );
    }

    fn session_destroyed(&self, session_id: &str) {
        self.store.drop_session(session_id);
    }
}

impl fmt::Debug for RequestGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestGate")
            .field("config", &self.config)
            .field("sessions", &self.store.session_count())
            .finish()
    }
}
