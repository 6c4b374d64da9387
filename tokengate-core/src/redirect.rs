//! Redirect interception.
//!
//! [`RedirectRewriter`] decorates the host's [`ResponseSink`]. Every
//! operation is delegated unchanged except `write_redirect`, which merges a
//! current token into trusted same-site targets so the follow-up navigation
//! already carries a valid token.

use crate::error::{GuardError, Result};
use crate::gate::RequestGate;
use crate::exchange::ResponseSink;
use http::StatusCode;
use tracing::{debug, trace};
use url::{Url, form_urlencoded};

// Relative targets are resolved against this placeholder origin; a resolved
// URL keeping it never left the current host.
const LOCAL_ORIGIN: &str = "http://tokengate.invalid";

/// Response sink wrapper injecting tokens into redirect targets.
pub struct RedirectRewriter<'a, W: ResponseSink> {
    inner: &'a mut W,
    gate: &'a RequestGate,
    session_id: Option<&'a str>,
    request_path: &'a str,
}

impl<'a, W: ResponseSink> RedirectRewriter<'a, W> {
    /// Wrap `inner`. Without a session id redirects pass through untouched.
    pub fn new(
        gate: &'a RequestGate,
        inner: &'a mut W,
        session_id: Option<&'a str>,
        request_path: &'a str,
    ) -> Self {
        Self {
            inner,
            gate,
            session_id,
            request_path,
        }
    }

    /// The wrapped sink.
    pub fn inner(&self) -> &W {
        self.inner
    }

    /// The target that would be sent for `location`, or `None` when the
    /// location is sent unchanged.
    pub fn rewrite_location(&self, location: &str) -> Option<String> {
        let session_id = self.session_id?;
        let destination = self.resolve_trusted(location)?;

        if !self.gate.is_protected_page(destination.path()) {
            return None;
        }

        let token = self.gate.token_for(session_id, destination.path());
        Some(merge_query_parameter(
            location,
            &self.gate.config().token_name,
            &token,
        ))
    }

    fn resolve_trusted(&self, location: &str) -> Option<Url> {
        match Url::parse(location) {
            Ok(url) => {
                let origin = url.origin();
                (origin.is_tuple() && self.gate.trusts_origin(&origin.ascii_serialization()))
                    .then_some(url)
            }
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                let local = Url::parse(LOCAL_ORIGIN).ok()?;
                // set_path keeps the host even for request paths like `//host/x`.
                let mut base = local.clone();
                base.set_path(self.request_path);
                let url = base.join(location).ok()?;
                (url.origin() == local.origin()).then_some(url)
            }
            Err(_) => None,
        }
    }
}

impl<W: ResponseSink> ResponseSink for RedirectRewriter<'_, W> {
    fn set_status(&mut self, status: u16) -> Result<()> {
        self.inner.set_status(status)
    }

    fn set_header(&mut self, name: &str, value: &str) -> Result<()> {
        self.inner.set_header(name, value)
    }

    fn write_body(&mut self, bytes: &[u8]) -> Result<()> {
        self.inner.write_body(bytes)
    }

    fn write_redirect(&mut self, location: &str, status: u16) -> Result<()> {
        if !StatusCode::from_u16(status).is_ok_and(|s| s.is_redirection()) {
            return Err(GuardError::InvalidRedirectStatus(status));
        }

        if self.inner.is_committed() {
            return self.inner.write_redirect(location, status);
        }

        match self.rewrite_location(location) {
            Some(rewritten) => {
                debug!(status = status, "Injected token into redirect target");
                self.inner.write_redirect(&rewritten, status)
            }
            None => {
                trace!(status = status, "Redirect passed through unchanged");
                self.inner.write_redirect(location, status)
            }
        }
    }

    fn is_committed(&self) -> bool {
        self.inner.is_committed()
    }
}

/// Set `name=value` in the query of `location`, replacing an existing
/// parameter of that name and keeping everything else byte for byte.
fn merge_query_parameter(location: &str, name: &str, value: &str) -> String {
    let (rest, fragment) = match location.split_once('#') {
        Some((rest, fragment)) => (rest, Some(fragment)),
        None => (location, None),
    };
    let (base, query) = rest.split_once('?').unwrap_or((rest, ""));

    let token_pair = form_urlencoded::Serializer::new(String::new())
        .append_pair(name, value)
        .finish();

    let mut pairs: Vec<&str> = query
        .split('&')
        .filter(|pair| !pair.is_empty() && !has_name(pair, name))
        .collect();
    pairs.push(&token_pair);

    let mut target = format!("{}?{}", base, pairs.join("&"));
    if let Some(fragment) = fragment {
        target.push('#');
        target.push_str(fragment);
    }
    target
}

fn has_name(pair: &str, name: &str) -> bool {
    form_urlencoded::parse(pair.as_bytes())
        .next()
        .is_some_and(|(key, _)| key == name)
}
