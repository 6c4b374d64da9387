//! # Tokengate
//!
//! Synchronizer-token CSRF protection that sits in front of a request
//! pipeline.
//!
//! ## Features
//!
//! - **Session-bound tokens** - one global token per session, or one per page
//! - **Rotation** - keep tokens for the session, or replace them after every use
//! - **Masking** - per-response renditions of the same token
//! - **Redirect rewriting** - same-site redirect targets carry a current token
//! - **Landing page** - optional token bootstrap for brand-new sessions
//! - **Page patterns** - exact, prefix, extension and regex page sets
//!
//! ## Quick Start
//!
//! ```rust
//! use tokengate_core::{
//!     GateDecision, GuardConfig, HttpRequest, HttpResponse, RequestGate, ResponseSink, Session,
//!     SessionLookup, SessionLookupError,
//! };
//!
//! struct Existing(Session);
//!
//! impl SessionLookup for Existing {
//!     fn current(&self) -> Result<Option<Session>, SessionLookupError> {
//!         Ok(Some(self.0.clone()))
//!     }
//!
//!     fn is_new(&self, _session: &Session) -> bool {
//!         false
//!     }
//! }
//!
//! let gate = RequestGate::new(GuardConfig::default()).unwrap();
//! let sessions = Existing(Session::new("session-1"));
//!
//! // Token a rendered form would embed
//! let token = gate.token_for("session-1", "/transfer");
//!
//! let request = HttpRequest::post("/transfer").with_header("X-CSRF-Token", token);
//! let mut response = HttpResponse::new();
//! let decision = gate
//!     .handle(
//!         &request,
//!         &sessions,
//!         &mut response,
//!         |_, sink| sink.write_body(b"transferred"),
//!         |_, _, _| Ok(()),
//!     )
//!     .unwrap();
//!
//! assert_eq!(decision, GateDecision::Allow);
//! ```
//!
//! ## Configuration
//!
//! ```rust
//! use tokengate_core::{GuardConfig, TokenScope};
//!
//! let config = GuardConfig::from_toml_str(
//!     r#"
//!     token_scope = "per_page"
//!     protected_pages = ["/account/*"]
//!     "#,
//! )
//! .unwrap();
//!
//! assert_eq!(config.token_scope, TokenScope::PerPage);
//! assert_eq!(config.header_name, "X-CSRF-Token");
//! ```

pub mod config;
pub mod error;
pub mod exchange;
pub mod gate;
pub mod loader;
pub mod pattern;
pub mod redirect;
pub mod rotation;
pub mod session;
pub mod store;
pub mod token;
pub mod validator;

pub use config::{GuardConfig, RotationStrictness, TokenScope};
pub use error::{GuardError, Result};
pub use exchange::{GateRequest, HttpRequest, HttpResponse, ResponseSink};
pub use gate::{GateDecision, RejectReason, RequestGate};
pub use loader::FileFormat;
pub use pattern::{PagePattern, PathMatcher};
pub use redirect::RedirectRewriter;
pub use rotation::{RequestOutcome, RotationPolicy, TokenAction};
pub use session::{Session, SessionListener, SessionLookup, SessionLookupError};
pub use store::{MemoryTokenStore, TokenStore};
pub use token::{ActionKey, DEFAULT_TOKEN_LENGTH, MIN_TOKEN_LENGTH, PresentedToken, TokenEntry, TokenLocation};
pub use validator::TokenValidator;
