// Tokengate - session-bound CSRF protection for Rust web services
//
// The engine lives in `tokengate-core`; `tokengate-session` supplies an
// in-memory session collaborator.

// Re-export core functionality
pub use tokengate_core::*;

// Re-export optional crates
#[cfg(feature = "session")]
pub use tokengate_session;

// Prelude for common imports
pub mod prelude {
    pub use crate::{
        GateDecision, GateRequest, GuardConfig, GuardError, HttpRequest, HttpResponse,
        RedirectRewriter, RejectReason, RequestGate, ResponseSink, RotationStrictness, Session,
        SessionListener, SessionLookup, TokenLocation, TokenScope, TokenStore,
    };

    #[cfg(feature = "session")]
    pub use tokengate_session::{MemorySessionStore, RequestSessions, SessionConfig};
}
