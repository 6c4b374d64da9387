use thiserror::Error;

/// Errors raised by the gate and its collaborators.
///
/// Request rejections are not errors; they are reported through
/// [`GateDecision::Reject`](crate::GateDecision::Reject). Variants here cover
/// misconfiguration and faults in the surrounding pipeline.
#[derive(Error, Debug)]
pub enum GuardError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid page pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("JSON configuration error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML configuration error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Session lookup failed: {0}")]
    SessionLookup(String),

    #[error("Downstream handler failed: {0}")]
    Downstream(String),

    #[error("Response already committed")]
    ResponseCommitted,

    #[error("Invalid redirect status: {0}")]
    InvalidRedirectStatus(u16),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl GuardError {
    /// Whether the error came from a collaborator rather than from the gate itself.
    pub fn is_collaborator_failure(&self) -> bool {
        matches!(self, Self::SessionLookup(_) | Self::Downstream(_))
    }
}

pub type Result<T> = std::result::Result<T, GuardError>;
