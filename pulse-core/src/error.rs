//! Error types for Forex Pulse

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Pulse-wide error type for configuration and plumbing failures
#[derive(Error, Debug)]
pub enum PulseError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl PulseError {
    pub fn network(msg: impl Into<String>) -> Self {
        PulseError::Network(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        PulseError::Config(msg.into())
    }
}

/// Result type alias for pulse operations
pub type PulseResult<T> = Result<T, PulseError>;

/// Closed taxonomy of acquisition failures.
///
/// Every message except [`AcquisitionError::Unclassified`] starts with a
/// bracketed tag (see [`ErrorKind::tag`]) so a consumer holding only the
/// rendered string can still pattern-match on it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AcquisitionError {
    #[error("[API_KEY_MISSING] No provider credential configured. Set GEMINI_API_KEY and restart.")]
    CredentialMissing,

    #[error("[EMPTY_RESPONSE] The intelligence provider returned no payload.")]
    EmptyResponse,

    #[error("[MALFORMED_RESPONSE] The provider payload could not be parsed: {0}")]
    MalformedResponse(String),

    #[error("[RATE_LIMITED] The provider rejected the request for exceeding its rate limit: {0}")]
    RateLimited(String),

    #[error("[API_KEY_INVALID] The provider rejected the configured credential: {0}")]
    InvalidCredential(String),

    #[error("[TIMEOUT] Signal acquisition did not finish within {0}s.")]
    Timeout(u64),

    #[error("{0}")]
    Unclassified(String),
}

/// Discriminant of [`AcquisitionError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    CredentialMissing,
    EmptyResponse,
    MalformedResponse,
    RateLimited,
    InvalidCredential,
    Timeout,
    Unclassified,
}

impl ErrorKind {
    /// Machine-matchable tag embedded in the error message
    pub fn tag(&self) -> Option<&'static str> {
        match self {
            ErrorKind::CredentialMissing => Some("API_KEY_MISSING"),
            ErrorKind::EmptyResponse => Some("EMPTY_RESPONSE"),
            ErrorKind::MalformedResponse => Some("MALFORMED_RESPONSE"),
            ErrorKind::RateLimited => Some("RATE_LIMITED"),
            ErrorKind::InvalidCredential => Some("API_KEY_INVALID"),
            ErrorKind::Timeout => Some("TIMEOUT"),
            ErrorKind::Unclassified => None,
        }
    }

    /// Whether an immediate retry without operator action can succeed
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            ErrorKind::CredentialMissing | ErrorKind::InvalidCredential
        )
    }
}

impl AcquisitionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AcquisitionError::CredentialMissing => ErrorKind::CredentialMissing,
            AcquisitionError::EmptyResponse => ErrorKind::EmptyResponse,
            AcquisitionError::MalformedResponse(_) => ErrorKind::MalformedResponse,
            AcquisitionError::RateLimited(_) => ErrorKind::RateLimited,
            AcquisitionError::InvalidCredential(_) => ErrorKind::InvalidCredential,
            AcquisitionError::Timeout(_) => ErrorKind::Timeout,
            AcquisitionError::Unclassified(_) => ErrorKind::Unclassified,
        }
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        AcquisitionError::MalformedResponse(msg.into())
    }

    pub fn unclassified(msg: impl Into<String>) -> Self {
        AcquisitionError::Unclassified(msg.into())
    }
}

/// Error as published on the caller-facing state surface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDescriptor {
    pub kind: ErrorKind,
    pub message: String,
    pub retryable: bool,
}

impl From<&AcquisitionError> for ErrorDescriptor {
    fn from(err: &AcquisitionError) -> Self {
        let kind = err.kind();
        Self {
            kind,
            message: err.to_string(),
            retryable: kind.is_retryable(),
        }
    }
}
