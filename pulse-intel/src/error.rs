//! Raw errors surfaced by signal providers

use thiserror::Error;

/// Errors a provider client can return before classification
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// No credential configured; raised before any network I/O
    #[error("No provider credential configured")]
    CredentialMissing,

    /// Reply carried no payload text
    #[error("Provider returned an empty payload")]
    EmptyResponse,

    /// Payload text is not valid JSON for the requested schema
    #[error("Malformed provider payload: {0}")]
    MalformedResponse(String),

    /// Provider answered with a non-success status
    #[error("Provider error (status {status}): {message}")]
    Http {
        /// HTTP status code
        status: u16,
        /// Error message from the provider
        message: String,
    },

    /// Client-side request timeout
    #[error("Provider request timed out after {after_secs}s")]
    Timeout { after_secs: u64 },

    /// Connection, TLS or body read failure
    #[error("Provider request failed: {0}")]
    Transport(String),
}
