//! Maps raw provider errors onto the acquisition error taxonomy
//!
//! Structured status codes win. Substring markers are only consulted for
//! errors that carry no usable status, and the marker lists are configuration
//! because providers change their error wording.

use pulse_core::AcquisitionError;
use tracing::debug;

use crate::error::ProviderError;

const DEFAULT_RATE_LIMIT_MARKERS: &[&str] = &["429", "RESOURCE_EXHAUSTED", "rate limit", "quota"];

const DEFAULT_AUTH_MARKERS: &[&str] = &[
    "401",
    "403",
    "API_KEY_INVALID",
    "API key not valid",
    "PERMISSION_DENIED",
    "UNAUTHENTICATED",
];

/// Substring markers used for opaque errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifierRules {
    pub rate_limit_markers: Vec<String>,
    pub auth_markers: Vec<String>,
}

impl Default for ClassifierRules {
    fn default() -> Self {
        Self {
            rate_limit_markers: DEFAULT_RATE_LIMIT_MARKERS
                .iter()
                .map(|m| m.to_string())
                .collect(),
            auth_markers: DEFAULT_AUTH_MARKERS.iter().map(|m| m.to_string()).collect(),
        }
    }
}

impl ClassifierRules {
    /// Parse a comma separated marker list, dropping blanks
    pub fn parse_markers(raw: &str) -> Vec<String> {
        raw.split(',')
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(String::from)
            .collect()
    }
}

/// Converts [`ProviderError`]s into [`AcquisitionError`]s
#[derive(Debug, Clone, Default)]
pub struct ResponseClassifier {
    rules: ClassifierRules,
}

impl ResponseClassifier {
    pub fn new(rules: ClassifierRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &ClassifierRules {
        &self.rules
    }

    pub fn classify(&self, error: ProviderError) -> AcquisitionError {
        let classified = match error {
            ProviderError::CredentialMissing => AcquisitionError::CredentialMissing,
            ProviderError::EmptyResponse => AcquisitionError::EmptyResponse,
            ProviderError::MalformedResponse(detail) => AcquisitionError::MalformedResponse(detail),
            ProviderError::Timeout { after_secs } => AcquisitionError::Timeout(after_secs),
            ProviderError::Http { status: 429, message } => AcquisitionError::RateLimited(message),
            ProviderError::Http {
                status: 401 | 403,
                message,
            } => AcquisitionError::InvalidCredential(message),
            ProviderError::Http { status, message } => {
                self.classify_text(format!("Provider error (status {}): {}", status, message))
            }
            ProviderError::Transport(message) => self.classify_text(message),
        };

        debug!("Classified provider error as {:?}", classified.kind());
        classified
    }

    /// Fallback for errors that only carry a message
    pub fn classify_text(&self, message: String) -> AcquisitionError {
        if contains_any(&message, &self.rules.rate_limit_markers) {
            AcquisitionError::RateLimited(message)
        } else if contains_any(&message, &self.rules.auth_markers) {
            AcquisitionError::InvalidCredential(message)
        } else {
            AcquisitionError::Unclassified(message)
        }
    }
}

fn contains_any(haystack: &str, markers: &[String]) -> bool {
    let haystack = haystack.to_lowercase();
    markers
        .iter()
        .any(|marker| haystack.contains(&marker.to_lowercase()))
}
