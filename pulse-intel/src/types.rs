//! Wire types for the Gemini `generateContent` endpoint and the parsed signal batch

use pulse_core::{CitationSource, SignalType};
use serde::{Deserialize, Serialize};

// ============================================================================
// Request
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub system_instruction: Content,
    pub contents: Vec<Content>,
    pub tools: Vec<Tool>,
    pub generation_config: GenerationConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    pub fn text(role: Option<&str>, text: impl Into<String>) -> Self {
        Self {
            role: role.map(String::from),
            parts: vec![Part {
                text: Some(text.into()),
            }],
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// Tool declaration; only Google Search grounding is used
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    pub google_search: GoogleSearch,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct GoogleSearch {}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_mime_type: String,
    pub response_schema: serde_json::Value,
}

// ============================================================================
// Response
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
    #[serde(default)]
    pub grounding_metadata: Option<GroundingMetadata>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

impl Candidate {
    /// Concatenated text of every part, `None` when there is no text at all
    pub fn text(&self) -> Option<String> {
        let text: String = self
            .content
            .as_ref()?
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();

        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroundingMetadata {
    #[serde(default)]
    pub grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GroundingChunk {
    #[serde(default)]
    pub web: Option<WebChunk>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebChunk {
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

/// Error envelope returned with non-2xx statuses
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorEnvelope {
    pub error: ApiErrorBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub code: Option<u16>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub status: Option<String>,
}

// ============================================================================
// Structured payload
// ============================================================================

/// The JSON object the model is asked to produce
#[derive(Debug, Clone, Deserialize)]
pub struct BatchSignalResponse {
    #[serde(default)]
    pub signals: Vec<RawSignalEntry>,
}

/// One entry of the structured payload, before classification is validated
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSignalEntry {
    pub symbol: String,
    pub signal: String,
    #[serde(default)]
    pub last_price: Option<String>,
    pub technical_summary: String,
    pub fundamental_summary: String,
    #[serde(default)]
    pub justification: Option<String>,
}

/// A validated per-symbol entry from one acquisition
#[derive(Debug, Clone, PartialEq)]
pub struct SignalReport {
    /// Symbol as the provider spelled it; resolved against the instrument set on merge
    pub symbol: String,
    pub signal: SignalType,
    pub last_price: String,
    pub technical_summary: String,
    pub fundamental_summary: String,
    pub justification: String,
}

/// Everything one acquisition produced
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SignalBatch {
    pub reports: Vec<SignalReport>,
    /// Citation sources shared by every report of the batch
    pub sources: Vec<CitationSource>,
}

impl SignalBatch {
    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }
}
