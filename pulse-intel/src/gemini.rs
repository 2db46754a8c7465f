//! Gemini client for grounded market signal acquisition

use std::time::Duration;

use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use pulse_core::{symbol_list, CitationSource, PulseError, MAX_CITATION_SOURCES, PRICE_UNAVAILABLE};
use reqwest::Client;
use serde_json::json;
use tracing::{debug, info, instrument, warn};

use crate::error::ProviderError;
use crate::types::{
    ApiErrorBody, ApiErrorEnvelope, BatchSignalResponse, Candidate, Content, GenerateContentRequest,
    GenerateContentResponse, GenerationConfig, GoogleSearch, RawSignalEntry, SignalBatch,
    SignalReport, Tool,
};

pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-3-flash-preview";

/// Title used for grounding chunks that arrive without one
const UNTITLED_SOURCE: &str = "Market Intelligence Source";

const FINISH_STOP: &str = "STOP";

const SYSTEM_INSTRUCTION: &str = r#"You are a high-performance financial intelligence engine. Your primary objective is to provide the most current MONTHLY market signals.
CRITICAL: You MUST perform fresh Google Searches for each request to ensure data is accurate as of today.
Target sources: Investing.com, ForexFactory, and major central bank announcements.

For each asset:
1. Identify the current monthly trend and key technical levels (RSI, Moving Averages).
2. Evaluate high-impact fundamental drivers (inflation data, interest rate decisions, geopolitical shifts).
3. Generate a definitive signal: Strong Buy, Buy, Neutral, Sell, or Strong Sell.

Return a JSON object with a 'signals' array.
Fields: symbol, signal, lastPrice, technicalSummary, fundamentalSummary, justification.
Tone: Institutional, precise, and data-driven."#;

/// Source of market signals for one refresh cycle
#[async_trait]
pub trait SignalProvider: Send + Sync {
    /// Issue exactly one acquisition request
    async fn acquire_signals(&self) -> Result<SignalBatch, ProviderError>;
}

/// Connection settings for [`GeminiClient`]
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub api_base: String,
    pub request_timeout: Duration,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            api_base: GEMINI_API_BASE.to_string(),
            request_timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: Client,
    config: GeminiConfig,
}

impl GeminiClient {
    /// Build the client.
    ///
    /// A missing credential is not an error here; it is reported by the first
    /// acquisition so the server can still come up and surface it.
    pub fn new(config: GeminiConfig) -> Result<Self, PulseError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| PulseError::network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.config.model = model.to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    pub fn has_credential(&self) -> bool {
        self.credential().is_some()
    }

    fn credential(&self) -> Option<&str> {
        self.config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.api_base.trim_end_matches('/'),
            self.config.model
        )
    }

    /// Request body for an analysis as of `today`
    pub fn build_request(&self, today: NaiveDate) -> GenerateContentRequest {
        GenerateContentRequest {
            system_instruction: Content::text(None, SYSTEM_INSTRUCTION),
            contents: vec![Content::text(Some("user"), build_prompt(today))],
            tools: vec![Tool {
                google_search: GoogleSearch::default(),
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json".to_string(),
                response_schema: response_schema(),
            },
        }
    }

    /// Fetch signals for every tracked instrument in a single grounded request
    #[instrument(skip(self), fields(model = %self.config.model))]
    pub async fn fetch_market_signals(&self) -> Result<SignalBatch, ProviderError> {
        let api_key = self.credential().ok_or(ProviderError::CredentialMissing)?;

        let request = self.build_request(Local::now().date_naive());
        debug!("Requesting grounded signals from {}", self.endpoint());

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            return Err(ProviderError::Http {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        if body.trim().is_empty() {
            return Err(ProviderError::EmptyResponse);
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&body).map_err(|e| {
            ProviderError::MalformedResponse(format!("Unreadable generateContent reply: {}", e))
        })?;

        let batch = parse_generate_response(parsed)?;
        info!(
            "Acquired {} signals with {} citation sources",
            batch.len(),
            batch.sources.len()
        );
        Ok(batch)
    }

    fn transport_error(&self, err: reqwest::Error) -> ProviderError {
        if err.is_timeout() {
            ProviderError::Timeout {
                after_secs: self.config.request_timeout.as_secs(),
            }
        } else {
            ProviderError::Transport(err.to_string())
        }
    }
}

#[async_trait]
impl SignalProvider for GeminiClient {
    async fn acquire_signals(&self) -> Result<SignalBatch, ProviderError> {
        self.fetch_market_signals().await
    }
}

/// User prompt naming the date and every tracked symbol
pub fn build_prompt(today: NaiveDate) -> String {
    format!(
        "Today is {}. Perform an immediate monthly market analysis for: {}. \
         Use real-time web grounding to find the absolute latest prices and sentiment. \
         Do not use cached or historical data from previous months.",
        today.format("%B %-d, %Y"),
        symbol_list()
    )
}

/// Schema the structured reply must follow
pub fn response_schema() -> serde_json::Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "signals": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "symbol": { "type": "STRING" },
                        "signal": { "type": "STRING" },
                        "lastPrice": { "type": "STRING" },
                        "technicalSummary": { "type": "STRING" },
                        "fundamentalSummary": { "type": "STRING" },
                        "justification": { "type": "STRING" }
                    },
                    "required": ["symbol", "signal", "technicalSummary", "fundamentalSummary"]
                }
            }
        }
    })
}

/// Turn a successful `generateContent` reply into a signal batch
pub fn parse_generate_response(
    response: GenerateContentResponse,
) -> Result<SignalBatch, ProviderError> {
    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or(ProviderError::EmptyResponse)?;

    // Anything but STOP means the structured reply was cut off or withheld
    if let Some(reason) = candidate
        .finish_reason
        .as_deref()
        .filter(|reason| *reason != FINISH_STOP)
    {
        return Err(ProviderError::MalformedResponse(format!(
            "Generation ended early ({})",
            reason
        )));
    }

    let text = candidate.text().ok_or(ProviderError::EmptyResponse)?;
    let json_str = extract_json(&text)?;

    let payload: BatchSignalResponse = serde_json::from_str(json_str).map_err(|e| {
        ProviderError::MalformedResponse(format!("Failed to parse signal payload: {}", e))
    })?;

    let reports = payload
        .signals
        .into_iter()
        .filter_map(into_report)
        .collect();

    Ok(SignalBatch {
        reports,
        sources: extract_sources(&candidate),
    })
}

fn into_report(entry: RawSignalEntry) -> Option<SignalReport> {
    let signal = match entry.signal.parse() {
        Ok(signal) => signal,
        Err(e) => {
            warn!("Dropping {} entry: {}", entry.symbol, e);
            return None;
        }
    };

    Some(SignalReport {
        symbol: entry.symbol,
        signal,
        last_price: entry
            .last_price
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| PRICE_UNAVAILABLE.to_string()),
        technical_summary: entry.technical_summary,
        fundamental_summary: entry.fundamental_summary,
        justification: entry.justification.unwrap_or_default(),
    })
}

/// Web grounding chunks of the candidate, first [`MAX_CITATION_SOURCES`] only
pub fn extract_sources(candidate: &Candidate) -> Vec<CitationSource> {
    let Some(metadata) = &candidate.grounding_metadata else {
        return Vec::new();
    };

    metadata
        .grounding_chunks
        .iter()
        .filter_map(|chunk| chunk.web.as_ref())
        .filter_map(|web| {
            let uri = web.uri.clone()?;
            let title = web
                .title
                .clone()
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| UNTITLED_SOURCE.to_string());
            Some(CitationSource { title, uri })
        })
        .take(MAX_CITATION_SOURCES)
        .collect()
}

/// Extract JSON from a string that might contain markdown code blocks
fn extract_json(content: &str) -> Result<&str, ProviderError> {
    // Try to find JSON in code blocks first
    if let Some(start) = content.find("```json") {
        let start = start + 7;
        if let Some(end) = content[start..].find("```") {
            return Ok(content[start..start + end].trim());
        }
    }

    // Try to find raw JSON
    if let Some(start) = content.find('{') {
        if let Some(end) = content.rfind('}') {
            if end > start {
                return Ok(&content[start..=end]);
            }
        }
    }

    Err(ProviderError::MalformedResponse(
        "No JSON object found in response".to_string(),
    ))
}

/// Best-effort message from a non-2xx body
fn error_message(body: &str) -> String {
    match serde_json::from_str::<ApiErrorEnvelope>(body) {
        Ok(ApiErrorEnvelope {
            error: ApiErrorBody {
                code,
                message,
                status,
            },
        }) => match (code, status) {
            (Some(code), Some(status)) => format!("{} ({} {})", message, code, status),
            (None, Some(status)) => format!("{} ({})", message, status),
            (Some(code), None) => format!("{} ({})", message, code),
            (None, None) => message,
        },
        Err(_) if body.trim().is_empty() => "no error body".to_string(),
        Err(_) => body.trim().to_string(),
    }
}
