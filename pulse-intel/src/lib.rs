//! Market intelligence acquisition for Forex Pulse
//!
//! This crate talks to the Gemini `generateContent` API with Google Search
//! grounding and a structured response schema, turns the reply into a
//! [`SignalBatch`], and classifies provider failures into the
//! [`pulse_core::AcquisitionError`] taxonomy.

pub mod classifier;
pub mod error;
pub mod gemini;
pub mod types;

pub use classifier::{ClassifierRules, ResponseClassifier};
pub use error::ProviderError;
pub use gemini::{GeminiClient, GeminiConfig, SignalProvider, DEFAULT_MODEL, GEMINI_API_BASE};
pub use types::{SignalBatch, SignalReport};
