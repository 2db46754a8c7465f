//! Core types for Forex Pulse
//!
//! This crate defines the shared data structures used across the workspace:
//! the tracked instruments, acquired signals, the refresh state exposed to
//! the presentation layer, and the acquisition error taxonomy.

pub mod error;
pub mod instrument;
pub mod signal;
pub mod state;

pub use error::{AcquisitionError, ErrorDescriptor, ErrorKind, PulseError, PulseResult};
pub use instrument::{instruments, symbol_list, AssetSymbol, Instrument};
pub use signal::{
    CitationSource, Signal, SignalBoard, SignalSlot, SignalType, MAX_CITATION_SOURCES,
    PRICE_UNAVAILABLE,
};
pub use state::RefreshState;
