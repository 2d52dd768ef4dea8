//! ==============================================================================
//! error.rs - engine error taxonomy
//! ==============================================================================
//!
//! purpose:
//!     matchable error variants for the ingestion/AQI engine. every variant
//!     here is recoverable: one bad frame or line never halts ingestion, and
//!     link/store failures are retried on the next scheduled cycle.
//!
//! relationships:
//!     - returned by: frame.rs, line.rs, store.rs, aqi.rs, link.rs
//!     - logged by: tasks.rs (log-and-continue supervision)
//!
//! ==============================================================================

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MonitorError {
    /// serial port missing or unreadable. the owning task drops the link and
    /// reopens it on its next cycle.
    #[error("sensor link unavailable: {0}")]
    LinkUnavailable(String),

    /// a full 10-byte window failed marker or checksum validation. the decoder
    /// discards one byte and keeps scanning.
    #[error("invalid frame ({reason}): {frame}")]
    FrameInvalid {
        reason: &'static str,
        /// hex dump of the rejected window
        frame: String,
    },

    /// a gas record had the wrong field count or a non-numeric field. the
    /// whole record is discarded; no partial update.
    #[error("malformed gas record: {0}")]
    ParseError(String),

    /// the store holds fewer rows than the requested window. reported
    /// explicitly, never coerced to a zero AQI.
    #[error("insufficient data: have {have} rows, need {need}")]
    InsufficientData { have: usize, need: usize },

    /// rolling store read/write failure. logged and retried next cycle.
    #[error("store i/o: {0}")]
    StoreIo(#[from] std::io::Error),

    /// every pollutant in the window fell outside its breakpoint table, so no
    /// overall index exists. distinct from a true zero AQI.
    #[error("no pollutant mapped to a sub-index")]
    NoMappedPollutant,
}
