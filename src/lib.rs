//! ==============================================================================
//! airmon - sensor ingestion and AQI computation engine
//! ==============================================================================
//!
//! the library side of the monitor: protocol decoding, shared reading state,
//! the bounded rolling store, and the breakpoint-interpolation AQI engine.
//! the binary in main.rs wires these into supervised tasks and the query
//! interface.
//!
//! data flow:
//!     frame/line decoding -> state (overwrite-latest) -> store (periodic
//!     snapshot + append + trim) -> aqi (on-demand over the last N rows)
//!
//! ==============================================================================

pub mod aqi;
pub mod config;
pub mod domain;
pub mod error;
pub mod frame;
pub mod line;
pub mod link;
pub mod state;
pub mod store;
pub mod tasks;
pub mod telemetry;
