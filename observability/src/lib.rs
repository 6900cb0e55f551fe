//! # Observability
//!
//! - [`init_tracing`]: `tracing-subscriber` registry with an `EnvFilter` and
//!   a plain or JSON formatter
//! - [`Telemetry`]: `metrics` counters and histograms for tracking and
//!   notification dispatch

pub mod logging;
pub mod telemetry;

pub use logging::init_tracing;
pub use telemetry::{DispatchOutcome, IgnoreReason, Telemetry, TrackTimer};
