//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! engine / propagation controller produce:
//!     → tracing events (stderr, filtered by RUST_LOG or config)
//!     → metrics.rs (counters and a duration histogram)
//!
//! Consumers:
//!     → operator terminal or log collector
//!     → whatever recorder the host process installs
//! ```
//!
//! # Design Decisions
//! - stdout is reserved for the result document, so logs go to stderr
//! - Each invocation runs inside a span carrying a UUID `invocation_id`
//! - The library records metrics through the facade only; no exporter

pub mod logging;
pub mod metrics;
