//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (subscriber setup, structured log events)
//!     → metrics.rs (counters, histograms)
//!     → tracing.rs (per-request spans with request IDs)
//!     → sink.rs (internal errors from the engine and the resource registry)
//!
//! Consumers:
//!     → stdout (fmt layer)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - Request ID flows through every span
//! - Metrics are cheap (atomic increments behind the `metrics` facade)
//! - Internal errors never escape to the client; they land in an `ErrorSink`

pub mod logging;
pub mod metrics;
pub mod sink;
pub mod tracing;

pub use sink::{ErrorSink, LoggingSink};
