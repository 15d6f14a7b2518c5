//! Dispatch root.
//!
//! # Data Flow
//! ```text
//! Event (from transport) + Closables (bound to the connection)
//!     → application.rs (try pages in order)
//!         predicate fails → next page
//!         chain rejects   → next page
//!         chain responds  → DispatchOutcome::Response
//!         chain errors    → sink + 500 (400 for undecodable input)
//!         chain abandoned → DispatchOutcome::Abandoned
//!     → nothing matched → 404
//! ```

pub mod application;

pub use application::{not_found, Application, ApplicationBuilder, DispatchOutcome};
