//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Validate → Metrics → Bind listener → Serve
//!
//! Shutdown (shutdown.rs, signals.rs):
//!     SIGTERM/SIGINT → Stop accepting → Drain connections → Exit
//!
//! Per request (closables.rs, timer.rs):
//!     Actors register resources → connection closes or chain closes early
//!         → every resource released exactly once
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then observability, then listeners
//! - Shutdown has a deadline: the drain gives up after it
//! - Request resources are tied to the connection, not the response write

pub mod closables;
pub mod shutdown;
pub mod signals;
pub mod startup;
pub mod timer;

pub use closables::{Closeable, Closables};
pub use shutdown::Shutdown;
pub use timer::Timer;
