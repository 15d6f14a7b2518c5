//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Page registration (at startup):
//!     (source, order, Page)[]
//!     → table.rs (sort by source ordinal, then declared order)
//!     → Freeze as the Application's page list
//!
//! Incoming Event
//!     → matcher.rs (each page's predicate, in order)
//!     → First match runs; a rejecting page passes to the next
//! ```
//!
//! # Design Decisions
//! - Pages compiled at startup, immutable at runtime
//! - No regex in hot path (prefix and exact matching only)
//! - Deterministic: same input always tries pages in the same order

pub mod matcher;
pub mod table;

pub use matcher::{
    route, AndMatcher, AnyMatcher, ExactPathMatcher, HostMatcher, Matcher, MethodMatcher,
    PathPrefixMatcher,
};
pub use table::RouteTable;
