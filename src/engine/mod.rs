//! Actor chain engine.
//!
//! # Data Flow
//! ```text
//! Page matched by dispatch
//!     → page.rs (fresh actor instances for this request)
//!     → chain.rs (run actors in order against Event + in-progress Response)
//!         continue → next actor, state threaded forward
//!         defer    → task registered with Closables, chain suspends
//!         reject / respond / error → terminal ChainResult
//!     → Back to dispatch
//! ```
//!
//! # Design Decisions
//! - Actors are synchronous; anything async goes through `Outcome::Defer`,
//!   so no lock or thread is held while waiting
//! - States are type-erased and looked up by type by later actors
//! - Panics inside actors become errors, never crash the connection task

pub mod actor;
pub mod chain;
pub mod conditional;
pub mod page;

pub use actor::{Actor, ActorContext, Deferred, FnActor, Outcome, Resumer, State};
pub use chain::{run_chain, ChainEnv, ChainResult};
pub use conditional::CheckIfModifiedSince;
pub use page::{Page, PageBuilder};
