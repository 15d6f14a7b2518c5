//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (hyper-util auto builder, middleware, connection tracking)
//!     → request.rs (Event: method, logical path, params, lazy body)
//!     → [dispatch root runs the matching chain]
//!     → response.rs (in-progress Response finalized once)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{Event, EventOptions, X_REQUEST_ID};
pub use response::{Response, ResponseBody};
pub use server::{ConnectionContext, HttpServer};
