//! Request-processing core for an HTTP server: ordered actor chains,
//! typed header codecs and a connection-bound resource registry.

pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod headers;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod routing;

pub use config::schema::ServerConfig;
pub use dispatch::{Application, DispatchOutcome};
pub use error::{Error, Result};
pub use http::HttpServer;
pub use lifecycle::{Closables, Shutdown};
