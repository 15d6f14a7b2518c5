//! Error taxonomy for the request core.
//!
//! # Categories
//! - `DecodingError`: a header or parameter is present but malformed.
//!   Expected; the actor that asked for the value decides the 4xx response.
//! - `EncodingError`: a value handed to a header codec fails its validation.
//! - `ChainContractError`: a chain was run in a way that cannot terminate,
//!   e.g. the last actor asked to continue. Maps to a 5xx response.
//! - `ResourceCloseError`: a registered resource failed to close. Reported to
//!   the error sink, never aborts the rest of the sweep.
//! - `TransportError`: the request body could not be read off the connection.
//! - `ActorError`: any other failure raised from inside an actor.

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A header or parameter value could not be decoded.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid value for {name}: {reason}")]
pub struct DecodingError {
    pub name: String,
    pub reason: String,
}

impl DecodingError {
    pub fn new(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// A value could not be turned into header text.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("cannot encode {name}: {reason}")]
pub struct EncodingError {
    pub name: String,
    pub reason: String,
}

impl EncodingError {
    pub fn new(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// The chain itself was malformed for the request it ran against.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChainContractError {
    #[error("actor {index} of page `{page}` continued past the end of the chain")]
    ContinuePastEnd { page: String, index: usize },
    #[error("page `{page}` has no actors")]
    EmptyChain { page: String },
    #[error("deferred actor {index} of page `{page}` dropped its resume handle")]
    ResumeDropped { page: String, index: usize },
}

/// One registered resource failed while being closed.
#[derive(Debug, Error)]
#[error("failed to close {resource}: {reason}")]
pub struct ResourceCloseError {
    pub resource: String,
    pub reason: String,
}

impl ResourceCloseError {
    pub fn new(resource: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request body could not be read: {0}")]
    Body(String),
}

/// Failure raised by an actor while handling a request.
#[derive(Debug, Error)]
pub enum ActorError {
    #[error("{0}")]
    Message(String),
    #[error(transparent)]
    Decoding(#[from] DecodingError),
    #[error(transparent)]
    Encoding(#[from] EncodingError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("actor panicked: {0}")]
    Panicked(String),
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl ActorError {
    pub fn msg(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }
}

/// Crate-level error.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Decoding(#[from] DecodingError),
    #[error(transparent)]
    Encoding(#[from] EncodingError),
    #[error(transparent)]
    Contract(#[from] ChainContractError),
    #[error(transparent)]
    ResourceClose(#[from] ResourceCloseError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Actor(#[from] ActorError),
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
    #[error(transparent)]
    Listener(#[from] crate::net::ListenerError),
    #[error(transparent)]
    Registry(#[from] crate::headers::RegistryError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Short, stable label used for metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Decoding(_) => "decoding",
            Error::Encoding(_) => "encoding",
            Error::Contract(_) => "chain_contract",
            Error::ResourceClose(_) => "resource_close",
            Error::Transport(_) => "transport",
            Error::Actor(_) => "actor",
            Error::Config(_) => "config",
            Error::Listener(_) => "listener",
            Error::Registry(_) => "header_registry",
            Error::Io(_) => "io",
        }
    }
}

/// Turns a caught panic payload into something printable.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
