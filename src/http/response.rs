//! Response under construction.
//!
//! Created empty when a chain starts, written to by actors through typed
//! headers, and turned into an HTTP response exactly once when the chain
//! responds. A rejected or abandoned chain simply drops it.

use std::fmt;

use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, StatusCode};

use crate::error::{DecodingError, EncodingError};
use crate::headers::HeaderType;

/// Response payload.
#[derive(Default)]
pub enum ResponseBody {
    #[default]
    Empty,
    Bytes(Bytes),
    /// A body produced incrementally by the transport.
    Stream(Body),
}

impl ResponseBody {
    pub fn stream(body: Body) -> Self {
        ResponseBody::Stream(body)
    }

    pub fn is_empty(&self) -> bool {
        match self {
            ResponseBody::Empty => true,
            ResponseBody::Bytes(bytes) => bytes.is_empty(),
            ResponseBody::Stream(_) => false,
        }
    }

    fn into_body(self) -> Body {
        match self {
            ResponseBody::Empty => Body::empty(),
            ResponseBody::Bytes(bytes) => Body::from(bytes),
            ResponseBody::Stream(body) => body,
        }
    }
}

impl fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseBody::Empty => f.write_str("Empty"),
            ResponseBody::Bytes(bytes) => write!(f, "Bytes({} bytes)", bytes.len()),
            ResponseBody::Stream(_) => f.write_str("Stream"),
        }
    }
}

impl From<&'static str> for ResponseBody {
    fn from(value: &'static str) -> Self {
        ResponseBody::Bytes(Bytes::from_static(value.as_bytes()))
    }
}

impl From<String> for ResponseBody {
    fn from(value: String) -> Self {
        ResponseBody::Bytes(Bytes::from(value))
    }
}

impl From<Vec<u8>> for ResponseBody {
    fn from(value: Vec<u8>) -> Self {
        ResponseBody::Bytes(Bytes::from(value))
    }
}

impl From<Bytes> for ResponseBody {
    fn from(value: Bytes) -> Self {
        ResponseBody::Bytes(value)
    }
}

#[derive(Debug, Default)]
pub struct Response {
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: ResponseBody,
}

impl Response {
    pub fn new() -> Self {
        Self::default()
    }

    /// Status set so far, if any.
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) -> &mut Self {
        self.status = Some(status);
        self
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Write a typed header: replaces any earlier value unless the header is
    /// multi-valued, in which case the value is appended.
    pub fn add<T: 'static>(&mut self, header: &HeaderType<T>, value: &T) -> Result<&mut Self, EncodingError> {
        header.write(&mut self.headers, value)?;
        Ok(self)
    }

    /// Read back a typed header written by an earlier actor.
    pub fn get<T: 'static>(&self, header: &HeaderType<T>) -> Result<Option<T>, DecodingError> {
        header.read(&self.headers)
    }

    pub fn body(&self) -> &ResponseBody {
        &self.body
    }

    pub fn set_body(&mut self, body: impl Into<ResponseBody>) -> &mut Self {
        self.body = body.into();
        self
    }

    /// Finalize into a transport response. Status defaults to 200.
    pub fn into_http(self) -> axum::response::Response {
        let mut response = axum::response::Response::new(self.body.into_body());
        *response.status_mut() = self.status.unwrap_or(StatusCode::OK);
        *response.headers_mut() = self.headers;
        response
    }
}
