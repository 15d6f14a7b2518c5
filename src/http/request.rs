//! Request context.
//!
//! An [`Event`] is the read-only view of one inbound request that every actor
//! in a chain sees. It is built once by the transport, shared behind an
//! `Arc`, and never mutated apart from the lazily read body.
//!
//! # Design Decisions
//! - The logical path has the configured mount point stripped
//! - Query parameters are flattened to a map; the first occurrence wins
//! - The body is read at most once, on demand, with a size limit; the bytes
//!   are cached for later readers

use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::sync::{Mutex, PoisonError};

use axum::body::{Body, Bytes};
use axum::extract::Query;
use axum::http::{header, HeaderMap, Method, Request, Uri, Version};
use serde::de::DeserializeOwned;
use tokio::sync::OnceCell;
use uuid::Uuid;

use crate::error::{DecodingError, TransportError};
use crate::headers::HeaderType;

/// Request ID header, set by the request-id layer when absent.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Limits and mount point applied while building an [`Event`].
#[derive(Debug, Clone)]
pub struct EventOptions {
    pub base_path: String,
    pub max_body_bytes: usize,
}

impl Default for EventOptions {
    fn default() -> Self {
        Self {
            base_path: String::new(),
            max_body_bytes: 2 * 1024 * 1024,
        }
    }
}

pub struct Event {
    method: Method,
    uri: Uri,
    version: Version,
    path: String,
    remote_addr: Option<SocketAddr>,
    headers: HeaderMap,
    params: HashMap<String, String>,
    request_id: Uuid,
    max_body_bytes: usize,
    body: Mutex<Option<Body>>,
    content: OnceCell<Bytes>,
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("request_id", &self.request_id)
            .field("method", &self.method)
            .field("path", &self.path)
            .field("remote_addr", &self.remote_addr)
            .finish_non_exhaustive()
    }
}

impl Event {
    pub fn from_request(
        request: Request<Body>,
        remote_addr: Option<SocketAddr>,
        options: &EventOptions,
    ) -> Self {
        let (parts, body) = request.into_parts();
        let path = strip_base_path(parts.uri.path(), &options.base_path).to_string();
        let params = parts
            .uri
            .query()
            .map(parse_query)
            .unwrap_or_default();
        let request_id = parts
            .headers
            .get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| Uuid::parse_str(v).ok())
            .unwrap_or_else(Uuid::new_v4);

        Self {
            method: parts.method,
            uri: parts.uri,
            version: parts.version,
            path,
            remote_addr,
            headers: parts.headers,
            params,
            request_id,
            max_body_bytes: options.max_body_bytes,
            body: Mutex::new(Some(body)),
            content: OnceCell::new(),
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn version(&self) -> Version {
        self.version
    }

    /// Request path with the mount point removed. Always starts with `/`.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    /// Decode a typed header. `Ok(None)` when absent.
    pub fn header<T: 'static>(&self, header: &HeaderType<T>) -> Result<Option<T>, DecodingError> {
        header.read(&self.headers)
    }

    /// The `Host` header, lowercased, without a port.
    pub fn host(&self) -> Option<String> {
        let host = self
            .headers
            .get(header::HOST)
            .and_then(|h| h.to_str().ok())
            .or_else(|| self.uri.host())?;
        let host = match host.rsplit_once(':') {
            Some((name, port)) if port.bytes().all(|b| b.is_ascii_digit()) => name,
            _ => host,
        };
        Some(host.to_ascii_lowercase())
    }

    pub fn params(&self) -> &HashMap<String, String> {
        &self.params
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn int_param(&self, name: &str) -> Result<Option<i32>, DecodingError> {
        self.parse_param(name)
    }

    pub fn long_param(&self, name: &str) -> Result<Option<i64>, DecodingError> {
        self.parse_param(name)
    }

    /// All query parameters deserialized into `T`.
    pub fn params_as<T: DeserializeOwned>(&self) -> Result<T, DecodingError> {
        Query::<T>::try_from_uri(&self.uri)
            .map(|Query(params)| params)
            .map_err(|rejection| DecodingError::new("query", rejection.body_text()))
    }

    fn parse_param<N: std::str::FromStr>(&self, name: &str) -> Result<Option<N>, DecodingError> {
        match self.param(name) {
            None => Ok(None),
            Some(raw) => raw.trim().parse().map(Some).map_err(|_| {
                DecodingError::new(name, format!("`{raw}` is not a valid number"))
            }),
        }
    }

    /// Whether the connection stays open after this exchange.
    pub fn is_keep_alive(&self) -> bool {
        let connection = self.headers.get(header::CONNECTION).and_then(|v| v.to_str().ok());
        let has = |token: &str| {
            connection
                .map(|v| v.split(',').any(|t| t.trim().eq_ignore_ascii_case(token)))
                .unwrap_or(false)
        };
        match self.version {
            Version::HTTP_09 => false,
            Version::HTTP_10 => has("keep-alive"),
            Version::HTTP_11 => !has("close"),
            _ => true,
        }
    }

    /// The request body, read on first call and cached.
    pub async fn content(&self) -> Result<Bytes, TransportError> {
        self.content
            .get_or_try_init(|| async {
                let body = self
                    .body
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .take()
                    .ok_or_else(|| TransportError::Body("body already failed to read".into()))?;
                axum::body::to_bytes(body, self.max_body_bytes)
                    .await
                    .map_err(|e| TransportError::Body(e.to_string()))
            })
            .await
            .cloned()
    }

    /// The body decoded as UTF-8.
    pub async fn content_as_string(&self) -> Result<String, TransportError> {
        let bytes = self.content().await?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| TransportError::Body("body is not valid UTF-8".into()))
    }
}

fn strip_base_path<'a>(path: &'a str, base_path: &str) -> &'a str {
    let base = base_path.trim_end_matches('/');
    if base.is_empty() {
        return path;
    }
    match path.strip_prefix(base) {
        Some("") => "/",
        Some(rest) if rest.starts_with('/') => rest,
        _ => path,
    }
}

fn parse_query(query: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        params.entry(key.into_owned()).or_insert_with(|| value.into_owned());
    }
    params
}
