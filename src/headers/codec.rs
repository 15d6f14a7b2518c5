//! Typed header descriptors.
//!
//! A [`HeaderType<T>`] ties a header name to the Rust type its value decodes
//! to and to the codec that converts in both directions. Values written with
//! `encode` always decode back to an equivalent value, though not necessarily
//! to identical text (multi-valued headers may be split or joined).

use std::fmt;
use std::sync::Arc;

use axum::http::{HeaderMap, HeaderName, HeaderValue};

use crate::error::{DecodingError, EncodingError};

/// Bidirectional text conversion for one header value type.
pub trait HeaderCodec<T>: Send + Sync {
    /// Render a value as header text.
    fn encode(&self, name: &HeaderName, value: &T) -> Result<String, EncodingError>;

    /// Parse header text into a value.
    fn decode(&self, name: &HeaderName, text: &str) -> Result<T, DecodingError>;

    /// Render a value as one or more header lines.
    ///
    /// Codecs whose values cannot share a line (e.g. `Set-Cookie`) override
    /// this to emit one line per item.
    fn encode_lines(&self, name: &HeaderName, value: &T) -> Result<Vec<String>, EncodingError> {
        Ok(vec![self.encode(name, value)?])
    }

    /// Parse every line present for the header into one value.
    ///
    /// The default joins the lines with `", "`, which is the list syntax of
    /// RFC 9110 section 5.3.
    fn decode_lines(&self, name: &HeaderName, lines: &[&str]) -> Result<T, DecodingError> {
        match lines {
            [single] => self.decode(name, single),
            many => self.decode(name, &many.join(", ")),
        }
    }
}

/// A named, typed header with its codec.
pub struct HeaderType<T> {
    name: HeaderName,
    multi_valued: bool,
    codec: Arc<dyn HeaderCodec<T>>,
}

impl<T> Clone for HeaderType<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            multi_valued: self.multi_valued,
            codec: Arc::clone(&self.codec),
        }
    }
}

impl<T> fmt::Debug for HeaderType<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeaderType")
            .field("name", &self.name)
            .field("multi_valued", &self.multi_valued)
            .finish()
    }
}

impl<T: 'static> HeaderType<T> {
    pub fn new(name: HeaderName, codec: impl HeaderCodec<T> + 'static) -> Self {
        Self {
            name,
            multi_valued: false,
            codec: Arc::new(codec),
        }
    }

    /// Mark the header as multi-valued: writes append instead of replace.
    pub fn multi_valued(mut self) -> Self {
        self.multi_valued = true;
        self
    }

    pub fn name(&self) -> &HeaderName {
        &self.name
    }

    pub fn is_multi_valued(&self) -> bool {
        self.multi_valued
    }

    /// Encode a value into header text.
    pub fn encode_text(&self, value: &T) -> Result<String, EncodingError> {
        self.codec.encode(&self.name, value)
    }

    /// Decode header text into a value.
    pub fn decode_text(&self, text: &str) -> Result<T, DecodingError> {
        self.codec.decode(&self.name, text)
    }

    /// Encode a value into header values ready to be placed in a map.
    pub fn encode(&self, value: &T) -> Result<Vec<HeaderValue>, EncodingError> {
        self.codec
            .encode_lines(&self.name, value)?
            .into_iter()
            .map(|line| {
                HeaderValue::from_str(&line).map_err(|_| {
                    EncodingError::new(self.name.as_str(), "contains bytes not allowed in a header")
                })
            })
            .collect()
    }

    /// Read the header from a map.
    ///
    /// Returns `Ok(None)` when the header is absent and `Err` when it is
    /// present but malformed.
    pub fn read(&self, headers: &HeaderMap) -> Result<Option<T>, DecodingError> {
        let mut lines = Vec::new();
        for value in headers.get_all(&self.name) {
            let text = value.to_str().map_err(|_| {
                DecodingError::new(self.name.as_str(), "header is not visible ASCII")
            })?;
            lines.push(text);
        }
        if lines.is_empty() {
            return Ok(None);
        }
        if !self.multi_valued {
            // Single-valued headers honour the last line written.
            lines.drain(..lines.len() - 1);
        }
        self.codec.decode_lines(&self.name, &lines).map(Some)
    }

    /// Write the header into a map: replace for single-valued headers,
    /// append for multi-valued ones.
    pub fn write(&self, headers: &mut HeaderMap, value: &T) -> Result<(), EncodingError> {
        let values = self.encode(value)?;
        if !self.multi_valued {
            headers.remove(&self.name);
        }
        for value in values {
            headers.append(self.name.clone(), value);
        }
        Ok(())
    }
}

/// Free-form text header.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextCodec;

impl HeaderCodec<String> for TextCodec {
    fn encode(&self, name: &HeaderName, value: &String) -> Result<String, EncodingError> {
        if value.chars().any(|c| c == '\r' || c == '\n') {
            return Err(EncodingError::new(name.as_str(), "line breaks are not allowed"));
        }
        if value.trim() != value {
            return Err(EncodingError::new(name.as_str(), "surrounding whitespace would be lost"));
        }
        Ok(value.clone())
    }

    fn decode(&self, _name: &HeaderName, text: &str) -> Result<String, DecodingError> {
        Ok(text.trim().to_string())
    }
}

/// Non-negative integer header, e.g. `Content-Length`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NumberCodec;

impl HeaderCodec<u64> for NumberCodec {
    fn encode(&self, _name: &HeaderName, value: &u64) -> Result<String, EncodingError> {
        Ok(value.to_string())
    }

    fn decode(&self, name: &HeaderName, text: &str) -> Result<u64, DecodingError> {
        text.trim()
            .parse()
            .map_err(|_| DecodingError::new(name.as_str(), format!("`{text}` is not a number")))
    }
}

/// Comma separated list whose items use another codec.
///
/// Decoding a header that is present but holds no items yields an empty
/// vector.
#[derive(Debug, Clone, Copy, Default)]
pub struct ListCodec<C>(pub C);

impl<T, C> HeaderCodec<Vec<T>> for ListCodec<C>
where
    C: HeaderCodec<T>,
{
    fn encode(&self, name: &HeaderName, value: &Vec<T>) -> Result<String, EncodingError> {
        let items = value
            .iter()
            .map(|item| self.0.encode(name, item))
            .collect::<Result<Vec<_>, _>>()?;
        if items.iter().any(|item| item.contains(',')) {
            return Err(EncodingError::new(name.as_str(), "list items may not contain ','"));
        }
        if items.iter().any(|item| item.is_empty()) {
            return Err(EncodingError::new(name.as_str(), "list items may not be empty"));
        }
        Ok(items.join(", "))
    }

    fn decode(&self, name: &HeaderName, text: &str) -> Result<Vec<T>, DecodingError> {
        text.split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(|item| self.0.decode(name, item))
            .collect()
    }
}

/// HTTP method token, used by `Allow`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MethodCodec;

impl HeaderCodec<axum::http::Method> for MethodCodec {
    fn encode(
        &self,
        _name: &HeaderName,
        value: &axum::http::Method,
    ) -> Result<String, EncodingError> {
        Ok(value.as_str().to_string())
    }

    fn decode(&self, name: &HeaderName, text: &str) -> Result<axum::http::Method, DecodingError> {
        axum::http::Method::from_bytes(text.trim().as_bytes())
            .map_err(|_| DecodingError::new(name.as_str(), format!("`{text}` is not a method")))
    }
}
