//! The standard header set.

use axum::http::{header, HeaderName, Method};
use chrono::{DateTime, Utc};

use super::codec::{HeaderType, ListCodec, MethodCodec, NumberCodec, TextCodec};
use super::cookie::{Cookie, CookieCodec, SetCookie, SetCookieCodec};
use super::date::HttpDateCodec;
use crate::config::CookieMode;

pub fn date() -> HeaderType<DateTime<Utc>> {
    HeaderType::new(header::DATE, HttpDateCodec)
}

pub fn last_modified() -> HeaderType<DateTime<Utc>> {
    HeaderType::new(header::LAST_MODIFIED, HttpDateCodec)
}

pub fn if_modified_since() -> HeaderType<DateTime<Utc>> {
    HeaderType::new(header::IF_MODIFIED_SINCE, HttpDateCodec)
}

pub fn expires() -> HeaderType<DateTime<Utc>> {
    HeaderType::new(header::EXPIRES, HttpDateCodec)
}

pub fn content_length() -> HeaderType<u64> {
    HeaderType::new(header::CONTENT_LENGTH, NumberCodec)
}

pub fn content_type() -> HeaderType<String> {
    HeaderType::new(header::CONTENT_TYPE, TextCodec)
}

pub fn etag() -> HeaderType<String> {
    HeaderType::new(header::ETAG, TextCodec)
}

pub fn location() -> HeaderType<String> {
    HeaderType::new(header::LOCATION, TextCodec)
}

pub fn allow() -> HeaderType<Vec<Method>> {
    HeaderType::new(header::ALLOW, ListCodec(MethodCodec)).multi_valued()
}

pub fn vary() -> HeaderType<Vec<String>> {
    HeaderType::new(header::VARY, ListCodec(TextCodec)).multi_valued()
}

/// Request cookies in the given validation mode. Prefer
/// [`HeaderRegistry::cookie`](super::HeaderRegistry::cookie), which honours
/// the configured mode.
pub fn cookie(mode: CookieMode) -> HeaderType<Vec<Cookie>> {
    HeaderType::new(header::COOKIE, CookieCodec::new(mode))
}

pub fn set_cookie() -> HeaderType<Vec<SetCookie>> {
    HeaderType::new(header::SET_COOKIE, SetCookieCodec).multi_valued()
}

/// Any header, as trimmed text.
pub fn header(name: HeaderName) -> HeaderType<String> {
    HeaderType::new(name, TextCodec)
}
