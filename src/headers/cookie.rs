//! Cookie and Set-Cookie codecs (RFC 6265).
//!
//! Two request-side variants exist:
//! - strict: names must be tokens and values cookie-octets, optionally
//!   double-quoted. Invalid pairs are dropped on decode and rejected on encode.
//! - lax: any non-empty name is accepted and values are taken verbatim.
//!
//! Decoding keeps the first occurrence when a name repeats. Encoding refuses
//! repeated names and anything decoding would not give back unchanged.

use std::collections::HashSet;

use axum::http::HeaderName;
use chrono::{DateTime, Utc};

use super::codec::HeaderCodec;
use super::date::{ensure_whole_seconds, format_http_date, parse_http_date};
use crate::config::CookieMode;
use crate::error::{DecodingError, EncodingError};

/// A request cookie pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Request `Cookie` header codec.
#[derive(Debug, Clone, Copy)]
pub struct CookieCodec {
    mode: CookieMode,
}

impl CookieCodec {
    pub fn new(mode: CookieMode) -> Self {
        Self { mode }
    }

    pub fn strict() -> Self {
        Self::new(CookieMode::Strict)
    }

    pub fn lax() -> Self {
        Self::new(CookieMode::Lax)
    }

    fn accepts(&self, name: &str, value: &str) -> bool {
        match self.mode {
            // `$`-prefixed names are RFC 2965 attributes such as $Version.
            CookieMode::Strict => is_token(name) && !name.starts_with('$') && is_cookie_value(value),
            CookieMode::Lax => !name.is_empty(),
        }
    }

    /// Why `cookie` cannot be written so that decoding yields it back.
    fn unencodable(&self, cookie: &Cookie) -> Option<&'static str> {
        if !self.accepts(&cookie.name, &cookie.value) {
            return Some("is not valid in this mode");
        }
        if self.mode == CookieMode::Strict {
            return None;
        }
        if cookie.name.contains(['=', ';']) || cookie.value.contains(';') {
            return Some("would break the pair syntax");
        }
        if cookie.name.trim() != cookie.name || cookie.value.trim() != cookie.value {
            return Some("has surrounding whitespace");
        }
        if cookie.value.len() >= 2 && cookie.value.starts_with('"') && cookie.value.ends_with('"') {
            return Some("has a quoted value");
        }
        None
    }
}

impl HeaderCodec<Vec<Cookie>> for CookieCodec {
    fn encode(&self, name: &HeaderName, value: &Vec<Cookie>) -> Result<String, EncodingError> {
        if value.is_empty() {
            return Err(EncodingError::new(name.as_str(), "no cookies to encode"));
        }
        let mut seen = HashSet::new();
        let mut pairs = Vec::with_capacity(value.len());
        for cookie in value {
            if let Some(problem) = self.unencodable(cookie) {
                return Err(EncodingError::new(
                    name.as_str(),
                    format!("cookie `{}` {problem} ({} mode)", cookie.name, self.mode.label()),
                ));
            }
            if !seen.insert(cookie.name.as_str()) {
                return Err(EncodingError::new(
                    name.as_str(),
                    format!("cookie `{}` appears twice", cookie.name),
                ));
            }
            pairs.push(format!("{}={}", cookie.name, cookie.value));
        }
        Ok(pairs.join("; "))
    }

    fn decode(&self, _name: &HeaderName, text: &str) -> Result<Vec<Cookie>, DecodingError> {
        let mut seen = HashSet::new();
        let mut cookies = Vec::new();
        for pair in text.split(';') {
            let pair = pair.trim();
            if pair.is_empty() {
                continue;
            }
            let (name, value) = match pair.split_once('=') {
                Some((name, value)) => (name.trim(), value.trim()),
                None => (pair, ""),
            };
            let value = unquote(value);
            if !self.accepts(name, value) {
                tracing::trace!(cookie = %name, mode = self.mode.label(), "dropping invalid cookie");
                continue;
            }
            if seen.insert(name.to_string()) {
                cookies.push(Cookie::new(name, value));
            }
        }
        Ok(cookies)
    }

    /// Browsers send one `Cookie` line, but HTTP/2 may split it; rejoin
    /// with `"; "` as RFC 9113 section 8.2.3 prescribes.
    fn decode_lines(&self, name: &HeaderName, lines: &[&str]) -> Result<Vec<Cookie>, DecodingError> {
        self.decode(name, &lines.join("; "))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl SameSite {
    fn as_str(self) -> &'static str {
        match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        }
    }

    fn parse(text: &str) -> Option<Self> {
        match text.to_ascii_lowercase().as_str() {
            "strict" => Some(SameSite::Strict),
            "lax" => Some(SameSite::Lax),
            "none" => Some(SameSite::None),
            _ => None,
        }
    }
}

/// A response cookie with its attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetCookie {
    pub name: String,
    pub value: String,
    pub path: Option<String>,
    pub domain: Option<String>,
    pub max_age: Option<i64>,
    pub expires: Option<DateTime<Utc>>,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: Option<SameSite>,
}

impl SetCookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            path: None,
            domain: None,
            max_age: None,
            expires: None,
            secure: false,
            http_only: false,
            same_site: None,
        }
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn max_age(mut self, seconds: i64) -> Self {
        self.max_age = Some(seconds);
        self
    }

    pub fn expires(mut self, at: DateTime<Utc>) -> Self {
        self.expires = Some(at);
        self
    }

    pub fn secure(mut self) -> Self {
        self.secure = true;
        self
    }

    pub fn http_only(mut self) -> Self {
        self.http_only = true;
        self
    }

    pub fn same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = Some(same_site);
        self
    }
}

/// Response `Set-Cookie` codec. One header line per cookie.
#[derive(Debug, Clone, Copy, Default)]
pub struct SetCookieCodec;

impl SetCookieCodec {
    fn encode_one(name: &HeaderName, cookie: &SetCookie) -> Result<String, EncodingError> {
        if !is_token(&cookie.name) || !is_cookie_value(&cookie.value) {
            return Err(EncodingError::new(
                name.as_str(),
                format!("cookie `{}` is not a valid name/value pair", cookie.name),
            ));
        }
        let mut line = format!("{}={}", cookie.name, cookie.value);
        for (attr, value) in [("Path", &cookie.path), ("Domain", &cookie.domain)] {
            if let Some(value) = value {
                if value.contains([';', '\r', '\n']) {
                    return Err(EncodingError::new(
                        name.as_str(),
                        format!("{attr} attribute contains a forbidden character"),
                    ));
                }
                line.push_str(&format!("; {attr}={value}"));
            }
        }
        if let Some(max_age) = cookie.max_age {
            line.push_str(&format!("; Max-Age={max_age}"));
        }
        if let Some(expires) = &cookie.expires {
            ensure_whole_seconds(name, expires)?;
            line.push_str(&format!("; Expires={}", format_http_date(expires)));
        }
        if cookie.secure {
            line.push_str("; Secure");
        }
        if cookie.http_only {
            line.push_str("; HttpOnly");
        }
        if let Some(same_site) = cookie.same_site {
            line.push_str(&format!("; SameSite={}", same_site.as_str()));
        }
        Ok(line)
    }

    fn decode_one(name: &HeaderName, line: &str) -> Result<SetCookie, DecodingError> {
        let mut parts = line.split(';');
        let pair = parts.next().unwrap_or_default().trim();
        let (cookie_name, value) = pair
            .split_once('=')
            .ok_or_else(|| DecodingError::new(name.as_str(), "missing `=` in cookie pair"))?;
        let cookie_name = cookie_name.trim();
        if cookie_name.is_empty() {
            return Err(DecodingError::new(name.as_str(), "empty cookie name"));
        }
        let mut cookie = SetCookie::new(cookie_name, unquote(value.trim()));

        for attr in parts {
            let attr = attr.trim();
            let (key, value) = match attr.split_once('=') {
                Some((key, value)) => (key.trim(), Some(value.trim())),
                None => (attr, None),
            };
            // Unknown or malformed attributes are ignored (RFC 6265 section 5.2).
            match (key.to_ascii_lowercase().as_str(), value) {
                ("path", Some(v)) => cookie.path = Some(v.to_string()),
                ("domain", Some(v)) => cookie.domain = Some(v.to_string()),
                ("max-age", Some(v)) => cookie.max_age = v.parse().ok().or(cookie.max_age),
                ("expires", Some(v)) => cookie.expires = parse_http_date(v).or(cookie.expires),
                ("secure", _) => cookie.secure = true,
                ("httponly", _) => cookie.http_only = true,
                ("samesite", Some(v)) => cookie.same_site = SameSite::parse(v),
                _ => {}
            }
        }
        Ok(cookie)
    }
}

impl HeaderCodec<Vec<SetCookie>> for SetCookieCodec {
    fn encode(&self, name: &HeaderName, value: &Vec<SetCookie>) -> Result<String, EncodingError> {
        // Only reachable through encode_text; a single line cannot hold more
        // than one cookie.
        match value.as_slice() {
            [one] => Self::encode_one(name, one),
            _ => Err(EncodingError::new(
                name.as_str(),
                "Set-Cookie text holds exactly one cookie",
            )),
        }
    }

    fn decode(&self, name: &HeaderName, text: &str) -> Result<Vec<SetCookie>, DecodingError> {
        Ok(vec![Self::decode_one(name, text)?])
    }

    fn encode_lines(&self, name: &HeaderName, value: &Vec<SetCookie>) -> Result<Vec<String>, EncodingError> {
        value.iter().map(|cookie| Self::encode_one(name, cookie)).collect()
    }

    fn decode_lines(&self, name: &HeaderName, lines: &[&str]) -> Result<Vec<SetCookie>, DecodingError> {
        lines.iter().map(|line| Self::decode_one(name, line)).collect()
    }
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

/// RFC 9110 token.
fn is_token(text: &str) -> bool {
    !text.is_empty()
        && text.bytes().all(|b| {
            b.is_ascii_alphanumeric()
                || matches!(
                    b,
                    b'!' | b'#' | b'$' | b'%' | b'&' | b'\'' | b'*' | b'+' | b'-' | b'.' | b'^'
                        | b'_' | b'`' | b'|' | b'~'
                )
        })
}

/// RFC 6265 cookie-octet*.
fn is_cookie_value(text: &str) -> bool {
    text.bytes()
        .all(|b| matches!(b, 0x21 | 0x23..=0x2B | 0x2D..=0x3A | 0x3C..=0x5B | 0x5D..=0x7E))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn name() -> HeaderName {
        HeaderName::from_static("cookie")
    }

    #[test]
    fn strict_drops_invalid_pairs() {
        let cookies = CookieCodec::strict()
            .decode(&name(), "a=1; b=has space; c=\"quoted\"; $Version=1")
            .unwrap();
        assert_eq!(cookies, vec![Cookie::new("a", "1"), Cookie::new("c", "quoted")]);
    }

    #[test]
    fn lax_keeps_what_strict_drops() {
        let cookies = CookieCodec::lax()
            .decode(&name(), "a=1; b=has space; flag")
            .unwrap();
        assert_eq!(
            cookies,
            vec![
                Cookie::new("a", "1"),
                Cookie::new("b", "has space"),
                Cookie::new("flag", ""),
            ]
        );
    }

    #[test]
    fn first_occurrence_wins() {
        let cookies = CookieCodec::strict().decode(&name(), "id=1; id=2").unwrap();
        assert_eq!(cookies, vec![Cookie::new("id", "1")]);
    }

    #[test]
    fn strict_refuses_to_encode_invalid_values() {
        let err = CookieCodec::strict()
            .encode(&name(), &vec![Cookie::new("a", "x y")])
            .unwrap_err();
        assert!(err.reason.contains("strict mode"));
        assert!(CookieCodec::lax()
            .encode(&name(), &vec![Cookie::new("a", "x y")])
            .is_ok());
    }

    #[test]
    fn strict_refuses_attribute_names() {
        let header = crate::headers::standard::cookie(CookieMode::Strict);
        let mut headers = axum::http::HeaderMap::new();
        let err = header
            .write(&mut headers, &vec![Cookie::new("$session", "abc")])
            .unwrap_err();
        assert!(err.reason.contains("$session"));
        assert!(headers.is_empty());
    }

    #[test]
    fn lax_refuses_values_decoding_would_alter() {
        for cookie in [
            Cookie::new("a", " x "),
            Cookie::new("b", "\"q\""),
            Cookie::new(" c", "1"),
            Cookie::new("d", "x;y"),
        ] {
            assert!(
                CookieCodec::lax().encode(&name(), &vec![cookie.clone()]).is_err(),
                "{cookie:?} was accepted"
            );
        }
        let kept = vec![Cookie::new("a", "x y"), Cookie::new("b", "q\"")];
        let text = CookieCodec::lax().encode(&name(), &kept).unwrap();
        assert_eq!(CookieCodec::lax().decode(&name(), &text).unwrap(), kept);
    }

    #[test]
    fn repeated_names_are_refused_on_encode() {
        let err = CookieCodec::strict()
            .encode(&name(), &vec![Cookie::new("id", "1"), Cookie::new("id", "2")])
            .unwrap_err();
        assert!(err.reason.contains("twice"));
    }

    #[test]
    fn encodes_pairs_in_order() {
        let text = CookieCodec::strict()
            .encode(&name(), &vec![Cookie::new("a", "1"), Cookie::new("b", "2")])
            .unwrap();
        assert_eq!(text, "a=1; b=2");
    }

    #[test]
    fn empty_header_decodes_to_empty_list() {
        assert!(CookieCodec::strict().decode(&name(), "").unwrap().is_empty());
    }

    #[test]
    fn set_cookie_lines_carry_attributes() {
        let header = HeaderName::from_static("set-cookie");
        let expires = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();
        let cookie = SetCookie::new("session", "abc")
            .path("/")
            .max_age(3600)
            .expires(expires)
            .secure()
            .http_only()
            .same_site(SameSite::Lax);
        let lines = SetCookieCodec.encode_lines(&header, &vec![cookie.clone()]).unwrap();
        assert_eq!(
            lines,
            vec![
                "session=abc; Path=/; Max-Age=3600; Expires=Tue, 01 Jan 2030 00:00:00 GMT; Secure; HttpOnly; SameSite=Lax"
                    .to_string()
            ]
        );
        let decoded = SetCookieCodec
            .decode_lines(&header, &[lines[0].as_str()])
            .unwrap();
        assert_eq!(decoded, vec![cookie]);
    }

    #[test]
    fn set_cookie_requires_a_pair() {
        let header = HeaderName::from_static("set-cookie");
        assert!(SetCookieCodec.decode(&header, "Secure").is_err());
    }
}
