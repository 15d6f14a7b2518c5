//! Header registry with per-name codec variants.
//!
//! Several codecs may be registered for one header name under different
//! labels (e.g. `strict` and `lax` cookies). [`HeaderRegistryBuilder::build`]
//! resolves exactly one active variant per name; the registry is immutable
//! afterwards and shared behind an `Arc`.

use std::any::{type_name, Any};
use std::collections::HashMap;

use axum::http::{HeaderMap, HeaderName};
use thiserror::Error;

use super::codec::HeaderType;
use super::cookie::Cookie;
use super::standard;
use crate::config::{CookieMode, HeaderConfig};
use crate::error::{DecodingError, EncodingError};

const DEFAULT_VARIANT: &str = "default";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("header `{header}` has no variant named `{label}`")]
    UnknownVariant { header: String, label: String },
    #[error("header `{header}` has {count} variants and none was selected")]
    Ambiguous { header: String, count: usize },
    #[error("header `{header}` variant `{label}` registered twice")]
    Duplicate { header: String, label: String },
}

struct Variant {
    label: String,
    header: Box<dyn Any + Send + Sync>,
}

#[derive(Default)]
pub struct HeaderRegistryBuilder {
    variants: HashMap<HeaderName, Vec<Variant>>,
    selections: HashMap<HeaderName, String>,
}

impl HeaderRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the only codec for a header.
    pub fn register<T: Send + Sync + 'static>(
        self,
        header: HeaderType<T>,
    ) -> Result<Self, RegistryError> {
        self.variant(DEFAULT_VARIANT, header)
    }

    /// Register a labelled codec variant.
    pub fn variant<T: Send + Sync + 'static>(
        mut self,
        label: impl Into<String>,
        header: HeaderType<T>,
    ) -> Result<Self, RegistryError> {
        let label = label.into();
        let variants = self.variants.entry(header.name().clone()).or_default();
        if variants.iter().any(|v| v.label == label) {
            return Err(RegistryError::Duplicate {
                header: header.name().to_string(),
                label,
            });
        }
        variants.push(Variant {
            label,
            header: Box::new(header),
        });
        Ok(self)
    }

    /// Choose which variant is active for a header name.
    pub fn select(mut self, name: HeaderName, label: impl Into<String>) -> Self {
        self.selections.insert(name, label.into());
        self
    }

    pub fn build(mut self) -> Result<HeaderRegistry, RegistryError> {
        let mut active = HashMap::with_capacity(self.variants.len());
        for (name, mut variants) in self.variants {
            let index = match self.selections.remove(&name) {
                Some(label) => variants
                    .iter()
                    .position(|v| v.label == label)
                    .ok_or_else(|| RegistryError::UnknownVariant {
                        header: name.to_string(),
                        label,
                    })?,
                None if variants.len() == 1 => 0,
                None => {
                    return Err(RegistryError::Ambiguous {
                        header: name.to_string(),
                        count: variants.len(),
                    })
                }
            };
            active.insert(name, variants.swap_remove(index));
        }
        if let Some((name, label)) = self.selections.into_iter().next() {
            return Err(RegistryError::UnknownVariant {
                header: name.to_string(),
                label,
            });
        }
        Ok(HeaderRegistry { active })
    }
}

/// The resolved set of header codecs.
pub struct HeaderRegistry {
    active: HashMap<HeaderName, Variant>,
}

impl std::fmt::Debug for HeaderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.active.iter().map(|(name, v)| (name.as_str(), v.label.as_str())))
            .finish()
    }
}

impl HeaderRegistry {
    pub fn builder() -> HeaderRegistryBuilder {
        HeaderRegistryBuilder::new()
    }

    /// Every standard header, with the cookie variant taken from config.
    pub fn standard(config: &HeaderConfig) -> Result<Self, RegistryError> {
        Self::builder()
            .register(standard::date())?
            .register(standard::last_modified())?
            .register(standard::if_modified_since())?
            .register(standard::expires())?
            .register(standard::content_length())?
            .register(standard::content_type())?
            .register(standard::etag())?
            .register(standard::location())?
            .register(standard::allow())?
            .register(standard::vary())?
            .register(standard::set_cookie())?
            .variant(CookieMode::Strict.label(), standard::cookie(CookieMode::Strict))?
            .variant(CookieMode::Lax.label(), standard::cookie(CookieMode::Lax))?
            .select(axum::http::header::COOKIE, config.cookies.label())
            .build()
    }

    /// The active header type for `name`, if it decodes to `T`.
    pub fn get<T: Send + Sync + 'static>(&self, name: &HeaderName) -> Option<HeaderType<T>> {
        let variant = self.active.get(name)?;
        let header = variant.header.downcast_ref::<HeaderType<T>>();
        if header.is_none() {
            tracing::debug!(
                header = %name,
                requested = type_name::<T>(),
                "registered header has a different value type"
            );
        }
        header.cloned()
    }

    /// Names that have an active codec.
    pub fn names(&self) -> impl Iterator<Item = &HeaderName> {
        self.active.keys()
    }

    /// Label of the active variant for `name`.
    pub fn active_variant(&self, name: &HeaderName) -> Option<&str> {
        self.active.get(name).map(|v| v.label.as_str())
    }

    /// The configured request cookie codec. Falls back to strict when the
    /// registry was built without one.
    pub fn cookie(&self) -> HeaderType<Vec<Cookie>> {
        self.get(&axum::http::header::COOKIE)
            .unwrap_or_else(|| standard::cookie(CookieMode::Strict))
    }

    /// Decode a header from a map using the active variant for its name,
    /// or the given type when nothing is registered.
    pub fn decode<T: Send + Sync + 'static>(
        &self,
        header: &HeaderType<T>,
        headers: &HeaderMap,
    ) -> Result<Option<T>, DecodingError> {
        match self.get::<T>(header.name()) {
            Some(active) => active.read(headers),
            None => header.read(headers),
        }
    }

    /// Encode a value to header text using the active variant for its name.
    pub fn encode<T: Send + Sync + 'static>(
        &self,
        header: &HeaderType<T>,
        value: &T,
    ) -> Result<String, EncodingError> {
        match self.get::<T>(header.name()) {
            Some(active) => active.encode_text(value),
            None => header.encode_text(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headers::cookie::{SameSite, SetCookie};
    use axum::http::{header, HeaderValue, Method};
    use chrono::{TimeZone, Utc};
    use std::collections::HashSet;
    use std::fmt::Debug;

    fn config(cookies: CookieMode) -> HeaderConfig {
        HeaderConfig { cookies }
    }

    fn assert_round_trip<T>(registry: &HeaderRegistry, name: HeaderName, value: T) -> HeaderName
    where
        T: PartialEq + Debug + Send + Sync + 'static,
    {
        let header = registry
            .get::<T>(&name)
            .unwrap_or_else(|| panic!("{name} is not registered as {}", type_name::<T>()));
        let mut headers = HeaderMap::new();
        header.write(&mut headers, &value).unwrap();
        assert_eq!(header.read(&headers), Ok(Some(value)), "{name}");
        name
    }

    #[test]
    fn every_standard_header_round_trips_in_both_cookie_modes() {
        let when = Utc.with_ymd_and_hms(2023, 7, 14, 9, 30, 0).unwrap();
        for mode in [CookieMode::Strict, CookieMode::Lax] {
            let registry = HeaderRegistry::standard(&config(mode)).unwrap();
            let cookies = match mode {
                CookieMode::Strict => vec![Cookie::new("session", "abc123"), Cookie::new("theme", "dark")],
                CookieMode::Lax => vec![Cookie::new("note", "two words"), Cookie::new("$legacy", "1")],
            };
            let set_cookies = vec![
                SetCookie::new("session", "abc")
                    .path("/")
                    .domain("example.com")
                    .max_age(60)
                    .expires(when)
                    .secure()
                    .http_only()
                    .same_site(SameSite::Strict),
                SetCookie::new("plain", "1"),
            ];

            let covered: HashSet<HeaderName> = [
                assert_round_trip(&registry, header::DATE, when),
                assert_round_trip(&registry, header::LAST_MODIFIED, when),
                assert_round_trip(&registry, header::IF_MODIFIED_SINCE, when),
                assert_round_trip(&registry, header::EXPIRES, when),
                assert_round_trip(&registry, header::CONTENT_LENGTH, 1234u64),
                assert_round_trip(&registry, header::CONTENT_TYPE, "text/html; charset=utf-8".to_string()),
                assert_round_trip(&registry, header::ETAG, "\"v1\"".to_string()),
                assert_round_trip(&registry, header::LOCATION, "/next?page=2".to_string()),
                assert_round_trip(&registry, header::ALLOW, vec![Method::GET, Method::HEAD]),
                assert_round_trip(&registry, header::VARY, vec!["Accept".to_string(), "Origin".to_string()]),
                assert_round_trip(&registry, header::COOKIE, cookies),
                assert_round_trip(&registry, header::SET_COOKIE, set_cookies),
            ]
            .into_iter()
            .collect();

            let registered: HashSet<HeaderName> = registry.names().cloned().collect();
            assert_eq!(covered, registered, "{mode:?}");
        }
    }

    #[test]
    fn standard_selects_configured_cookie_variant() {
        let strict = HeaderRegistry::standard(&config(CookieMode::Strict)).unwrap();
        let lax = HeaderRegistry::standard(&config(CookieMode::Lax)).unwrap();
        assert_eq!(strict.active_variant(&header::COOKIE), Some("strict"));
        assert_eq!(lax.active_variant(&header::COOKIE), Some("lax"));

        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("a=1; b=x y"));
        assert_eq!(strict.cookie().read(&headers).unwrap().unwrap().len(), 1);
        assert_eq!(lax.cookie().read(&headers).unwrap().unwrap().len(), 2);
    }

    #[test]
    fn decode_goes_through_active_variant() {
        let lax = HeaderRegistry::standard(&config(CookieMode::Lax)).unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("b=x y"));
        // Caller holds the strict type; the registry still uses lax.
        let decoded = lax
            .decode(&standard::cookie(CookieMode::Strict), &headers)
            .unwrap()
            .unwrap();
        assert_eq!(decoded, vec![Cookie::new("b", "x y")]);
    }

    #[test]
    fn wrong_type_lookup_is_none() {
        let registry = HeaderRegistry::standard(&HeaderConfig::default()).unwrap();
        assert!(registry.get::<u64>(&header::LAST_MODIFIED).is_none());
        assert!(registry.get::<u64>(&header::CONTENT_LENGTH).is_some());
    }

    #[test]
    fn unselected_variants_are_ambiguous() {
        let result = HeaderRegistry::builder()
            .variant("strict", standard::cookie(CookieMode::Strict))
            .and_then(|b| b.variant("lax", standard::cookie(CookieMode::Lax)))
            .and_then(|b| b.build());
        assert!(matches!(result, Err(RegistryError::Ambiguous { count: 2, .. })));
    }

    #[test]
    fn unknown_selection_fails() {
        let result = HeaderRegistry::builder()
            .register(standard::etag())
            .map(|b| b.select(header::ETAG, "weak"))
            .and_then(|b| b.build());
        assert!(matches!(result, Err(RegistryError::UnknownVariant { .. })));
    }

    #[test]
    fn duplicate_labels_fail() {
        let result = HeaderRegistry::builder()
            .register(standard::etag())
            .and_then(|b| b.register(standard::etag()));
        assert!(matches!(result, Err(RegistryError::Duplicate { .. })));
    }
}
