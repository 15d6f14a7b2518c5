//! HTTP-date codec (RFC 9110 section 5.6.7).
//!
//! Always emits IMF-fixdate. Accepts IMF-fixdate, the obsolete RFC 850 form
//! and asctime, as recipients are required to.
//!
//! An HTTP-date has whole-second resolution. The codec refuses values with a
//! fractional second instead of silently dropping it; pass such values
//! through [`truncate_to_seconds`] first.

use axum::http::HeaderName;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};

use super::codec::HeaderCodec;
use crate::error::{DecodingError, EncodingError};

const IMF_FIXDATE: &str = "%a, %d %b %Y %H:%M:%S GMT";
const RFC_850: &str = "%A, %d-%b-%y %H:%M:%S GMT";
const ASCTIME: &str = "%a %b %e %H:%M:%S %Y";

#[derive(Debug, Clone, Copy, Default)]
pub struct HttpDateCodec;

impl HeaderCodec<DateTime<Utc>> for HttpDateCodec {
    fn encode(&self, name: &HeaderName, value: &DateTime<Utc>) -> Result<String, EncodingError> {
        ensure_whole_seconds(name, value)?;
        Ok(format_http_date(value))
    }

    fn decode(&self, name: &HeaderName, text: &str) -> Result<DateTime<Utc>, DecodingError> {
        parse_http_date(text)
            .ok_or_else(|| DecodingError::new(name.as_str(), format!("`{text}` is not an HTTP date")))
    }
}

/// Render as IMF-fixdate. Any fractional second is dropped.
pub fn format_http_date(value: &DateTime<Utc>) -> String {
    value.format(IMF_FIXDATE).to_string()
}

/// Parse any of the three accepted HTTP-date forms. Sub-second precision is
/// not representable and never produced.
pub fn parse_http_date(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(parsed) = NaiveDateTime::parse_from_str(text, IMF_FIXDATE) {
        return Some(Utc.from_utc_datetime(&parsed));
    }
    if let Ok(parsed) = DateTime::parse_from_rfc2822(text) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(parsed) = NaiveDateTime::parse_from_str(text, RFC_850) {
        return Some(Utc.from_utc_datetime(&parsed));
    }
    // asctime pads single-digit days with a space; collapse runs so %e matches.
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    NaiveDateTime::parse_from_str(&collapsed, ASCTIME)
        .ok()
        .map(|parsed| Utc.from_utc_datetime(&parsed))
}

pub(crate) fn ensure_whole_seconds(
    name: &HeaderName,
    value: &DateTime<Utc>,
) -> Result<(), EncodingError> {
    if value.timestamp_subsec_nanos() != 0 {
        return Err(EncodingError::new(
            name.as_str(),
            "HTTP dates have whole-second resolution",
        ));
    }
    Ok(())
}

/// Truncate to whole seconds, the resolution of an HTTP-date.
pub fn truncate_to_seconds(value: DateTime<Utc>) -> DateTime<Utc> {
    Utc.timestamp_opt(value.timestamp(), 0)
        .single()
        .unwrap_or(value)
}
