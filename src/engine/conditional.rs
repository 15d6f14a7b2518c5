//! Conditional GET support.

use axum::http::{Method, StatusCode};

use super::actor::{Actor, ActorContext, Outcome};
use crate::error::ActorError;
use crate::headers;
use crate::headers::date::truncate_to_seconds;

/// Answers `304 Not Modified` when the `Last-Modified` header an earlier
/// actor placed on the response is not newer than the request's
/// `If-Modified-Since`. Continues otherwise.
///
/// An unparseable `If-Modified-Since` is ignored, as RFC 9110 section
/// 13.1.3 requires.
#[derive(Debug, Clone, Copy, Default)]
pub struct CheckIfModifiedSince;

impl Actor for CheckIfModifiedSince {
    fn act(&self, cx: &mut ActorContext<'_>) -> Result<Outcome, ActorError> {
        if !matches!(*cx.event().method(), Method::GET | Method::HEAD) {
            return Ok(Outcome::next());
        }
        let since = match cx.event().header(&headers::if_modified_since()) {
            Ok(Some(since)) => since,
            Ok(None) => return Ok(Outcome::next()),
            Err(e) => {
                tracing::debug!(error = %e, "Ignoring malformed If-Modified-Since");
                return Ok(Outcome::next());
            }
        };
        let Some(modified) = cx.response().get(&headers::last_modified())? else {
            return Ok(Outcome::next());
        };
        if truncate_to_seconds(modified) <= since {
            return Ok(Outcome::respond(StatusCode::NOT_MODIFIED, ""));
        }
        Ok(Outcome::next())
    }

    fn name(&self) -> &str {
        "check-if-modified-since"
    }
}
