//! Request spans.
//!
//! Every dispatch runs inside a span carrying the request ID, so engine
//! transitions and sink reports correlate without passing IDs around.

use tracing::Span;

use crate::http::Event;

pub fn request_span(event: &Event) -> Span {
    tracing::info_span!(
        "request",
        request_id = %event.request_id(),
        method = %event.method(),
        path = %event.path(),
        page = tracing::field::Empty,
    )
}
