//! Destination for internal errors.
//!
//! Chain contract violations, actor failures and resource close failures are
//! never shown to the client verbatim. They are handed to an [`ErrorSink`].

use crate::error::Error;

use super::metrics;

pub trait ErrorSink: Send + Sync {
    fn report_internal_error(&self, error: &Error);
}

/// Default sink: logs at error level and counts by kind.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingSink;

impl ErrorSink for LoggingSink {
    fn report_internal_error(&self, error: &Error) {
        tracing::error!(kind = error.kind(), error = %error, "Internal error");
        metrics::record_internal_error(error.kind());
    }
}
