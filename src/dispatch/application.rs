//! The dispatch root.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use axum::http::{header, HeaderValue, StatusCode};
use tracing::Instrument;

use crate::config::EngineConfig;
use crate::engine::{run_chain, ChainEnv, ChainResult, Page};
use crate::error::{ActorError, Error};
use crate::headers::{HeaderRegistry, RegistryError};
use crate::http::{Event, Response};
use crate::lifecycle::Closables;
use crate::observability::{metrics, tracing::request_span, ErrorSink, LoggingSink};
use crate::routing::RouteTable;

/// What the transport should do with a dispatched request.
#[derive(Debug)]
pub enum DispatchOutcome {
    /// Write this response.
    Response(axum::response::Response),
    /// The connection is gone; write nothing.
    Abandoned,
}

impl DispatchOutcome {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            DispatchOutcome::Response(r) => Some(r.status()),
            DispatchOutcome::Abandoned => None,
        }
    }
}

/// Ordered candidate pages plus everything their chains share.
pub struct Application {
    pages: Vec<Page>,
    headers: Arc<HeaderRegistry>,
    sink: Arc<dyn ErrorSink>,
    config: EngineConfig,
}

impl fmt::Debug for Application {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Application")
            .field("pages", &self.pages.iter().map(Page::name).collect::<Vec<_>>())
            .field("config", &self.config)
            .finish()
    }
}

impl Application {
    pub fn builder() -> ApplicationBuilder {
        ApplicationBuilder::default()
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn headers(&self) -> &Arc<HeaderRegistry> {
        &self.headers
    }

    pub fn sink(&self) -> &Arc<dyn ErrorSink> {
        &self.sink
    }

    /// Try each page in order; the first whose predicate matches runs with a
    /// fresh response. A rejecting page hands over to the next candidate.
    pub async fn dispatch(&self, event: Arc<Event>, closables: &Closables) -> DispatchOutcome {
        let span = request_span(&event);
        self.dispatch_inner(event, closables).instrument(span).await
    }

    async fn dispatch_inner(&self, event: Arc<Event>, closables: &Closables) -> DispatchOutcome {
        let start = Instant::now();
        let env = ChainEnv {
            event: &event,
            closables,
            headers: &self.headers,
            config: &self.config,
        };

        for page in &self.pages {
            if !page.matches(&event) {
                continue;
            }
            tracing::Span::current().record("page", page.name());

            match run_chain(page, &env).await {
                ChainResult::Responded(response) => {
                    let status = response.status().unwrap_or(StatusCode::OK);
                    metrics::record_dispatch(page.name(), "responded", status.as_u16(), start);
                    return DispatchOutcome::Response(response.into_http());
                }
                ChainResult::Rejected => {
                    tracing::debug!(page = page.name(), "Page rejected request");
                    metrics::record_rejection(page.name());
                }
                ChainResult::Errored(error) => {
                    let response = self.error_response(&error);
                    metrics::record_dispatch(page.name(), "errored", response.status().as_u16(), start);
                    return DispatchOutcome::Response(response);
                }
                ChainResult::Abandoned => {
                    tracing::debug!(page = page.name(), "Request abandoned");
                    metrics::record_dispatch(page.name(), "abandoned", 0, start);
                    return DispatchOutcome::Abandoned;
                }
            }
        }

        tracing::debug!(path = event.path(), "No page matched");
        metrics::record_dispatch("none", "unmatched", StatusCode::NOT_FOUND.as_u16(), start);
        DispatchOutcome::Response(not_found())
    }

    /// A decoding failure that escaped an actor is the client's fault and
    /// answered with 400; everything else is internal.
    fn error_response(&self, error: &Error) -> axum::response::Response {
        if let Error::Actor(ActorError::Decoding(e)) = error {
            tracing::debug!(error = %e, "Request carried an undecodable value");
            return plain(StatusCode::BAD_REQUEST, e.to_string());
        }
        self.sink.report_internal_error(error);
        plain(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
    }
}

/// The standard "no match" response.
pub fn not_found() -> axum::response::Response {
    plain(StatusCode::NOT_FOUND, "No matching page".to_string())
}

fn plain(status: StatusCode, body: String) -> axum::response::Response {
    let mut response = Response::new();
    response.set_status(status).set_body(body);
    let mut response = response.into_http();
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

#[derive(Default)]
pub struct ApplicationBuilder {
    pages: Vec<Page>,
    headers: Option<Arc<HeaderRegistry>>,
    sink: Option<Arc<dyn ErrorSink>>,
    config: EngineConfig,
}

impl ApplicationBuilder {
    /// Append a page after those already added.
    pub fn page(mut self, page: Page) -> Self {
        self.pages.push(page);
        self
    }

    /// Append every page of a route table, in table order.
    pub fn routes(mut self, table: RouteTable) -> Self {
        self.pages.extend(table.into_pages());
        self
    }

    pub fn headers(mut self, headers: Arc<HeaderRegistry>) -> Self {
        self.headers = Some(headers);
        self
    }

    pub fn sink(mut self, sink: Arc<dyn ErrorSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<Application, RegistryError> {
        let headers = match self.headers {
            Some(headers) => headers,
            None => Arc::new(HeaderRegistry::standard(&Default::default())?),
        };
        tracing::info!(pages = self.pages.len(), debug = self.config.debug, "Application built");
        Ok(Application {
            pages: self.pages,
            headers,
            sink: self.sink.unwrap_or_else(|| Arc::new(LoggingSink)),
            config: self.config,
        })
    }
}
