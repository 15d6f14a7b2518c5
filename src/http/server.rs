//! HTTP server: the transport adapter in front of the dispatch root.
//!
//! # Responsibilities
//! - Accept connections under the listener's connection limit
//! - Track each connection and expose its close notification
//! - Serve HTTP/1.1 and HTTP/2 through hyper-util's auto builder
//! - Wire up middleware (tracing, timeout, request ID)
//! - Turn each request into an `Event`, dispatch it, write the result
//! - Release each request's resources once its response is written
//! - Stop accepting and drain on shutdown

use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    Extension, Router,
};
use http_body::{Body as HttpBody, Frame, SizeHint};
use hyper::body::Incoming;
use hyper_util::{rt::TokioExecutor, rt::TokioIo, server::conn::auto};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tower::ServiceExt;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use super::request::{Event, EventOptions};
use crate::config::ServerConfig;
use crate::dispatch::{Application, DispatchOutcome};
use crate::lifecycle::{Closables, Shutdown};
use crate::net::{ConnectionClosed, ConnectionId, ConnectionPermit, ConnectionTracker, Listener};

/// How long in-flight connections get to finish after shutdown.
const DRAIN_DEADLINE: Duration = Duration::from_secs(10);

/// Per-connection facts handed to the request handler.
#[derive(Debug, Clone)]
pub struct ConnectionContext {
    pub id: ConnectionId,
    pub peer: SocketAddr,
    pub closed: ConnectionClosed,
}

#[derive(Clone)]
struct ServerState {
    app: Arc<Application>,
    event_options: Arc<EventOptions>,
}

pub struct HttpServer {
    router: Router,
    tracker: ConnectionTracker,
}

impl HttpServer {
    pub fn new(config: &ServerConfig, app: Application) -> Self {
        let state = ServerState {
            app: Arc::new(app),
            event_options: Arc::new(EventOptions {
                base_path: config.listener.base_path.clone(),
                max_body_bytes: config.engine.max_body_bytes,
            }),
        };
        Self {
            router: Self::build_router(config, state),
            tracker: ConnectionTracker::new(),
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ServerConfig, state: ServerState) -> Router {
        Router::new()
            .fallback(dispatch_handler)
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    pub fn tracker(&self) -> &ConnectionTracker {
        &self.tracker
    }

    /// Accept and serve connections until `shutdown` fires, then drain.
    pub async fn run(self, listener: Listener, shutdown: Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        loop {
            let accepted = tokio::select! {
                accepted = listener.accept() => accepted,
                _ = shutdown.wait() => break,
            };
            match accepted {
                Ok((stream, peer, permit)) => {
                    let router = self.router.clone();
                    let tracker = self.tracker.clone();
                    let shutdown = shutdown.clone();
                    tokio::spawn(serve_connection(stream, peer, permit, router, tracker, shutdown));
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Accept failed");
                    tokio::time::sleep(Duration::from_millis(50)).await;
                }
            }
        }

        tracing::info!(
            active_connections = self.tracker.active_count(),
            "HTTP server draining"
        );
        if !self.tracker.wait_for_drain(DRAIN_DEADLINE).await {
            tracing::warn!(
                active_connections = self.tracker.active_count(),
                "Drain deadline passed with connections still open"
            );
        }
        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    _permit: ConnectionPermit,
    router: Router,
    tracker: ConnectionTracker,
    shutdown: Shutdown,
) {
    // Dropped when this task ends, however it ends: that is the
    // connection-closed notification.
    let guard = tracker.track();
    let context = ConnectionContext {
        id: guard.id(),
        peer,
        closed: guard.closed(),
    };
    let connection_id = guard.id();
    let router = router.layer(Extension(context));
    let service = hyper::service::service_fn(move |request: Request<Incoming>| {
        router.clone().oneshot(request)
    });

    let builder = auto::Builder::new(TokioExecutor::new());
    let connection = builder.serve_connection(TokioIo::new(stream), service);
    tokio::pin!(connection);

    let result = tokio::select! {
        result = connection.as_mut() => result,
        _ = shutdown.wait() => {
            connection.as_mut().graceful_shutdown();
            connection.await
        }
    };
    if let Err(e) = result {
        tracing::debug!(connection_id = %connection_id, error = %e, "Connection ended with error");
    }
    drop(guard);
}

async fn dispatch_handler(
    State(state): State<ServerState>,
    Extension(connection): Extension<ConnectionContext>,
    request: Request<Body>,
) -> Response {
    let event = Arc::new(Event::from_request(
        request,
        Some(connection.peer),
        &state.event_options,
    ));
    let closables = Closables::bound_to(connection.closed.clone(), Arc::clone(state.app.sink()));
    let mut dropped = ReleaseIfDropped(Some(closables.clone()));

    let outcome = state.app.dispatch(event, &closables).await;
    dropped.0 = None;

    let response = match outcome {
        DispatchOutcome::Response(response) => response,
        DispatchOutcome::Abandoned => {
            // The peer is normally gone and this is never written. If the
            // chain closed its own resources early, the client still gets a
            // terminal answer.
            tracing::debug!(connection_id = %connection.id, "Dispatch abandoned");
            StatusCode::SERVICE_UNAVAILABLE.into_response()
        }
    };
    release_after_write(response, &closables)
}

/// Releases the request's resources when the handler future is dropped
/// before it produced a response.
struct ReleaseIfDropped(Option<Closables>);

impl Drop for ReleaseIfDropped {
    fn drop(&mut self) {
        if let Some(closables) = self.0.take() {
            closables.close_dropped();
        }
    }
}

/// Move the request's close trigger from the connection to the end of the
/// response write.
fn release_after_write(response: Response, closables: &Closables) -> Response {
    let (done, written) = oneshot::channel::<()>();
    closables.close_on(async move {
        let _ = written.await;
    });
    response.map(|body| Body::new(WriteTracked { inner: body, _done: done }))
}

/// Response body that signals completion when hyper drops it, after the last
/// frame or when the connection goes away mid-write.
struct WriteTracked {
    inner: Body,
    _done: oneshot::Sender<()>,
}

impl HttpBody for WriteTracked {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        Pin::new(&mut self.get_mut().inner).poll_frame(cx)
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}
