//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use actor_chain::dispatch::DispatchOutcome;
use actor_chain::error::{Error, ResourceCloseError};
use actor_chain::http::{Event, EventOptions};
use actor_chain::lifecycle::Closeable;
use actor_chain::net::Listener;
use actor_chain::observability::ErrorSink;
use actor_chain::{Application, HttpServer, ServerConfig, Shutdown};
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use tokio::net::TcpListener;

/// Build a shared event for `method uri` with optional headers.
pub fn event(method: Method, uri: &str, headers: &[(&str, &str)]) -> Arc<Event> {
    let mut builder = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    let request = builder.body(Body::empty()).unwrap();
    Arc::new(Event::from_request(request, None, &EventOptions::default()))
}

/// Status and body text of a dispatched response. Panics on `Abandoned`.
pub async fn read(outcome: DispatchOutcome) -> (StatusCode, String) {
    match outcome {
        DispatchOutcome::Response(response) => {
            let status = response.status();
            let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
                .await
                .unwrap();
            (status, String::from_utf8(bytes.to_vec()).unwrap())
        }
        DispatchOutcome::Abandoned => panic!("dispatch was abandoned"),
    }
}

/// Error sink that remembers everything reported to it.
#[derive(Default)]
pub struct RecordingSink {
    errors: Mutex<Vec<(String, String)>>,
}

impl RecordingSink {
    pub fn kinds(&self) -> Vec<String> {
        self.errors.lock().unwrap().iter().map(|(k, _)| k.clone()).collect()
    }

    pub fn messages(&self) -> Vec<String> {
        self.errors.lock().unwrap().iter().map(|(_, m)| m.clone()).collect()
    }
}

impl ErrorSink for RecordingSink {
    fn report_internal_error(&self, error: &Error) {
        self.errors
            .lock()
            .unwrap()
            .push((error.kind().to_string(), error.to_string()));
    }
}

/// Closeable that counts how often it was closed.
#[derive(Default)]
pub struct CountingResource {
    closes: AtomicUsize,
}

impl CountingResource {
    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

impl Closeable for CountingResource {
    fn close(&self) -> Result<(), ResourceCloseError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Poll `condition` until it holds or `timeout` passes.
pub async fn eventually(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

/// HTTP client that never routes through an environment proxy.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

/// Start a server for `app` on an ephemeral port.
pub async fn start_server(config: ServerConfig, app: Application) -> (SocketAddr, Shutdown) {
    let tcp = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = tcp.local_addr().unwrap();
    let listener = Listener::from_tcp(tcp, config.listener.max_connections);
    let shutdown = Shutdown::new();
    let server = HttpServer::new(&config, app);
    let stop = shutdown.clone();
    tokio::spawn(async move {
        server.run(listener, stop).await.unwrap();
    });
    (addr, shutdown)
}
