//! actor-chain demo server.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ net::Listener ──▶ http::HttpServer ──▶ dispatch::Application
//!                        (limits)        (hyper-util,           │ first matching page
//!                                         tower-http layers)    ▼
//!                                                         engine::run_chain
//!                                                     actors ◀──┤──▶ headers (typed codecs)
//!                                                               └──▶ lifecycle::Closables
//!     Client Response                                                 (released when the
//!     ◀────────────── http::Response ◀── DispatchOutcome               connection closes)
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{Method, StatusCode};
use chrono::{DateTime, Utc};
use clap::Parser;

use actor_chain::config::validation::validate_config;
use actor_chain::config::{load_config, ConfigError, ServerConfig};
use actor_chain::engine::{CheckIfModifiedSince, Outcome, Page, State};
use actor_chain::error::ActorError;
use actor_chain::headers::date::truncate_to_seconds;
use actor_chain::headers::{self, HeaderRegistry};
use actor_chain::lifecycle::{startup, Shutdown};
use actor_chain::observability::logging::init_logging;
use actor_chain::routing::{route, RouteTable};
use actor_chain::Application;

#[derive(Parser)]
#[command(name = "actor-chain")]
#[command(about = "Actor chain HTTP server", long_about = None)]
struct Cli {
    /// TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
        validate_config(&config).map_err(ConfigError::Validation)?;
    }

    init_logging(&config.observability);
    tracing::info!("actor-chain v{} starting", env!("CARGO_PKG_VERSION"));

    let headers = Arc::new(HeaderRegistry::standard(&config.headers)?);
    let app = Application::builder()
        .routes(demo_routes())
        .headers(headers)
        .config(config.engine.clone())
        .build()?;

    startup::run(config, app, Shutdown::new()).await?;
    Ok(())
}

/// Pages served by the demo binary.
fn demo_routes() -> RouteTable {
    let started: DateTime<Utc> = truncate_to_seconds(Utc::now());
    let mut table = RouteTable::new();

    table.insert(
        0,
        0,
        Page::builder("hello")
            .matching(route(Method::GET, "/hello"))
            .actor_fn("greet", |cx| {
                let name = cx.event().param("name").unwrap_or("world").to_string();
                Ok(Outcome::respond(StatusCode::OK, format!("Hello, {name}!\n")))
            })
            .build(),
    );

    table.insert(
        0,
        10,
        Page::builder("static")
            .matching(route(Method::GET, "/static"))
            .actor_fn("last-modified", move |cx| {
                cx.response().add(&headers::last_modified(), &started)?;
                Ok(Outcome::next())
            })
            .actor(CheckIfModifiedSince)
            .actor_fn("body", |_cx| {
                Ok(Outcome::respond(StatusCode::OK, "unchanged since startup\n"))
            })
            .build(),
    );

    table.insert(
        0,
        20,
        Page::builder("echo")
            .matching(route(Method::POST, "/echo"))
            .actor_fn("read-body", |cx| {
                let event = cx.event_handle();
                Ok(Outcome::defer(async move {
                    let body = event.content_as_string().await?;
                    Ok::<_, ActorError>(Some(Box::new(body) as State))
                }))
            })
            .actor_fn("reply", |cx| {
                let body = cx.state::<String>().cloned().unwrap_or_default();
                Ok(Outcome::respond(StatusCode::OK, body))
            })
            .build(),
    );

    table.insert(
        0,
        30,
        Page::builder("slow")
            .matching(route(Method::GET, "/slow"))
            .actor_fn("wait", |cx| {
                let secs = cx.event().long_param("secs")?.unwrap_or(1).clamp(0, 30) as u64;
                let closables = cx.closables().clone();
                Ok(Outcome::defer(async move {
                    closables.add_fn(|| tracing::debug!("Slow request resources released"));
                    tokio::time::sleep(Duration::from_secs(secs)).await;
                    Ok::<_, ActorError>(None)
                }))
            })
            .actor_fn("done", |_cx| Ok(Outcome::respond(StatusCode::OK, "done\n")))
            .build(),
    );

    table
}
