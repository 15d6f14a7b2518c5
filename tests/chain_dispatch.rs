//! Chain execution and dispatch behavior, driven without a socket.

mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use actor_chain::config::EngineConfig;
use actor_chain::dispatch::DispatchOutcome;
use actor_chain::engine::{CheckIfModifiedSince, Deferred, Outcome, Page, State};
use actor_chain::error::ActorError;
use actor_chain::headers;
use actor_chain::lifecycle::Closables;
use actor_chain::net::ConnectionClosed;
use actor_chain::routing::{route, PathPrefixMatcher, RouteTable};
use actor_chain::Application;
use axum::http::{HeaderName, Method, StatusCode};
use chrono::{Duration as ChronoDuration, TimeZone, Utc};

use common::{event, read, CountingResource, RecordingSink};

fn app(pages: Vec<Page>, sink: Arc<RecordingSink>) -> Application {
    pages
        .into_iter()
        .fold(Application::builder(), |b, p| b.page(p))
        .sink(sink)
        .config(EngineConfig {
            debug: true,
            ..EngineConfig::default()
        })
        .build()
        .unwrap()
}

fn shared_page() -> Page {
    Page::builder("shared")
        .matching(route(Method::GET, "/shared"))
        .actor_fn("a", |_cx| Ok(Outcome::next_with("X".to_string())))
        .actor_fn("b", |cx| {
            let state = cx.state::<String>().cloned().unwrap_or_default();
            Ok(Outcome::respond(StatusCode::OK, state))
        })
        .build()
}

#[tokio::test]
async fn state_is_threaded_to_the_next_actor() {
    let sink = Arc::new(RecordingSink::default());
    let app = app(vec![shared_page()], sink.clone());

    let outcome = app
        .dispatch(event(Method::GET, "/shared", &[]), &Closables::default())
        .await;
    assert_eq!(read(outcome).await, (StatusCode::OK, "X".to_string()));
    assert!(sink.kinds().is_empty());
}

#[tokio::test]
async fn get_only_page_does_not_match_post() {
    let sink = Arc::new(RecordingSink::default());
    let app = app(vec![shared_page()], sink);

    let outcome = app
        .dispatch(event(Method::POST, "/shared", &[]), &Closables::default())
        .await;
    let (status, _) = read(outcome).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn continuing_past_the_last_actor_is_a_500() {
    let sink = Arc::new(RecordingSink::default());
    let page = Page::builder("runaway")
        .actor_fn("only", |_cx| Ok(Outcome::next()))
        .build();
    let app = app(vec![page], sink.clone());

    let (status, _) = read(app.dispatch(event(Method::GET, "/", &[]), &Closables::default()).await).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(sink.kinds(), vec!["chain_contract".to_string()]);
    assert!(sink.messages()[0].contains("continued past the end"));
}

#[tokio::test]
async fn empty_page_is_a_contract_error() {
    let sink = Arc::new(RecordingSink::default());
    let app = app(vec![Page::builder("empty").build()], sink.clone());

    let (status, _) = read(app.dispatch(event(Method::GET, "/", &[]), &Closables::default()).await).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(sink.kinds(), vec!["chain_contract".to_string()]);
}

#[tokio::test]
async fn rejection_falls_through_to_the_next_page() {
    let sink = Arc::new(RecordingSink::default());
    let reject = Page::builder("picky")
        .actor_fn("check", |cx| {
            if cx.event().param("admin").is_some() {
                Ok(Outcome::respond(StatusCode::OK, "admin"))
            } else {
                Ok(Outcome::reject())
            }
        })
        .build();
    let fallback = Page::builder("fallback")
        .actor_fn("answer", |_cx| Ok(Outcome::respond(StatusCode::OK, "fallback")))
        .build();
    let app = app(vec![reject, fallback], sink);

    let (_, body) = read(app.dispatch(event(Method::GET, "/x", &[]), &Closables::default()).await).await;
    assert_eq!(body, "fallback");
    let (_, body) = read(app.dispatch(event(Method::GET, "/x?admin=1", &[]), &Closables::default()).await).await;
    assert_eq!(body, "admin");
}

#[tokio::test]
async fn rejection_stops_the_chain_but_keeps_its_resources() {
    let sink = Arc::new(RecordingSink::default());
    let first = Arc::new(CountingResource::default());
    let second = Arc::new(CountingResource::default());
    let third_ran = Arc::new(AtomicBool::new(false));

    let picky = {
        let first = first.clone();
        let second = second.clone();
        let third_ran = third_ran.clone();
        Page::builder("picky")
            .actor_fn("open", move |cx| {
                cx.closables().add(first.clone());
                Ok(Outcome::next())
            })
            .actor_fn("refuse", move |cx| {
                cx.closables().add(second.clone());
                Ok(Outcome::reject())
            })
            .actor_fn("after", move |_cx| {
                third_ran.store(true, Ordering::SeqCst);
                Ok(Outcome::respond(StatusCode::OK, "picky"))
            })
            .build()
    };
    let fallback = Page::builder("fallback")
        .actor_fn("answer", |_cx| Ok(Outcome::respond(StatusCode::OK, "fallback")))
        .build();
    let app = app(vec![picky, fallback], sink.clone());

    let closables = Closables::default();
    let (_, body) = read(app.dispatch(event(Method::GET, "/x", &[]), &closables).await).await;
    assert_eq!(body, "fallback");
    assert!(!third_ran.load(Ordering::SeqCst));
    assert_eq!(closables.pending(), 2);
    assert_eq!((first.closes(), second.closes()), (0, 0));

    closables.close_early();
    assert_eq!((first.closes(), second.closes()), (1, 1));
    assert!(sink.kinds().is_empty());
}

#[tokio::test]
async fn all_rejecting_pages_yield_not_found() {
    let sink = Arc::new(RecordingSink::default());
    let page = Page::builder("no").actor_fn("no", |_cx| Ok(Outcome::reject())).build();
    let app = app(vec![page], sink);

    let (status, body) = read(app.dispatch(event(Method::GET, "/", &[]), &Closables::default()).await).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, "No matching page");
}

#[tokio::test]
async fn first_matching_page_wins_in_table_order() {
    let sink = Arc::new(RecordingSink::default());
    let mut table = RouteTable::new();
    table
        .insert(
            1,
            0,
            Page::builder("general")
                .matching(PathPrefixMatcher::new("/api"))
                .actor_fn("g", |_cx| Ok(Outcome::respond(StatusCode::OK, "general")))
                .build(),
        )
        .insert(
            0,
            0,
            Page::builder("specific")
                .matching(route(Method::GET, "/api/users"))
                .actor_fn("s", |_cx| Ok(Outcome::respond(StatusCode::OK, "specific")))
                .build(),
        );
    let app = Application::builder().routes(table).sink(sink).build().unwrap();

    let (_, body) = read(app.dispatch(event(Method::GET, "/api/users", &[]), &Closables::default()).await).await;
    assert_eq!(body, "specific");
    let (_, body) = read(app.dispatch(event(Method::GET, "/api/other", &[]), &Closables::default()).await).await;
    assert_eq!(body, "general");
}

fn conditional_page() -> Page {
    Page::builder("conditional")
        .matching(route(Method::GET, "/doc"))
        .actor_fn("stamp", |cx| {
            let modified = Utc.with_ymd_and_hms(2021, 3, 4, 5, 6, 7).unwrap();
            cx.response().add(&headers::last_modified(), &modified)?;
            Ok(Outcome::next())
        })
        .actor(CheckIfModifiedSince)
        .actor_fn("body", |_cx| Ok(Outcome::respond(StatusCode::OK, "document")))
        .build()
}

#[tokio::test]
async fn if_modified_since_answers_not_modified() {
    let sink = Arc::new(RecordingSink::default());
    let app = app(vec![conditional_page()], sink);
    let modified = Utc.with_ymd_and_hms(2021, 3, 4, 5, 6, 7).unwrap();

    let same = headers::date::format_http_date(&modified);
    let outcome = app
        .dispatch(
            event(Method::GET, "/doc", &[("if-modified-since", same.as_str())]),
            &Closables::default(),
        )
        .await;
    let DispatchOutcome::Response(response) = outcome else {
        panic!("abandoned");
    };
    assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
    assert_eq!(
        response.headers().get("last-modified").unwrap(),
        "Thu, 04 Mar 2021 05:06:07 GMT"
    );

    let older = headers::date::format_http_date(&(modified - ChronoDuration::hours(1)));
    let (status, body) = read(
        app.dispatch(
            event(Method::GET, "/doc", &[("if-modified-since", older.as_str())]),
            &Closables::default(),
        )
        .await,
    )
    .await;
    assert_eq!((status, body.as_str()), (StatusCode::OK, "document"));

    let (status, _) = read(
        app.dispatch(
            event(Method::GET, "/doc", &[("if-modified-since", "garbage")]),
            &Closables::default(),
        )
        .await,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn headers_written_early_are_visible_later() {
    let sink = Arc::new(RecordingSink::default());
    let page = Page::builder("headers")
        .actor_fn("write", |cx| {
            let expect = headers::header(HeaderName::from_static("x-expect"));
            cx.response().add(&expect, &"hello".to_string())?;
            Ok(Outcome::next())
        })
        .actor_fn("read", |cx| {
            let expect = headers::header(HeaderName::from_static("x-expect"));
            let value = cx.response().get(&expect)?.unwrap_or_default();
            Ok(Outcome::respond(StatusCode::OK, value))
        })
        .build();
    let app = app(vec![page], sink);

    let (_, body) = read(app.dispatch(event(Method::GET, "/", &[]), &Closables::default()).await).await;
    assert_eq!(body, "hello");
}

#[tokio::test]
async fn deferred_future_resumes_at_the_next_actor() {
    let sink = Arc::new(RecordingSink::default());
    let page = Page::builder("deferred")
        .actor_fn("defer", |_cx| {
            Ok(Outcome::defer(async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                Ok::<_, ActorError>(Some(Box::new(42u32) as State))
            }))
        })
        .actor_fn("answer", |cx| {
            let value = cx.state::<u32>().copied().unwrap_or_default();
            Ok(Outcome::respond(StatusCode::OK, value.to_string()))
        })
        .build();
    let app = app(vec![page], sink);

    let (_, body) = read(app.dispatch(event(Method::GET, "/", &[]), &Closables::default()).await).await;
    assert_eq!(body, "42");
}

#[tokio::test]
async fn resume_handle_delivers_state_from_another_task() {
    let sink = Arc::new(RecordingSink::default());
    let page = Page::builder("resumer")
        .actor_fn("defer", |_cx| {
            let (resumer, deferred) = Deferred::channel();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                resumer.resume_with("resumed".to_string());
            });
            Ok(Outcome::Defer(deferred))
        })
        .actor_fn("answer", |cx| {
            let value = cx.state::<String>().cloned().unwrap_or_default();
            Ok(Outcome::respond(StatusCode::OK, value))
        })
        .build();
    let app = app(vec![page], sink);

    let (_, body) = read(app.dispatch(event(Method::GET, "/", &[]), &Closables::default()).await).await;
    assert_eq!(body, "resumed");
}

#[tokio::test]
async fn dropped_resume_handle_is_a_500() {
    let sink = Arc::new(RecordingSink::default());
    let page = Page::builder("forgetful")
        .actor_fn("defer", |_cx| {
            let (resumer, deferred) = Deferred::channel();
            drop(resumer);
            Ok(Outcome::Defer(deferred))
        })
        .actor_fn("never", |_cx| Ok(Outcome::respond(StatusCode::OK, "unreachable")))
        .build();
    let app = app(vec![page], sink.clone());

    let (status, _) = read(app.dispatch(event(Method::GET, "/", &[]), &Closables::default()).await).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(sink.messages()[0].contains("dropped its resume handle"));
}

#[tokio::test]
async fn connection_close_while_deferred_abandons_the_chain() {
    let sink = Arc::new(RecordingSink::default());
    let resource = Arc::new(CountingResource::default());
    let registered = resource.clone();
    let page = Page::builder("hang")
        .actor_fn("hold", move |cx| {
            cx.closables().add(registered.clone());
            Ok(Outcome::defer(std::future::pending::<Result<Option<State>, ActorError>>()))
        })
        .actor_fn("never", |_cx| Ok(Outcome::respond(StatusCode::OK, "unreachable")))
        .build();
    let app = Arc::new(app(vec![page], sink.clone()));

    let (close, connection) = ConnectionClosed::detached();
    let closables = Closables::bound_to(connection, sink.clone());
    let dispatch = {
        let app = app.clone();
        let closables = closables.clone();
        tokio::spawn(async move { app.dispatch(event(Method::GET, "/", &[]), &closables).await })
    };

    assert!(common::eventually(Duration::from_secs(2), || closables.pending() == 2).await);
    close.send_replace(true);

    let outcome = dispatch.await.unwrap();
    assert!(matches!(outcome, DispatchOutcome::Abandoned));
    assert_eq!(resource.closes(), 1);
    assert!(sink.kinds().is_empty());
}

#[tokio::test]
async fn actor_panic_becomes_a_500() {
    let sink = Arc::new(RecordingSink::default());
    let page = Page::builder("boom")
        .actor_fn("boom", |_cx| -> Result<Outcome, ActorError> { panic!("kaboom") })
        .build();
    let app = app(vec![page], sink.clone());

    let (status, _) = read(app.dispatch(event(Method::GET, "/", &[]), &Closables::default()).await).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(sink.kinds(), vec!["actor".to_string()]);
    assert!(sink.messages()[0].contains("kaboom"));
}

#[tokio::test]
async fn panic_in_deferred_work_becomes_a_500() {
    let sink = Arc::new(RecordingSink::default());
    let page = Page::builder("deferred-boom")
        .actor_fn("defer", |_cx| {
            Ok(Outcome::defer(async {
                if true {
                    panic!("deferred kaboom");
                }
                Ok::<Option<State>, ActorError>(None)
            }))
        })
        .actor_fn("never", |_cx| Ok(Outcome::respond(StatusCode::OK, "unreachable")))
        .build();
    let app = app(vec![page], sink.clone());

    let (status, _) = read(app.dispatch(event(Method::GET, "/", &[]), &Closables::default()).await).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(sink.messages()[0].contains("deferred kaboom"));
}

#[tokio::test]
async fn undecodable_parameter_is_a_400() {
    let sink = Arc::new(RecordingSink::default());
    let page = Page::builder("numbers")
        .actor_fn("parse", |cx| {
            let n = cx.event().int_param("n")?.unwrap_or(0);
            Ok(Outcome::respond(StatusCode::OK, (n * 2).to_string()))
        })
        .build();
    let app = app(vec![page], sink.clone());

    let (status, body) = read(app.dispatch(event(Method::GET, "/?n=21", &[]), &Closables::default()).await).await;
    assert_eq!((status, body.as_str()), (StatusCode::OK, "42"));

    let (status, _) = read(app.dispatch(event(Method::GET, "/?n=many", &[]), &Closables::default()).await).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(sink.kinds().is_empty());
}
