//! Actors and their outcomes.

use std::any::{type_name, Any};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use axum::http::StatusCode;
use tokio::sync::oneshot;

use crate::error::ActorError;
use crate::headers::HeaderRegistry;
use crate::http::{Event, Response, ResponseBody};
use crate::lifecycle::Closables;

/// Opaque value an actor hands to the actors after it.
pub type State = Box<dyn Any + Send + Sync>;

/// One step of a chain.
///
/// Actors carry construction-time configuration only; a fresh set is built
/// for every request a page matches.
pub trait Actor: Send + Sync {
    fn act(&self, cx: &mut ActorContext<'_>) -> Result<Outcome, ActorError>;

    /// Name used in logs.
    fn name(&self) -> &str {
        type_name::<Self>()
    }
}

/// Adapter that turns a closure into an [`Actor`].
#[derive(Clone)]
pub struct FnActor<F> {
    name: &'static str,
    f: F,
}

impl<F> FnActor<F>
where
    F: Fn(&mut ActorContext<'_>) -> Result<Outcome, ActorError> + Send + Sync,
{
    pub fn new(name: &'static str, f: F) -> Self {
        Self { name, f }
    }
}

impl<F> Actor for FnActor<F>
where
    F: Fn(&mut ActorContext<'_>) -> Result<Outcome, ActorError> + Send + Sync,
{
    fn act(&self, cx: &mut ActorContext<'_>) -> Result<Outcome, ActorError> {
        (self.f)(cx)
    }

    fn name(&self) -> &str {
        self.name
    }
}

/// What an actor decided.
pub enum Outcome {
    /// Hand over to the next actor, optionally with a state value.
    Continue(Option<State>),
    /// This page does not handle the request; dispatch tries the next one.
    Reject,
    /// Finish with the response built so far. `body`, when present,
    /// replaces the in-progress body.
    Respond {
        status: StatusCode,
        body: Option<ResponseBody>,
    },
    /// Suspend until the deferred work resumes the chain.
    Defer(Deferred),
}

impl Outcome {
    pub fn next() -> Self {
        Outcome::Continue(None)
    }

    pub fn next_with<T: Any + Send + Sync>(state: T) -> Self {
        Outcome::Continue(Some(Box::new(state)))
    }

    pub fn reject() -> Self {
        Outcome::Reject
    }

    pub fn respond(status: StatusCode, body: impl Into<ResponseBody>) -> Self {
        Outcome::Respond {
            status,
            body: Some(body.into()),
        }
    }

    /// Respond with the in-progress body untouched.
    pub fn status(status: StatusCode) -> Self {
        Outcome::Respond { status, body: None }
    }

    pub fn defer<F>(work: F) -> Self
    where
        F: Future<Output = Result<Option<State>, ActorError>> + Send + 'static,
    {
        Outcome::Defer(Deferred::new(work))
    }

    pub(crate) fn label(&self) -> &'static str {
        match self {
            Outcome::Continue(_) => "continue",
            Outcome::Reject => "reject",
            Outcome::Respond { .. } => "respond",
            Outcome::Defer(_) => "defer",
        }
    }
}

impl fmt::Debug for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Respond { status, body } => f
                .debug_struct("Respond")
                .field("status", status)
                .field("body", body)
                .finish(),
            other => f.write_str(other.label()),
        }
    }
}

pub(crate) enum Resumed {
    Continue(Option<State>),
    Failed(ActorError),
    Dropped,
}

/// Work that resumes a suspended chain.
///
/// The chain re-enters at the actor after the one that deferred, with the
/// state the work produced. The work runs as a task registered with the
/// request's [`Closables`], so a closed connection cancels it.
pub struct Deferred {
    pub(crate) work: Pin<Box<dyn Future<Output = Resumed> + Send>>,
}

impl Deferred {
    pub fn new<F>(work: F) -> Self
    where
        F: Future<Output = Result<Option<State>, ActorError>> + Send + 'static,
    {
        Self {
            work: Box::pin(async move {
                match work.await {
                    Ok(state) => Resumed::Continue(state),
                    Err(e) => Resumed::Failed(e),
                }
            }),
        }
    }

    /// Deferral resumed through an explicit handle, e.g. from a callback
    /// API or another task. Dropping the [`Resumer`] unused is an error.
    pub fn channel() -> (Resumer, Deferred) {
        let (tx, rx) = oneshot::channel();
        let deferred = Deferred {
            work: Box::pin(async move {
                match rx.await {
                    Ok(Ok(state)) => Resumed::Continue(state),
                    Ok(Err(e)) => Resumed::Failed(e),
                    Err(_) => Resumed::Dropped,
                }
            }),
        };
        (Resumer { tx }, deferred)
    }
}

/// Handle that resumes a chain suspended with [`Deferred::channel`].
pub struct Resumer {
    tx: oneshot::Sender<Result<Option<State>, ActorError>>,
}

impl Resumer {
    pub fn resume(self) {
        let _ = self.tx.send(Ok(None));
    }

    pub fn resume_with<T: Any + Send + Sync>(self, state: T) {
        let _ = self.tx.send(Ok(Some(Box::new(state))));
    }

    pub fn fail(self, error: ActorError) {
        let _ = self.tx.send(Err(error));
    }

    /// True once the chain stopped waiting (e.g. the connection closed).
    pub fn is_abandoned(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Everything an actor may look at or touch.
pub struct ActorContext<'a> {
    pub(crate) event: &'a Arc<Event>,
    pub(crate) response: &'a mut Response,
    pub(crate) states: &'a [State],
    pub(crate) closables: &'a Closables,
    pub(crate) headers: &'a Arc<HeaderRegistry>,
    pub(crate) page: &'a str,
    pub(crate) index: usize,
}

impl<'a> ActorContext<'a> {
    pub fn event(&self) -> &Event {
        self.event
    }

    /// Shared handle to the event, for deferred work that outlives `act`.
    pub fn event_handle(&self) -> Arc<Event> {
        Arc::clone(self.event)
    }

    pub fn response(&mut self) -> &mut Response {
        self.response
    }

    /// The most recent state of type `T` passed forward by an earlier actor.
    pub fn state<T: Any>(&self) -> Option<&T> {
        self.states.iter().rev().find_map(|s| s.downcast_ref::<T>())
    }

    pub fn closables(&self) -> &Closables {
        self.closables
    }

    pub fn headers(&self) -> &HeaderRegistry {
        self.headers
    }

    pub fn page(&self) -> &str {
        self.page
    }

    /// Position of the running actor in its chain.
    pub fn index(&self) -> usize {
        self.index
    }
}
