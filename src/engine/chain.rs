//! Chain execution state machine.
//!
//! ```text
//!            ┌──────── continue(state) ────────┐
//!            ▼                                 │
//!   Running(index, states) ──► actor.act() ────┤
//!            ▲                                 ├── reject ───► Rejected
//!            │                                 ├── respond ──► Responded
//!            │                                 ├── error/panic ► Errored
//!            └── resume(state) ◄── Deferred ◄──┘
//!                                     └── cancelled ──► Abandoned
//! ```
//!
//! Continuing from the last actor is a contract violation and ends in
//! `Errored`. Resumption always re-enters at the actor after the one that
//! deferred.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tokio::task::AbortHandle;

use super::actor::{ActorContext, Outcome, Resumed, State};
use super::page::Page;
use crate::config::EngineConfig;
use crate::error::{panic_message, ActorError, ChainContractError, Error};
use crate::headers::HeaderRegistry;
use crate::http::{Event, Response};
use crate::lifecycle::Closables;

/// Terminal state of one chain run.
#[derive(Debug)]
pub enum ChainResult {
    Responded(Response),
    Rejected,
    Errored(Error),
    /// The connection went away while the chain was suspended; nothing is
    /// written.
    Abandoned,
}

impl ChainResult {
    pub fn label(&self) -> &'static str {
        match self {
            ChainResult::Responded(_) => "responded",
            ChainResult::Rejected => "rejected",
            ChainResult::Errored(_) => "errored",
            ChainResult::Abandoned => "abandoned",
        }
    }
}

/// Shared inputs of a chain run.
pub struct ChainEnv<'a> {
    pub event: &'a Arc<Event>,
    pub closables: &'a Closables,
    pub headers: &'a Arc<HeaderRegistry>,
    pub config: &'a EngineConfig,
}

/// Aborts the deferred task if the chain future itself is dropped
/// (e.g. by a request timeout).
struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

macro_rules! transition {
    ($debug:expr, $($arg:tt)+) => {
        if $debug {
            tracing::info!($($arg)+);
        } else {
            tracing::debug!($($arg)+);
        }
    };
}

/// Run `page` against the event until it reaches a terminal state.
pub async fn run_chain(page: &Page, env: &ChainEnv<'_>) -> ChainResult {
    let actors = page.instantiate();
    if actors.is_empty() {
        return ChainResult::Errored(
            ChainContractError::EmptyChain {
                page: page.name().to_string(),
            }
            .into(),
        );
    }

    let debug = env.config.debug;
    let last = actors.len() - 1;
    let mut response = Response::new();
    let mut states: Vec<State> = Vec::new();
    let mut index = 0;

    loop {
        let actor = &actors[index];
        let acted = {
            let mut cx = ActorContext {
                event: env.event,
                response: &mut response,
                states: &states,
                closables: env.closables,
                headers: env.headers,
                page: page.name(),
                index,
            };
            catch_unwind(AssertUnwindSafe(|| actor.act(&mut cx)))
        };

        let outcome = match acted {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                transition!(debug, page = page.name(), index, actor = actor.name(), error = %e, "Actor failed");
                return ChainResult::Errored(e.into());
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                transition!(debug, page = page.name(), index, actor = actor.name(), panic = %message, "Actor panicked");
                return ChainResult::Errored(ActorError::Panicked(message).into());
            }
        };

        transition!(
            debug,
            page = page.name(),
            index,
            actor = actor.name(),
            outcome = outcome.label(),
            "Actor finished"
        );

        let resumed_state = match outcome {
            Outcome::Continue(state) => state,
            Outcome::Reject => return ChainResult::Rejected,
            Outcome::Respond { status, body } => {
                response.set_status(status);
                if let Some(body) = body {
                    response.set_body(body);
                }
                return ChainResult::Responded(response);
            }
            Outcome::Defer(deferred) => {
                let handle = env.closables.spawn(deferred.work);
                let _abort = AbortOnDrop(handle.abort_handle());
                match handle.await {
                    Ok(Resumed::Continue(state)) => {
                        transition!(debug, page = page.name(), index, "Chain resumed");
                        state
                    }
                    Ok(Resumed::Failed(e)) => return ChainResult::Errored(e.into()),
                    Ok(Resumed::Dropped) => {
                        return ChainResult::Errored(
                            ChainContractError::ResumeDropped {
                                page: page.name().to_string(),
                                index,
                            }
                            .into(),
                        )
                    }
                    Err(join) if join.is_cancelled() => {
                        transition!(debug, page = page.name(), index, "Deferred work cancelled, abandoning chain");
                        return ChainResult::Abandoned;
                    }
                    Err(join) => {
                        let message = match join.try_into_panic() {
                            Ok(payload) => panic_message(payload.as_ref()),
                            Err(e) => e.to_string(),
                        };
                        return ChainResult::Errored(ActorError::Panicked(message).into());
                    }
                }
            }
        };

        if index == last {
            return ChainResult::Errored(
                ChainContractError::ContinuePastEnd {
                    page: page.name().to_string(),
                    index,
                }
                .into(),
            );
        }
        if let Some(state) = resumed_state {
            states.push(state);
        }
        index += 1;
    }
}

