//! Pages: a match predicate plus an ordered actor chain.

use std::fmt;
use std::sync::Arc;

use super::actor::{Actor, ActorContext, FnActor, Outcome};
use crate::error::ActorError;
use crate::http::Event;
use crate::routing::{AndMatcher, Matcher};

type ActorFactory = Arc<dyn Fn() -> Box<dyn Actor> + Send + Sync>;

/// A candidate chain. Immutable once built.
pub struct Page {
    name: String,
    predicate: Box<dyn Matcher>,
    factories: Vec<ActorFactory>,
}

impl fmt::Debug for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Page")
            .field("name", &self.name)
            .field("predicate", &self.predicate)
            .field("actors", &self.factories.len())
            .finish()
    }
}

impl Page {
    pub fn builder(name: impl Into<String>) -> PageBuilder {
        PageBuilder {
            name: name.into(),
            predicate: None,
            factories: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn matches(&self, event: &Event) -> bool {
        self.predicate.matches(event)
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// A fresh actor chain for one request.
    pub(crate) fn instantiate(&self) -> Vec<Box<dyn Actor>> {
        self.factories.iter().map(|make| make()).collect()
    }
}

pub struct PageBuilder {
    name: String,
    predicate: Option<Box<dyn Matcher>>,
    factories: Vec<ActorFactory>,
}

impl PageBuilder {
    /// Predicate deciding whether this page handles a request. Without one
    /// the page matches everything.
    pub fn matching(mut self, predicate: impl Matcher + 'static) -> Self {
        self.predicate = Some(Box::new(predicate));
        self
    }

    /// Append an actor; each request gets its own clone.
    pub fn actor<A: Actor + Clone + 'static>(self, actor: A) -> Self {
        self.actor_factory(move || actor.clone())
    }

    /// Append an actor built by `make` for every request.
    pub fn actor_factory<A, F>(mut self, make: F) -> Self
    where
        A: Actor + 'static,
        F: Fn() -> A + Send + Sync + 'static,
    {
        self.factories
            .push(Arc::new(move || Box::new(make()) as Box<dyn Actor>));
        self
    }

    /// Append a closure actor.
    pub fn actor_fn<F>(self, name: &'static str, f: F) -> Self
    where
        F: Fn(&mut ActorContext<'_>) -> Result<Outcome, ActorError> + Clone + Send + Sync + 'static,
    {
        self.actor(FnActor::new(name, f))
    }

    pub fn build(self) -> Page {
        Page {
            name: self.name,
            predicate: self
                .predicate
                .unwrap_or_else(|| Box::new(AndMatcher::default())),
            factories: self.factories,
        }
    }
}
