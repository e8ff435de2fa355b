//! Route → handler table.
//!
//! Built once through [`DispatchTableBuilder`] and read-only afterwards.
//! Adding an event type means adding a route, not a trait method.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::payload::Payload;
use super::route::{EventType, MessageKind, Route};
use crate::endpoint::SecurityContext;
use crate::message::{MessageEnvelope, Reply};

/// Everything a handler sees about one inbound message.
pub struct Context<'a> {
    pub envelope: &'a MessageEnvelope,
    /// `None` when the envelope did not classify.
    pub route: Option<Route>,
    /// `None` when the envelope did not classify.
    pub payload: Option<Payload<'a>>,
    /// Present for secure-mode deliveries.
    pub security: Option<&'a SecurityContext>,
}

/// Handles one route. Implemented for any matching closure.
pub trait Handler: Send + Sync {
    fn handle(&self, ctx: &Context<'_>) -> Reply;
}

impl<F> Handler for F
where
    F: Fn(&Context<'_>) -> Reply + Send + Sync,
{
    fn handle(&self, ctx: &Context<'_>) -> Reply {
        self(ctx)
    }
}

/// Replies with nothing. Default unknown handler.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyReply;

impl Handler for EmptyReply {
    fn handle(&self, _ctx: &Context<'_>) -> Reply {
        Reply::Empty
    }
}

/// Immutable mapping from [`Route`] to handler, plus the unknown handler.
pub struct DispatchTable {
    routes: HashMap<Route, Arc<dyn Handler>>,
    unknown: Arc<dyn Handler>,
}

impl DispatchTable {
    pub fn builder() -> DispatchTableBuilder {
        DispatchTableBuilder::default()
    }

    pub fn get(&self, route: Route) -> Option<&dyn Handler> {
        self.routes.get(&route).map(|handler| handler.as_ref())
    }

    pub fn unknown(&self) -> &dyn Handler {
        self.unknown.as_ref()
    }

    pub fn contains(&self, route: Route) -> bool {
        self.routes.contains_key(&route)
    }

    /// Number of routes with a registered handler.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl fmt::Debug for DispatchTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut routes: Vec<_> = self.routes.keys().collect();
        routes.sort_by_key(|route| format!("{:?}", route));
        f.debug_struct("DispatchTable").field("routes", &routes).finish()
    }
}

#[derive(Default)]
pub struct DispatchTableBuilder {
    routes: HashMap<Route, Arc<dyn Handler>>,
    unknown: Option<Arc<dyn Handler>>,
}

impl DispatchTableBuilder {
    /// Register `handler` for `route`, replacing any earlier registration.
    pub fn route<F>(self, route: Route, handler: F) -> Self
    where
        F: Fn(&Context<'_>) -> Reply + Send + Sync + 'static,
    {
        self.route_handler(route, Arc::new(handler))
    }

    pub fn route_handler(mut self, route: Route, handler: Arc<dyn Handler>) -> Self {
        self.routes.insert(route, handler);
        self
    }

    pub fn on_message<F>(self, kind: MessageKind, handler: F) -> Self
    where
        F: Fn(&Context<'_>) -> Reply + Send + Sync + 'static,
    {
        self.route(Route::Message(kind), handler)
    }

    pub fn on_event<F>(self, event: EventType, handler: F) -> Self
    where
        F: Fn(&Context<'_>) -> Reply + Send + Sync + 'static,
    {
        self.route(Route::Event(event), handler)
    }

    /// Handler for envelopes that do not classify, or whose route has no
    /// registration. Defaults to [`EmptyReply`].
    pub fn unknown<F>(self, handler: F) -> Self
    where
        F: Fn(&Context<'_>) -> Reply + Send + Sync + 'static,
    {
        self.unknown_handler(Arc::new(handler))
    }

    pub fn unknown_handler(mut self, handler: Arc<dyn Handler>) -> Self {
        self.unknown = Some(handler);
        self
    }

    pub fn build(self) -> DispatchTable {
        DispatchTable {
            routes: self.routes,
            unknown: self.unknown.unwrap_or_else(|| Arc::new(EmptyReply)),
        }
    }
}
