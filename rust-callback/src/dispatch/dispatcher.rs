//! Single-pass message dispatch.
//!
//! ```text
//! Received → Classified → Dispatched → Responded
//!                                    → Unknown
//! ```
//!
//! Exactly one handler runs per envelope: the route's handler, or the table's
//! unknown handler when the envelope does not classify or its route has no
//! registration. Both terminals produce a reply, never an error.

use std::sync::Arc;

use tracing::{debug, info};

use super::payload::Payload;
use super::route::{classify, ClassificationMiss, Route};
use super::table::{Context, DispatchTable};
use crate::endpoint::SecurityContext;
use crate::message::{MessageEnvelope, Reply};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Received,
    Classified,
    Dispatched,
    Responded,
    Unknown,
}

impl DispatchState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, DispatchState::Responded | DispatchState::Unknown)
    }

    fn can_advance_to(&self, next: DispatchState) -> bool {
        matches!(
            (self, next),
            (DispatchState::Received, DispatchState::Classified)
                | (DispatchState::Classified, DispatchState::Dispatched)
                | (DispatchState::Dispatched, DispatchState::Responded)
                | (DispatchState::Dispatched, DispatchState::Unknown)
        )
    }

    fn advance(&mut self, next: DispatchState) {
        debug_assert!(
            self.can_advance_to(next),
            "invalid dispatch transition {:?} -> {:?}",
            self,
            next
        );
        debug!(from = ?self, to = ?next, "dispatch_transition");
        *self = next;
    }
}

/// Why the unknown handler ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnknownReason {
    Unclassified(ClassificationMiss),
    /// Classified, but nothing is registered for the route.
    Unhandled(Route),
}

/// How dispatch ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Terminal {
    Responded(Route),
    Unknown(UnknownReason),
}

/// Outcome of dispatching one envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatched {
    pub terminal: Terminal,
    pub reply: Reply,
}

impl Dispatched {
    pub fn state(&self) -> DispatchState {
        match self.terminal {
            Terminal::Responded(_) => DispatchState::Responded,
            Terminal::Unknown(_) => DispatchState::Unknown,
        }
    }

    pub fn route(&self) -> Option<Route> {
        match &self.terminal {
            Terminal::Responded(route) => Some(*route),
            Terminal::Unknown(UnknownReason::Unhandled(route)) => Some(*route),
            Terminal::Unknown(UnknownReason::Unclassified(_)) => None,
        }
    }
}

/// Classifies envelopes and runs the matching handler.
#[derive(Clone)]
pub struct MessageDispatcher {
    table: Arc<DispatchTable>,
}

impl MessageDispatcher {
    pub fn new(table: DispatchTable) -> Self {
        Self {
            table: Arc::new(table),
        }
    }

    pub fn table(&self) -> &DispatchTable {
        &self.table
    }

    pub fn dispatch(
        &self,
        envelope: &MessageEnvelope,
        security: Option<&SecurityContext>,
    ) -> Dispatched {
        let mut state = DispatchState::Received;

        let classified = classify(envelope);
        state.advance(DispatchState::Classified);

        let (route, handler) = match &classified {
            Ok(route) => (Some(*route), self.table.get(*route)),
            Err(_) => (None, None),
        };

        let ctx = Context {
            envelope,
            route,
            payload: route.map(|route| Payload::from_route(route, envelope)),
            security,
        };

        state.advance(DispatchState::Dispatched);

        let (terminal, reply) = match (classified, handler) {
            (Ok(route), Some(handler)) => {
                let reply = handler.handle(&ctx);
                state.advance(DispatchState::Responded);
                (Terminal::Responded(route), reply)
            }
            (Ok(route), None) => {
                let reply = self.table.unknown().handle(&ctx);
                state.advance(DispatchState::Unknown);
                (Terminal::Unknown(UnknownReason::Unhandled(route)), reply)
            }
            (Err(miss), _) => {
                let reply = self.table.unknown().handle(&ctx);
                state.advance(DispatchState::Unknown);
                (Terminal::Unknown(UnknownReason::Unclassified(miss)), reply)
            }
        };

        let (msg_type, event) = match route {
            Some(route) => route.tags(),
            None => (envelope.msg_type.as_str(), envelope.event.as_deref()),
        };
        info!(
            from_user = %envelope.from_user_name,
            msg_type = %msg_type,
            event = event.unwrap_or(""),
            terminal = ?state,
            reply_type = reply.msg_type().unwrap_or("empty"),
            "message_dispatched"
        );

        Dispatched { terminal, reply }
    }
}
