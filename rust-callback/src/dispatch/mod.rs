//! Message classification and dispatch.
//!
//! ## Flow
//!
//! ```text
//! MessageEnvelope → classify() → Route → DispatchTable → Handler → Reply
//!                             ↘ ClassificationMiss → unknown handler → Reply
//! ```

pub mod dispatcher;
pub mod payload;
pub mod route;
pub mod table;

pub use dispatcher::{DispatchState, Dispatched, MessageDispatcher, Terminal, UnknownReason};
pub use payload::{EventPayload, Payload};
pub use route::{classify, ClassificationMiss, EventType, MessageKind, Route};
pub use table::{Context, DispatchTable, DispatchTableBuilder, EmptyReply, Handler};
