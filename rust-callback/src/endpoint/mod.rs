//! The callback endpoint and its request plumbing.
//!
//! - [`query`]: query-string parameters, encrypt mode and flow
//! - [`callback`]: [`CallbackEndpoint`], handshake and delivery
//! - [`invalid`]: what to answer when a request is rejected

pub mod callback;
mod codec;
pub mod invalid;
pub mod query;

pub use callback::{CallbackEndpoint, CallbackResponse, EndpointSettings};
pub use codec::SecurityContext;
pub use invalid::{
    InvalidRequestHandler, InvalidRequestMode, RejectInvalidRequest, SilentInvalidRequest,
};
pub use query::{CallbackQuery, EncryptMode, Flow};
