//! wxhook - authenticated, encrypted webhook receiver for official-account
//! message callbacks.
//!
//! ## Architecture
//!
//! ```text
//! HTTP (axum) → CallbackEndpoint → PayloadCodec (raw | aes) → MessageEnvelope
//!                                → MessageDispatcher → Handler → Reply → seal
//! ```
//!
//! The core below [`web`] is synchronous: one request is one pass through
//! verification, decryption, dispatch and reply encoding. The only shared
//! mutable state is the [`KeyRing`].

pub mod autoreply;
pub mod config;
pub mod crypto;
pub mod dispatch;
pub mod endpoint;
pub mod error;
pub mod message;
pub mod web;

// Re-export commonly used types
pub use autoreply::AutoReply;
pub use config::Config;
pub use crypto::{AesKey, KeyGeneration, KeyRing, ScratchPool};
pub use dispatch::{Context, DispatchTable, Handler, MessageDispatcher, Route};
pub use endpoint::{
    CallbackEndpoint, CallbackQuery, CallbackResponse, EndpointSettings, Flow,
    InvalidRequestHandler, InvalidRequestMode, SecurityContext,
};
pub use error::{CallbackError, CryptoError, ProtocolError};
pub use message::{MessageEnvelope, Reply};
pub use web::AppState;
