//! What the endpoint answers when a request fails authentication, decryption
//! or parsing.
//!
//! The platform may disable a callback URL that keeps failing loudly, so the
//! default answer is an empty 200.

use std::str::FromStr;
use std::sync::Arc;

use super::callback::CallbackResponse;
use crate::error::CallbackError;

/// Decides the transport-visible outcome of a rejected request.
pub trait InvalidRequestHandler: Send + Sync {
    fn on_invalid(&self, error: &CallbackError) -> CallbackResponse;
}

impl<F> InvalidRequestHandler for F
where
    F: Fn(&CallbackError) -> CallbackResponse + Send + Sync,
{
    fn on_invalid(&self, error: &CallbackError) -> CallbackResponse {
        self(error)
    }
}

/// Answer with an empty success response.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentInvalidRequest;

impl InvalidRequestHandler for SilentInvalidRequest {
    fn on_invalid(&self, _error: &CallbackError) -> CallbackResponse {
        CallbackResponse::Empty
    }
}

/// Answer with a rejection the host maps to a client error status.
#[derive(Debug, Clone, Copy, Default)]
pub struct RejectInvalidRequest;

impl InvalidRequestHandler for RejectInvalidRequest {
    fn on_invalid(&self, _error: &CallbackError) -> CallbackResponse {
        CallbackResponse::Rejected
    }
}

/// Configured choice between the built-in handlers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InvalidRequestMode {
    #[default]
    Silent,
    Reject,
}

impl InvalidRequestMode {
    pub fn handler(&self) -> Arc<dyn InvalidRequestHandler> {
        match self {
            InvalidRequestMode::Silent => Arc::new(SilentInvalidRequest),
            InvalidRequestMode::Reject => Arc::new(RejectInvalidRequest),
        }
    }
}

impl FromStr for InvalidRequestMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "silent" => Ok(InvalidRequestMode::Silent),
            "reject" => Ok(InvalidRequestMode::Reject),
            other => Err(format!("unknown invalid request mode `{}`", other)),
        }
    }
}
