//! The callback endpoint: handshake and delivery flows over one pipeline.
//!
//! ```text
//! query + body → PayloadCodec::open → MessageEnvelope → recipient check
//!              → MessageDispatcher → Reply::encode → PayloadCodec::seal
//! ```
//!
//! Any failure along the way is logged and handed to the injected
//! [`InvalidRequestHandler`]; the endpoint itself never returns an error.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, warn};
use zeroize::Zeroizing;

use super::codec::{AesCodec, PayloadCodec, PlainCodec};
use super::invalid::{InvalidRequestHandler, SilentInvalidRequest};
use super::query::{CallbackQuery, EncryptMode, Flow};
use crate::crypto::{handshake_signature, verify, KeyRing, ScratchPool};
use crate::dispatch::MessageDispatcher;
use crate::error::{CallbackError, ProtocolError};
use crate::message::MessageEnvelope;

/// What the transport should send back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackResponse {
    /// Handshake success: the echo token is the whole body.
    Echo(String),
    /// Reply document, plain or sealed.
    Xml(Vec<u8>),
    /// Success with an empty body.
    Empty,
    /// Client error.
    Rejected,
}

/// Account identity the endpoint authenticates against.
#[derive(Clone)]
pub struct EndpointSettings {
    /// Shared signing token.
    pub token: String,
    /// App id bound into every encrypted frame.
    pub app_id: String,
    /// Original account id (`gh_...`), the expected `ToUserName`.
    pub original_id: String,
}

impl std::fmt::Debug for EndpointSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndpointSettings")
            .field("token", &"..")
            .field("app_id", &self.app_id)
            .field("original_id", &self.original_id)
            .finish()
    }
}

pub struct CallbackEndpoint {
    settings: EndpointSettings,
    keyring: Option<Arc<KeyRing>>,
    dispatcher: MessageDispatcher,
    invalid: Arc<dyn InvalidRequestHandler>,
    scratch: ScratchPool,
}

impl CallbackEndpoint {
    /// Plain mode only until a key ring is attached.
    pub fn new(settings: EndpointSettings, dispatcher: MessageDispatcher) -> Self {
        Self {
            settings,
            keyring: None,
            dispatcher,
            invalid: Arc::new(SilentInvalidRequest),
            scratch: ScratchPool::default(),
        }
    }

    pub fn with_keyring(mut self, keyring: Arc<KeyRing>) -> Self {
        self.keyring = Some(keyring);
        self
    }

    pub fn with_invalid_request_handler(mut self, handler: Arc<dyn InvalidRequestHandler>) -> Self {
        self.invalid = handler;
        self
    }

    pub fn with_scratch_pool(mut self, scratch: ScratchPool) -> Self {
        self.scratch = scratch;
        self
    }

    pub fn settings(&self) -> &EndpointSettings {
        &self.settings
    }

    pub fn keyring(&self) -> Option<&Arc<KeyRing>> {
        self.keyring.as_ref()
    }

    /// Serve a request whose flow is derived from the transport method.
    pub fn handle_method(&self, method: &str, query: &CallbackQuery, body: &[u8]) -> CallbackResponse {
        match Flow::from_method(method) {
            Ok(flow) => self.handle(flow, query, body),
            Err(e) => self.reject(e.into(), None),
        }
    }

    pub fn handle(&self, flow: Flow, query: &CallbackQuery, body: &[u8]) -> CallbackResponse {
        let result = match flow {
            Flow::Handshake => self.handshake(query),
            Flow::Delivery => self.delivery(query, body),
        };

        match result {
            Ok(response) => response,
            Err(e) => self.reject(e, Some(flow)),
        }
    }

    /// Hand a failure the transport detected before the endpoint could
    /// parse the request to the invalid-request handler.
    pub fn reject_request(&self, error: CallbackError) -> CallbackResponse {
        self.reject(error, None)
    }

    fn reject(&self, error: CallbackError, flow: Option<Flow>) -> CallbackResponse {
        warn!(
            flow = ?flow,
            kind = error.kind(),
            error = %error,
            "callback_request_invalid"
        );
        self.invalid.on_invalid(&error)
    }

    fn handshake(&self, query: &CallbackQuery) -> Result<CallbackResponse, CallbackError> {
        let signature = query.signature()?;
        let echostr = query.echostr()?;
        let computed = handshake_signature(&self.settings.token, query.timestamp()?, query.nonce()?);

        if !verify(signature, &computed) {
            return Err(ProtocolError::SignatureMismatch.into());
        }

        debug!("callback_handshake_verified");
        Ok(CallbackResponse::Echo(echostr.to_string()))
    }

    fn delivery(&self, query: &CallbackQuery, body: &[u8]) -> Result<CallbackResponse, CallbackError> {
        match query.encrypt_mode()? {
            EncryptMode::Raw => self.deliver(
                &PlainCodec {
                    token: &self.settings.token,
                },
                query,
                body,
            ),
            EncryptMode::Aes => {
                let keyring = self
                    .keyring
                    .as_deref()
                    .ok_or_else(|| ProtocolError::UnsupportedEncryptType("aes".to_string()))?;
                self.deliver(
                    &AesCodec {
                        token: &self.settings.token,
                        app_id: &self.settings.app_id,
                        original_id: &self.settings.original_id,
                        keyring,
                        scratch: &self.scratch,
                    },
                    query,
                    body,
                )
            }
        }
    }

    fn deliver<'a, C>(
        &self,
        codec: &C,
        query: &CallbackQuery,
        body: &'a [u8],
    ) -> Result<CallbackResponse, CallbackError>
    where
        C: PayloadCodec<'a>,
    {
        let opened = codec.open(query, body)?;
        let envelope = MessageEnvelope::from_xml(opened.plaintext.as_bytes())?;
        drop(opened.plaintext);

        if envelope.to_user_name != self.settings.original_id {
            return Err(ProtocolError::RecipientMismatch {
                actual: envelope.to_user_name.clone(),
            }
            .into());
        }

        let security = opened.security;
        let dispatched = self.dispatcher.dispatch(&envelope, security.as_ref());

        let xml = match dispatched.reply.encode(&envelope, unix_now())? {
            Some(xml) => Zeroizing::new(xml),
            None => return Ok(CallbackResponse::Empty),
        };

        let sealed = codec.seal(&xml, security.as_ref())?;
        debug!(
            mode = codec.mode().as_str(),
            response_length = sealed.len(),
            "callback_reply_sealed"
        );
        Ok(CallbackResponse::Xml(sealed))
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
