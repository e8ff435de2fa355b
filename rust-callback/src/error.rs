//! Error taxonomy for the callback pipeline.
//!
//! - [`ProtocolError`]: the request is not what the platform would send.
//!   Raised before any payload is parsed or decrypted.
//! - [`CryptoError`]: the encrypted payload could not be opened. Kept apart
//!   from protocol failures because it can occur legitimately while a key
//!   rotation is in flight.
//! - [`CallbackError`]: everything the endpoint can hand to the
//!   invalid-request callback.
//!
//! An unrecognized message or event type is not an error; see
//! [`crate::dispatch::Terminal::Unknown`].

use thiserror::Error;

/// Request-level authentication and framing failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("missing required query parameter `{0}`")]
    MissingParameter(&'static str),

    #[error("signature mismatch")]
    SignatureMismatch,

    #[error("unsupported encrypt_type `{0}`")]
    UnsupportedEncryptType(String),

    #[error("recipient `{actual}` is not the configured account")]
    RecipientMismatch { actual: String },

    #[error("unsupported method `{0}`")]
    UnsupportedMethod(String),

    #[error("malformed query string: {0}")]
    MalformedQuery(String),
}

/// Failures while opening or sealing an encrypted envelope.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    #[error("ciphertext length {0} is not a positive multiple of 32")]
    InvalidLength(usize),

    #[error("invalid padding")]
    InvalidPadding,

    #[error("corrupt envelope")]
    CorruptEnvelope,

    #[error("account mismatch")]
    AccountMismatch,

    #[error("invalid base64 ciphertext: {0}")]
    InvalidBase64(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),
}

/// Any failure the callback endpoint can observe while serving a request.
#[derive(Debug, Error)]
pub enum CallbackError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("malformed body: {0}")]
    MalformedBody(String),

    #[error("failed to encode reply: {0}")]
    ReplyEncoding(String),
}

impl CallbackError {
    /// Short, stable label used as a log field.
    pub fn kind(&self) -> &'static str {
        match self {
            CallbackError::Protocol(_) => "protocol",
            CallbackError::Crypto(_) => "crypto",
            CallbackError::MalformedBody(_) => "malformed_body",
            CallbackError::ReplyEncoding(_) => "reply_encoding",
        }
    }
}

impl From<quick_xml::DeError> for CallbackError {
    fn from(err: quick_xml::DeError) -> Self {
        CallbackError::MalformedBody(err.to_string())
    }
}

impl From<std::str::Utf8Error> for CallbackError {
    fn from(err: std::str::Utf8Error) -> Self {
        CallbackError::MalformedBody(err.to_string())
    }
}

impl From<quick_xml::Error> for CallbackError {
    fn from(err: quick_xml::Error) -> Self {
        CallbackError::ReplyEncoding(err.to_string())
    }
}
