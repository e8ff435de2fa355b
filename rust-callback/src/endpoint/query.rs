//! Query-string parameters and flow selection.

use serde::Deserialize;

use crate::error::ProtocolError;

/// Query parameters the platform attaches to every callback.
///
/// All fields are optional at the type level so that a missing parameter
/// surfaces as a [`ProtocolError`] instead of a transport-level rejection.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackQuery {
    pub signature: Option<String>,
    pub timestamp: Option<String>,
    pub nonce: Option<String>,
    /// Handshake challenge.
    pub echostr: Option<String>,
    pub encrypt_type: Option<String>,
    pub msg_signature: Option<String>,
    /// Sender open id; informational only.
    pub openid: Option<String>,
}

impl CallbackQuery {
    pub(crate) fn signature(&self) -> Result<&str, ProtocolError> {
        required(&self.signature, "signature")
    }

    pub(crate) fn timestamp(&self) -> Result<&str, ProtocolError> {
        required(&self.timestamp, "timestamp")
    }

    pub(crate) fn nonce(&self) -> Result<&str, ProtocolError> {
        required(&self.nonce, "nonce")
    }

    pub(crate) fn echostr(&self) -> Result<&str, ProtocolError> {
        required(&self.echostr, "echostr")
    }

    pub(crate) fn msg_signature(&self) -> Result<&str, ProtocolError> {
        required(&self.msg_signature, "msg_signature")
    }

    pub(crate) fn encrypt_mode(&self) -> Result<EncryptMode, ProtocolError> {
        EncryptMode::parse(self.encrypt_type.as_deref())
    }
}

fn required<'a>(value: &'a Option<String>, name: &'static str) -> Result<&'a str, ProtocolError> {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or(ProtocolError::MissingParameter(name))
}

/// Body encoding of a delivery, from `encrypt_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncryptMode {
    Raw,
    Aes,
}

impl EncryptMode {
    /// Absent or empty means `raw`.
    pub fn parse(value: Option<&str>) -> Result<Self, ProtocolError> {
        match value.map(str::trim) {
            None | Some("") => Ok(EncryptMode::Raw),
            Some(v) if v.eq_ignore_ascii_case("raw") => Ok(EncryptMode::Raw),
            Some(v) if v.eq_ignore_ascii_case("aes") => Ok(EncryptMode::Aes),
            Some(other) => Err(ProtocolError::UnsupportedEncryptType(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EncryptMode::Raw => "raw",
            EncryptMode::Aes => "aes",
        }
    }
}

/// Which exchange a request belongs to, from the transport method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// `GET`: endpoint ownership check with `echostr`.
    Handshake,
    /// `POST`: message or event delivery.
    Delivery,
}

impl Flow {
    pub fn from_method(method: &str) -> Result<Self, ProtocolError> {
        if method.eq_ignore_ascii_case("GET") {
            Ok(Flow::Handshake)
        } else if method.eq_ignore_ascii_case("POST") {
            Ok(Flow::Delivery)
        } else {
            Err(ProtocolError::UnsupportedMethod(method.to_string()))
        }
    }
}
