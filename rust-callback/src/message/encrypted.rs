//! Secure-mode wire documents.
//!
//! Inbound, the platform wraps the ciphertext as
//! `<xml><ToUserName/><Encrypt/></xml>` and puts signature, timestamp and
//! nonce on the query string. Outbound, all four travel in the body.

use serde::Deserialize;

use super::xml::XmlDocument;
use crate::error::CallbackError;

/// Body of a secure-mode delivery.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename = "xml")]
pub struct EncryptedRequestBody {
    #[serde(rename = "ToUserName")]
    pub to_user_name: Option<String>,
    /// Base64 ciphertext.
    #[serde(rename = "Encrypt")]
    pub encrypt: String,
}

impl EncryptedRequestBody {
    pub fn from_xml(bytes: &[u8]) -> Result<Self, CallbackError> {
        let text = std::str::from_utf8(bytes)?;
        Ok(quick_xml::de::from_str(text)?)
    }
}

/// Secure-mode response document.
///
/// `msg_signature` is the sorted SHA-1 over token, `timestamp`, `nonce` and
/// `encrypt`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename = "xml")]
pub struct EncryptedEnvelope {
    #[serde(rename = "Encrypt")]
    pub encrypt: String,
    #[serde(rename = "MsgSignature")]
    pub msg_signature: String,
    #[serde(rename = "TimeStamp")]
    pub timestamp: String,
    #[serde(rename = "Nonce")]
    pub nonce: String,
}

impl EncryptedEnvelope {
    pub fn from_xml(bytes: &[u8]) -> Result<Self, CallbackError> {
        let text = std::str::from_utf8(bytes)?;
        Ok(quick_xml::de::from_str(text)?)
    }

    pub fn to_xml(&self) -> Result<Vec<u8>, CallbackError> {
        let mut doc = XmlDocument::new()?;
        doc.cdata("Encrypt", &self.encrypt)?
            .cdata("MsgSignature", &self.msg_signature)?
            .text("TimeStamp", &self.timestamp)?
            .cdata("Nonce", &self.nonce)?;
        Ok(doc.finish()?)
    }
}
