//! Payload codecs: how a delivery body is authenticated and opened, and how
//! a reply is sealed.
//!
//! [`PlainCodec`] checks the query-string signature and passes bytes through.
//! [`AesCodec`] checks the message signature, decrypts with key-ring fallback
//! into a pooled scratch buffer, and seals replies under the same generation.

use std::ops::Range;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use tracing::{debug, warn};

use super::query::{CallbackQuery, EncryptMode};
use crate::crypto::{
    decrypt_in_place, encrypt, handshake_signature, message_signature, verify, AesKey,
    KeyGeneration, KeyRing, ScratchBuf, ScratchPool, RANDOM_LEN,
};
use crate::error::{CallbackError, CryptoError, ProtocolError};
use crate::message::{EncryptedEnvelope, EncryptedRequestBody};

/// Decryption context of a secure-mode delivery, handed to handlers and
/// used to seal the reply.
#[derive(Debug)]
pub struct SecurityContext {
    /// Random prefix of the inbound frame.
    pub random: [u8; RANDOM_LEN],
    /// Generation that opened the payload.
    pub generation: KeyGeneration,
    pub timestamp: String,
    pub nonce: String,
    key: AesKey,
}

impl SecurityContext {
    pub(crate) fn key(&self) -> &AesKey {
        &self.key
    }
}

/// Plain bytes of a delivery, either the request body itself or a range of a
/// scratch buffer.
pub(crate) enum Plaintext<'a> {
    Body(&'a [u8]),
    Staged {
        buf: ScratchBuf<'a>,
        range: Range<usize>,
    },
}

impl Plaintext<'_> {
    pub(crate) fn as_bytes(&self) -> &[u8] {
        match self {
            Plaintext::Body(body) => body,
            Plaintext::Staged { buf, range } => &buf[range.clone()],
        }
    }
}

pub(crate) struct Opened<'a> {
    pub(crate) plaintext: Plaintext<'a>,
    pub(crate) security: Option<SecurityContext>,
}

pub(crate) trait PayloadCodec<'a> {
    fn mode(&self) -> EncryptMode;

    /// Authenticate the request and expose its plain envelope bytes.
    fn open(&self, query: &CallbackQuery, body: &'a [u8]) -> Result<Opened<'a>, CallbackError>;

    /// Turn a reply document into the response body.
    fn seal(
        &self,
        reply: &[u8],
        security: Option<&SecurityContext>,
    ) -> Result<Vec<u8>, CallbackError>;
}

/// `encrypt_type=raw`.
pub(crate) struct PlainCodec<'a> {
    pub(crate) token: &'a str,
}

impl<'a> PayloadCodec<'a> for PlainCodec<'a> {
    fn mode(&self) -> EncryptMode {
        EncryptMode::Raw
    }

    fn open(&self, query: &CallbackQuery, body: &'a [u8]) -> Result<Opened<'a>, CallbackError> {
        let signature = query.signature()?;
        let computed = handshake_signature(self.token, query.timestamp()?, query.nonce()?);

        if !verify(signature, &computed) {
            warn!(mode = "raw", "callback_signature_mismatch");
            return Err(ProtocolError::SignatureMismatch.into());
        }

        Ok(Opened {
            plaintext: Plaintext::Body(body),
            security: None,
        })
    }

    fn seal(
        &self,
        reply: &[u8],
        _security: Option<&SecurityContext>,
    ) -> Result<Vec<u8>, CallbackError> {
        Ok(reply.to_vec())
    }
}

/// `encrypt_type=aes`.
pub(crate) struct AesCodec<'a> {
    pub(crate) token: &'a str,
    pub(crate) app_id: &'a str,
    pub(crate) original_id: &'a str,
    pub(crate) keyring: &'a KeyRing,
    pub(crate) scratch: &'a ScratchPool,
}

impl<'a> PayloadCodec<'a> for AesCodec<'a> {
    fn mode(&self) -> EncryptMode {
        EncryptMode::Aes
    }

    fn open(&self, query: &CallbackQuery, body: &'a [u8]) -> Result<Opened<'a>, CallbackError> {
        let msg_signature = query.msg_signature()?;
        let timestamp = query.timestamp()?;
        let nonce = query.nonce()?;

        let wrapper = EncryptedRequestBody::from_xml(body)?;

        let computed = message_signature(self.token, timestamp, nonce, &wrapper.encrypt);
        if !verify(msg_signature, &computed) {
            warn!(mode = "aes", "callback_signature_mismatch");
            return Err(ProtocolError::SignatureMismatch.into());
        }

        if let Some(to) = wrapper.to_user_name.as_deref().filter(|to| !to.is_empty()) {
            if to != self.original_id {
                return Err(ProtocolError::RecipientMismatch {
                    actual: to.to_string(),
                }
                .into());
            }
        }

        let scratch: &'a ScratchPool = self.scratch;
        let mut ciphertext = scratch.checkout();
        STANDARD
            .decode_vec(wrapper.encrypt.as_bytes(), &mut ciphertext)
            .map_err(|e| CryptoError::InvalidBase64(e.to_string()))?;

        let mut work = scratch.checkout();
        let unlocked = self.keyring.decrypt_with_fallback(|key| {
            work.clear();
            work.extend_from_slice(&ciphertext);
            decrypt_in_place(&mut work, self.app_id, key.as_bytes())
        })?;
        drop(ciphertext);

        debug!(
            generation = unlocked.generation.as_str(),
            plaintext_length = unlocked.value.plaintext.len(),
            "callback_payload_decrypted"
        );

        Ok(Opened {
            plaintext: Plaintext::Staged {
                buf: work,
                range: unlocked.value.plaintext.clone(),
            },
            security: Some(SecurityContext {
                random: unlocked.value.random,
                generation: unlocked.generation,
                timestamp: timestamp.to_string(),
                nonce: nonce.to_string(),
                key: unlocked.key,
            }),
        })
    }

    fn seal(
        &self,
        reply: &[u8],
        security: Option<&SecurityContext>,
    ) -> Result<Vec<u8>, CallbackError> {
        let security = security.ok_or_else(|| {
            CallbackError::ReplyEncoding("secure reply without a security context".to_string())
        })?;

        let mut random = [0u8; RANDOM_LEN];
        OsRng.fill_bytes(&mut random);

        let ciphertext = encrypt(&random, reply, self.app_id, security.key().as_bytes())?;
        let encrypt = STANDARD.encode(ciphertext);
        let msg_signature =
            message_signature(self.token, &security.timestamp, &security.nonce, &encrypt);

        EncryptedEnvelope {
            encrypt,
            msg_signature,
            timestamp: security.timestamp.clone(),
            nonce: security.nonce.clone(),
        }
        .to_xml()
    }
}
