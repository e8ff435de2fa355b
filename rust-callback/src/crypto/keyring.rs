//! Symmetric key generations for secure-mode callbacks.
//!
//! The ring holds the current key and the one it replaced. Readers take a
//! snapshot under a shared lock; rotation takes the exclusive lock and is
//! expected to be rare.

use std::fmt;

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use parking_lot::RwLock;
use subtle::ConstantTimeEq;
use tracing::{debug, info, warn};
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::codec::KEY_LEN;
use crate::error::CryptoError;

/// Length of the platform's textual key form.
pub const ENCODING_AES_KEY_LEN: usize = 43;

// EncodingAESKey is unpadded base64 whose last symbol may carry
// non-zero trailing bits.
const ENCODING_AES_KEY_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_allow_trailing_bits(true)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// A 256-bit AES key. Zeroized on drop; never printed.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct AesKey([u8; KEY_LEN]);

impl AesKey {
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Decode the 43-character EncodingAESKey handed out by the platform.
    pub fn from_encoding_aes_key(encoded: &str) -> Result<Self, CryptoError> {
        let encoded = encoded.trim();
        if encoded.len() != ENCODING_AES_KEY_LEN {
            return Err(CryptoError::InvalidKey(format!(
                "expected {} characters, got {}",
                ENCODING_AES_KEY_LEN,
                encoded.len()
            )));
        }

        let mut decoded = ENCODING_AES_KEY_ENGINE
            .decode(encoded)
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;

        if decoded.len() != KEY_LEN {
            decoded.zeroize();
            return Err(CryptoError::InvalidKey(format!(
                "decoded to {} bytes",
                decoded.len()
            )));
        }

        let mut key = [0u8; KEY_LEN];
        key.copy_from_slice(&decoded);
        decoded.zeroize();
        Ok(Self(key))
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    /// An all-zero key stands for "no key configured".
    pub fn is_zero(&self) -> bool {
        self.0.ct_eq(&[0u8; KEY_LEN]).into()
    }
}

impl PartialEq for AesKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.ct_eq(&other.0).into()
    }
}

impl Eq for AesKey {}

impl fmt::Debug for AesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AesKey(..)")
    }
}

/// Which generation opened a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyGeneration {
    Current,
    Previous,
}

impl KeyGeneration {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyGeneration::Current => "current",
            KeyGeneration::Previous => "previous",
        }
    }
}

/// Result of a successful fallback decrypt.
///
/// `key` is a copy of the generation that worked, so a reply can be sealed
/// under it even if the ring rotates mid-request.
#[derive(Debug)]
pub struct Unlocked<T> {
    pub value: T,
    pub generation: KeyGeneration,
    pub key: AesKey,
}

struct KeyMaterial {
    current: AesKey,
    previous: Option<AesKey>,
}

/// Current and previous key generation behind a read-mostly lock.
pub struct KeyRing {
    material: RwLock<KeyMaterial>,
}

impl KeyRing {
    pub fn new(initial: AesKey) -> Self {
        Self::with_previous(initial, None)
    }

    /// Start with an explicit previous generation, e.g. right after an
    /// out-of-process rotation. An all-zero previous key counts as absent.
    pub fn with_previous(current: AesKey, previous: Option<AesKey>) -> Self {
        Self {
            material: RwLock::new(KeyMaterial {
                current,
                previous: previous.filter(|key| !key.is_zero()),
            }),
        }
    }

    pub fn current(&self) -> AesKey {
        self.material.read().current.clone()
    }

    pub fn previous(&self) -> Option<AesKey> {
        self.material.read().previous.clone()
    }

    /// Make `new_key` current and keep the old current as previous.
    /// Whatever was previous before is dropped.
    pub fn rotate(&self, new_key: AesKey) {
        let mut material = self.material.write();
        let retired = std::mem::replace(&mut material.current, new_key);
        material.previous = Some(retired).filter(|key| !key.is_zero());
        info!(
            has_previous = material.previous.is_some(),
            "keyring_rotated"
        );
    }

    /// Run `attempt` with the current key, then once with the previous key if
    /// the first attempt failed and a distinct previous key exists.
    ///
    /// The original error is returned when no fallback applies. If the
    /// fallback also fails, its error is returned.
    pub fn decrypt_with_fallback<T, F>(&self, mut attempt: F) -> Result<Unlocked<T>, CryptoError>
    where
        F: FnMut(&AesKey) -> Result<T, CryptoError>,
    {
        let (current, previous) = {
            let material = self.material.read();
            (material.current.clone(), material.previous.clone())
        };

        let first_error = match attempt(&current) {
            Ok(value) => {
                return Ok(Unlocked {
                    value,
                    generation: KeyGeneration::Current,
                    key: current,
                })
            }
            Err(e) => e,
        };

        let previous = match previous.filter(|key| *key != current) {
            Some(key) => key,
            None => return Err(first_error),
        };

        debug!(error = %first_error, "keyring_current_failed_trying_previous");

        match attempt(&previous) {
            Ok(value) => {
                info!(generation = KeyGeneration::Previous.as_str(), "keyring_fallback_hit");
                Ok(Unlocked {
                    value,
                    generation: KeyGeneration::Previous,
                    key: previous,
                })
            }
            Err(e) => {
                warn!(current_error = %first_error, previous_error = %e, "keyring_fallback_failed");
                Err(e)
            }
        }
    }
}

impl fmt::Debug for KeyRing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyRing")
            .field("has_previous", &self.material.read().previous.is_some())
            .finish()
    }
}
