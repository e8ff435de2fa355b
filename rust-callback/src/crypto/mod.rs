//! Cryptographic building blocks for the callback pipeline.
//!
//! - [`signature`]: SHA-1 handshake and message signatures
//! - [`codec`]: framed AES-256-CBC payload encryption
//! - [`keyring`]: current/previous key generations
//! - [`scratch`]: zeroizing buffer pool for per-request staging

pub mod codec;
pub mod keyring;
pub mod scratch;
pub mod signature;

pub use codec::{decrypt, decrypt_in_place, encrypt, Decrypted, OpenedFrame, KEY_LEN, RANDOM_LEN};
pub use keyring::{AesKey, KeyGeneration, KeyRing, Unlocked};
pub use scratch::{ScratchBuf, ScratchPool};
pub use signature::{handshake_signature, message_signature, verify};
