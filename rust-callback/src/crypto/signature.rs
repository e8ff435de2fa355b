//! Callback signature computation and verification.
//!
//! The platform signs callbacks with SHA-1 over the lexicographically sorted
//! concatenation of the shared token and the request parameters:
//! - handshake and plain delivery: `token`, `timestamp`, `nonce`
//! - secure delivery: `token`, `timestamp`, `nonce`, base64 ciphertext
//!
//! Sorting first makes the digest independent of argument order.

use sha1::{Digest, Sha1};
use subtle::ConstantTimeEq;

/// Signature checked on the handshake and on plain-mode deliveries.
pub fn handshake_signature(token: &str, timestamp: &str, nonce: &str) -> String {
    sorted_sha1(&mut [token, timestamp, nonce])
}

/// Signature carried as `msg_signature` on secure-mode deliveries, and
/// written into every encrypted response.
pub fn message_signature(token: &str, timestamp: &str, nonce: &str, ciphertext: &str) -> String {
    sorted_sha1(&mut [token, timestamp, nonce, ciphertext])
}

/// Constant-time comparison of a received signature against a computed one.
///
/// Unequal lengths compare unequal without inspecting content.
pub fn verify(candidate: &str, computed: &str) -> bool {
    candidate.as_bytes().ct_eq(computed.as_bytes()).into()
}

fn sorted_sha1(parts: &mut [&str]) -> String {
    parts.sort_unstable();

    let mut hasher = Sha1::new();
    for part in parts.iter() {
        hasher.update(part.as_bytes());
    }

    hex::encode(hasher.finalize())
}
