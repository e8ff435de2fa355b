//! Payload encryption for secure-mode callbacks.
//!
//! The framed plaintext is
//!
//! ```text
//! random(16) | u32_be(len) | message(len) | account_id | pad
//! ```
//!
//! padded to a multiple of 32 bytes with N bytes of value N (N = 32 when the
//! frame is already aligned), then encrypted with AES-256-CBC using the first
//! 16 key bytes as IV. The 32-byte pad block is part of the framing and is
//! unrelated to the cipher's 16-byte block.

use std::ops::Range;

use cbc::cipher::block_padding::NoPadding;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, Iv, Key, KeyIvInit};
use zeroize::Zeroizing;

use crate::error::CryptoError;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// Raw key length in bytes.
pub const KEY_LEN: usize = 32;

/// Length of the random prefix of every frame.
pub const RANDOM_LEN: usize = 16;

const PAD_BLOCK: usize = 32;
const LENGTH_PREFIX_LEN: usize = 4;
const IV_LEN: usize = 16;
const HEADER_LEN: usize = RANDOM_LEN + LENGTH_PREFIX_LEN;

/// A decrypted frame that owns its plaintext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decrypted {
    pub random: [u8; RANDOM_LEN],
    pub plaintext: Vec<u8>,
}

/// A frame decrypted in place; `plaintext` indexes into the caller's buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenedFrame {
    pub random: [u8; RANDOM_LEN],
    pub plaintext: Range<usize>,
}

/// Frame, pad and encrypt `plaintext` for `account_id`.
pub fn encrypt(
    random: &[u8; RANDOM_LEN],
    plaintext: &[u8],
    account_id: &str,
    key: &[u8; KEY_LEN],
) -> Result<Vec<u8>, CryptoError> {
    let message_len =
        u32::try_from(plaintext.len()).map_err(|_| CryptoError::InvalidLength(plaintext.len()))?;

    let unpadded = HEADER_LEN + plaintext.len() + account_id.len();
    let pad = PAD_BLOCK - unpadded % PAD_BLOCK;

    let mut buffer = Vec::with_capacity(unpadded + pad);
    buffer.extend_from_slice(random);
    buffer.extend_from_slice(&message_len.to_be_bytes());
    buffer.extend_from_slice(plaintext);
    buffer.extend_from_slice(account_id.as_bytes());
    buffer.resize(unpadded + pad, pad as u8);

    let len = buffer.len();
    Aes256CbcEnc::new(Key::<Aes256CbcEnc>::from_slice(key), iv_of(key))
        .encrypt_padded_mut::<NoPadding>(&mut buffer, len)
        .map_err(|_| CryptoError::InvalidLength(len))?;

    Ok(buffer)
}

/// Decrypt and unframe `ciphertext`, returning an owned copy of the message.
pub fn decrypt(
    ciphertext: &[u8],
    account_id: &str,
    key: &[u8; KEY_LEN],
) -> Result<Decrypted, CryptoError> {
    let mut buffer = Zeroizing::new(ciphertext.to_vec());
    let frame = decrypt_in_place(&mut buffer, account_id, key)?;

    Ok(Decrypted {
        random: frame.random,
        plaintext: buffer[frame.plaintext].to_vec(),
    })
}

/// Decrypt `buffer` in place and validate its framing.
///
/// On success the message lives at `buffer[frame.plaintext]`. On failure the
/// buffer holds undefined bytes and must not be reused without a reset.
pub fn decrypt_in_place(
    buffer: &mut [u8],
    account_id: &str,
    key: &[u8; KEY_LEN],
) -> Result<OpenedFrame, CryptoError> {
    let len = buffer.len();
    if len == 0 || len % PAD_BLOCK != 0 {
        return Err(CryptoError::InvalidLength(len));
    }

    Aes256CbcDec::new(Key::<Aes256CbcDec>::from_slice(key), iv_of(key))
        .decrypt_padded_mut::<NoPadding>(buffer)
        .map_err(|_| CryptoError::InvalidLength(len))?;

    let pad = usize::from(buffer[len - 1]);
    if !(1..=PAD_BLOCK).contains(&pad) {
        return Err(CryptoError::InvalidPadding);
    }

    let content_len = len - pad;
    if content_len < HEADER_LEN {
        return Err(CryptoError::CorruptEnvelope);
    }

    let mut prefix = [0u8; LENGTH_PREFIX_LEN];
    prefix.copy_from_slice(&buffer[RANDOM_LEN..HEADER_LEN]);
    let message_len = u32::from_be_bytes(prefix) as usize;

    let end = HEADER_LEN
        .checked_add(message_len)
        .filter(|end| *end <= content_len)
        .ok_or(CryptoError::CorruptEnvelope)?;

    if &buffer[end..content_len] != account_id.as_bytes() {
        return Err(CryptoError::AccountMismatch);
    }

    let mut random = [0u8; RANDOM_LEN];
    random.copy_from_slice(&buffer[..RANDOM_LEN]);

    Ok(OpenedFrame {
        random,
        plaintext: HEADER_LEN..end,
    })
}

fn iv_of(key: &[u8; KEY_LEN]) -> &Iv<Aes256CbcEnc> {
    Iv::<Aes256CbcEnc>::from_slice(&key[..IV_LEN])
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const KEY: [u8; KEY_LEN] = *b"0123456789abcdef0123456789abcdef";
    const RANDOM: [u8; RANDOM_LEN] = *b"aaaabbbbccccdddd";
    const APP_ID: &str = "wxabcdef0123456789";

    #[test]
    fn test_encrypt_output_is_aligned() {
        for len in [0usize, 1, 10, 31, 32, 33, 100] {
            let plaintext = vec![b'x'; len];
            let ciphertext = encrypt(&RANDOM, &plaintext, APP_ID, &KEY).unwrap();
            assert_eq!(ciphertext.len() % PAD_BLOCK, 0);
            assert!(ciphertext.len() > HEADER_LEN + len + APP_ID.len());
        }
    }

    #[test]
    fn test_full_pad_block_when_aligned() {
        // 16 + 4 + 12 + 0 = 32 -> a whole extra pad block.
        let plaintext = vec![b'y'; 12];
        let ciphertext = encrypt(&RANDOM, &plaintext, "", &KEY).unwrap();
        assert_eq!(ciphertext.len(), 64);

        let decrypted = decrypt(&ciphertext, "", &KEY).unwrap();
        assert_eq!(decrypted.plaintext, plaintext);
    }

    #[test]
    fn test_decrypt_roundtrip() {
        let plaintext = b"<xml><Content><![CDATA[hello]]></Content></xml>";
        let ciphertext = encrypt(&RANDOM, plaintext, APP_ID, &KEY).unwrap();

        let decrypted = decrypt(&ciphertext, APP_ID, &KEY).unwrap();

        assert_eq!(decrypted.random, RANDOM);
        assert_eq!(decrypted.plaintext, plaintext.to_vec());
    }

    #[test]
    fn test_decrypt_in_place_reports_range() {
        let ciphertext = encrypt(&RANDOM, b"hello", APP_ID, &KEY).unwrap();
        let mut buffer = ciphertext.clone();

        let frame = decrypt_in_place(&mut buffer, APP_ID, &KEY).unwrap();

        assert_eq!(frame.plaintext, HEADER_LEN..HEADER_LEN + 5);
        assert_eq!(&buffer[frame.plaintext], b"hello");
    }

    #[test]
    fn test_decrypt_rejects_bad_length() {
        assert_eq!(
            decrypt(&[], APP_ID, &KEY),
            Err(CryptoError::InvalidLength(0))
        );
        assert_eq!(
            decrypt(&[0u8; 48], APP_ID, &KEY),
            Err(CryptoError::InvalidLength(48))
        );
    }

    #[test]
    fn test_decrypt_rejects_account_mismatch() {
        let ciphertext = encrypt(&RANDOM, b"hello", APP_ID, &KEY).unwrap();

        assert_eq!(
            decrypt(&ciphertext, "wxsomeoneelse00000", &KEY),
            Err(CryptoError::AccountMismatch)
        );
    }

    #[test]
    fn test_decrypt_rejects_invalid_padding() {
        // Frame a buffer by hand whose pad byte is out of range.
        let mut frame = vec![0u8; 64];
        frame[63] = 0;
        let len = frame.len();
        Aes256CbcEnc::new(Key::<Aes256CbcEnc>::from_slice(&KEY), iv_of(&KEY))
            .encrypt_padded_mut::<NoPadding>(&mut frame, len)
            .unwrap();

        assert_eq!(
            decrypt(&frame, APP_ID, &KEY),
            Err(CryptoError::InvalidPadding)
        );
    }

    #[test]
    fn test_decrypt_rejects_overlong_length_prefix() {
        let mut frame = vec![0u8; 64];
        frame[RANDOM_LEN..HEADER_LEN].copy_from_slice(&1000u32.to_be_bytes());
        frame[32..].fill(32);
        let len = frame.len();
        Aes256CbcEnc::new(Key::<Aes256CbcEnc>::from_slice(&KEY), iv_of(&KEY))
            .encrypt_padded_mut::<NoPadding>(&mut frame, len)
            .unwrap();

        assert_eq!(
            decrypt(&frame, APP_ID, &KEY),
            Err(CryptoError::CorruptEnvelope)
        );
    }

    #[test]
    fn test_decrypt_wrong_key_fails() {
        let ciphertext = encrypt(&RANDOM, b"hello", APP_ID, &KEY).unwrap();
        let other = [7u8; KEY_LEN];

        assert!(decrypt(&ciphertext, APP_ID, &other).is_err());
    }

    #[test]
    fn test_single_bit_flips_are_detected() {
        // Short message: nearly every block carries framing, so a flip
        // lands on the length prefix, account id or pad almost always.
        let ciphertext = encrypt(&RANDOM, b"hi", APP_ID, &KEY).unwrap();

        let total = ciphertext.len() * 8;
        let mut rejected = 0;
        for bit in 0..total {
            let mut tampered = ciphertext.clone();
            tampered[bit / 8] ^= 1 << (bit % 8);
            if decrypt(&tampered, APP_ID, &KEY).is_err() {
                rejected += 1;
            }
        }

        assert!(rejected * 10 >= total * 9, "rejected {rejected} of {total}");
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_roundtrip(
            random in any::<[u8; RANDOM_LEN]>(),
            plaintext in proptest::collection::vec(any::<u8>(), 0..4096),
            account_id in "[A-Za-z0-9_]{0,32}",
            key in any::<[u8; KEY_LEN]>(),
        ) {
            let ciphertext = encrypt(&random, &plaintext, &account_id, &key).unwrap();
            let decrypted = decrypt(&ciphertext, &account_id, &key).unwrap();

            prop_assert_eq!(decrypted.random, random);
            prop_assert_eq!(decrypted.plaintext, plaintext);
        }
    }
}
