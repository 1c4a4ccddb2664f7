//! AES-256-GCM engine: 96-bit IV, 128-bit tag, no AAD (C7).
//!
//! The tag is always handled separately from the ciphertext — the data model
//! stores them in distinct fields — so encryption here returns the two apart
//! rather than concatenated the way the `aead` crate's `Aead::encrypt` does.

use aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};

use crate::error::{CapsaError, Result};

const TAG_LEN: usize = 16;

/// Encrypt `plaintext` under `key` (32 bytes) and `iv` (12 bytes), returning
/// `(ciphertext, tag)` with the tag split out of the combined AEAD output.
pub fn encrypt(plaintext: &[u8], key: &[u8; 32], iv: &[u8; 12]) -> Result<(Vec<u8>, [u8; 16])> {
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|_| CapsaError::Argument("AES-256-GCM key must be 32 bytes".into()))?;
    let nonce = Nonce::from_slice(iv);
    let mut combined = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| CapsaError::AuthenticationFailed)?;
    let tag_bytes = combined.split_off(combined.len() - TAG_LEN);
    let mut tag = [0u8; TAG_LEN];
    tag.copy_from_slice(&tag_bytes);
    Ok((combined, tag))
}

/// Decrypt `ciphertext` under `key`/`iv`, verifying the detached `tag`.
/// Any authentication failure surfaces as `AuthenticationFailed` — padding,
/// tag, or length problems are all indistinguishable to the caller.
pub fn decrypt(
    ciphertext: &[u8],
    key: &[u8; 32],
    iv: &[u8; 12],
    tag: &[u8; 16],
) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|_| CapsaError::Argument("AES-256-GCM key must be 32 bytes".into()))?;
    let nonce = Nonce::from_slice(iv);
    let mut combined = Vec::with_capacity(ciphertext.len() + TAG_LEN);
    combined.extend_from_slice(ciphertext);
    combined.extend_from_slice(tag);
    cipher
        .decrypt(nonce, combined.as_slice())
        .map_err(|_| CapsaError::AuthenticationFailed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::{new_iv, new_master_key};

    #[test]
    fn round_trips() {
        let key = new_master_key();
        let iv = new_iv();
        let (ct, tag) = encrypt(b"Hello, World!", &key, &iv).unwrap();
        let pt = decrypt(&ct, &key, &iv, &tag).unwrap();
        assert_eq!(pt, b"Hello, World!");
    }

    #[test]
    fn tampered_tag_fails_closed() {
        let key = new_master_key();
        let iv = new_iv();
        let (ct, mut tag) = encrypt(b"secret", &key, &iv).unwrap();
        tag[0] ^= 0x80;
        assert!(matches!(
            decrypt(&ct, &key, &iv, &tag),
            Err(CapsaError::AuthenticationFailed)
        ));
    }

    #[test]
    fn tampered_ciphertext_fails_closed() {
        let key = new_master_key();
        let iv = new_iv();
        let (mut ct, tag) = encrypt(b"secret", &key, &iv).unwrap();
        ct[0] ^= 0x01;
        assert!(matches!(
            decrypt(&ct, &key, &iv, &tag),
            Err(CapsaError::AuthenticationFailed)
        ));
    }

    #[test]
    fn wrong_key_size_is_an_argument_error() {
        let short_key = [0u8; 16];
        // Build via new_from_slice directly to exercise the error path without
        // fighting the type system over a [u8;32] requirement.
        let result = Aes256Gcm::new_from_slice(&short_key);
        assert!(result.is_err());
    }
}
