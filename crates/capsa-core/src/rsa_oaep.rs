//! RSA-OAEP wrap/unwrap of the 32-byte master key (C6).
//!
//! Fixed parameters: OAEP with SHA-256 as both the message digest and the
//! MGF1 hash, empty label — `Oaep::new::<Sha256>()` sets up exactly that.
//! Every call enforces a minimum 4096-bit modulus; shorter keys are rejected
//! before any cryptographic operation is attempted.

use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;

use crate::base64url;
use crate::error::{CapsaError, Result};

const MIN_MODULUS_BITS: usize = 4096;

fn check_modulus_size(key_bits: usize) -> Result<()> {
    if key_bits < MIN_MODULUS_BITS {
        return Err(CapsaError::Argument(format!(
            "RSA modulus must be at least {MIN_MODULUS_BITS} bits, got {key_bits}"
        )));
    }
    Ok(())
}

/// Wrap the 32-byte master key under `public_key`, returning base64url ciphertext.
pub fn wrap(master_key: &[u8; 32], public_key: &RsaPublicKey) -> Result<String> {
    check_modulus_size(public_key.size() * 8)?;
    let mut rng = rand::rngs::OsRng;
    let ciphertext = public_key
        .encrypt(&mut rng, Oaep::new::<Sha256>(), master_key.as_slice())
        .map_err(|e| CapsaError::Argument(format!("RSA-OAEP wrap failed: {e}")))?;
    Ok(base64url::encode(&ciphertext))
}

/// Unwrap a base64url RSA-OAEP ciphertext under `private_key`, returning the
/// 32-byte master key. Any failure — padding, tag, or length — collapses to
/// `AuthenticationFailed`-style opacity per §4.6: no plaintext bytes escape.
pub fn unwrap(ciphertext_b64url: &str, private_key: &RsaPrivateKey) -> Result<[u8; 32]> {
    check_modulus_size(private_key.size() * 8)?;
    let ciphertext = base64url::decode(ciphertext_b64url)?;
    let plaintext = private_key
        .decrypt(Oaep::new::<Sha256>(), &ciphertext)
        .map_err(|_| CapsaError::InvalidMasterKey)?;
    if plaintext.len() != 32 {
        return Err(CapsaError::InvalidMasterKey);
    }
    let mut key = [0u8; 32];
    key.copy_from_slice(&plaintext);
    Ok(key)
}
