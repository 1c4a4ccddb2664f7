//! Detached JWS RS256 signing and verification over the canonical string (C9).

use rsa::pkcs1v15::{Signature, SigningKey, VerifyingKey};
use rsa::signature::{RandomizedSigner, SignatureEncoding, Verifier};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;

use crate::base64url;
use crate::error::{CapsaError, Result};
use crate::hash::constant_time_eq;
use crate::model::CapsaSignature;

/// The exact byte sequence of the protected header — no whitespace variation
/// is permitted, so this is a literal rather than a serialized struct.
const PROTECTED_HEADER_JSON: &str = r#"{"alg":"RS256","typ":"JWT"}"#;

const SIGNATURE_LEN: usize = 512;
const MAX_PAYLOAD_CHARS: usize = 65_536;

/// Sign `canonical` under `private_key`, producing a complete detached
/// JWS triple. `private_key` must be 4096-bit; the modulus is not checked
/// here since key generation/import already enforces it at the boundary.
pub fn sign(canonical: &str, private_key: &RsaPrivateKey) -> Result<CapsaSignature> {
    let payload = base64url::encode(canonical.as_bytes());
    if payload.len() > MAX_PAYLOAD_CHARS {
        return Err(CapsaError::LimitExceeded {
            field: "signature.payload",
            actual: payload.len(),
            limit: MAX_PAYLOAD_CHARS,
        });
    }
    let protected = base64url::encode(PROTECTED_HEADER_JSON.as_bytes());
    let signing_input = format!("{protected}.{payload}");

    let signing_key = SigningKey::<Sha256>::new(private_key.clone());
    let mut rng = rand::rngs::OsRng;
    let signature: Signature = signing_key.sign_with_rng(&mut rng, signing_input.as_bytes());
    let signature_bytes = signature.to_bytes();
    if signature_bytes.len() != SIGNATURE_LEN {
        return Err(CapsaError::Argument(format!(
            "RS256 signature must be {SIGNATURE_LEN} bytes, got {}",
            signature_bytes.len()
        )));
    }

    Ok(CapsaSignature {
        algorithm: "RS256".to_string(),
        protected,
        payload,
        signature: base64url::encode(&signature_bytes),
    })
}

/// Verify a detached JWS triple against an independently reconstructed
/// canonical string. Every failure mode — payload mismatch, bad signature
/// length, cryptographic failure — collapses to `false`; no distinguishing
/// information about why escapes (§4.9).
pub fn verify(sig: &CapsaSignature, canonical: &str, public_key: &RsaPublicKey) -> bool {
    verify_jws(&sig.protected, &sig.payload, &sig.signature, canonical, public_key)
}

/// Diagnostic entry point exposed at the crate root (§6). Takes the raw
/// base64url triple plus the independently reconstructed canonical string,
/// so callers that only have wire fields in hand (not a full [`CapsaSignature`])
/// can still verify.
pub fn verify_jws(
    protected_b64: &str,
    payload_b64: &str,
    signature_b64: &str,
    canonical: &str,
    public_key: &RsaPublicKey,
) -> bool {
    let expected_payload = base64url::encode(canonical.as_bytes());
    if !constant_time_eq(expected_payload.as_bytes(), payload_b64.as_bytes()) {
        return false;
    }

    let Ok(signature_bytes) = base64url::decode(signature_b64) else {
        return false;
    };
    if signature_bytes.len() != SIGNATURE_LEN {
        return false;
    }
    let Ok(signature) = Signature::try_from(signature_bytes.as_slice()) else {
        return false;
    };

    let signing_input = format!("{protected_b64}.{payload_b64}");
    let verifying_key = VerifyingKey::<Sha256>::new(public_key.clone());
    verifying_key
        .verify(signing_input.as_bytes(), &signature)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keygen::generate_key_pair;
    use crate::keys::{parse_private_key, parse_public_key};

    fn keypair() -> (RsaPrivateKey, RsaPublicKey) {
        // RS256 signatures over a 4096-bit key are exactly 512 bytes (§3); a
        // smaller test key would make `sign`'s length check fail spuriously.
        let pair = generate_key_pair(4096).unwrap();
        (
            parse_private_key(&pair.private_key).unwrap(),
            parse_public_key(&pair.public_key).unwrap(),
        )
    }

    #[test]
    fn signs_and_verifies() {
        let (sk, pk) = keypair();
        let sig = sign("capsa_x|1.0.0|0|AES-256-GCM", &sk).unwrap();
        assert_eq!(sig.algorithm, "RS256");
        assert!(verify(&sig, "capsa_x|1.0.0|0|AES-256-GCM", &pk));
    }

    #[test]
    fn protected_header_is_the_exact_literal() {
        let (sk, _) = keypair();
        let sig = sign("anything", &sk).unwrap();
        let decoded = base64url::decode(&sig.protected).unwrap();
        assert_eq!(decoded, PROTECTED_HEADER_JSON.as_bytes());
    }

    #[test]
    fn flipping_a_signature_bit_fails_verification() {
        let (sk, pk) = keypair();
        let mut sig = sign("capsa_x|1.0.0|0|AES-256-GCM", &sk).unwrap();
        let mut raw = base64url::decode(&sig.signature).unwrap();
        raw[0] ^= 0x01;
        sig.signature = base64url::encode(&raw);
        assert!(!verify(&sig, "capsa_x|1.0.0|0|AES-256-GCM", &pk));
    }

    #[test]
    fn mismatched_canonical_string_fails_verification() {
        let (sk, pk) = keypair();
        let sig = sign("capsa_x|1.0.0|0|AES-256-GCM", &sk).unwrap();
        assert!(!verify(&sig, "capsa_x|1.0.0|1|AES-256-GCM", &pk));
    }

    #[test]
    fn wrong_length_signature_fails_closed() {
        let (_, pk) = keypair();
        let bad_sig = CapsaSignature {
            algorithm: "RS256".to_string(),
            protected: base64url::encode(PROTECTED_HEADER_JSON.as_bytes()),
            payload: base64url::encode(b"capsa_x|1.0.0|0|AES-256-GCM"),
            signature: base64url::encode(&[0u8; 511]),
        };
        assert!(!verify(&bad_sig, "capsa_x|1.0.0|0|AES-256-GCM", &pk));
    }
}
