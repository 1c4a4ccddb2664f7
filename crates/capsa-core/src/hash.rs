//! SHA-256 hashing and timing-safe byte comparison (C3).

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// SHA-256 of `data`, as exactly 64 lowercase hex characters.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// SHA-256 raw digest.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// Data-independent-time equality. Used anywhere an attacker-controlled value
/// is compared against a secret-derived one (e.g. the JWS payload check).
///
/// The length check short-circuits before the constant-time comparison; two
/// byte strings of different length are never mistaken for equal, but the
/// length itself is not considered secret here (RFC 7515 payloads are not a
/// place we need to hide a length).
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}
