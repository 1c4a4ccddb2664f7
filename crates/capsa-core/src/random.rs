//! CSPRNG draws and zeroization (C1).
//!
//! All randomness in this crate flows through here so there is exactly one
//! place that talks to the OS RNG. `zeroize` must be invoked on every exit
//! path that releases a master-key buffer; the builder and opener both do
//! this on drop, not just on the success path (§4.1, §9).

use rand::RngCore;
use zeroize::Zeroize;

/// Fill `buf` with CSPRNG output.
pub fn random_bytes(buf: &mut [u8]) {
    rand::rngs::OsRng.fill_bytes(buf);
}

/// Freshly generate a 32-byte AES-256-GCM master key.
pub fn new_master_key() -> [u8; 32] {
    let mut key = [0u8; 32];
    random_bytes(&mut key);
    key
}

/// Freshly generate a 96-bit AES-GCM IV.
pub fn new_iv() -> [u8; 12] {
    let mut iv = [0u8; 12];
    random_bytes(&mut iv);
    iv
}

/// Overwrite `buf` with zeros. Thin wrapper kept so call sites read as
/// intent ("zeroize this") rather than reaching for the `Zeroize` trait
/// directly every time.
pub fn zeroize<Z: Zeroize + ?Sized>(buf: &mut Z) {
    buf.zeroize();
}
