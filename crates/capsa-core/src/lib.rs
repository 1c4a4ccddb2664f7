//! Client-side cryptographic core for zero-knowledge capsa envelopes.
//!
//! Builds authenticated, end-to-end encrypted "capsa" envelopes — subject,
//! body, structured data, and file payloads encrypted under a fresh
//! per-capsa master key, RSA-OAEP-wrapped per recipient, bound together by a
//! detached RS256 signature — and opens them back. See [`builder::CapsaBuilder`]
//! and [`opener::OpenedCapsa`] for the two halves of the core.

pub mod aes_gcm;
pub mod asyncapi;
pub mod base64url;
pub mod builder;
pub mod canonical;
pub mod compression;
pub mod error;
pub mod hash;
pub mod ids;
pub mod jws;
pub mod keygen;
pub mod keys;
pub mod limits;
pub mod mime;
pub mod model;
pub mod opener;
pub mod random;
pub mod rsa_oaep;

pub use asyncapi::{build_async, open_async};
pub use builder::{BuiltCapsa, CapsaBuilder, FileOptions, PartyKey};
pub use error::{CapsaError, Result};
pub use jws::verify_jws;
pub use keygen::{generate_key_pair, GeneratedKeyPair, PRODUCTION_BITS};
pub use limits::Limits;
pub use model::{
    AccessControl, Capsa, CapsaMetadata, CapsaSignature, FileEntry, Keychain, KeychainEntry,
    StructuredData,
};
pub use opener::OpenedCapsa;
