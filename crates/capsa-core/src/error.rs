//! Named failure categories for the capsa core, per the error handling design.
//!
//! Callers match on these variants; none of them leak which cryptographic
//! sub-step failed (verification failures in particular are collapsed to a
//! single [`CapsaError::SignatureInvalid`]).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CapsaError {
    /// Use-after-release of a builder or an opened capsa.
    #[error("{0} has already been disposed")]
    Disposed(&'static str),

    /// Contract violation on an input (empty creator id, short RSA key, wrong-size
    /// master key, non-12-byte IV, etc).
    #[error("invalid argument: {0}")]
    Argument(String),

    /// A size/count guard from the data model was exceeded. Names the offending field.
    #[error("limit exceeded on {field}: {actual} > {limit}")]
    LimitExceeded {
        field: &'static str,
        actual: usize,
        limit: usize,
    },

    /// No content: a capsa needs at least one file or a non-empty subject or body.
    #[error("capsa is empty: at least one file, subject, or body is required")]
    Empty,

    /// Base64url decode, PEM-envelope parse, or JSON parse failure.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// AES-GCM authentication tag mismatch on decrypt.
    #[error("AEAD authentication failed")]
    AuthenticationFailed,

    /// Any failure inside JWS RS256 verification.
    #[error("signature verification failed")]
    SignatureInvalid,

    /// The requested party has no usable keychain entry.
    #[error("party has no usable keychain entry")]
    NotInKeychain,

    /// Unwrapped master key length was not 32 bytes.
    #[error("unwrapped master key has invalid length")]
    InvalidMasterKey,

    /// Duplicate IV detected across every field of one capsa. The caller must not
    /// transmit this envelope.
    #[error(
        "duplicate IV detected across capsa fields (possible CSPRNG fault) — do not transmit this envelope"
    )]
    CsprngFault,

    /// File/stream read failure pulled in through the builder's file-source adapter.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CapsaError>;
