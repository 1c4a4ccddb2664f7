//! RFC 4648 §5 base64url, unpadded on output, tolerant of padding and of the
//! standard alphabet on input.

use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine as _;

use crate::error::{CapsaError, Result};

/// Encode bytes as unpadded base64url.
pub fn encode(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Decode base64url or standard base64, padded or not. Strict about anything
/// else: invalid characters or broken padding fail with `MalformedInput`.
pub fn decode(input: &str) -> Result<Vec<u8>> {
    for engine in [URL_SAFE_NO_PAD, URL_SAFE, STANDARD_NO_PAD, STANDARD] {
        if let Ok(bytes) = engine.decode(input) {
            return Ok(bytes);
        }
    }
    Err(CapsaError::MalformedInput(format!(
        "invalid base64url input ({} chars)",
        input.len()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let data = b"the quick brown fox jumps over the lazy dog";
        let encoded = encode(data);
        assert!(!encoded.contains('='));
        assert_eq!(decode(&encoded).unwrap(), data);
    }

    #[test]
    fn tolerates_padding_and_standard_alphabet() {
        let data = b"\xfb\xff\xfe";
        let standard_padded = STANDARD.encode(data);
        assert_eq!(decode(&standard_padded).unwrap(), data);
    }

    #[test]
    fn rejects_garbage() {
        assert!(decode("not base64!! \0").is_err());
    }
}
