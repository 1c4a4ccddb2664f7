//! gzip compression applied before encryption (C4).

use std::io::{Read, Write};

use flate2::write::GzEncoder;
use flate2::Compression;

use crate::error::Result;

/// gzip's own header/trailer overhead means compressing anything shorter
/// than this is never a win; the break-even point observed in practice.
const COMPRESS_THRESHOLD: usize = 150;

pub fn should_compress(byte_len: usize) -> bool {
    byte_len >= COMPRESS_THRESHOLD
}

pub struct CompressionOutcome {
    pub bytes: Vec<u8>,
    pub compressed: bool,
    pub original_size: Option<u64>,
}

/// Compress `plaintext` with gzip only when doing so is a net win
/// (strictly smaller than the input) and the caller opted in via `compress`.
/// Returns the original bytes untouched otherwise.
pub fn compress_if_beneficial(plaintext: &[u8], compress: bool) -> Result<CompressionOutcome> {
    if !compress || !should_compress(plaintext.len()) {
        return Ok(CompressionOutcome {
            bytes: plaintext.to_vec(),
            compressed: false,
            original_size: None,
        });
    }

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(plaintext)?;
    let gzipped = encoder.finish()?;

    if gzipped.len() < plaintext.len() {
        Ok(CompressionOutcome {
            bytes: gzipped,
            compressed: true,
            original_size: Some(plaintext.len() as u64),
        })
    } else {
        Ok(CompressionOutcome {
            bytes: plaintext.to_vec(),
            compressed: false,
            original_size: None,
        })
    }
}

/// Standard gzip inverse.
pub fn decompress(gzipped: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = flate2::read::GzDecoder::new(gzipped);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}
