//! Deterministic assembly of the pipe-delimited signed string (C8, §4.8).
//!
//! The canonical string is re-derived identically on both build and open;
//! any divergence in field order or presence causes signature verification
//! to fail rather than raising a distinct error, by design (§4.9).

pub struct CanonicalFields<'a> {
    pub package_id: &'a str,
    pub total_size: u64,
    pub file_hashes: &'a [String],
    pub file_content_ivs: &'a [String],
    pub file_filename_ivs: &'a [String],
    pub structured_iv: Option<&'a str>,
    pub subject_iv: Option<&'a str>,
    pub body_iv: Option<&'a str>,
}

const VERSION: &str = "1.0.0";
const ALGORITHM: &str = "AES-256-GCM";

/// Build the canonical string per the BNF in §6. Optional IVs are appended
/// only when present — never as an empty placeholder segment.
pub fn build_canonical_string(fields: &CanonicalFields) -> String {
    let mut parts = vec![
        fields.package_id.to_string(),
        VERSION.to_string(),
        fields.total_size.to_string(),
        ALGORITHM.to_string(),
    ];
    parts.extend(fields.file_hashes.iter().cloned());
    parts.extend(fields.file_content_ivs.iter().cloned());
    parts.extend(fields.file_filename_ivs.iter().cloned());
    if let Some(iv) = fields.structured_iv {
        parts.push(iv.to_string());
    }
    if let Some(iv) = fields.subject_iv {
        parts.push(iv.to_string());
    }
    if let Some(iv) = fields.body_iv {
        parts.push(iv.to_string());
    }
    parts.join("|")
}
