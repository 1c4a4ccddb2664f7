//! Extension-based MIME type fallback (§4.11 step 3e). No content sniffing —
//! a handful of common extensions plus a default, built once behind a
//! `OnceLock` rather than reaching for a dedicated crate.

use std::collections::HashMap;
use std::sync::OnceLock;

pub const DEFAULT_MIMETYPE: &str = "application/octet-stream";

fn table() -> &'static HashMap<&'static str, &'static str> {
    static TABLE: OnceLock<HashMap<&'static str, &'static str>> = OnceLock::new();
    TABLE.get_or_init(|| {
        HashMap::from([
            ("txt", "text/plain"),
            ("csv", "text/csv"),
            ("html", "text/html"),
            ("htm", "text/html"),
            ("css", "text/css"),
            ("json", "application/json"),
            ("xml", "application/xml"),
            ("pdf", "application/pdf"),
            ("zip", "application/zip"),
            ("gz", "application/gzip"),
            ("png", "image/png"),
            ("jpg", "image/jpeg"),
            ("jpeg", "image/jpeg"),
            ("gif", "image/gif"),
            ("webp", "image/webp"),
            ("svg", "image/svg+xml"),
            ("mp4", "video/mp4"),
            ("mp3", "audio/mpeg"),
            ("wav", "audio/wav"),
            ("doc", "application/msword"),
            ("docx", "application/vnd.openxmlformats-officedocument.wordprocessingml.document"),
            ("xls", "application/vnd.ms-excel"),
            ("xlsx", "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"),
        ])
    })
}

/// Guess a mimetype from a filename's extension, falling back to
/// [`DEFAULT_MIMETYPE`] when there is no extension or no match.
pub fn guess_mimetype(filename: &str) -> String {
    filename
        .rsplit_once('.')
        .and_then(|(_, ext)| table().get(ext.to_ascii_lowercase().as_str()))
        .map(|&m| m.to_string())
        .unwrap_or_else(|| DEFAULT_MIMETYPE.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_known_extensions_case_insensitively() {
        assert_eq!(guess_mimetype("notes.txt"), "text/plain");
        assert_eq!(guess_mimetype("PHOTO.PNG"), "image/png");
    }

    #[test]
    fn falls_back_for_unknown_or_missing_extension() {
        assert_eq!(guess_mimetype("data.xyz"), DEFAULT_MIMETYPE);
        assert_eq!(guess_mimetype("noext"), DEFAULT_MIMETYPE);
    }
}
