//! Wire-format data model: the exact JSON shape exchanged with collaborators
//! (§6). Field names and casing are part of the contract, not an
//! implementation detail — they are pinned with `serde(rename = ...)` rather
//! than relying on a blanket `rename_all` so the mapping stays visible at each
//! field.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A `(ciphertext, iv, tag)` triple, all base64url (§3). Not part of the wire
/// envelope directly — the envelope spells each field out individually under
/// per-field names (`encryptedSubject`/`subjectIV`/`subjectAuthTag`, etc.) —
/// the opener groups them back into this shape to decrypt subject, body,
/// structured data, and filenames through one helper. File *content*
/// ciphertext doesn't fit this shape: it is raw bytes held outside the
/// envelope by a blob store, not a base64url string inside it.
#[derive(Debug, Clone)]
pub struct EncryptedField {
    pub ciphertext: String,
    pub iv: String,
    pub tag: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEntry {
    #[serde(rename = "fileId")]
    pub file_id: String,
    #[serde(rename = "encryptedFilename")]
    pub encrypted_filename: String,
    #[serde(rename = "filenameIV")]
    pub filename_iv: String,
    #[serde(rename = "filenameAuthTag")]
    pub filename_auth_tag: String,
    pub iv: String,
    #[serde(rename = "authTag")]
    pub auth_tag: String,
    pub mimetype: String,
    pub size: u64,
    pub hash: String,
    #[serde(rename = "hashAlgorithm")]
    pub hash_algorithm: String,
    #[serde(rename = "expiresAt", skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compressed: Option<bool>,
    #[serde(rename = "compressionAlgorithm", skip_serializing_if = "Option::is_none")]
    pub compression_algorithm: Option<String>,
    #[serde(rename = "originalSize", skip_serializing_if = "Option::is_none")]
    pub original_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transform: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeychainEntry {
    pub party: String,
    #[serde(rename = "encryptedKey")]
    pub encrypted_key: String,
    pub iv: String,
    pub fingerprint: String,
    pub permissions: Vec<String>,
    #[serde(rename = "actingFor", skip_serializing_if = "Option::is_none")]
    pub acting_for: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revoked: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Keychain {
    pub algorithm: String,
    pub keys: Vec<KeychainEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapsaSignature {
    pub algorithm: String,
    pub protected: String,
    pub payload: String,
    pub signature: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccessControl {
    #[serde(rename = "expiresAt", skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CapsaMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(rename = "relatedPackages", skip_serializing_if = "Option::is_none")]
    pub related_packages: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Capsa {
    #[serde(rename = "packageId")]
    pub package_id: String,
    pub keychain: Keychain,
    pub signature: CapsaSignature,
    #[serde(rename = "accessControl")]
    pub access_control: AccessControl,
    #[serde(rename = "deliveryPriority")]
    pub delivery_priority: String,
    pub files: Vec<FileEntry>,

    #[serde(rename = "encryptedSubject", skip_serializing_if = "Option::is_none")]
    pub encrypted_subject: Option<String>,
    #[serde(rename = "subjectIV", skip_serializing_if = "Option::is_none")]
    pub subject_iv: Option<String>,
    #[serde(rename = "subjectAuthTag", skip_serializing_if = "Option::is_none")]
    pub subject_auth_tag: Option<String>,

    #[serde(rename = "encryptedBody", skip_serializing_if = "Option::is_none")]
    pub encrypted_body: Option<String>,
    #[serde(rename = "bodyIV", skip_serializing_if = "Option::is_none")]
    pub body_iv: Option<String>,
    #[serde(rename = "bodyAuthTag", skip_serializing_if = "Option::is_none")]
    pub body_auth_tag: Option<String>,

    #[serde(rename = "encryptedStructured", skip_serializing_if = "Option::is_none")]
    pub encrypted_structured: Option<String>,
    #[serde(rename = "structuredIV", skip_serializing_if = "Option::is_none")]
    pub structured_iv: Option<String>,
    #[serde(rename = "structuredAuthTag", skip_serializing_if = "Option::is_none")]
    pub structured_auth_tag: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<CapsaMetadata>,
}

/// A recognized-options mapping (§4.11): string keys, JSON-representable
/// values, insertion order preserved. `serde_json`'s `preserve_order`
/// feature backs `serde_json::Map` with an `IndexMap`, so insertion order
/// survives round-tripping and feeds deterministic canonicalization.
pub type StructuredData = serde_json::Map<String, Value>;
