//! Capsa Opener (C12, §4.12): selects a keychain entry, unwraps the master
//! key, verifies the signature, and exposes eager/lazy decryption.

use rsa::{RsaPrivateKey, RsaPublicKey};
use serde_json::Value;

use crate::aes_gcm;
use crate::base64url;
use crate::canonical::{build_canonical_string, CanonicalFields};
use crate::compression;
use crate::error::{CapsaError, Result};
use crate::jws;
use crate::model::{Capsa, EncryptedField, FileEntry, KeychainEntry, StructuredData};
use crate::random::zeroize;
use crate::rsa_oaep;

const TAG_LEN: usize = 16;

fn canonical_of(envelope: &Capsa) -> String {
    let file_hashes: Vec<String> = envelope.files.iter().map(|f| f.hash.clone()).collect();
    let file_content_ivs: Vec<String> = envelope.files.iter().map(|f| f.iv.clone()).collect();
    let file_filename_ivs: Vec<String> =
        envelope.files.iter().map(|f| f.filename_iv.clone()).collect();
    let total_size: u64 = envelope.files.iter().map(|f| f.size).sum();

    let fields = CanonicalFields {
        package_id: &envelope.package_id,
        total_size,
        file_hashes: &file_hashes,
        file_content_ivs: &file_content_ivs,
        file_filename_ivs: &file_filename_ivs,
        structured_iv: envelope.structured_iv.as_deref(),
        subject_iv: envelope.subject_iv.as_deref(),
        body_iv: envelope.body_iv.as_deref(),
    };
    build_canonical_string(&fields)
}

fn decode_tag(tag: &str) -> Result<[u8; TAG_LEN]> {
    if tag.is_empty() {
        return Err(CapsaError::AuthenticationFailed);
    }
    let bytes = base64url::decode(tag)?;
    if bytes.len() != TAG_LEN {
        return Err(CapsaError::AuthenticationFailed);
    }
    let mut out = [0u8; TAG_LEN];
    out.copy_from_slice(&bytes);
    Ok(out)
}

fn decode_iv(iv: &str) -> Result<[u8; 12]> {
    let bytes = base64url::decode(iv)?;
    if bytes.len() != 12 {
        return Err(CapsaError::MalformedInput("IV must be 12 bytes".into()));
    }
    let mut out = [0u8; 12];
    out.copy_from_slice(&bytes);
    Ok(out)
}

/// Keychain entries worth attempting for a given `party_id`: the party's own
/// entry (if any) followed by every delegate entry whose `acting_for`
/// mentions it. Order matters only as a preference; which one actually
/// unwraps is decided by whether `recipient_private_key` matches it (§4.12
/// step 2-3, generalized to the case where a party has both a direct entry
/// and delegate coverage and the caller may be opening as either).
fn candidate_entries<'a>(keys: &'a [KeychainEntry], party_id: Option<&str>) -> Vec<&'a KeychainEntry> {
    match party_id {
        Some(id) => {
            let mut list: Vec<&KeychainEntry> = keys.iter().filter(|k| k.party == id).collect();
            list.extend(keys.iter().filter(|k| {
                k.party != id && k.acting_for.as_deref().unwrap_or(&[]).iter().any(|a| a == id)
            }));
            list
        }
        None => {
            let mut list: Vec<&KeychainEntry> = keys.iter().filter(|k| !k.encrypted_key.is_empty()).collect();
            if list.is_empty() {
                list = keys.iter().collect();
            }
            list
        }
    }
}

/// A scoped handle over an envelope's decrypted content and its master key.
/// `Open` while the master key is held; `close` (or drop) transitions to
/// `Closed`, after which any access fails `Disposed`.
pub struct OpenedCapsa {
    envelope: Capsa,
    master_key: Option<[u8; 32]>,
    subject: Option<String>,
    body: Option<String>,
    structured: Option<StructuredData>,
}

impl OpenedCapsa {
    pub fn open(
        envelope: Capsa,
        recipient_private_key: &RsaPrivateKey,
        party_id: Option<&str>,
        creator_public_key: Option<&RsaPublicKey>,
        verify_signature: bool,
    ) -> Result<OpenedCapsa> {
        if verify_signature {
            let pk = creator_public_key
                .ok_or_else(|| CapsaError::Argument("verify_signature requires a creator public key".into()))?;
            let canonical = canonical_of(&envelope);
            if !jws::verify(&envelope.signature, &canonical, pk) {
                return Err(CapsaError::SignatureInvalid);
            }
        }

        // A party can be reachable through more than one keychain entry (its
        // own direct entry and/or a delegate's `acting_for` entry); which one
        // `recipient_private_key` actually unwraps is the real selector, not
        // just which one's `party`/`acting_for` matches the requested id.
        let candidates = candidate_entries(&envelope.keychain.keys, party_id);
        if candidates.is_empty() {
            return Err(CapsaError::NotInKeychain);
        }

        let mut master_key: Option<[u8; 32]> = None;
        for entry in &candidates {
            if entry.encrypted_key.is_empty() {
                continue;
            }
            if let Ok(key) = rsa_oaep::unwrap(&entry.encrypted_key, recipient_private_key) {
                master_key = Some(key);
                break;
            }
        }
        let mut master_key = master_key.ok_or(CapsaError::NotInKeychain)?;

        let subject = match optional_field(&envelope.encrypted_subject, &envelope.subject_iv, &envelope.subject_auth_tag) {
            Some(field) => {
                let plaintext = decrypt_field(&field, &master_key)?;
                Some(String::from_utf8(plaintext).map_err(|e| {
                    CapsaError::MalformedInput(format!("subject is not valid UTF-8: {e}"))
                })?)
            }
            None => None,
        };

        let body = match optional_field(&envelope.encrypted_body, &envelope.body_iv, &envelope.body_auth_tag) {
            Some(field) => {
                let plaintext = decrypt_field(&field, &master_key)?;
                Some(String::from_utf8(plaintext).map_err(|e| {
                    CapsaError::MalformedInput(format!("body is not valid UTF-8: {e}"))
                })?)
            }
            None => None,
        };

        let structured = match optional_field(
            &envelope.encrypted_structured,
            &envelope.structured_iv,
            &envelope.structured_auth_tag,
        ) {
            Some(field) => {
                let plaintext = decrypt_field(&field, &master_key)?;
                let value: Value = serde_json::from_slice(&plaintext)
                    .map_err(|e| CapsaError::MalformedInput(format!("structured data is not valid JSON: {e}")))?;
                match value {
                    Value::Object(map) => Some(map),
                    _ => {
                        return Err(CapsaError::MalformedInput(
                            "structured data must decode to a JSON object".into(),
                        ))
                    }
                }
            }
            None => None,
        };

        let opened = OpenedCapsa {
            envelope,
            master_key: Some(master_key),
            subject,
            body,
            structured,
        };
        // `master_key` is Copy; the struct field above holds its own copy.
        // Clear this now-redundant local copy.
        zeroize(&mut master_key);
        Ok(opened)
    }

    fn check_open(&self) -> Result<&[u8; 32]> {
        self.master_key.as_ref().ok_or(CapsaError::Disposed("OpenedCapsa"))
    }

    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    pub fn structured(&self) -> Option<&StructuredData> {
        self.structured.as_ref()
    }

    pub fn files(&self) -> &[FileEntry] {
        &self.envelope.files
    }

    pub fn package_id(&self) -> &str {
        &self.envelope.package_id
    }

    /// Returns a copy of the master key. The caller owns zeroizing it.
    pub fn get_master_key(&self) -> Result<[u8; 32]> {
        Ok(*self.check_open()?)
    }

    fn find_file(&self, file_id: &str) -> Result<&FileEntry> {
        self.envelope
            .files
            .iter()
            .find(|f| f.file_id == file_id)
            .ok_or_else(|| CapsaError::Argument(format!("unknown file_id: {file_id}")))
    }

    /// Decrypt a file's ciphertext (fetched separately from a blob store) by
    /// `file_id`. Ungzips automatically when the metadata says `compressed`.
    pub fn decrypt_file(&self, file_id: &str, ciphertext: &[u8]) -> Result<Vec<u8>> {
        let master_key = self.check_open()?;
        let entry = self.find_file(file_id)?;
        let tag = decode_tag(&entry.auth_tag)?;
        let iv = decode_iv(&entry.iv)?;
        let plaintext = aes_gcm::decrypt(ciphertext, master_key, &iv, &tag)?;
        if entry.compressed == Some(true) {
            compression::decompress(&plaintext)
        } else {
            Ok(plaintext)
        }
    }

    /// Decrypt a file's stored filename by `file_id`.
    pub fn decrypt_filename(&self, file_id: &str) -> Result<String> {
        let master_key = self.check_open()?;
        let entry = self.find_file(file_id)?;
        // Reject a missing/empty tag before any AEAD call, same guard as
        // subject/body/structured (§4.12 step 6).
        if entry.filename_auth_tag.is_empty() {
            return Err(CapsaError::AuthenticationFailed);
        }
        let field = EncryptedField {
            ciphertext: entry.encrypted_filename.clone(),
            iv: entry.filename_iv.clone(),
            tag: entry.filename_auth_tag.clone(),
        };
        let plaintext = decrypt_field(&field, master_key)?;
        String::from_utf8(plaintext)
            .map_err(|e| CapsaError::MalformedInput(format!("filename is not valid UTF-8: {e}")))
    }

    /// Transition to `Closed`, zeroizing the master key. Idempotent.
    pub fn close(&mut self) {
        if let Some(ref mut key) = self.master_key {
            zeroize(key);
        }
        self.master_key = None;
    }
}

impl Drop for OpenedCapsa {
    fn drop(&mut self) {
        self.close();
    }
}

/// Decrypt a base64url `(ciphertext, iv, tag)` triple (§3's `EncryptedField`)
/// under `master_key`. Used for every field that is stored as three base64url
/// strings in the envelope: subject, body, structured data, and filenames.
/// (File *content* ciphertext is the exception — it lives outside the
/// envelope as an opaque blob, so [`OpenedCapsa::decrypt_file`] decrypts it
/// directly rather than through this helper.)
fn decrypt_field(field: &EncryptedField, master_key: &[u8; 32]) -> Result<Vec<u8>> {
    let ciphertext = base64url::decode(&field.ciphertext)?;
    let iv = decode_iv(&field.iv)?;
    let tag = decode_tag(&field.tag)?;
    aes_gcm::decrypt(&ciphertext, master_key, &iv, &tag)
}

/// Build an [`EncryptedField`] from an optional `(ciphertext, iv, tag)` triple,
/// the shape subject/body/structured data take in the envelope — present only
/// when all three are set.
fn optional_field(
    ciphertext: &Option<String>,
    iv: &Option<String>,
    tag: &Option<String>,
) -> Option<EncryptedField> {
    match (ciphertext, iv, tag) {
        (Some(ciphertext), Some(iv), Some(tag)) => Some(EncryptedField {
            ciphertext: ciphertext.clone(),
            iv: iv.clone(),
            tag: tag.clone(),
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{CapsaBuilder, FileOptions, PartyKey};
    use crate::keygen::generate_key_pair;
    use crate::keys::{parse_private_key, parse_public_key};
    use crate::limits::Limits;

    fn party(id: &str) -> (PartyKey, RsaPrivateKey) {
        let pair = generate_key_pair(4096).unwrap();
        let pk = parse_public_key(&pair.public_key).unwrap();
        let sk = parse_private_key(&pair.private_key).unwrap();
        (
            PartyKey {
                id: id.to_string(),
                public_key: pk,
                fingerprint: pair.fingerprint,
                is_delegate: None,
            },
            sk,
        )
    }

    #[test]
    fn opens_and_decrypts_a_simple_capsa() {
        let (creator, creator_sk) = party("creator");
        let (recipient, recipient_sk) = party("recipient");
        let creator_pk = RsaPublicKey::from(&creator_sk);

        let mut builder = CapsaBuilder::new("creator", Limits::default());
        builder.set_subject("Test Subject").unwrap();
        builder.set_body("Test Body").unwrap();
        builder.add_recipient("recipient").unwrap();
        builder
            .add_file_bytes("notes.txt", b"Hello, World!".to_vec(), FileOptions::default())
            .unwrap();
        let built = builder.build(&creator_sk, vec![creator, recipient]).unwrap();

        let file_id = built.envelope.files[0].file_id.clone();
        let ciphertext = built.blobs.iter().find(|(id, _)| id == &file_id).unwrap().1.clone();

        let opened = OpenedCapsa::open(
            built.envelope,
            &recipient_sk,
            Some("recipient"),
            Some(&creator_pk),
            true,
        )
        .unwrap();

        assert_eq!(opened.subject(), Some("Test Subject"));
        assert_eq!(opened.body(), Some("Test Body"));
        let plaintext = opened.decrypt_file(&file_id, &ciphertext).unwrap();
        assert_eq!(plaintext, b"Hello, World!");
    }

    #[test]
    fn unrelated_party_fails_not_in_keychain() {
        let (creator, creator_sk) = party("creator");
        let (recipient, _recipient_sk) = party("recipient");
        let (_, outsider_sk) = party("outsider");

        let mut builder = CapsaBuilder::new("creator", Limits::default());
        builder.set_subject("hi").unwrap();
        builder.add_recipient("recipient").unwrap();
        let built = builder.build(&creator_sk, vec![creator, recipient]).unwrap();

        let result = OpenedCapsa::open(built.envelope, &outsider_sk, Some("outsider"), None, false);
        assert!(matches!(result, Err(CapsaError::NotInKeychain)));
    }

    #[test]
    fn closed_capsa_rejects_further_access() {
        let (creator, creator_sk) = party("creator");
        let mut builder = CapsaBuilder::new("creator", Limits::default());
        builder.set_subject("hi").unwrap();
        let built = builder.build(&creator_sk, vec![creator]).unwrap();

        let mut opened = OpenedCapsa::open(built.envelope, &creator_sk, None, None, false).unwrap();
        opened.close();
        assert!(matches!(opened.get_master_key(), Err(CapsaError::Disposed(_))));
    }

    #[test]
    fn tampered_signature_fails_verification() {
        let (creator, creator_sk) = party("creator");
        let creator_pk = RsaPublicKey::from(&creator_sk);
        let mut builder = CapsaBuilder::new("creator", Limits::default());
        builder.set_subject("hi").unwrap();
        let mut built = builder.build(&creator_sk, vec![creator]).unwrap();

        let mut raw = base64url::decode(&built.envelope.signature.signature).unwrap();
        raw[0] ^= 0x01;
        built.envelope.signature.signature = base64url::encode(&raw);

        let result = OpenedCapsa::open(built.envelope, &creator_sk, None, Some(&creator_pk), true);
        assert!(matches!(result, Err(CapsaError::SignatureInvalid)));
    }
}
